//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::util::rate_limit::ConnectionRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// WebSocket upgrade handler. Identity is an ephemeral connection id;
/// there is no account layer.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let conn_id = Uuid::new_v4();
    info!(conn_id = %conn_id, "new WebSocket connection");

    let (mut ws_sink, mut ws_stream) = socket.split();

    // Send welcome message
    let welcome = ServerMsg::Welcome {
        conn_id,
        server_time: unix_millis(),
    };
    if let Err(e) = send_msg(&mut ws_sink, &welcome).await {
        error!(conn_id = %conn_id, error = %e, "failed to send welcome");
        return;
    }

    // Register with matchmaking to get the outbound channel
    let outbox_rx = state.matchmaking.register_connection(conn_id);

    // Writer task: outbound channel -> WebSocket
    let writer_handle = tokio::spawn(write_loop(conn_id, ws_sink, outbox_rx));

    // Reader loop: WebSocket -> queue/match operations
    let rate_limiter = ConnectionRateLimiter::new();
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_input() {
                    warn!(conn_id = %conn_id, "rate limited input message");
                    continue;
                }
                match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(msg) => dispatch(&state, conn_id, msg).await,
                    Err(e) => {
                        warn!(conn_id = %conn_id, error = %e, "failed to parse client message");
                    }
                }
            }
            Ok(Message::Close(_)) => {
                info!(conn_id = %conn_id, "client initiated close");
                break;
            }
            Ok(_) => {
                // binary and control frames carry no intents
                debug!(conn_id = %conn_id, "ignoring non-text frame");
            }
            Err(e) => {
                error!(conn_id = %conn_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    // Cleanup on disconnect: dequeue if waiting, forfeit if in a match
    state.matchmaking.handle_disconnect(conn_id).await;
    writer_handle.abort();

    info!(conn_id = %conn_id, "WebSocket connection closed");
}

/// Map one inbound intent to the matchmaking/match components
async fn dispatch(state: &AppState, conn_id: Uuid, msg: ClientMsg) {
    match msg {
        ClientMsg::JoinQueue { display_name } => {
            let name = display_name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| format!("Player_{}", &conn_id.to_string()[..8]));
            state.matchmaking.join_queue(conn_id, name).await;
        }
        ClientMsg::PlayCard {
            match_id,
            slot_index,
        } => {
            state
                .matchmaking
                .route_play_card(conn_id, match_id, slot_index)
                .await;
        }
        ClientMsg::Ping { t } => {
            state.matchmaking.send_to(conn_id, ServerMsg::Pong { t });
        }
        ClientMsg::LeaveMatch => {
            state.matchmaking.route_leave(conn_id).await;
        }
    }
}

/// Forward outbound messages to the socket until either side closes
async fn write_loop(
    conn_id: Uuid,
    mut ws_sink: futures::stream::SplitSink<WebSocket, Message>,
    mut outbox_rx: mpsc::UnboundedReceiver<ServerMsg>,
) {
    while let Some(msg) = outbox_rx.recv().await {
        if let Err(e) = send_msg(&mut ws_sink, &msg).await {
            debug!(conn_id = %conn_id, error = %e, "WebSocket send failed");
            break;
        }
    }
}

/// Send a message over WebSocket
async fn send_msg(
    sink: &mut futures::stream::SplitSink<WebSocket, Message>,
    msg: &ServerMsg,
) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
