//! Matchmaking flows: pairing, waiting, disconnects, forfeits, purge.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;
use uuid::Uuid;

use card_battle_server::game::MatchRegistry;
use card_battle_server::matchmaking::MatchmakingService;
use card_battle_server::ws::protocol::{MatchResult, ServerMsg, Side};

const RECV_TIMEOUT: Duration = Duration::from_secs(2);

struct Client {
    conn_id: Uuid,
    rx: mpsc::UnboundedReceiver<ServerMsg>,
}

fn connect(service: &MatchmakingService) -> Client {
    let conn_id = Uuid::new_v4();
    let rx = service.register_connection(conn_id);
    Client { conn_id, rx }
}

async fn recv(client: &mut Client) -> ServerMsg {
    timeout(RECV_TIMEOUT, client.rx.recv())
        .await
        .expect("no message within timeout")
        .expect("channel closed")
}

/// Skip state broadcasts until something else arrives
async fn recv_non_state(client: &mut Client) -> ServerMsg {
    loop {
        let msg = recv(client).await;
        if !matches!(msg, ServerMsg::MatchState { .. }) {
            return msg;
        }
    }
}

#[tokio::test]
async fn two_live_connections_pair_into_one_match() {
    let registry = Arc::new(MatchRegistry::new());
    let service = MatchmakingService::new(registry.clone());

    let mut a = connect(&service);
    let mut b = connect(&service);

    service.join_queue(a.conn_id, "alice".to_string()).await;
    assert!(matches!(recv(&mut a).await, ServerMsg::WaitingForOpponent));

    service.join_queue(b.conn_id, "bo".to_string()).await;

    let ServerMsg::MatchStart {
        match_id,
        self_id,
        opponent_id,
        side,
        self_name,
        opponent_name,
    } = recv_non_state(&mut a).await
    else {
        panic!("expected match_start for the first joiner");
    };
    assert_eq!(self_id, a.conn_id);
    assert_eq!(opponent_id, b.conn_id);
    assert_eq!(side, Side::Near);
    assert_eq!(self_name, "alice");
    assert_eq!(opponent_name, "bo");

    let ServerMsg::MatchStart {
        match_id: b_match,
        side: b_side,
        ..
    } = recv_non_state(&mut b).await
    else {
        panic!("expected match_start for the second joiner");
    };
    assert_eq!(b_match, match_id);
    assert_eq!(b_side, Side::Far);

    // nobody left waiting, exactly one match registered
    assert_eq!(service.queue_size().await, 0);
    assert_eq!(registry.active_matches(), 1);
    assert_eq!(service.current_match(&a.conn_id), Some(match_id));
}

#[tokio::test]
async fn matched_players_receive_state_broadcasts() {
    let registry = Arc::new(MatchRegistry::new());
    let service = MatchmakingService::new(registry);

    let mut a = connect(&service);
    let mut b = connect(&service);
    service.join_queue(a.conn_id, "a".to_string()).await;
    service.join_queue(b.conn_id, "b".to_string()).await;

    // skip waiting/match_start, then expect a 10Hz state stream
    for client in [&mut a, &mut b] {
        loop {
            if let ServerMsg::MatchState { players, .. } = recv(client).await {
                assert_eq!(players.len(), 2);
                let snapshot = &players[&client.conn_id];
                assert_eq!(snapshot.base_health, 100.0);
                assert_eq!(snapshot.cards.len(), 4);
                break;
            }
        }
    }
}

#[tokio::test]
async fn queued_disconnect_leaves_no_phantom_waiter() {
    let registry = Arc::new(MatchRegistry::new());
    let service = MatchmakingService::new(registry.clone());

    let mut a = connect(&service);
    service.join_queue(a.conn_id, "a".to_string()).await;
    assert!(matches!(recv(&mut a).await, ServerMsg::WaitingForOpponent));

    service.handle_disconnect(a.conn_id).await;
    assert_eq!(service.queue_size().await, 0);

    // a later solo enqueue must wait, not match against the ghost
    let mut b = connect(&service);
    service.join_queue(b.conn_id, "b".to_string()).await;
    assert!(matches!(recv(&mut b).await, ServerMsg::WaitingForOpponent));
    assert!(service.is_queued(&b.conn_id).await);
    assert_eq!(registry.active_matches(), 0);
}

#[tokio::test]
async fn disconnect_during_match_forfeits_to_the_opponent() {
    let registry = Arc::new(MatchRegistry::new());
    let service = MatchmakingService::new(registry.clone());

    let mut a = connect(&service);
    let mut b = connect(&service);
    service.join_queue(a.conn_id, "a".to_string()).await;
    service.join_queue(b.conn_id, "b".to_string()).await;

    // both seated
    assert!(matches!(
        recv_non_state(&mut b).await,
        ServerMsg::MatchStart { .. }
    ));

    service.handle_disconnect(a.conn_id).await;

    loop {
        match recv_non_state(&mut b).await {
            ServerMsg::MatchOver { result } => {
                assert_eq!(result, MatchResult::Win);
                break;
            }
            // pre-forfeit queue/start chatter
            _ => continue,
        }
    }
    assert_eq!(registry.active_matches(), 0);
}

#[tokio::test(start_paused = true)]
async fn ended_match_is_purged_after_the_grace_delay() {
    let registry = Arc::new(MatchRegistry::new());
    let service = MatchmakingService::new(registry.clone());

    let mut a = connect(&service);
    let mut b = connect(&service);
    service.join_queue(a.conn_id, "a".to_string()).await;
    assert!(matches!(recv(&mut a).await, ServerMsg::WaitingForOpponent));
    service.join_queue(b.conn_id, "b".to_string()).await;

    let ServerMsg::MatchStart { match_id, .. } = recv_non_state(&mut a).await else {
        panic!("expected match_start");
    };

    service.handle_disconnect(a.conn_id).await;
    loop {
        if let ServerMsg::MatchOver { .. } = recv_non_state(&mut b).await {
            break;
        }
    }

    // the record survives the grace window, then disappears
    let handle = registry.get(&match_id).expect("still registered in grace");
    assert!(!handle.is_active());

    timeout(Duration::from_secs(30), async {
        while registry.get(&match_id).is_some() {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    })
    .await
    .expect("match purged after grace delay");
}
