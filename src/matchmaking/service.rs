//! Matchmaking service - connection registry, pairing, and match routing

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::game::{GameMatch, MatchRegistry, PlayerInput, PlayerSeat, MATCH_PURGE_DELAY_SECS};
use crate::util::time::unix_millis;
use crate::ws::protocol::{ClientMsg, ServerMsg};

use super::queue::{MatchmakingQueue, QueuedPlayer};

/// Matchmaking service. Owns the waiting queue, the table of live
/// connections, and the connection-to-match association.
pub struct MatchmakingService {
    queue: Mutex<MatchmakingQueue>,
    registry: Arc<MatchRegistry>,
    /// Outbound channel per live connection
    connections: DashMap<Uuid, mpsc::UnboundedSender<ServerMsg>>,
    /// Connection -> current match; Arc-shared with the per-match
    /// cleanup tasks
    player_matches: Arc<DashMap<Uuid, Uuid>>,
}

impl MatchmakingService {
    pub fn new(registry: Arc<MatchRegistry>) -> Self {
        Self {
            queue: Mutex::new(MatchmakingQueue::new()),
            registry,
            connections: DashMap::new(),
            player_matches: Arc::new(DashMap::new()),
        }
    }

    /// Register a connection (called when the WebSocket connects).
    /// Returns the receiver its session reads outbound messages from.
    pub fn register_connection(&self, conn_id: Uuid) -> mpsc::UnboundedReceiver<ServerMsg> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.connections.insert(conn_id, tx);
        rx
    }

    /// Push a message to one connection's session
    pub fn send_to(&self, conn_id: Uuid, msg: ServerMsg) {
        if let Some(tx) = self.connections.get(&conn_id) {
            let _ = tx.send(msg);
        }
    }

    /// Join the matchmaking queue. Pairs the two oldest live waiters the
    /// moment the queue holds two.
    pub async fn join_queue(&self, conn_id: Uuid, display_name: String) {
        if self.player_matches.contains_key(&conn_id) {
            warn!(conn_id = %conn_id, "join_queue while in a match, ignoring");
            return;
        }

        let mut queue = self.queue.lock().await;
        queue.enqueue(QueuedPlayer::new(conn_id, display_name));
        info!(conn_id = %conn_id, queue_size = queue.len(), "joined matchmaking queue");

        while let Some(pair) = queue.pop_pair() {
            let [first, second] = pair;
            let first_tx = self.connections.get(&first.conn_id).map(|t| t.value().clone());
            let second_tx = self
                .connections
                .get(&second.conn_id)
                .map(|t| t.value().clone());

            match (first_tx, second_tx) {
                (Some(first_tx), Some(second_tx)) => {
                    self.create_match([(first, first_tx), (second, second_tx)]);
                }
                (first_tx, second_tx) => {
                    // a candidate vanished before pairing: keep the
                    // survivor(s) waiting and tell them so
                    for (player, tx) in [(first, first_tx), (second, second_tx)] {
                        if tx.is_some() {
                            info!(conn_id = %player.conn_id, "partner disconnected, still waiting");
                            let id = player.conn_id;
                            queue.enqueue(player);
                            self.send_to(id, ServerMsg::WaitingForOpponent);
                        }
                    }
                }
            }
        }

        if queue.contains(&conn_id) {
            self.send_to(conn_id, ServerMsg::WaitingForOpponent);
        }
    }

    /// Spin up a match for a pair: seat assignment, registry entry, and
    /// the tick task, with purge after the post-game grace delay.
    fn create_match(&self, pair: [(QueuedPlayer, mpsc::UnboundedSender<ServerMsg>); 2]) {
        let match_id = Uuid::new_v4();
        let seed = rand::random::<u64>();

        let seats = pair.map(|(player, outbox)| PlayerSeat {
            conn_id: player.conn_id,
            display_name: player.display_name,
            outbox,
        });
        let members = [seats[0].conn_id, seats[1].conn_id];

        let (game_match, handle) = GameMatch::new(match_id, seed, seats, unix_millis());
        self.registry.insert(handle);
        for conn_id in members {
            self.player_matches.insert(conn_id, match_id);
        }

        info!(match_id = %match_id, near = %members[0], far = %members[1], "created match");

        let registry = self.registry.clone();
        let player_matches = self.player_matches.clone();
        tokio::spawn(async move {
            game_match.run().await;

            // match over: free both connections for a rematch right away,
            // keep the registry entry through the grace period
            for conn_id in members {
                player_matches.remove(&conn_id);
            }
            tokio::time::sleep(Duration::from_secs(MATCH_PURGE_DELAY_SECS)).await;
            registry.remove(&match_id);
            info!(match_id = %match_id, "match purged");
        });
    }

    /// Route a play-card intent to its match task
    pub async fn route_play_card(&self, conn_id: Uuid, match_id: Uuid, slot_index: usize) {
        let Some(handle) = self.registry.get(&match_id) else {
            debug!(conn_id = %conn_id, match_id = %match_id, "play for unknown match, ignoring");
            return;
        };
        if !handle.is_active() {
            debug!(conn_id = %conn_id, match_id = %match_id, "play for ended match, ignoring");
            return;
        }
        if !handle.members.contains(&conn_id) {
            warn!(conn_id = %conn_id, match_id = %match_id, "play from a non-member, ignoring");
            return;
        }

        let input = PlayerInput {
            conn_id,
            msg: ClientMsg::PlayCard {
                match_id,
                slot_index,
            },
            received_at: unix_millis(),
        };
        if handle.input_tx.send(input).await.is_err() {
            debug!(match_id = %match_id, "match task gone, dropping play intent");
        }
    }

    /// Client-initiated concede: forfeit without dropping the connection
    pub async fn route_leave(&self, conn_id: Uuid) {
        if let Some(match_id) = self.player_matches.get(&conn_id).map(|r| *r) {
            self.forfeit(conn_id, match_id).await;
        }
    }

    /// Connection closed: drop from the queue if waiting, forfeit any
    /// active match, release the outbound channel.
    pub async fn handle_disconnect(&self, conn_id: Uuid) {
        self.connections.remove(&conn_id);

        {
            let mut queue = self.queue.lock().await;
            queue.dequeue(conn_id);
        }

        if let Some((_, match_id)) = self.player_matches.remove(&conn_id) {
            self.forfeit(conn_id, match_id).await;
        }

        info!(conn_id = %conn_id, "connection unregistered");
    }

    async fn forfeit(&self, conn_id: Uuid, match_id: Uuid) {
        let Some(handle) = self.registry.get(&match_id) else {
            return;
        };
        if !handle.is_active() {
            return;
        }
        let input = PlayerInput {
            conn_id,
            msg: ClientMsg::LeaveMatch,
            received_at: unix_millis(),
        };
        if handle.input_tx.send(input).await.is_err() {
            debug!(match_id = %match_id, "match task gone, forfeit already settled");
        }
    }

    /// Current queue size (health endpoint)
    pub async fn queue_size(&self) -> usize {
        self.queue.lock().await.len()
    }

    /// Check if a connection is waiting in the queue
    pub async fn is_queued(&self, conn_id: &Uuid) -> bool {
        self.queue.lock().await.contains(conn_id)
    }

    /// The match a connection is currently in, if any
    pub fn current_match(&self, conn_id: &Uuid) -> Option<Uuid> {
        self.player_matches.get(conn_id).map(|r| *r)
    }
}
