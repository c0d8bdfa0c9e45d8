//! Matchmaking queue implementation

use std::collections::VecDeque;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Player waiting in the matchmaking queue
#[derive(Debug, Clone)]
pub struct QueuedPlayer {
    pub conn_id: Uuid,
    pub display_name: String,
    pub queued_at: Instant,
}

impl QueuedPlayer {
    pub fn new(conn_id: Uuid, display_name: String) -> Self {
        Self {
            conn_id,
            display_name,
            queued_at: Instant::now(),
        }
    }

    /// How long this player has been waiting
    pub fn wait_time(&self) -> Duration {
        self.queued_at.elapsed()
    }
}

/// Strict FIFO queue of waiting connections. Matches are always exactly
/// two players, paired oldest-first.
#[derive(Debug, Default)]
pub struct MatchmakingQueue {
    queue: VecDeque<QueuedPlayer>,
}

impl MatchmakingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a player to the queue; no-op if already waiting
    pub fn enqueue(&mut self, player: QueuedPlayer) {
        if !self.contains(&player.conn_id) {
            self.queue.push_back(player);
        }
    }

    /// Remove a player from the queue (disconnect while waiting)
    pub fn dequeue(&mut self, conn_id: Uuid) -> Option<QueuedPlayer> {
        let pos = self.queue.iter().position(|p| p.conn_id == conn_id)?;
        self.queue.remove(pos)
    }

    /// Check if a player is in the queue
    pub fn contains(&self, conn_id: &Uuid) -> bool {
        self.queue.iter().any(|p| &p.conn_id == conn_id)
    }

    /// Get queue length
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Check if queue is empty
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Pop the two oldest waiters for pairing, if available. Liveness of
    /// the pair is the caller's problem; a dead member is dropped and the
    /// survivor re-enqueued there.
    pub fn pop_pair(&mut self) -> Option<[QueuedPlayer; 2]> {
        if self.queue.len() < 2 {
            return None;
        }
        let first = self.queue.pop_front()?;
        let second = self.queue.pop_front()?;
        Some([first, second])
    }
}
