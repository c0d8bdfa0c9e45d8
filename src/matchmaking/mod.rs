//! Matchmaking queue and pairing service

pub mod queue;
pub mod service;

pub use queue::{MatchmakingQueue, QueuedPlayer};
pub use service::MatchmakingService;
