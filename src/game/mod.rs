//! Game simulation modules

pub mod cards;
pub mod combat;
pub mod r#match;
pub mod snapshot;

pub use r#match::{GameMatch, MatchHandle, MatchRegistry, PlayerSeat, PlayerState, Troop};

use crate::ws::protocol::ClientMsg;
use uuid::Uuid;

/// Arena dimensions (fixed, matches the client's logical canvas)
pub const ARENA_WIDTH: f32 = 600.0;
pub const ARENA_HEIGHT: f32 = 800.0;
pub const BASE_SIZE: f32 = 100.0;

/// Base health and defense
pub const BASE_MAX_HEALTH: f32 = 100.0;
pub const BASE_ATTACK_RANGE: f32 = 200.0;
pub const BASE_ATTACK_DAMAGE: f32 = 2.0;
/// Attacks per second
pub const BASE_ATTACK_SPEED: f32 = 1.0;
/// Visual base-attack indicator lifetime without a fresh hit
pub const BASE_ATTACK_INDICATOR_MS: u64 = 200;

/// Mana economy
pub const MAX_MANA: f32 = 10.0;
pub const MANA_REGEN_PER_SEC: f32 = 0.5;
/// Flat bonus granted by a mana-gain card
pub const MANA_GAIN_AMOUNT: f32 = 4.0;

/// Hand and spawn placement
pub const HAND_SIZE: usize = 4;
/// Lateral jitter around the base when a troop spawns
pub const SPAWN_JITTER_X: f32 = 140.0;
/// Spawn offset from the base center toward the arena middle
pub const SPAWN_GAP_Y: f32 = 50.0;

/// Grace delay before an ended match is purged from the registry
pub const MATCH_PURGE_DELAY_SECS: u64 = 5;

/// Player intent received from the connection gateway
#[derive(Debug, Clone)]
pub struct PlayerInput {
    pub conn_id: Uuid,
    pub msg: ClientMsg,
    pub received_at: u64,
}
