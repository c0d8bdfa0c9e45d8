//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::catalog::TroopType;

/// 2D position in arena coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Which vertical extreme of the arena a player's base sits at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// Bottom of the arena
    Near,
    /// Top of the arena
    Far,
}

/// Match outcome from one player's perspective
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchResult {
    Win,
    Lose,
}

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Enter the matchmaking queue
    JoinQueue {
        display_name: Option<String>,
    },

    /// Play the card in a hand slot
    PlayCard {
        match_id: Uuid,
        /// UI slot index into the fixed-size hand
        slot_index: usize,
    },

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },

    /// Concede the current match
    LeaveMatch,
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Welcome message after connection
    Welcome {
        conn_id: Uuid,
        server_time: u64,
    },

    /// Queued, no opponent available yet
    WaitingForOpponent,

    /// Paired into a match
    MatchStart {
        match_id: Uuid,
        self_id: Uuid,
        opponent_id: Uuid,
        side: Side,
        self_name: String,
        opponent_name: String,
    },

    /// Full authoritative state, broadcast every tick while active
    MatchState {
        match_id: Uuid,
        players: HashMap<Uuid, PlayerSnapshot>,
    },

    /// Card play rejected: mana below the card's cost
    InsufficientMana,

    /// Match has ended
    MatchOver {
        result: MatchResult,
    },

    /// Pong response
    Pong {
        /// Echo back client timestamp
        t: u64,
    },
}

/// One player's state in a match-state broadcast
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub conn_id: Uuid,
    pub display_name: String,
    pub side: Side,
    pub base_position: Position,
    /// Clamped at 0 in emitted state
    pub base_health: f32,
    pub max_base_health: f32,
    pub mana: f32,
    pub max_mana: f32,
    /// Transient base-defense indicator for the renderer
    pub base_attacking: Option<BaseAttackIndicator>,
    pub troops: Vec<TroopSnapshot>,
    /// Hand, order = UI slot index
    pub cards: Vec<CardSnapshot>,
}

/// A live troop in a snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TroopSnapshot {
    pub id: Uuid,
    pub troop_type: TroopType,
    pub level: u32,
    pub position: Position,
    pub health: f32,
    pub max_health: f32,
    pub attacking: bool,
}

/// A hand slot in a snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardSnapshot {
    pub id: Uuid,
    pub troop_type: TroopType,
    pub mana_cost: f32,
}

/// Visual marker for a base-defense shot: which enemy troop was hit and
/// when. Decays server-side after 200ms; no gameplay effect.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BaseAttackIndicator {
    pub target: Uuid,
    pub started_at: u64,
}
