//! Snapshot building for state broadcasts
//!
//! The full match state goes out every tick at 10Hz; there is no delta
//! compression, the state for two players is small enough to resend whole.

use std::collections::HashMap;

use crate::ws::protocol::{CardSnapshot, PlayerSnapshot, ServerMsg, TroopSnapshot};

use super::r#match::{MatchState, PlayerState};

/// Build the per-tick `match_state` broadcast
pub fn match_state(state: &MatchState) -> ServerMsg {
    let players: HashMap<_, _> = state
        .players
        .iter()
        .map(|p| (p.conn_id, player_snapshot(p)))
        .collect();

    ServerMsg::MatchState {
        match_id: state.id,
        players,
    }
}

fn player_snapshot(player: &PlayerState) -> PlayerSnapshot {
    PlayerSnapshot {
        conn_id: player.conn_id,
        display_name: player.display_name.clone(),
        side: player.side,
        // never emit a negative base health
        base_health: player.base_health.max(0.0),
        max_base_health: super::BASE_MAX_HEALTH,
        base_position: player.base_position,
        mana: player.mana,
        max_mana: player.max_mana,
        base_attacking: player.base_attacking,
        troops: player
            .troops
            .iter()
            .map(|t| TroopSnapshot {
                id: t.id,
                troop_type: t.troop_type,
                level: t.level,
                position: t.position,
                health: t.health,
                max_health: t.max_health,
                attacking: t.attacking,
            })
            .collect(),
        cards: player
            .cards
            .iter()
            .map(|c| CardSnapshot {
                id: c.id,
                troop_type: c.troop_type,
                mana_cost: c.mana_cost,
            })
            .collect(),
    }
}
