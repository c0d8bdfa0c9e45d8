//! Card hand management and draw policy

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use uuid::Uuid;

use crate::catalog::{TroopDefinition, TroopType};
use crate::ws::protocol::{Position, Side};

use super::{HAND_SIZE, SPAWN_GAP_Y, SPAWN_JITTER_X};

/// A hand slot: a troop type plus its cost snapshotted at draw time
#[derive(Debug, Clone)]
pub struct Card {
    pub id: Uuid,
    pub troop_type: TroopType,
    pub mana_cost: f32,
}

impl Card {
    pub fn new(troop_type: TroopType) -> Self {
        Self {
            id: Uuid::new_v4(),
            troop_type,
            mana_cost: TroopDefinition::get(troop_type).mana_cost,
        }
    }
}

/// Starter card type every fresh hand is built from
pub const STARTER_TYPE: TroopType = TroopType::Soldier;

/// Draw policy for replacing played cards
pub struct CardDealer;

impl CardDealer {
    /// Initial hand for a new match: all starter cards
    pub fn initial_hand() -> Vec<Card> {
        (0..HAND_SIZE).map(|_| Card::new(STARTER_TYPE)).collect()
    }

    /// Uniform draw over the card pool, excluding the just-played type to
    /// cut down on immediate repeats
    pub fn draw_replacement(rng: &mut ChaCha8Rng, exclude: TroopType) -> Card {
        let pool: Vec<TroopType> = TroopType::ALL
            .into_iter()
            .filter(|t| *t != exclude)
            .collect();
        Card::new(pool[rng.gen_range(0..pool.len())])
    }

    /// A full fresh hand for the reshuffle mechanic. Further reshuffle
    /// cards are excluded from the redraw to avoid infinite chains.
    pub fn reshuffle_hand(rng: &mut ChaCha8Rng) -> Vec<Card> {
        let pool: Vec<TroopType> = TroopType::ALL
            .into_iter()
            .filter(|t| *t != TroopType::Shuffler)
            .collect();
        (0..HAND_SIZE)
            .map(|_| Card::new(pool[rng.gen_range(0..pool.len())]))
            .collect()
    }

    /// Random combat troop types for the mystery-box spawn
    pub fn random_combat_types(rng: &mut ChaCha8Rng, count: usize) -> Vec<TroopType> {
        let pool: Vec<TroopType> = TroopType::ALL
            .into_iter()
            .filter(|t| !t.is_mechanic())
            .collect();
        (0..count)
            .map(|_| pool[rng.gen_range(0..pool.len())])
            .collect()
    }
}

/// Spawn point near a base: lateral jitter, offset toward the arena
/// middle so troops start on the lane rather than inside the base.
pub fn spawn_position(rng: &mut ChaCha8Rng, base: Position, side: Side) -> Position {
    let gap = match side {
        Side::Near => -SPAWN_GAP_Y,
        Side::Far => SPAWN_GAP_Y,
    };
    Position {
        x: base.x + rng.gen_range(-SPAWN_JITTER_X..SPAWN_JITTER_X),
        y: base.y + gap,
    }
}

/// Three spawn points for a multi-spawn card: deterministic lateral
/// spread plus a little jitter per body.
pub fn multi_spawn_positions(rng: &mut ChaCha8Rng, base: Position, side: Side) -> [Position; 3] {
    let gap = match side {
        Side::Near => -SPAWN_GAP_Y,
        Side::Far => SPAWN_GAP_Y,
    };
    [-60.0_f32, 0.0, 60.0].map(|spread| Position {
        x: base.x + spread + rng.gen_range(-20.0..20.0),
        y: base.y + gap + rng.gen_range(-10.0..10.0),
    })
}
