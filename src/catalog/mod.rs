//! Troop catalog - immutable per-type stat tables and level scaling
//!
//! The catalog is pure data: definitions are looked up by [`TroopType`] and
//! never mutated. Stat scaling for repeated plays lives here too, alongside
//! the per-match [`LevelRegistry`] that tracks play counts.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Troop types available in the game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TroopType {
    /// Cheap balanced infantry, the starter card
    Soldier,
    /// High health, slow, medium damage
    Tank,
    /// Fragile ranged unit with fast shots
    Archer,
    /// Fast melee with very short reach
    Berserker,
    /// Durable melee bruiser
    Knight,
    /// Long range, high damage, very fragile
    Mage,
    /// Spawns three bodies per card
    Swarm,
    /// Near-stationary long-range emplacement
    Ballista,
    /// Mechanic card: spawns three random combat troops
    MysteryBox,
    /// Mechanic card: heals the owner's base
    Elixir,
    /// Mechanic card: grants mana plus a decoy body
    ManaOrb,
    /// Mechanic card: redraws the entire hand
    Shuffler,
}

impl TroopType {
    /// Every type that can appear on a card
    pub const ALL: [TroopType; 12] = [
        TroopType::Soldier,
        TroopType::Tank,
        TroopType::Archer,
        TroopType::Berserker,
        TroopType::Knight,
        TroopType::Mage,
        TroopType::Swarm,
        TroopType::Ballista,
        TroopType::MysteryBox,
        TroopType::Elixir,
        TroopType::ManaOrb,
        TroopType::Shuffler,
    ];

    /// Mechanic-only cards resolve an effect instead of fielding a
    /// combat-worthy troop of their own type.
    pub fn is_mechanic(self) -> bool {
        matches!(
            self,
            TroopType::MysteryBox | TroopType::Elixir | TroopType::ManaOrb | TroopType::Shuffler
        )
    }

    /// Parse a type id string (tooling, logs). Unknown ids are `None`;
    /// callers wanting the canonical defensive default chain with
    /// `unwrap_or_default()` (soldier).
    pub fn from_id(id: &str) -> Option<Self> {
        match id {
            "soldier" => Some(Self::Soldier),
            "tank" => Some(Self::Tank),
            "archer" => Some(Self::Archer),
            "berserker" => Some(Self::Berserker),
            "knight" => Some(Self::Knight),
            "mage" => Some(Self::Mage),
            "swarm" => Some(Self::Swarm),
            "ballista" => Some(Self::Ballista),
            "mystery_box" => Some(Self::MysteryBox),
            "elixir" => Some(Self::Elixir),
            "mana_orb" => Some(Self::ManaOrb),
            "shuffler" => Some(Self::Shuffler),
            _ => None,
        }
    }
}

impl Default for TroopType {
    fn default() -> Self {
        Self::Soldier
    }
}

/// Non-spawn effect triggered when a card of this type is played
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecialEffect {
    None,
    /// Spawn 3 troops of the card's type instead of 1
    MultiSpawn,
    /// Spawn 3 troops of random non-mechanic types
    RandomMultiSpawn,
    /// Heal the owner's base by the scaled attack stat
    BaseHeal,
    /// Grant a flat mana bonus, plus a decoy spawn
    ManaGain,
    /// Replace the owner's entire hand with fresh draws
    HandReshuffle,
}

/// Aggro radius bounds: a troop prefers enemy troops over the enemy base
/// within `2 x range`, clamped to its floor and this ceiling.
pub const AGGRO_CEILING: f32 = 400.0;

/// Default aggro floor; fast melee types use a lower one so they commit
/// to the base rush instead of chasing everything on the lane.
pub const AGGRO_FLOOR: f32 = 220.0;
const AGGRO_FLOOR_FAST_MELEE: f32 = 120.0;

/// Immutable stats for a troop type
#[derive(Debug, Clone, Copy)]
pub struct TroopDefinition {
    pub troop_type: TroopType,
    pub health: f32,
    pub attack: f32,
    pub range: f32,
    pub speed: f32,
    /// Attacks per second
    pub attack_speed: f32,
    pub mana_cost: f32,
    pub special: SpecialEffect,
    pub aggro_floor: f32,
}

impl TroopDefinition {
    /// Look up the definition for a troop type. Total over the enum;
    /// string ids from outside the protocol go through
    /// [`TroopType::from_id`] first, with soldier as the documented
    /// fallback for anything unknown.
    pub fn get(troop_type: TroopType) -> Self {
        match troop_type {
            TroopType::Soldier => Self {
                troop_type,
                health: 2.0,
                attack: 1.0,
                range: 35.0,
                speed: 10.0,
                attack_speed: 1.5,
                mana_cost: 1.0,
                special: SpecialEffect::None,
                aggro_floor: AGGRO_FLOOR,
            },
            TroopType::Tank => Self {
                troop_type,
                health: 55.0,
                attack: 2.0,
                range: 40.0,
                speed: 2.5,
                attack_speed: 1.0,
                mana_cost: 8.0,
                special: SpecialEffect::None,
                aggro_floor: AGGRO_FLOOR,
            },
            TroopType::Archer => Self {
                troop_type,
                health: 7.0,
                attack: 1.5,
                range: 225.0,
                speed: 4.0,
                attack_speed: 2.0,
                mana_cost: 5.0,
                special: SpecialEffect::None,
                aggro_floor: AGGRO_FLOOR,
            },
            TroopType::Berserker => Self {
                troop_type,
                health: 13.0,
                attack: 2.0,
                range: 15.0,
                speed: 17.0,
                attack_speed: 2.0,
                mana_cost: 4.0,
                special: SpecialEffect::None,
                aggro_floor: AGGRO_FLOOR_FAST_MELEE,
            },
            TroopType::Knight => Self {
                troop_type,
                health: 18.0,
                attack: 3.0,
                range: 35.0,
                speed: 5.5,
                attack_speed: 0.8,
                mana_cost: 3.0,
                special: SpecialEffect::None,
                aggro_floor: AGGRO_FLOOR,
            },
            TroopType::Mage => Self {
                troop_type,
                health: 5.0,
                attack: 9.0,
                range: 275.0,
                speed: 3.5,
                attack_speed: 0.66,
                mana_cost: 7.0,
                special: SpecialEffect::None,
                aggro_floor: AGGRO_FLOOR,
            },
            TroopType::Swarm => Self {
                troop_type,
                health: 4.0,
                attack: 2.0,
                range: 50.0,
                speed: 7.0,
                attack_speed: 1.5,
                mana_cost: 5.0,
                special: SpecialEffect::MultiSpawn,
                aggro_floor: AGGRO_FLOOR,
            },
            TroopType::Ballista => Self {
                troop_type,
                health: 25.0,
                attack: 1.0,
                range: 285.0,
                speed: 0.1,
                attack_speed: 2.33,
                mana_cost: 6.0,
                special: SpecialEffect::None,
                aggro_floor: AGGRO_FLOOR,
            },
            TroopType::MysteryBox => Self {
                troop_type,
                health: 0.0,
                attack: 0.0,
                range: 0.0,
                speed: 0.0,
                attack_speed: 0.0,
                mana_cost: 10.0,
                special: SpecialEffect::RandomMultiSpawn,
                aggro_floor: AGGRO_FLOOR,
            },
            TroopType::Elixir => Self {
                troop_type,
                health: 0.0,
                // The attack stat doubles as the heal amount
                attack: 12.0,
                range: 0.0,
                speed: 0.0,
                attack_speed: 0.0,
                mana_cost: 4.0,
                special: SpecialEffect::BaseHeal,
                aggro_floor: AGGRO_FLOOR,
            },
            TroopType::ManaOrb => Self {
                troop_type,
                health: 1.0,
                attack: 0.0,
                range: 30.0,
                speed: 2.0,
                attack_speed: 1.0,
                mana_cost: 2.0,
                special: SpecialEffect::ManaGain,
                aggro_floor: AGGRO_FLOOR,
            },
            TroopType::Shuffler => Self {
                troop_type,
                health: 0.0,
                attack: 0.0,
                range: 0.0,
                speed: 0.0,
                attack_speed: 0.0,
                mana_cost: 0.0,
                special: SpecialEffect::HandReshuffle,
                aggro_floor: AGGRO_FLOOR,
            },
        }
    }

    /// Aggro radius for this type: `2 x range` clamped to the per-type
    /// floor and the global ceiling.
    pub fn aggro_radius(&self) -> f32 {
        (2.0 * self.range).clamp(self.aggro_floor, AGGRO_CEILING)
    }
}

/// Scale a base stat for a play-count level.
///
/// Level 1 (or below) returns the base stat truncated to 2 decimals.
/// Each level step past 1 adds a fixed percentage of the ORIGINAL base
/// stat: level 2 adds 10%, level 3 a further 11%, level 4 a further 12%,
/// and so on (cumulative, never compounding off the running total).
/// Results are truncated, not rounded. Range is never passed through
/// here at spawn time; it stays at the base value for every level.
pub fn scale_stat(base: f32, level: u32) -> f32 {
    let bonus_percent: u32 = if level <= 1 {
        0
    } else {
        (0..level - 1).map(|step| 10 + step).sum()
    };
    (base * (100 + bonus_percent) as f32).floor() / 100.0
}

/// Per-match play-count tracker.
///
/// Owned by a single match and dropped with it, so counts can never leak
/// across matches or connections. Convention is increment-then-read: the
/// first play of a type yields level 1 (base stats), the second level 2.
#[derive(Debug, Default)]
pub struct LevelRegistry {
    counts: HashMap<(Uuid, TroopType), u32>,
}

impl LevelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a play and return the resulting level.
    pub fn bump(&mut self, owner: Uuid, troop_type: TroopType) -> u32 {
        let count = self.counts.entry((owner, troop_type)).or_insert(0);
        *count += 1;
        *count
    }

    /// Current level without recording a play (0 = never played).
    pub fn level(&self, owner: Uuid, troop_type: TroopType) -> u32 {
        self.counts.get(&(owner, troop_type)).copied().unwrap_or(0)
    }
}
