//! Combat helpers - distance, cadence, damage, and straight-line movement

use crate::ws::protocol::Position;

use super::r#match::Troop;

/// Combat math shared by troop updates and base defense
pub struct CombatSystem;

impl CombatSystem {
    /// Euclidean distance between two arena positions
    pub fn distance(a: Position, b: Position) -> f32 {
        let dx = a.x - b.x;
        let dy = a.y - b.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Whether an attack cadence of `attacks_per_sec` has elapsed since
    /// `last_attack` (millisecond timestamps). A zero cadence never fires.
    pub fn cadence_elapsed(now: u64, last_attack: u64, attacks_per_sec: f32) -> bool {
        if attacks_per_sec <= 0.0 {
            return false;
        }
        now.saturating_sub(last_attack) as f32 >= 1_000.0 / attacks_per_sec
    }

    /// Damage dealt per hit against an enemy base. Half the troop's
    /// attack, rounded up - a deliberate balance rule, distinct from the
    /// full attack value applied to troops.
    pub fn base_damage(attack: f32) -> f32 {
        (attack / 2.0).ceil()
    }

    /// Nearest living troop to `from`, if any
    pub fn nearest_living(from: Position, troops: &[Troop]) -> Option<&Troop> {
        troops
            .iter()
            .filter(|t| t.health > 0.0)
            .min_by(|a, b| {
                let da = Self::distance(from, a.position);
                let db = Self::distance(from, b.position);
                da.total_cmp(&db)
            })
    }

    /// Advance `pos` straight toward `target` by `speed` units. No
    /// pathfinding; troops walk through each other by design.
    pub fn step_toward(pos: Position, target: Position, speed: f32) -> Position {
        let dx = target.x - pos.x;
        let dy = target.y - pos.y;
        let dist = (dx * dx + dy * dy).sqrt();
        if dist <= 0.0 {
            return pos;
        }
        Position {
            x: pos.x + dx / dist * speed,
            y: pos.y + dy / dist * speed,
        }
    }
}
