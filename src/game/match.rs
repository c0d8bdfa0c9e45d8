//! Match state and authoritative tick loop

use dashmap::DashMap;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::catalog::{scale_stat, LevelRegistry, SpecialEffect, TroopDefinition, TroopType};
use crate::util::time::{unix_millis, TICK_INTERVAL_MS};
use crate::ws::protocol::{
    BaseAttackIndicator, ClientMsg, MatchResult, Position, ServerMsg, Side,
};

use super::cards::{self, Card, CardDealer};
use super::combat::CombatSystem;
use super::snapshot;
use super::{
    PlayerInput, ARENA_HEIGHT, ARENA_WIDTH, BASE_ATTACK_DAMAGE, BASE_ATTACK_INDICATOR_MS,
    BASE_ATTACK_RANGE, BASE_ATTACK_SPEED, BASE_MAX_HEALTH, BASE_SIZE, MANA_GAIN_AMOUNT,
    MANA_REGEN_PER_SEC, MAX_MANA,
};

/// What a troop is currently locked onto
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// An enemy troop by id
    Troop(Uuid),
    /// The enemy base
    Base,
}

/// A live combat entity. Stats are level-scaled snapshots taken at spawn
/// and immutable for the troop's lifetime; range alone is never scaled.
#[derive(Debug, Clone)]
pub struct Troop {
    pub id: Uuid,
    pub troop_type: TroopType,
    pub level: u32,
    pub position: Position,
    pub health: f32,
    pub max_health: f32,
    pub attack: f32,
    pub range: f32,
    pub speed: f32,
    pub attack_speed: f32,
    pub attacking: bool,
    pub last_attack_time: u64,
    pub target: Option<Target>,
}

impl Troop {
    pub fn spawn(troop_type: TroopType, level: u32, position: Position) -> Self {
        let def = TroopDefinition::get(troop_type);
        let health = scale_stat(def.health, level);
        Self {
            id: Uuid::new_v4(),
            troop_type,
            level,
            position,
            health,
            max_health: health,
            attack: scale_stat(def.attack, level),
            // range stays at the base value for every level
            range: def.range,
            speed: scale_stat(def.speed, level),
            attack_speed: scale_stat(def.attack_speed, level),
            attacking: false,
            last_attack_time: 0,
            target: None,
        }
    }
}

/// Player state in a match (authoritative)
#[derive(Debug, Clone)]
pub struct PlayerState {
    pub conn_id: Uuid,
    pub display_name: String,
    pub side: Side,
    pub base_position: Position,
    pub base_health: f32,
    pub troops: Vec<Troop>,
    pub mana: f32,
    pub max_mana: f32,
    pub last_mana_update: u64,
    pub last_base_attack: u64,
    pub base_attacking: Option<BaseAttackIndicator>,
    pub cards: Vec<Card>,
}

impl PlayerState {
    pub fn new(conn_id: Uuid, display_name: String, side: Side, now: u64) -> Self {
        let base_position = match side {
            Side::Near => Position::new(ARENA_WIDTH / 2.0, ARENA_HEIGHT - BASE_SIZE / 2.0),
            Side::Far => Position::new(ARENA_WIDTH / 2.0, BASE_SIZE / 2.0),
        };
        Self {
            conn_id,
            display_name,
            side,
            base_position,
            base_health: BASE_MAX_HEALTH,
            troops: Vec::new(),
            mana: MAX_MANA,
            max_mana: MAX_MANA,
            last_mana_update: now,
            last_base_attack: 0,
            base_attacking: None,
            cards: CardDealer::initial_hand(),
        }
    }
}

/// Result of a play-card attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOutcome {
    Played,
    /// Mana below the card's cost; nothing mutated
    InsufficientMana,
    /// Unknown sender or out-of-range slot; logged and dropped upstream
    Invalid,
}

/// Match state (owned by the match task)
pub struct MatchState {
    pub id: Uuid,
    pub seed: u64,
    pub active: bool,
    pub tick: u64,
    /// Seat 0 = near side, seat 1 = far side
    pub players: [PlayerState; 2],
    pub rng: ChaCha8Rng,
    pub levels: LevelRegistry,
}

impl MatchState {
    pub fn new(id: Uuid, seed: u64, seats: [(Uuid, String, Side); 2], now: u64) -> Self {
        Self {
            id,
            seed,
            active: true,
            tick: 0,
            players: seats.map(|(conn_id, name, side)| PlayerState::new(conn_id, name, side, now)),
            rng: ChaCha8Rng::seed_from_u64(seed),
            levels: LevelRegistry::new(),
        }
    }

    /// Seat index for a connection, if it is a member
    pub fn seat_of(&self, conn_id: Uuid) -> Option<usize> {
        self.players.iter().position(|p| p.conn_id == conn_id)
    }

    /// Split-borrow (player, opponent) for the given seat
    pub fn pair_mut(&mut self, idx: usize) -> (&mut PlayerState, &mut PlayerState) {
        let (left, right) = self.players.split_at_mut(1);
        match idx {
            0 => (&mut left[0], &mut right[0]),
            _ => (&mut right[0], &mut left[0]),
        }
    }

    /// Resolve a card play: validate, pay mana, run the special effect or
    /// spawn, and refill the hand slot.
    pub fn play_card(&mut self, conn_id: Uuid, slot: usize) -> PlayOutcome {
        let Some(idx) = self.seat_of(conn_id) else {
            return PlayOutcome::Invalid;
        };
        let Some(card) = self.players[idx].cards.get(slot).cloned() else {
            return PlayOutcome::Invalid;
        };
        if self.players[idx].mana < card.mana_cost {
            return PlayOutcome::InsufficientMana;
        }

        let MatchState {
            players,
            rng,
            levels,
            ..
        } = self;
        let me = &mut players[idx];
        me.mana -= card.mana_cost;

        let def = TroopDefinition::get(card.troop_type);
        match def.special {
            SpecialEffect::None => {
                let pos = cards::spawn_position(rng, me.base_position, me.side);
                Self::spawn_for(me, levels, card.troop_type, pos);
            }
            SpecialEffect::MultiSpawn => {
                for pos in cards::multi_spawn_positions(rng, me.base_position, me.side) {
                    Self::spawn_for(me, levels, card.troop_type, pos);
                }
            }
            SpecialEffect::RandomMultiSpawn => {
                for troop_type in CardDealer::random_combat_types(rng, 3) {
                    let pos = cards::spawn_position(rng, me.base_position, me.side);
                    Self::spawn_for(me, levels, troop_type, pos);
                }
            }
            SpecialEffect::BaseHeal => {
                let level = levels.bump(me.conn_id, card.troop_type);
                let heal = scale_stat(def.attack, level);
                me.base_health = (me.base_health + heal).min(BASE_MAX_HEALTH);
            }
            SpecialEffect::ManaGain => {
                me.mana = (me.mana + MANA_GAIN_AMOUNT).min(me.max_mana);
                let pos = cards::spawn_position(rng, me.base_position, me.side);
                Self::spawn_for(me, levels, card.troop_type, pos);
            }
            SpecialEffect::HandReshuffle => {
                me.cards = CardDealer::reshuffle_hand(rng);
                // the whole hand was replaced, skip the per-slot refill
                return PlayOutcome::Played;
            }
        }

        me.cards[slot] = CardDealer::draw_replacement(rng, card.troop_type);
        PlayOutcome::Played
    }

    /// Spawn one troop for a player, bumping its play-count level first
    /// (increment-then-read: first play = level 1 = base stats).
    fn spawn_for(me: &mut PlayerState, levels: &mut LevelRegistry, t: TroopType, pos: Position) {
        let level = levels.bump(me.conn_id, t);
        me.troops.push(Troop::spawn(t, level, pos));
    }

    /// One player's share of a simulation tick. Returns the winner's
    /// connection id the instant the opposing base falls.
    ///
    /// Resolution is single-pass, no two-phase commit: damage lands on
    /// live values, so a troop can deal its blow on the same tick it dies.
    pub fn update_player(&mut self, idx: usize, now: u64) -> Option<Uuid> {
        let (me, foe) = self.pair_mut(idx);
        let me_id = me.conn_id;

        // 1. Mana regeneration, proportional to wall-clock elapsed
        let elapsed_ms = now.saturating_sub(me.last_mana_update);
        me.mana = (me.mana + elapsed_ms as f32 / 1_000.0 * MANA_REGEN_PER_SEC).min(me.max_mana);
        me.last_mana_update = now;

        // 2. Prune dead troops
        me.troops.retain(|t| t.health > 0.0);

        // 3. Base defense: hit the nearest enemy troop in range
        if CombatSystem::cadence_elapsed(now, me.last_base_attack, BASE_ATTACK_SPEED) {
            let base_position = me.base_position;
            let nearest = foe
                .troops
                .iter_mut()
                .filter(|t| {
                    t.health > 0.0
                        && CombatSystem::distance(base_position, t.position) <= BASE_ATTACK_RANGE
                })
                .min_by(|a, b| {
                    CombatSystem::distance(base_position, a.position)
                        .total_cmp(&CombatSystem::distance(base_position, b.position))
                });
            if let Some(target) = nearest {
                target.health -= BASE_ATTACK_DAMAGE;
                me.base_attacking = Some(BaseAttackIndicator {
                    target: target.id,
                    started_at: now,
                });
                me.last_base_attack = now;
            } else {
                me.base_attacking = None;
            }
        }
        // Transient indicator decay; renderer parity, no gameplay effect
        if let Some(indicator) = me.base_attacking {
            if now.saturating_sub(indicator.started_at) > BASE_ATTACK_INDICATOR_MS {
                me.base_attacking = None;
            }
        }

        // 4. Troop targeting, combat, and movement
        for i in 0..me.troops.len() {
            let troop = &me.troops[i];

            // Sticky targets: keep a base lock while attacking, keep a
            // troop lock while the target lives, otherwise re-acquire.
            let target = match troop.target {
                Some(Target::Base) if troop.attacking => Target::Base,
                Some(Target::Troop(tid))
                    if foe.troops.iter().any(|t| t.id == tid && t.health > 0.0) =>
                {
                    Target::Troop(tid)
                }
                _ => {
                    let aggro = TroopDefinition::get(troop.troop_type).aggro_radius();
                    match CombatSystem::nearest_living(troop.position, &foe.troops) {
                        Some(enemy)
                            if CombatSystem::distance(troop.position, enemy.position)
                                <= aggro =>
                        {
                            Target::Troop(enemy.id)
                        }
                        _ => Target::Base,
                    }
                }
            };

            // A stale troop id falls back to the base position; the lock
            // itself is re-acquired next tick.
            let target_pos = match target {
                Target::Troop(tid) => foe
                    .troops
                    .iter()
                    .find(|t| t.id == tid)
                    .map(|t| t.position)
                    .unwrap_or(foe.base_position),
                Target::Base => foe.base_position,
            };

            let dist = CombatSystem::distance(troop.position, target_pos);
            let in_range = dist <= troop.range;
            let can_fire =
                in_range && CombatSystem::cadence_elapsed(now, troop.last_attack_time, troop.attack_speed);
            let (attack, speed, position) = (troop.attack, troop.speed, troop.position);

            {
                let troop = &mut me.troops[i];
                troop.target = Some(target);
                troop.attacking = in_range;
                if can_fire {
                    troop.last_attack_time = now;
                }
                if !in_range {
                    troop.position = CombatSystem::step_toward(position, target_pos, speed);
                }
            }

            if can_fire {
                match target {
                    Target::Base => {
                        foe.base_health -= CombatSystem::base_damage(attack);
                        if foe.base_health <= 0.0 {
                            foe.base_health = 0.0;
                            return Some(me_id);
                        }
                    }
                    Target::Troop(tid) => {
                        if let Some(enemy) = foe.troops.iter_mut().find(|t| t.id == tid) {
                            enemy.health -= attack;
                        }
                    }
                }
            }
        }

        None
    }
}

/// Seat assignment handed to a new match: connection, name, and the
/// channel its session reads outbound messages from.
pub struct PlayerSeat {
    pub conn_id: Uuid,
    pub display_name: String,
    pub outbox: mpsc::UnboundedSender<ServerMsg>,
}

/// Per-player outbound channels for one match
struct Outbox {
    members: [(Uuid, mpsc::UnboundedSender<ServerMsg>); 2],
}

impl Outbox {
    fn send_to(&self, conn_id: Uuid, msg: ServerMsg) {
        if let Some((_, tx)) = self.members.iter().find(|(id, _)| *id == conn_id) {
            // a dropped receiver means the session is closing; the
            // disconnect path handles the forfeit
            let _ = tx.send(msg);
        }
    }

    fn broadcast(&self, msg: ServerMsg) {
        for (_, tx) in &self.members {
            let _ = tx.send(msg.clone());
        }
    }
}

/// Handle to a running match
#[derive(Clone)]
pub struct MatchHandle {
    pub id: Uuid,
    pub input_tx: mpsc::Sender<PlayerInput>,
    pub members: [Uuid; 2],
    active: Arc<AtomicBool>,
}

impl MatchHandle {
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }
}

/// Registry of all matches, including recently-ended ones awaiting purge
pub struct MatchRegistry {
    matches: DashMap<Uuid, MatchHandle>,
}

impl MatchRegistry {
    pub fn new() -> Self {
        Self {
            matches: DashMap::new(),
        }
    }

    pub fn get(&self, id: &Uuid) -> Option<MatchHandle> {
        self.matches.get(id).map(|m| m.value().clone())
    }

    pub fn insert(&self, handle: MatchHandle) {
        self.matches.insert(handle.id, handle);
    }

    pub fn remove(&self, id: &Uuid) -> Option<MatchHandle> {
        self.matches.remove(id).map(|(_, h)| h)
    }

    pub fn active_matches(&self) -> usize {
        self.matches.iter().filter(|m| m.value().is_active()).count()
    }

    pub fn active_players(&self) -> usize {
        self.active_matches() * 2
    }
}

impl Default for MatchRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// The authoritative game match
pub struct GameMatch {
    state: MatchState,
    input_rx: mpsc::Receiver<PlayerInput>,
    outbox: Outbox,
    active: Arc<AtomicBool>,
}

impl GameMatch {
    /// Create a new match. Seat order fixes the sides: first seat near
    /// (bottom), second far (top).
    pub fn new(id: Uuid, seed: u64, seats: [PlayerSeat; 2], now: u64) -> (Self, MatchHandle) {
        let (input_tx, input_rx) = mpsc::channel(64);
        let active = Arc::new(AtomicBool::new(true));
        let [near, far] = seats;

        let handle = MatchHandle {
            id,
            input_tx,
            members: [near.conn_id, far.conn_id],
            active: active.clone(),
        };

        let outbox = Outbox {
            members: [(near.conn_id, near.outbox), (far.conn_id, far.outbox)],
        };
        let state = MatchState::new(
            id,
            seed,
            [
                (near.conn_id, near.display_name, Side::Near),
                (far.conn_id, far.display_name, Side::Far),
            ],
            now,
        );

        let game_match = Self {
            state,
            input_rx,
            outbox,
            active,
        };
        (game_match, handle)
    }

    pub fn state(&self) -> &MatchState {
        &self.state
    }

    /// Direct state access for the integration test suite
    pub fn state_mut(&mut self) -> &mut MatchState {
        &mut self.state
    }

    /// Run the authoritative tick loop until the match ends
    pub async fn run(mut self) {
        info!(match_id = %self.state.id, "match active");
        self.announce_start();

        let mut ticker = interval(Duration::from_millis(TICK_INTERVAL_MS));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        while self.state.active {
            ticker.tick().await;
            // check-then-stop: never process a tick once the match ended
            if !self.state.active {
                break;
            }
            self.process_inputs();
            if self.state.active {
                self.step(unix_millis());
            }
        }

        info!(match_id = %self.state.id, "match task stopped");
    }

    /// Tell both members the match is on, with their side assignments
    fn announce_start(&self) {
        for idx in 0..2 {
            let me = &self.state.players[idx];
            let opponent = &self.state.players[1 - idx];
            self.outbox.send_to(
                me.conn_id,
                ServerMsg::MatchStart {
                    match_id: self.state.id,
                    self_id: me.conn_id,
                    opponent_id: opponent.conn_id,
                    side: me.side,
                    self_name: me.display_name.clone(),
                    opponent_name: opponent.display_name.clone(),
                },
            );
        }
    }

    /// Drain all pending player intents
    pub fn process_inputs(&mut self) {
        while let Ok(input) = self.input_rx.try_recv() {
            if !self.state.active {
                break;
            }
            match input.msg {
                ClientMsg::PlayCard {
                    match_id,
                    slot_index,
                } => self.handle_play_card(input.conn_id, match_id, slot_index),
                ClientMsg::LeaveMatch => self.handle_forfeit(input.conn_id),
                other => {
                    debug!(
                        match_id = %self.state.id,
                        conn_id = %input.conn_id,
                        msg = ?other,
                        "ignoring out-of-band intent"
                    );
                }
            }
        }
    }

    fn handle_play_card(&mut self, conn_id: Uuid, match_id: Uuid, slot: usize) {
        if match_id != self.state.id {
            warn!(
                match_id = %self.state.id,
                conn_id = %conn_id,
                claimed = %match_id,
                "play intent for a different match"
            );
            return;
        }
        match self.state.play_card(conn_id, slot) {
            PlayOutcome::Played => {
                // immediate broadcast so the spawn feels responsive
                self.outbox.broadcast(snapshot::match_state(&self.state));
            }
            PlayOutcome::InsufficientMana => {
                self.outbox.send_to(conn_id, ServerMsg::InsufficientMana);
            }
            PlayOutcome::Invalid => {
                debug!(
                    match_id = %self.state.id,
                    conn_id = %conn_id,
                    slot,
                    "dropping invalid play intent"
                );
            }
        }
    }

    /// A member left or disconnected: the remaining player wins
    fn handle_forfeit(&mut self, conn_id: Uuid) {
        if let Some(idx) = self.state.seat_of(conn_id) {
            let winner = self.state.players[1 - idx].conn_id;
            info!(match_id = %self.state.id, loser = %conn_id, "forfeit");
            self.end_match(winner);
        }
    }

    /// One simulation tick: update both players in seat order, then
    /// broadcast. Ends the match mid-pass if a base falls.
    pub fn step(&mut self, now: u64) {
        if !self.state.active {
            return;
        }
        self.state.tick += 1;
        for idx in 0..2 {
            if let Some(winner) = self.state.update_player(idx, now) {
                self.end_match(winner);
                return;
            }
        }
        self.outbox.broadcast(snapshot::match_state(&self.state));
    }

    fn end_match(&mut self, winner: Uuid) {
        if !self.state.active {
            return;
        }
        self.state.active = false;
        self.active.store(false, Ordering::Relaxed);

        for player in &self.state.players {
            let result = if player.conn_id == winner {
                MatchResult::Win
            } else {
                MatchResult::Lose
            };
            self.outbox
                .send_to(player.conn_id, ServerMsg::MatchOver { result });
        }

        info!(match_id = %self.state.id, winner = %winner, "match over");
    }
}
