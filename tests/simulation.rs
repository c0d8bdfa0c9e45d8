//! Simulation scenarios driven tick-by-tick with injected timestamps.

use tokio::sync::mpsc;
use uuid::Uuid;

use card_battle_server::catalog::TroopType;
use card_battle_server::game::{GameMatch, MatchHandle, PlayerInput, PlayerSeat, Troop};
use card_battle_server::ws::protocol::{ClientMsg, MatchResult, Position, ServerMsg};

struct Harness {
    game: GameMatch,
    handle: MatchHandle,
    near: Uuid,
    far: Uuid,
    near_rx: mpsc::UnboundedReceiver<ServerMsg>,
    far_rx: mpsc::UnboundedReceiver<ServerMsg>,
}

fn harness(now: u64) -> Harness {
    let near = Uuid::new_v4();
    let far = Uuid::new_v4();
    let (near_tx, near_rx) = mpsc::unbounded_channel();
    let (far_tx, far_rx) = mpsc::unbounded_channel();

    let seats = [
        PlayerSeat {
            conn_id: near,
            display_name: "near".to_string(),
            outbox: near_tx,
        },
        PlayerSeat {
            conn_id: far,
            display_name: "far".to_string(),
            outbox: far_tx,
        },
    ];
    let (game, handle) = GameMatch::new(Uuid::new_v4(), 7, seats, now);

    Harness {
        game,
        handle,
        near,
        far,
        near_rx,
        far_rx,
    }
}

fn drain(rx: &mut mpsc::UnboundedReceiver<ServerMsg>) -> Vec<ServerMsg> {
    let mut msgs = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        msgs.push(msg);
    }
    msgs
}

fn match_overs(msgs: &[ServerMsg]) -> Vec<MatchResult> {
    msgs.iter()
        .filter_map(|m| match m {
            ServerMsg::MatchOver { result } => Some(*result),
            _ => None,
        })
        .collect()
}

/// A fixed-stat attacker placed by hand, bypassing the card path
fn attacker(attack: f32, position: Position) -> Troop {
    Troop {
        id: Uuid::new_v4(),
        troop_type: TroopType::Knight,
        level: 1,
        position,
        health: 1_000.0,
        max_health: 1_000.0,
        attack,
        range: 50.0,
        speed: 5.0,
        attack_speed: 1.0,
        attacking: false,
        last_attack_time: 0,
        target: None,
    }
}

#[test]
fn base_falls_after_ten_half_damage_hits() {
    let mut h = harness(0);

    // attack 20 -> ceil(20/2) = 10 base damage per hit, 100 health base
    let far_base = h.game.state().players[1].base_position;
    h.game.state_mut().players[0]
        .troops
        .push(attacker(20.0, Position::new(far_base.x, far_base.y + 10.0)));

    // one attack window per second
    for k in 1..=9 {
        h.game.step(1_000 * k);
        assert!(h.game.state().active, "match ended early at hit {k}");
    }
    assert_eq!(h.game.state().players[1].base_health, 10.0);

    h.game.step(10_000);
    assert!(!h.game.state().active);
    assert!(!h.handle.is_active());
    assert_eq!(h.game.state().players[1].base_health, 0.0);

    // exactly one match_over per member, opposite results
    assert_eq!(match_overs(&drain(&mut h.near_rx)), vec![MatchResult::Win]);
    assert_eq!(match_overs(&drain(&mut h.far_rx)), vec![MatchResult::Lose]);
}

#[test]
fn ticks_after_match_end_do_nothing() {
    let mut h = harness(0);
    let far_base = h.game.state().players[1].base_position;
    h.game.state_mut().players[0]
        .troops
        .push(attacker(200.0, Position::new(far_base.x, far_base.y + 10.0)));

    h.game.step(1_000);
    assert!(!h.game.state().active);
    drain(&mut h.near_rx);
    drain(&mut h.far_rx);

    // a stray step on an ended match must not emit anything
    h.game.step(2_000);
    assert!(drain(&mut h.near_rx).is_empty());
    assert!(drain(&mut h.far_rx).is_empty());
}

#[test]
fn forfeit_input_ends_the_match_for_the_opponent() {
    let mut h = harness(0);
    h.handle
        .input_tx
        .try_send(PlayerInput {
            conn_id: h.far,
            msg: ClientMsg::LeaveMatch,
            received_at: 0,
        })
        .expect("input queued");

    h.game.process_inputs();

    assert!(!h.game.state().active);
    assert_eq!(match_overs(&drain(&mut h.near_rx)), vec![MatchResult::Win]);
    assert_eq!(match_overs(&drain(&mut h.far_rx)), vec![MatchResult::Lose]);
}

#[test]
fn insufficient_mana_is_surfaced_only_to_the_player() {
    let mut h = harness(0);
    h.game.state_mut().players[0].mana = 0.5;
    let match_id = h.game.state().id;

    h.handle
        .input_tx
        .try_send(PlayerInput {
            conn_id: h.near,
            msg: ClientMsg::PlayCard {
                match_id,
                slot_index: 0,
            },
            received_at: 0,
        })
        .expect("input queued");
    h.game.process_inputs();

    let near_msgs = drain(&mut h.near_rx);
    assert!(matches!(near_msgs.as_slice(), [ServerMsg::InsufficientMana]));
    assert!(drain(&mut h.far_rx).is_empty());

    // nothing mutated
    assert_eq!(h.game.state().players[0].mana, 0.5);
    assert!(h.game.state().players[0].troops.is_empty());
}

#[test]
fn play_card_spawns_and_broadcasts_immediately() {
    let mut h = harness(0);
    let match_id = h.game.state().id;

    h.handle
        .input_tx
        .try_send(PlayerInput {
            conn_id: h.near,
            msg: ClientMsg::PlayCard {
                match_id,
                slot_index: 0,
            },
            received_at: 0,
        })
        .expect("input queued");
    h.game.process_inputs();

    assert_eq!(h.game.state().players[0].troops.len(), 1);
    // starter soldier costs 1
    assert_eq!(h.game.state().players[0].mana, 9.0);

    for rx in [&mut h.near_rx, &mut h.far_rx] {
        let msgs = drain(rx);
        assert_eq!(msgs.len(), 1);
        let ServerMsg::MatchState { players, .. } = &msgs[0] else {
            panic!("expected match_state");
        };
        assert_eq!(players[&h.near].troops.len(), 1);
    }
}

#[test]
fn every_tick_broadcasts_state_to_both_members_in_order() {
    let mut h = harness(0);
    h.game.step(100);
    h.game.step(200);

    for rx in [&mut h.near_rx, &mut h.far_rx] {
        let msgs = drain(rx);
        assert_eq!(msgs.len(), 2);
        assert!(msgs
            .iter()
            .all(|m| matches!(m, ServerMsg::MatchState { players, .. } if players.len() == 2)));
    }
}

#[test]
fn dead_troops_vanish_from_the_next_snapshot() {
    let mut h = harness(0);
    let mut corpse = attacker(1.0, Position::new(300.0, 400.0));
    corpse.health = 0.0;
    h.game.state_mut().players[0].troops.push(corpse);

    h.game.step(100);

    assert!(h.game.state().players[0].troops.is_empty());
    let msgs = drain(&mut h.near_rx);
    let ServerMsg::MatchState { players, .. } = msgs.last().expect("one snapshot") else {
        panic!("expected match_state");
    };
    assert!(players[&h.near].troops.is_empty());
}

#[test]
fn troops_converge_and_fight_to_the_death() {
    let mut h = harness(0);

    // two knights face off in the middle lane; equal stats, the one
    // resolving first each tick lands the killing blow first
    h.game.state_mut().players[0]
        .troops
        .push(attacker(6.0, Position::new(300.0, 420.0)));
    let mut defender = attacker(6.0, Position::new(300.0, 380.0));
    defender.health = 12.0;
    defender.max_health = 12.0;
    h.game.state_mut().players[1].troops.push(defender);

    // in range of each other (40 apart, range 50): both lock and trade
    h.game.step(1_000);
    assert!(h.game.state().players[0].troops[0].attacking);
    assert_eq!(h.game.state().players[1].troops[0].health, 6.0);

    h.game.step(2_000);
    // the defender fell to the second hit and was pruned on its own
    // pass, after having already traded damage on the first tick
    assert!(h.game.state().players[1].troops.is_empty());
    assert!(h.game.state().players[0].troops[0].health < 1_000.0);
    assert!(h.game.state().active);
}
