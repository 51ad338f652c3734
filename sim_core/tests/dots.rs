//! Integration test: periodic effects against the simulation clock
//!
//! Covers tick timing relative to aura expiry, refresh, rollover and the
//! event log a dot leaves behind.

mod common;

use common::*;
use sim_core::prelude::*;
use sim_core::sim::LogEntry;
use std::cell::Cell;
use std::rc::Rc;

fn corruption(sim: &mut Simulation, player: UnitId, per_tick: f64) -> SpellId {
    sim.register_spell(
        player,
        SpellConfig {
            action_id: ActionId::spell(25311),
            school: SpellSchool::Shadow,
            defense_type: DefenseType::Magic,
            proc_mask: ProcMask::SPELL_DAMAGE,
            dot: Some(DotConfig {
                number_of_ticks: 5,
                tick_length: secs(3),
                on_snapshot: Some(Rc::new(move |sim: &mut Simulation, dot: DotId, _| {
                    dot.take_snapshot(sim, per_tick)
                })),
                ..DotConfig::new("Corruption")
            }),
            ..Default::default()
        },
    )
    .unwrap()
}

#[test]
fn test_last_tick_lands_before_expiry() {
    let (mut sim, player) = fight_with(FightConfig {
        target_level: 60,
        record_events: true,
        ..Default::default()
    });
    let target = sim.primary_target().unwrap();
    let spell = corruption(&mut sim, player, 30.0);
    sim.reset(7);

    assert!(spell.cast(&mut sim, target));
    let dot = spell.dot(&sim, target).unwrap();
    assert_eq!(dot.aura(&sim).expires_at(&sim), secs(15));

    sim.advance_to(secs(20));
    let metrics = sim.spell(spell).metrics;
    assert_eq!(metrics.ticks, 5);
    assert_eq!(metrics.damage, 150.0);
    assert!(!dot.is_active(&sim));

    let log = sim.event_log().unwrap();
    let tick_times: Vec<_> = log
        .damage_events()
        .filter_map(|e| match e {
            LogEntry::Damage { time, .. } => Some(*time),
            _ => None,
        })
        .collect();
    assert_eq!(tick_times, vec![secs(3), secs(6), secs(9), secs(12), secs(15)]);

    // The tick at 15s is logged before the aura falls off at 15s
    let last_tick = log
        .entries
        .iter()
        .rposition(|e| matches!(e, LogEntry::Damage { .. }))
        .unwrap();
    let expired = log
        .entries
        .iter()
        .position(|e| matches!(e, LogEntry::AuraExpired { aura, .. } if aura == "Corruption (Player)"))
        .unwrap();
    assert!(last_tick < expired);
    match &log.entries[expired] {
        LogEntry::AuraExpired { time, .. } => assert_eq!(*time, secs(15)),
        other => panic!("unexpected entry {:?}", other),
    }
}

#[test]
fn test_periodic_listeners_see_every_tick() {
    let (mut sim, player) = fight(1);
    let target = sim.primary_target().unwrap();
    let spell = corruption(&mut sim, player, 30.0);

    let seen = Rc::new(Cell::new(0));
    let counter = seen.clone();
    make_proc_trigger_aura(
        &mut sim,
        player,
        ProcTrigger {
            name: "Tick Counter".to_string(),
            action_id: ActionId::spell(1),
            callback: EventChannel::PeriodicDamageDealt,
            handler: Some(Rc::new(
                move |_: &mut Simulation, _: AuraId, _: SpellId, _: Option<&SpellResult>| counter.set(counter.get() + 1),
            )),
            ..Default::default()
        },
    )
    .unwrap();

    sim.reset(1);
    spell.cast(&mut sim, target);
    sim.advance_to(secs(30));
    assert_eq!(seen.get(), 5);
}

#[test]
fn test_refresh_mid_dot_extends_on_tick_grid() {
    let (mut sim, player) = fight(1);
    let target = sim.primary_target().unwrap();
    let spell = corruption(&mut sim, player, 30.0);
    sim.reset(1);

    spell.cast(&mut sim, target);
    sim.advance_to(secs(10));
    // Ticks at 3, 6 and 9 have landed
    spell.cast(&mut sim, target);
    let dot = spell.dot(&sim, target).unwrap();
    assert_eq!(dot.remaining_ticks(&sim), 5);
    assert_eq!(sim.dot(dot).next_tick(), secs(12));
    assert_eq!(dot.aura(&sim).expires_at(&sim), secs(24));

    sim.advance_to(secs(40));
    assert_eq!(sim.spell(spell).metrics.ticks, 8);
    assert_eq!(sim.spell(spell).metrics.damage, 240.0);
}

#[test]
fn test_rollover_picks_up_new_multiplier_without_extending() {
    let (mut sim, player) = fight(1);
    let target = sim.primary_target().unwrap();
    let spell = corruption(&mut sim, player, 30.0);
    sim.reset(1);

    spell.cast(&mut sim, target);
    let dot = spell.dot(&sim, target).unwrap();
    sim.advance_to(secs(7));
    sim.unit_mut(player).pseudo_stats.damage_dealt_multiplier = 1.5;
    dot.rollover(&mut sim);
    assert_eq!(dot.remaining_ticks(&sim), 3);
    assert_eq!(dot.aura(&sim).expires_at(&sim), secs(15));

    sim.advance_to(secs(30));
    assert_eq!(sim.spell(spell).metrics.damage, 2.0 * 30.0 + 3.0 * 45.0);
}

#[test]
fn test_dots_are_cleared_between_trials() {
    let (mut sim, player) = fight(1);
    let target = sim.primary_target().unwrap();
    let spell = corruption(&mut sim, player, 30.0);

    sim.reset(1);
    spell.cast(&mut sim, target);
    sim.advance_to(secs(4));
    let dot = spell.dot(&sim, target).unwrap();
    assert!(dot.is_active(&sim));

    sim.reset(2);
    assert!(!dot.is_active(&sim));
    assert_eq!(dot.remaining_ticks(&sim), 0);
    sim.advance_to(secs(20));
    assert_eq!(sim.spell(spell).metrics.ticks, 0);
}
