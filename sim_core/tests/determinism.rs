//! Integration test: seeded trials are reproducible
//!
//! The same seed must give the same event log, and a batch must aggregate to
//! the same numbers whether its trials run in parallel or on one thread.

mod common;

use common::*;
use sim_core::prelude::*;
use sim_core::sim::run_batch_sequential;
use std::rc::Rc;

/// Melee character with a bleed kept up by a one-second rotation tick
fn build(sim: &mut Simulation) -> Result<(), ConfigError> {
    let player = sim.add_unit("Rogue", UnitKind::Player, 60);
    {
        let unit = sim.unit_mut(player);
        unit.weapons.main_hand = Some(Weapon {
            min_damage: 110.0,
            max_damage: 160.0,
            swing_speed: 2.6,
        });
        unit.add_stats(&Stats::from_pairs(&[
            (Stat::AttackPower, 900.0),
            (Stat::MeleeCrit, 20.0),
            (Stat::MeleeHit, 6.0),
        ]));
    }
    sim.enable_auto_attacks(player)?;

    let rupture = sim.register_spell(
        player,
        SpellConfig {
            action_id: ActionId::spell(11275),
            school: SpellSchool::Physical,
            defense_type: DefenseType::Melee,
            proc_mask: ProcMask::MELEE_MH_SPECIAL,
            dot: Some(DotConfig {
                number_of_ticks: 4,
                tick_length: secs(2),
                on_snapshot: Some(Rc::new(|sim: &mut Simulation, dot: DotId, _: bool| {
                    let caster = sim.dot(dot).caster;
                    let ap = sim.unit(caster).stat(Stat::AttackPower);
                    dot.take_snapshot(sim, 80.0 + ap * 0.04)
                })),
                ..DotConfig::new("Rupture")
            }),
            ..Default::default()
        },
    )?;

    sim.register_aura(
        player,
        AuraConfig {
            on_reset: Some(Rc::new(move |sim: &mut Simulation, _: AuraId| {
                sim.scheduler_mut().schedule(
                    secs(0),
                    secs(1),
                    None,
                    ActionPriority::Default,
                    Rc::new(move |sim: &mut Simulation, _| {
                        let Some(target) = sim.primary_target() else {
                            return;
                        };
                        let ticking = rupture.dot(sim, target).is_some_and(|dot| dot.is_active(sim));
                        if !ticking {
                            rupture.cast(sim, target);
                        }
                    }),
                );
            })),
            ..AuraConfig::new("Rotation", ActionId::default())
        },
    )?;

    let buffs = sim.config().buffs.clone();
    apply_buff_effects(sim, player, &buffs.raid, &buffs.party, &buffs.individual)
}

fn config() -> FightConfig {
    let mut config = FightConfig {
        duration_secs: 60.0,
        iterations: 24,
        seed: 1234,
        record_events: true,
        ..Default::default()
    };
    config.buffs.party.windfury_totem = true;
    config.buffs.party.battle_shout = TristateEffect::Improved;
    config.buffs.raid.leader_of_the_pack = true;
    config.buffs.individual.blessing_of_kings = true;
    config
}

fn event_log(seed: u64) -> sim_core::sim::EventLog {
    let mut sim = Simulation::new(config());
    build(&mut sim).unwrap();
    let result = sim.run_single_trial(seed);
    result.events.expect("events are recorded")
}

#[test]
fn test_same_seed_same_event_log() {
    let first = event_log(99);
    let second = event_log(99);
    assert!(first.damage_events().count() > 20);
    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[test]
fn test_different_seed_different_event_log() {
    assert_ne!(event_log(1), event_log(2));
}

#[test]
fn test_reused_simulation_matches_fresh_one() {
    let mut sim = Simulation::new(config());
    build(&mut sim).unwrap();
    sim.run_single_trial(5);
    let reused = sim.run_single_trial(6).events.unwrap();
    assert_eq!(reused, event_log(6));
}

#[test]
fn test_parallel_batch_matches_sequential() {
    let config = FightConfig {
        record_events: false,
        ..config()
    };
    let parallel = run_batch(&config, build).unwrap();
    let again = run_batch(&config, build).unwrap();
    let sequential = run_batch_sequential(&config, build).unwrap();

    assert_eq!(parallel.iterations, 24);
    assert!(parallel.dps.mean > 0.0);
    assert_eq!(
        serde_json::to_string(&parallel).unwrap(),
        serde_json::to_string(&again).unwrap()
    );
    assert_eq!(parallel, sequential);
}

/// Two bleeds on each of three targets, opened in a seed-dependent order
fn build_cleave(sim: &mut Simulation) -> Result<(), ConfigError> {
    let player = sim.add_unit("Rogue", UnitKind::Player, 60);
    let bleed = |spell_id: i32, label: &str| SpellConfig {
        action_id: ActionId::spell(spell_id),
        defense_type: DefenseType::Melee,
        proc_mask: ProcMask::MELEE_MH_SPECIAL,
        dot: Some(DotConfig {
            number_of_ticks: 3,
            tick_length: secs(2),
            on_snapshot: Some(Rc::new(|sim: &mut Simulation, dot: DotId, _: bool| dot.take_snapshot(sim, 50.0))),
            ..DotConfig::new(label)
        }),
        ..Default::default()
    };
    let rupture = sim.register_spell(player, bleed(11275, "Rupture"))?;
    let garrote = sim.register_spell(player, bleed(11290, "Garrote"))?;

    sim.register_aura(
        player,
        AuraConfig {
            on_reset: Some(Rc::new(move |sim: &mut Simulation, _: AuraId| {
                sim.scheduler_mut().schedule_once(
                    secs(0),
                    ActionPriority::Default,
                    Rc::new(move |sim: &mut Simulation, _| {
                        let mut order = [rupture, garrote];
                        if sim.random_float("Opener") < 0.5 {
                            order.reverse();
                        }
                        for target in sim.targets().into_iter().rev() {
                            for spell in order {
                                spell.cast(sim, target);
                            }
                        }
                    }),
                );
            })),
            ..AuraConfig::new("Opener", ActionId::default())
        },
    )?;
    Ok(())
}

#[test]
fn test_reused_simulation_reports_like_fresh_one_on_many_targets() {
    let config = FightConfig {
        duration_secs: 10.0,
        num_targets: 3,
        ..Default::default()
    };
    let mut reused = Simulation::new(config.clone());
    build_cleave(&mut reused).unwrap();
    for target in reused.targets() {
        assert!(reused.unit(target).get_aura("Rupture (Rogue)").is_some());
        assert!(reused.unit(target).get_aura("Garrote (Rogue)").is_some());
    }

    for seed in 0..8 {
        let report = reused.run_single_trial(seed);
        assert_eq!(report.auras.len(), 6);
        let mut fresh = Simulation::new(config.clone());
        build_cleave(&mut fresh).unwrap();
        assert_eq!(report, fresh.run_single_trial(seed));
    }
}
