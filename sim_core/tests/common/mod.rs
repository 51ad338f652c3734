//! Shared fixtures for the integration scenarios

#![allow(dead_code)]

use rand::RngCore;
use sim_core::combat::{AttackTableInput, CombatTable, OutcomeKind};
use sim_core::prelude::*;
use std::rc::Rc;
use std::time::Duration;

/// Table where every attack lands for its full amount
pub struct AlwaysHitTable;

impl CombatTable for AlwaysHitTable {
    fn roll_outcome(&self, kind: OutcomeKind, _input: &AttackTableInput, _rng: &mut dyn RngCore) -> HitOutcome {
        if kind.is_periodic() {
            HitOutcome::TICK
        } else {
            HitOutcome::HIT
        }
    }

    fn outcome_multiplier(&self, outcome: HitOutcome, _school: SpellSchool) -> f64 {
        if outcome.landed() {
            1.0
        } else {
            0.0
        }
    }

    fn armor_multiplier(&self, _armor: f64, _attacker_level: u32) -> f64 {
        1.0
    }

    fn resistance_multiplier(&self, _resistance: f64, _attacker_level: u32) -> f64 {
        1.0
    }
}

pub fn secs(s: u64) -> Duration {
    Duration::from_secs(s)
}

pub fn millis(ms: u64) -> Duration {
    Duration::from_millis(ms)
}

/// Fight against `num_targets` level-60 enemies with a level-60 player
pub fn fight(num_targets: usize) -> (Simulation, UnitId) {
    fight_with(FightConfig {
        num_targets,
        target_level: 60,
        ..Default::default()
    })
}

pub fn fight_with(config: FightConfig) -> (Simulation, UnitId) {
    let mut sim = Simulation::new(config);
    let player = sim.add_unit("Player", UnitKind::Player, 60);
    (sim, player)
}

/// Same as [`fight`], with every attack landing
pub fn deterministic_fight(num_targets: usize) -> (Simulation, UnitId) {
    let (mut sim, player) = fight(num_targets);
    sim.set_combat_table(Rc::new(AlwaysHitTable));
    (sim, player)
}

pub fn give_weapon(sim: &mut Simulation, unit: UnitId, speed: f64) {
    sim.unit_mut(unit).weapons.main_hand = Some(Weapon {
        min_damage: 100.0,
        max_damage: 100.0,
        swing_speed: speed,
    });
}

/// Instant spell with the given mask that does nothing on its own
pub fn strike(sim: &mut Simulation, unit: UnitId, spell_id: i32, proc_mask: ProcMask) -> SpellId {
    sim.register_spell(
        unit,
        SpellConfig {
            action_id: ActionId::spell(spell_id),
            school: SpellSchool::Physical,
            defense_type: DefenseType::Melee,
            proc_mask,
            ..Default::default()
        },
    )
    .expect("strike registers")
}
