//! Auto attacks - the main-hand white swing loop and extra attacks

use crate::combat::OutcomeKind;
use crate::error::ConfigError;
use crate::scheduler::{ActionHandle, ActionPriority};
use crate::sim::Simulation;
use crate::spell::SpellConfig;
use crate::stats::Stat;
use crate::types::{ActionId, DefenseType, ProcMask, SpellId, SpellSchool, UnitId};
use crate::unit::Hand;
use std::rc::Rc;
use std::time::Duration;
use tracing::debug;

pub const MAIN_HAND_AUTO: ActionId = ActionId { spell_id: 6603, tag: 1 };
pub const EXTRA_ATTACK: ActionId = ActionId { spell_id: 6603, tag: 3 };

/// Per-unit swing state
#[derive(Debug, Clone, Default)]
pub struct AutoAttackState {
    main_hand: Option<SpellId>,
    extra_attack: Option<SpellId>,
    swing_action: Option<ActionHandle>,
    next_swing: Duration,
}

impl AutoAttackState {
    pub fn is_enabled(&self) -> bool {
        self.main_hand.is_some()
    }

    /// Time of the next scheduled main-hand swing
    pub fn next_swing(&self) -> Duration {
        self.next_swing
    }

    pub fn main_hand_spell(&self) -> Option<SpellId> {
        self.main_hand
    }

    pub fn extra_attack_spell(&self) -> Option<SpellId> {
        self.extra_attack
    }

    pub(crate) fn reset(&mut self) {
        self.swing_action = None;
        self.next_swing = Duration::ZERO;
    }
}

impl Simulation {
    /// Give `unit` a main-hand swing loop against the primary target. The unit
    /// needs a main-hand weapon.
    pub fn enable_auto_attacks(&mut self, unit: UnitId) -> Result<(), ConfigError> {
        let owner = self.check_unit(unit)?;
        if owner.weapons.main_hand.is_none() {
            return Err(ConfigError::Validation(format!(
                "unit '{}' has auto attacks but no main-hand weapon",
                owner.label
            )));
        }
        if owner.auto.is_enabled() {
            return Ok(());
        }

        let white = |action_id, proc_mask| SpellConfig {
            action_id,
            school: SpellSchool::Physical,
            defense_type: DefenseType::Melee,
            proc_mask,
            ..Default::default()
        };
        let main_hand = self.register_spell(unit, white(MAIN_HAND_AUTO, ProcMask::MELEE_MH_AUTO))?;
        let extra_attack = self.register_spell(
            unit,
            white(EXTRA_ATTACK, ProcMask::MELEE_MH_AUTO | ProcMask::SUPPRESS_EXTRA_ATTACK),
        )?;
        let auto = &mut self.unit_mut(unit).auto;
        auto.main_hand = Some(main_hand);
        auto.extra_attack = Some(extra_attack);
        Ok(())
    }
}

/// Start the swing loop at the current time (called on every reset)
pub(crate) fn start_swinging(sim: &mut Simulation, unit: UnitId) {
    if sim.unit(unit).auto.is_enabled() {
        let now = sim.now();
        schedule_swing(sim, unit, now);
    }
}

fn schedule_swing(sim: &mut Simulation, unit: UnitId, at: Duration) {
    if let Some(handle) = sim.unit_mut(unit).auto.swing_action.take() {
        sim.scheduler_mut().cancel(handle);
    }
    let handle = sim.scheduler_mut().schedule_once(
        at,
        ActionPriority::Auto,
        Rc::new(move |sim: &mut Simulation, _| swing(sim, unit)),
    );
    let auto = &mut sim.unit_mut(unit).auto;
    auto.swing_action = Some(handle);
    auto.next_swing = at;
}

fn swing_interval(sim: &Simulation, unit: UnitId) -> Duration {
    let speed = sim.unit(unit).swing_speed(Hand::MainHand).unwrap_or(0.0);
    Duration::from_secs_f64(speed.max(0.1))
}

/// Weapon roll plus attack power over the weapon's base speed
fn white_damage(sim: &mut Simulation, unit: UnitId) -> f64 {
    let Some(weapon) = sim.unit(unit).weapon(Hand::MainHand).copied() else {
        return 0.0;
    };
    let attack_power = sim.unit(unit).stat(Stat::AttackPower);
    sim.roll(weapon.min_damage, weapon.max_damage) + attack_power / 14.0 * weapon.swing_speed
}

fn swing(sim: &mut Simulation, unit: UnitId) {
    let (Some(spell), Some(target)) = (sim.unit(unit).auto.main_hand, sim.primary_target()) else {
        return;
    };
    // The next swing is queued before the hit so an extra attack can reset it
    let next = sim.now().saturating_add(swing_interval(sim, unit));
    schedule_swing(sim, unit, next);

    sim.spell_mut(spell).metrics.casts += 1;
    let damage = white_damage(sim, unit);
    spell.calc_and_deal_damage(sim, target, damage, OutcomeKind::MeleeWhite);
}

/// Perform `attacks` immediate main-hand swings, then restart the swing timer.
///
/// The swings carry `SUPPRESS_EXTRA_ATTACK` so extra-attack procs can exclude
/// them and not chain.
pub fn extra_main_hand_attack(sim: &mut Simulation, unit: UnitId, attacks: u32) {
    let (Some(spell), Some(target)) = (sim.unit(unit).auto.extra_attack, sim.primary_target()) else {
        return;
    };
    debug!(time = ?sim.now(), unit = unit.0, attacks, "extra attacks");
    for _ in 0..attacks {
        if sim.is_finished() {
            return;
        }
        sim.spell_mut(spell).metrics.casts += 1;
        let damage = white_damage(sim, unit);
        spell.calc_and_deal_damage(sim, target, damage, OutcomeKind::MeleeWhite);
    }
    let next = sim.now().saturating_add(swing_interval(sim, unit));
    schedule_swing(sim, unit, next);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FightConfig;
    use crate::types::UnitKind;
    use crate::unit::Weapon;

    fn setup() -> (Simulation, UnitId) {
        let mut sim = Simulation::new(FightConfig {
            target_level: 60,
            ..Default::default()
        });
        let player = sim.add_unit("Player", UnitKind::Player, 60);
        sim.unit_mut(player).weapons.main_hand = Some(Weapon {
            min_damage: 100.0,
            max_damage: 200.0,
            swing_speed: 2.0,
        });
        sim.enable_auto_attacks(player).unwrap();
        (sim, player)
    }

    #[test]
    fn test_requires_weapon() {
        let mut sim = Simulation::new(FightConfig::default());
        let player = sim.add_unit("Player", UnitKind::Player, 60);
        assert!(sim.enable_auto_attacks(player).is_err());
    }

    #[test]
    fn test_swings_at_weapon_speed() {
        let (mut sim, player) = setup();
        sim.reset(1);
        sim.advance_to(Duration::from_secs(10));
        let spell = sim.unit(player).auto_attacks().main_hand_spell().unwrap();
        // Swings at 0, 2, 4, 6, 8, 10
        let metrics = sim.spell(spell).metrics;
        assert_eq!(metrics.casts, 6);
        assert_eq!(metrics.hits + metrics.crits + metrics.misses, 6);
        assert_eq!(sim.unit(player).auto_attacks().next_swing(), Duration::from_secs(12));
    }

    #[test]
    fn test_haste_shortens_swings() {
        let (mut sim, player) = setup();
        sim.unit_mut(player).pseudo_stats.melee_speed_multiplier = 2.0;
        sim.reset(1);
        sim.advance_to(Duration::from_millis(500));
        assert_eq!(sim.unit(player).auto_attacks().next_swing(), Duration::from_secs(1));
    }

    #[test]
    fn test_extra_attack_resets_swing_timer() {
        let (mut sim, player) = setup();
        sim.reset(2);
        sim.advance_to(Duration::from_millis(500));
        extra_main_hand_attack(&mut sim, player, 1);
        assert_eq!(sim.unit(player).auto_attacks().next_swing(), Duration::from_millis(2500));
    }
}
