//! Cooldowns other players spend on a unit (Power Infusion, Innervate)
//!
//! Each source has its own cooldown. A shared timer spaces consecutive
//! applications so a new copy only lands once the previous one has run out,
//! or once the next source is off cooldown, whichever is later.

use crate::aura::AuraConfig;
use crate::error::ConfigError;
use crate::scheduler::ActionPriority;
use crate::sim::Simulation;
use crate::timer::Cooldown;
use crate::types::{ActionId, AuraId, ResourceKind, SpellSchool, UnitId};
use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;
use tracing::debug;

/// Extra condition checked before an external cooldown is used on the unit
pub type ActivationCondition = Rc<dyn Fn(&Simulation, UnitId) -> bool>;

/// How often a ready cooldown whose condition failed is checked again
const RETRY_INTERVAL: Duration = Duration::from_secs(1);

pub const POWER_INFUSION: ActionId = ActionId { spell_id: 10060, tag: 0 };
const POWER_INFUSION_DURATION: Duration = Duration::from_secs(15);
const POWER_INFUSION_COOLDOWN: Duration = Duration::from_secs(180);
const POWER_INFUSION_MULTIPLIER: f64 = 1.2;

pub const INNERVATE: ActionId = ActionId { spell_id: 29166, tag: 0 };
const INNERVATE_DURATION: Duration = Duration::from_secs(20);
const INNERVATE_COOLDOWN: Duration = Duration::from_secs(360);
/// Innervate is saved until the unit runs this low on mana
const INNERVATE_MANA_THRESHOLD: f64 = 1000.0;

#[derive(Clone)]
pub struct ExternalCooldownConfig {
    pub action_id: ActionId,
    /// Buff applied by each use. While any aura with the buff's tag (or the
    /// buff itself, when untagged) is active, no new copy is applied.
    pub aura: AuraId,
    pub aura_duration: Duration,
    /// Cooldown of each source
    pub aura_cooldown: Duration,
    pub should_activate: Option<ActivationCondition>,
}

struct ExternalCooldown {
    unit: UnitId,
    aura: AuraId,
    aura_tag: String,
    aura_duration: Duration,
    sources: Vec<Cooldown>,
    /// Source that applies the next copy
    next_source: Cell<usize>,
    shared: Cooldown,
    should_activate: Option<ActivationCondition>,
}

impl ExternalCooldown {
    fn buff_is_up(&self, sim: &Simulation) -> bool {
        if self.aura_tag.is_empty() {
            self.aura.is_active(sim)
        } else {
            sim.unit(self.unit).has_active_aura_with_tag(&self.aura_tag)
        }
    }

    fn is_ready(&self, sim: &Simulation) -> bool {
        self.shared.is_ready(sim)
            && self.sources[self.next_source.get()].is_ready(sim)
            && !self.buff_is_up(sim)
            && self.should_activate.as_ref().map_or(true, |condition| condition(sim, self.unit))
    }

    fn apply(&self, sim: &mut Simulation) {
        debug!(time = ?sim.now(), unit = self.unit.0, aura = %sim.aura(self.aura).label, source = self.next_source.get(), "external cooldown");
        self.aura.activate(sim);

        let used = self.next_source.get();
        self.sources[used].use_cooldown(sim);
        let next = (used + 1) % self.sources.len();
        self.next_source.set(next);

        let source = self.sources[next];
        let ready_at = if source.is_ready(sim) {
            sim.now().saturating_add(self.aura_duration)
        } else {
            source.ready_at(sim)
        };
        sim.set_timer_ready_at(self.shared.timer, ready_at);
    }

    /// Earliest time the cooldown could be used again
    fn next_attempt(&self, sim: &Simulation) -> Duration {
        let now = sim.now();
        let ready_at = self
            .shared
            .ready_at(sim)
            .max(self.sources[self.next_source.get()].ready_at(sim));
        if ready_at > now {
            ready_at
        } else {
            now.saturating_add(RETRY_INTERVAL)
        }
    }
}

fn attempt(sim: &mut Simulation, state: Rc<ExternalCooldown>) {
    if state.is_ready(sim) {
        state.apply(sim);
    }
    let at = state.next_attempt(sim);
    if at < sim.duration() {
        sim.scheduler_mut().schedule_once(
            at,
            ActionPriority::Default,
            Rc::new(move |sim: &mut Simulation, _| attempt(sim, state.clone())),
        );
    }
}

/// Approximate `num_sources` other players each casting the buff on `unit`
/// whenever their cooldown allows.
///
/// Returns the controller aura, whose reset hook starts the cycle each trial.
pub fn register_external_cooldown(
    sim: &mut Simulation,
    unit: UnitId,
    config: ExternalCooldownConfig,
    num_sources: u32,
) -> Result<AuraId, ConfigError> {
    sim.check_unit(unit)?;
    let label = sim.aura(config.aura).label.clone();
    if num_sources == 0 {
        return Err(ConfigError::Validation(format!(
            "external cooldown '{}' needs at least one source",
            label
        )));
    }
    if config.aura_duration.is_zero() || config.aura_cooldown.is_zero() {
        return Err(ConfigError::Validation(format!(
            "external cooldown '{}' needs a positive duration and cooldown",
            label
        )));
    }

    let sources = (0..num_sources)
        .map(|_| Cooldown::new(sim.new_timer(), config.aura_cooldown))
        .collect();
    let shared = Cooldown::new(sim.new_timer(), config.aura_duration);
    let state = Rc::new(ExternalCooldown {
        unit,
        aura: config.aura,
        aura_tag: sim.aura(config.aura).tag.clone(),
        aura_duration: config.aura_duration,
        sources,
        next_source: Cell::new(0),
        shared,
        should_activate: config.should_activate,
    });

    sim.register_aura(
        unit,
        AuraConfig {
            on_reset: Some(Rc::new(move |sim: &mut Simulation, _: AuraId| {
                state.next_source.set(0);
                let state = state.clone();
                let now = sim.now();
                sim.scheduler_mut().schedule_once(
                    now,
                    ActionPriority::Default,
                    Rc::new(move |sim: &mut Simulation, _| attempt(sim, state.clone())),
                );
            })),
            ..AuraConfig::new(format!("{} Cooldowns", label), config.action_id.with_tag(-1))
        },
    )
}

/// +20% damage for every magic school
pub fn power_infusion_aura(sim: &mut Simulation, unit: UnitId) -> Result<AuraId, ConfigError> {
    let schools = || SpellSchool::all().iter().filter(|s| s.is_magic()).map(|s| s.index());
    sim.get_or_register_aura(
        unit,
        AuraConfig {
            tag: "PowerInfusion".to_string(),
            duration: POWER_INFUSION_DURATION,
            on_gain: Some(Rc::new(move |sim: &mut Simulation, aura: AuraId| {
                let multipliers = &mut sim.unit_mut(aura.unit).pseudo_stats.school_damage_dealt_multiplier;
                for school in schools() {
                    multipliers[school] *= POWER_INFUSION_MULTIPLIER;
                }
            })),
            on_expire: Some(Rc::new(move |sim: &mut Simulation, aura: AuraId| {
                let multipliers = &mut sim.unit_mut(aura.unit).pseudo_stats.school_damage_dealt_multiplier;
                for school in schools() {
                    multipliers[school] /= POWER_INFUSION_MULTIPLIER;
                }
            })),
            ..AuraConfig::new("Power Infusion", POWER_INFUSION)
        },
    )
}

/// Fivefold mana regeneration
pub fn innervate_aura(sim: &mut Simulation, unit: UnitId) -> Result<AuraId, ConfigError> {
    sim.get_or_register_aura(
        unit,
        AuraConfig {
            tag: "Innervate".to_string(),
            duration: INNERVATE_DURATION,
            on_gain: Some(Rc::new(|sim: &mut Simulation, aura: AuraId| {
                sim.unit_mut(aura.unit).pseudo_stats.mana_regen_multiplier += 4.0
            })),
            on_expire: Some(Rc::new(|sim: &mut Simulation, aura: AuraId| {
                sim.unit_mut(aura.unit).pseudo_stats.mana_regen_multiplier -= 4.0
            })),
            ..AuraConfig::new("Innervate", INNERVATE)
        },
    )
}

pub fn register_power_infusion_cooldown(sim: &mut Simulation, unit: UnitId, sources: u32) -> Result<(), ConfigError> {
    if sources == 0 {
        return Ok(());
    }
    let aura = power_infusion_aura(sim, unit)?;
    register_external_cooldown(
        sim,
        unit,
        ExternalCooldownConfig {
            action_id: POWER_INFUSION,
            aura,
            aura_duration: POWER_INFUSION_DURATION,
            aura_cooldown: POWER_INFUSION_COOLDOWN,
            should_activate: None,
        },
        sources,
    )?;
    Ok(())
}

/// Innervate is only used once the unit is low on mana
pub fn register_innervate_cooldown(sim: &mut Simulation, unit: UnitId, sources: u32) -> Result<(), ConfigError> {
    if sources == 0 {
        return Ok(());
    }
    let aura = innervate_aura(sim, unit)?;
    register_external_cooldown(
        sim,
        unit,
        ExternalCooldownConfig {
            action_id: INNERVATE,
            aura,
            aura_duration: INNERVATE_DURATION,
            aura_cooldown: INNERVATE_COOLDOWN,
            should_activate: Some(Rc::new(|sim: &Simulation, unit: UnitId| {
                let owner = sim.unit(unit);
                owner.has_resource(ResourceKind::Mana) && owner.resource(ResourceKind::Mana) <= INNERVATE_MANA_THRESHOLD
            })),
        },
        sources,
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FightConfig;
    use crate::types::UnitKind;

    fn setup(duration_secs: f64) -> (Simulation, UnitId) {
        let mut sim = Simulation::new(FightConfig {
            duration_secs,
            ..Default::default()
        });
        let player = sim.add_unit("Player", UnitKind::Player, 60);
        (sim, player)
    }

    #[test]
    fn test_requires_a_source() {
        let (mut sim, player) = setup(60.0);
        let aura = power_infusion_aura(&mut sim, player).unwrap();
        let err = register_external_cooldown(
            &mut sim,
            player,
            ExternalCooldownConfig {
                action_id: POWER_INFUSION,
                aura,
                aura_duration: POWER_INFUSION_DURATION,
                aura_cooldown: POWER_INFUSION_COOLDOWN,
                should_activate: None,
            },
            0,
        );
        assert!(matches!(err, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_single_source_waits_for_its_cooldown() {
        let (mut sim, player) = setup(400.0);
        register_power_infusion_cooldown(&mut sim, player, 1).unwrap();
        let aura = sim.unit(player).get_aura("Power Infusion").unwrap();
        sim.reset(1);

        sim.advance_to(Duration::from_secs(1));
        assert!(aura.is_active(&sim));
        sim.advance_to(Duration::from_secs(100));
        assert!(!aura.is_active(&sim));
        sim.advance_to(Duration::from_secs(180));
        assert!(aura.is_active(&sim));
        assert_eq!(sim.aura(aura).activations(), 2);
    }
}
