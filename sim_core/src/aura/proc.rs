//! Proc triggers - permanent listener auras that roll a chance on matching events

use super::{AuraConfig, CastHook, EventChannel, SpellResultHook};
use crate::error::ConfigError;
use crate::sim::Simulation;
use crate::spell::SpellResult;
use crate::timer::Cooldown;
use crate::types::{ActionId, AuraId, HitOutcome, ProcMask, SpellId, UnitId};
use crate::unit::Hand;
use std::rc::Rc;
use std::time::Duration;
use tracing::{debug, warn};

/// Action run when a proc fires. Cast-complete triggers get no result.
pub type ProcHandler = Rc<dyn Fn(&mut Simulation, AuraId, SpellId, Option<&SpellResult>)>;

/// How likely a qualifying event is to proc
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProcRate {
    /// Fixed chance in `[0, 1]`
    Chance(f64),
    /// Procs per minute, scaled by the triggering weapon's swing time
    Ppm(f64),
}

impl Default for ProcRate {
    fn default() -> Self {
        ProcRate::Chance(1.0)
    }
}

#[derive(Clone)]
pub struct ProcTrigger {
    pub name: String,
    pub action_id: ActionId,
    pub callback: EventChannel,
    /// Triggering spell must share a bit with this mask; empty accepts any spell
    pub proc_mask: ProcMask,
    /// Triggering spell must share no bit with this mask
    pub proc_mask_exclude: ProcMask,
    /// Outcome filter; empty accepts any outcome
    pub outcome: HitOutcome,
    pub rate: ProcRate,
    pub icd: Option<Duration>,
    pub handler: Option<ProcHandler>,
}

impl Default for ProcTrigger {
    fn default() -> Self {
        ProcTrigger {
            name: String::new(),
            action_id: ActionId::default(),
            callback: EventChannel::SpellHitDealt,
            proc_mask: ProcMask::EMPTY,
            proc_mask_exclude: ProcMask::EMPTY,
            outcome: HitOutcome::empty(),
            rate: ProcRate::default(),
            icd: None,
            handler: None,
        }
    }
}

struct ProcFilter {
    name: String,
    proc_mask: ProcMask,
    proc_mask_exclude: ProcMask,
    outcome: HitOutcome,
    rate: ProcRate,
    icd: Option<Cooldown>,
    handler: ProcHandler,
}

impl ProcFilter {
    fn handle(&self, sim: &mut Simulation, aura: AuraId, spell: SpellId, result: Option<&SpellResult>) {
        let mask = sim.spell(spell).proc_mask;
        if !self.proc_mask.is_empty() && !mask.matches(self.proc_mask) {
            return;
        }
        if mask.intersects(self.proc_mask_exclude) {
            return;
        }
        if let Some(result) = result {
            if !result.outcome.matches(self.outcome) {
                return;
            }
        }
        let icd = self.icd;
        if let Some(icd) = icd {
            if !icd.is_ready(sim) {
                return;
            }
        }

        let chance = match self.rate {
            ProcRate::Chance(chance) => chance,
            ProcRate::Ppm(ppm) => sim
                .unit(aura.unit)
                .swing_speed(Hand::from_proc_mask(mask))
                .map(|speed| ppm * speed / 60.0)
                .unwrap_or(0.0),
        };
        if chance < 1.0 && sim.random_float(&self.name) >= chance {
            return;
        }

        if let Some(icd) = icd {
            icd.use_cooldown(sim);
        }
        debug!(time = ?sim.now(), proc = %self.name, "proc fired");
        (self.handler)(sim, aura, spell, result);
    }
}

fn validate(trigger: &ProcTrigger) -> Result<ProcHandler, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidProcTrigger {
        name: trigger.name.clone(),
        reason: reason.to_string(),
    };
    if trigger.name.is_empty() {
        return Err(invalid("missing name"));
    }
    match trigger.rate {
        ProcRate::Chance(chance) if !(chance > 0.0 && chance <= 1.0) => {
            return Err(invalid("chance must be in (0, 1]"));
        }
        ProcRate::Ppm(ppm) if !(ppm > 0.0 && ppm.is_finite()) => {
            return Err(invalid("ppm must be positive"));
        }
        _ => {}
    }
    trigger.handler.clone().ok_or_else(|| invalid("missing handler"))
}

/// Register a permanent aura on `unit` that runs `trigger.handler` when a
/// matching event on `trigger.callback` passes the mask, outcome, icd and
/// chance checks (in that order).
pub fn make_proc_trigger_aura(sim: &mut Simulation, unit: UnitId, trigger: ProcTrigger) -> Result<AuraId, ConfigError> {
    let handler = validate(&trigger)?;
    let owner = sim.check_unit(unit)?;
    if matches!(trigger.rate, ProcRate::Ppm(_)) && owner.weapons.main_hand.is_none() && owner.weapons.ranged.is_none() {
        warn!(proc = %trigger.name, unit = %owner.label, "ppm trigger on a unit without weapons never procs");
    }

    let icd = trigger.icd.map(|duration| Cooldown::new(sim.new_timer(), duration));
    let filter = Rc::new(ProcFilter {
        name: trigger.name.clone(),
        proc_mask: trigger.proc_mask,
        proc_mask_exclude: trigger.proc_mask_exclude,
        outcome: trigger.outcome,
        rate: trigger.rate,
        icd,
        handler,
    });

    let mut config = AuraConfig::new(trigger.name, trigger.action_id);
    let result_hook = {
        let filter = filter.clone();
        Some(Rc::new(move |sim: &mut Simulation, aura: AuraId, spell: SpellId, result: &SpellResult| {
            filter.handle(sim, aura, spell, Some(result))
        }) as SpellResultHook)
    };
    match trigger.callback {
        EventChannel::SpellHitDealt => config.on_spell_hit_dealt = result_hook,
        EventChannel::SpellHitTaken => config.on_spell_hit_taken = result_hook,
        EventChannel::PeriodicDamageDealt => config.on_periodic_damage_dealt = result_hook,
        EventChannel::HealDealt => config.on_heal_dealt = result_hook,
        EventChannel::CastComplete => {
            config.on_cast_complete = Some(Rc::new(move |sim: &mut Simulation, aura: AuraId, spell: SpellId| {
                filter.handle(sim, aura, spell, None)
            }) as CastHook)
        }
    }

    let aura = sim.register_aura(unit, config)?;
    Ok(aura.make_permanent(sim))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FightConfig;
    use crate::types::UnitKind;

    fn noop() -> Option<ProcHandler> {
        Some(Rc::new(|_: &mut Simulation, _: AuraId, _: SpellId, _: Option<&SpellResult>| {}))
    }

    fn setup() -> (Simulation, UnitId) {
        let mut sim = Simulation::new(FightConfig::default());
        let player = sim.add_unit("Player", UnitKind::Player, 60);
        (sim, player)
    }

    #[test]
    fn test_invalid_triggers_rejected() {
        let (mut sim, player) = setup();
        let cases = [
            ProcTrigger {
                handler: noop(),
                ..Default::default()
            },
            ProcTrigger {
                name: "No Handler".to_string(),
                ..Default::default()
            },
            ProcTrigger {
                name: "Zero".to_string(),
                rate: ProcRate::Chance(0.0),
                handler: noop(),
                ..Default::default()
            },
            ProcTrigger {
                name: "Too Likely".to_string(),
                rate: ProcRate::Chance(1.5),
                handler: noop(),
                ..Default::default()
            },
            ProcTrigger {
                name: "Negative Ppm".to_string(),
                rate: ProcRate::Ppm(-1.0),
                handler: noop(),
                ..Default::default()
            },
        ];
        for trigger in cases {
            let result = make_proc_trigger_aura(&mut sim, player, trigger);
            assert!(matches!(result, Err(ConfigError::InvalidProcTrigger { .. })));
        }
        assert_eq!(sim.unit(player).aura_count(), 0);
    }

    #[test]
    fn test_trigger_aura_is_permanent() {
        let (mut sim, player) = setup();
        let aura = make_proc_trigger_aura(
            &mut sim,
            player,
            ProcTrigger {
                name: "Listener".to_string(),
                handler: noop(),
                ..Default::default()
            },
        )
        .unwrap();
        assert!(sim.aura(aura).is_permanent());
        assert!(!aura.is_active(&sim));
        sim.reset(1);
        assert!(aura.is_active(&sim));
    }

    #[test]
    fn test_ppm_without_weapon_never_procs() {
        let (mut sim, player) = setup();
        let target = sim.primary_target().unwrap();
        let fired = Rc::new(std::cell::Cell::new(false));
        let flag = fired.clone();
        make_proc_trigger_aura(
            &mut sim,
            player,
            ProcTrigger {
                name: "Unarmed".to_string(),
                rate: ProcRate::Ppm(60.0),
                handler: Some(Rc::new(
                    move |_: &mut Simulation, _: AuraId, _: SpellId, _: Option<&SpellResult>| flag.set(true),
                )),
                ..Default::default()
            },
        )
        .unwrap();
        let spell = sim
            .register_spell(
                player,
                crate::spell::SpellConfig {
                    proc_mask: ProcMask::MELEE_MH_SPECIAL,
                    ..Default::default()
                },
            )
            .unwrap();
        sim.reset(1);
        spell.calc_and_deal_damage(&mut sim, target, 10.0, crate::combat::OutcomeKind::AlwaysHit);
        assert!(!fired.get());
    }
}
