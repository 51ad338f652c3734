//! Spell - the castable unit of action
//!
//! A spell is registered once on its caster. Casting checks cost, cooldown
//! and an in-progress hard cast, then runs the spell's effects either right
//! away or when the cast time elapses. Damage and healing resolution lives
//! in [`damage`].

mod damage;
mod result;

pub use result::SpellResult;

use crate::dot::{Dot, DotConfig};
use crate::error::ConfigError;
use crate::metrics::SpellMetrics;
use crate::scheduler::ActionPriority;
use crate::sim::{LogEntry, Simulation};
use crate::timer::Cooldown;
use crate::types::{ActionId, DefenseType, DotId, ProcMask, ResourceKind, SpellId, SpellSchool, TimerId, UnitId};
use bitflags::bitflags;
use std::rc::Rc;
use std::time::Duration;
use tracing::{debug, trace};

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct SpellFlags: u32 {
        /// All-or-nothing: resistance becomes a full-resist chance
        const BINARY              = 1 << 0;
        /// Keep out of per-action metrics
        const NO_METRICS          = 1 << 1;
        /// Completing the cast does not notify cast-complete listeners
        const NO_ON_CAST_COMPLETE = 1 << 2;
        const IGNORE_ARMOR        = 1 << 3;
    }
}

/// Effects run when a cast completes, with the chosen target
pub type ApplyEffects = Rc<dyn Fn(&mut Simulation, UnitId, SpellId)>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpellCost {
    pub resource: ResourceKind,
    pub amount: f64,
}

#[derive(Clone)]
pub struct SpellConfig {
    pub action_id: ActionId,
    pub school: SpellSchool,
    pub defense_type: DefenseType,
    pub proc_mask: ProcMask,
    pub flags: SpellFlags,
    pub cost: Option<SpellCost>,
    pub cooldown: Option<Duration>,
    /// Timer to share with other spells (e.g. a category cooldown)
    pub shared_timer: Option<TimerId>,
    pub cast_time: Duration,
    pub damage_multiplier: f64,
    pub threat_multiplier: f64,
    /// Added to the caster's crit chance, as a fraction
    pub bonus_crit_chance: f64,
    /// Periodic effect the spell applies by default
    pub dot: Option<DotConfig>,
    /// Replaces the default effect (applying the dot)
    pub apply_effects: Option<ApplyEffects>,
}

impl Default for SpellConfig {
    fn default() -> Self {
        SpellConfig {
            action_id: ActionId::default(),
            school: SpellSchool::Physical,
            defense_type: DefenseType::None,
            proc_mask: ProcMask::EMPTY,
            flags: SpellFlags::empty(),
            cost: None,
            cooldown: None,
            shared_timer: None,
            cast_time: Duration::ZERO,
            damage_multiplier: 1.0,
            threat_multiplier: 1.0,
            bonus_crit_chance: 0.0,
            dot: None,
            apply_effects: None,
        }
    }
}

/// A registered spell
pub struct Spell {
    pub unit: UnitId,
    pub action_id: ActionId,
    pub school: SpellSchool,
    pub defense_type: DefenseType,
    pub proc_mask: ProcMask,
    pub flags: SpellFlags,
    pub cost: Option<SpellCost>,
    pub cooldown: Option<Cooldown>,
    pub cast_time: Duration,
    pub damage_multiplier: f64,
    pub threat_multiplier: f64,
    pub bonus_crit_chance: f64,
    apply_effects: Option<ApplyEffects>,
    dot_config: Option<DotConfig>,
    /// Dot per owning unit, created when the spell or the unit is registered
    dots: Vec<Option<DotId>>,
    pub metrics: SpellMetrics,
}

impl Spell {
    pub(crate) fn reset(&mut self) {
        self.metrics = SpellMetrics::default();
    }

    pub fn has_dot(&self) -> bool {
        self.dot_config.is_some()
    }
}

impl Simulation {
    /// Register a spell cast by `unit`
    pub fn register_spell(&mut self, unit: UnitId, config: SpellConfig) -> Result<SpellId, ConfigError> {
        self.check_unit(unit)?;
        if let Some(dot) = &config.dot {
            dot.validate()?;
            // Dot auras are labelled after the caster, so two casters sharing a
            // label must not own dots with the same name
            let caster_label = &self.unit(unit).label;
            let duplicate = self
                .spells
                .iter()
                .filter(|s| self.unit(s.unit).label == *caster_label)
                .filter_map(|s| s.dot_config.as_ref())
                .any(|other| other.aura.label == dot.aura.label);
            if duplicate {
                return Err(ConfigError::InvalidDot {
                    label: dot.aura.label.clone(),
                    reason: format!("a caster labelled '{}' already owns a dot with this label", caster_label),
                });
            }
        }
        if let Some(cost) = config.cost {
            if !(cost.amount >= 0.0) {
                return Err(ConfigError::Validation(format!(
                    "spell {} has a negative cost",
                    config.action_id
                )));
            }
        }

        let cooldown = match (config.cooldown, config.shared_timer) {
            (Some(duration), Some(timer)) => Some(Cooldown::new(timer, duration)),
            (Some(duration), None) => Some(Cooldown::new(self.new_timer(), duration)),
            (None, _) => None,
        };
        self.spells.push(Spell {
            unit,
            action_id: config.action_id,
            school: config.school,
            defense_type: config.defense_type,
            proc_mask: config.proc_mask,
            flags: config.flags,
            cost: config.cost,
            cooldown,
            cast_time: config.cast_time,
            damage_multiplier: config.damage_multiplier,
            threat_multiplier: config.threat_multiplier,
            bonus_crit_chance: config.bonus_crit_chance,
            apply_effects: config.apply_effects,
            dot_config: config.dot,
            dots: Vec::new(),
            metrics: SpellMetrics::default(),
        });
        let id = SpellId(self.spells.len() - 1);

        let owners: Vec<UnitId> = match &self.spell(id).dot_config {
            Some(dot) if dot.is_aoe || dot.self_only => vec![unit],
            Some(_) => self.units().map(|u| u.id).collect(),
            None => Vec::new(),
        };
        for owner in owners {
            self.create_dot(id, owner)?;
        }
        Ok(id)
    }

    /// Give a unit added after some dot spells were registered its copy of
    /// each targeted dot
    pub(crate) fn create_dots_for_new_unit(&mut self, unit: UnitId) {
        let spells: Vec<SpellId> = (0..self.spells.len())
            .map(SpellId)
            .filter(|&id| {
                self.spell(id)
                    .dot_config
                    .as_ref()
                    .is_some_and(|dot| !dot.is_aoe && !dot.self_only)
            })
            .collect();
        for spell in spells {
            if let Err(e) = self.create_dot(spell, unit) {
                // A fresh unit has no auras and dot labels are unique per
                // caster label, so registration cannot collide here
                panic!(
                    "dot of spell {} cannot be created on unit '{}': {}",
                    self.spell(spell).action_id,
                    self.unit(unit).label,
                    e
                );
            }
        }
    }

    fn create_dot(&mut self, spell: SpellId, owner: UnitId) -> Result<(), ConfigError> {
        let Some(config) = self.spell(spell).dot_config.clone() else {
            return Ok(());
        };
        let caster = self.spell(spell).unit;
        let id = DotId(self.dots.len());
        let dot = Dot::create(self, id, spell, caster, owner, config)?;
        self.dots.push(dot);

        let dots = &mut self.spell_mut(spell).dots;
        if dots.len() <= owner.0 {
            dots.resize(owner.0 + 1, None);
        }
        dots[owner.0] = Some(id);
        Ok(())
    }
}

impl SpellId {
    /// Caster of the spell
    pub fn unit(self, sim: &Simulation) -> UnitId {
        sim.spell(self).unit
    }

    /// True if the caster can pay the cost, the cooldown is ready and no hard
    /// cast is in progress
    pub fn can_cast(self, sim: &Simulation) -> bool {
        let spell = sim.spell(self);
        let caster = sim.unit(spell.unit);
        if caster.hardcast_until > sim.now() {
            return false;
        }
        if let Some(cooldown) = &spell.cooldown {
            if !cooldown.is_ready(sim) {
                return false;
            }
        }
        match spell.cost {
            Some(cost) => cost.amount <= 0.0 || caster.resource(cost.resource) >= cost.amount,
            None => true,
        }
    }

    /// Cast at `target`. Returns false (and changes nothing) if the spell
    /// cannot be cast right now.
    pub fn cast(self, sim: &mut Simulation, target: UnitId) -> bool {
        if !self.can_cast(sim) {
            trace!(time = ?sim.now(), spell = %sim.spell(self).action_id, "cast rejected");
            return false;
        }
        let now = sim.now();
        let (caster, action_id, cost, cooldown, cast_time, flags) = {
            let spell = sim.spell(self);
            (
                spell.unit,
                spell.action_id,
                spell.cost,
                spell.cooldown,
                spell.cast_time,
                spell.flags,
            )
        };

        if let Some(cost) = cost {
            sim.unit_mut(caster).spend_resource(cost.resource, cost.amount);
        }
        if let Some(cooldown) = cooldown {
            cooldown.use_cooldown(sim);
        }
        if !flags.contains(SpellFlags::NO_METRICS) {
            sim.spell_mut(self).metrics.casts += 1;
        }
        debug!(time = ?now, unit = caster.0, spell = %action_id, "cast");
        sim.record(LogEntry::Cast {
            time: now,
            unit: caster,
            action: action_id,
        });

        if cast_time.is_zero() {
            self.complete_cast(sim, target);
        } else {
            let speed = sim.unit(caster).pseudo_stats.cast_speed_multiplier;
            let cast_time = cast_time.div_f64(speed.max(f64::EPSILON));
            let finish = now.saturating_add(cast_time);
            sim.unit_mut(caster).hardcast_until = finish;
            sim.scheduler_mut().schedule_once(
                finish,
                ActionPriority::Default,
                Rc::new(move |sim: &mut Simulation, _| self.complete_cast(sim, target)),
            );
        }
        true
    }

    fn complete_cast(self, sim: &mut Simulation, target: UnitId) {
        let (caster, apply_effects, flags) = {
            let spell = sim.spell(self);
            (spell.unit, spell.apply_effects.clone(), spell.flags)
        };
        match apply_effects {
            Some(effects) => effects(sim, target, self),
            None => {
                if let Some(dot) = self.dot(sim, target) {
                    dot.apply(sim);
                }
            }
        }
        if !flags.contains(SpellFlags::NO_ON_CAST_COMPLETE) {
            sim.dispatch_cast_complete(caster, self);
        }
    }

    /// The spell's dot on `target`. AoE and self-only dots live on the caster
    /// whatever the target.
    ///
    /// Returns `None` for spells without a dot.
    pub fn dot(self, sim: &Simulation, target: UnitId) -> Option<DotId> {
        let spell = sim.spell(self);
        let config = spell.dot_config.as_ref()?;
        let owner = if config.is_aoe || config.self_only {
            spell.unit
        } else {
            target
        };
        spell.dots.get(owner.0).copied().flatten()
    }
}
