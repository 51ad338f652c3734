//! Simulation environment - clock, RNG, entity storage and trial lifecycle
//!
//! A `Simulation` owns every unit, aura, spell and dot of one fight plus the
//! scheduler that drives them. Content refers to entities through typed ids
//! and mutates them through `&mut Simulation` inside callbacks.

mod batch;
mod log;

pub use batch::{run_batch, run_batch_sequential};
pub use log::{EventLog, LogEntry};

use crate::combat::{CombatTable, DefaultCombatTable};
use crate::config::FightConfig;
use crate::dot::Dot;
use crate::error::ConfigError;
use crate::metrics::TrialResult;
use crate::scheduler::{ActionPriority, Scheduler};
use crate::spell::Spell;
use crate::stats::Stat;
use crate::types::{AuraId, DotId, ResourceKind, SpellId, TimerId, UnitId, UnitKind};
use crate::unit::Unit;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::rc::Rc;
use std::time::Duration;
use tracing::{debug, trace};

/// One fight: units, their content and the event timeline
pub struct Simulation {
    config: FightConfig,
    now: Duration,
    rng: ChaCha8Rng,
    scheduler: Scheduler,
    /// Ready-at time of every timer
    timers: Vec<Duration>,
    pub(crate) units: Vec<Unit>,
    pub(crate) spells: Vec<Spell>,
    pub(crate) dots: Vec<Dot>,
    combat: Rc<dyn CombatTable>,
    log: Option<EventLog>,
    finished: bool,
    kill_time: Option<Duration>,
}

impl Simulation {
    /// Create an environment with the configured enemy targets already present
    pub fn new(config: FightConfig) -> Self {
        let combat: Rc<dyn CombatTable> = Rc::new(DefaultCombatTable::new(config.combat.clone()));
        let log = config.record_events.then(EventLog::default);
        let mut sim = Simulation {
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            config,
            now: Duration::ZERO,
            scheduler: Scheduler::new(),
            timers: Vec::new(),
            units: Vec::new(),
            spells: Vec::new(),
            dots: Vec::new(),
            combat,
            log,
            finished: false,
            kill_time: None,
        };

        for i in 0..sim.config.num_targets {
            let level = sim.config.target_level;
            let armor = sim.config.target_armor;
            let health = sim.config.target_health;
            let id = sim.add_unit(format!("Target {}", i + 1), UnitKind::Enemy, level);
            let target = sim.unit_mut(id);
            target.add_stat(Stat::Armor, armor);
            if let Some(health) = health {
                target.enable_resource(ResourceKind::Health, health);
            }
        }
        sim
    }

    pub fn config(&self) -> &FightConfig {
        &self.config
    }

    /// Current simulated time
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Configured fight length
    pub fn duration(&self) -> Duration {
        self.config.duration()
    }

    /// Time left until the configured fight length
    pub fn remaining_duration(&self) -> Duration {
        self.duration().saturating_sub(self.now)
    }

    pub fn scheduler_mut(&mut self) -> &mut Scheduler {
        &mut self.scheduler
    }

    // === Timers ===

    /// Allocate a readiness timer (ready immediately)
    pub fn new_timer(&mut self) -> TimerId {
        self.timers.push(Duration::ZERO);
        TimerId(self.timers.len() - 1)
    }

    pub fn timer_ready_at(&self, timer: TimerId) -> Duration {
        self.timers[timer.0]
    }

    pub fn set_timer_ready_at(&mut self, timer: TimerId, ready_at: Duration) {
        self.timers[timer.0] = ready_at;
    }

    // === Randomness ===

    /// Uniform roll in `[0, 1)` from the trial's seeded source.
    ///
    /// The label only identifies the roll in trace output.
    pub fn random_float(&mut self, label: &str) -> f64 {
        let value: f64 = self.rng.gen();
        trace!(label, value, "random roll");
        value
    }

    /// Uniform roll in `[min, max)`
    pub fn roll(&mut self, min: f64, max: f64) -> f64 {
        if max <= min {
            return min;
        }
        min + (max - min) * self.random_float("Damage Roll")
    }

    pub(crate) fn rng_mut(&mut self) -> &mut ChaCha8Rng {
        &mut self.rng
    }

    // === Combat resolution collaborator ===

    pub fn combat_table(&self) -> Rc<dyn CombatTable> {
        self.combat.clone()
    }

    /// Replace the attack table used for outcome and mitigation rolls
    pub fn set_combat_table(&mut self, table: Rc<dyn CombatTable>) {
        self.combat = table;
    }

    // === Units ===

    pub fn add_unit(&mut self, label: impl Into<String>, kind: UnitKind, level: u32) -> UnitId {
        let id = UnitId(self.units.len());
        self.units.push(Unit::new(id, label.into(), kind, level));
        self.create_dots_for_new_unit(id);
        id
    }

    /// Look up a unit. Panics on an id that was never handed out.
    pub fn unit(&self, id: UnitId) -> &Unit {
        &self.units[id.0]
    }

    pub fn unit_mut(&mut self, id: UnitId) -> &mut Unit {
        &mut self.units[id.0]
    }

    /// Construction-time lookup that reports unknown ids as configuration errors
    pub fn check_unit(&self, id: UnitId) -> Result<&Unit, ConfigError> {
        self.units.get(id.0).ok_or(ConfigError::UnknownUnit(id.0))
    }

    pub fn units(&self) -> impl Iterator<Item = &Unit> {
        self.units.iter()
    }

    /// Enemy units in creation order
    pub fn targets(&self) -> Vec<UnitId> {
        self.units
            .iter()
            .filter(|u| u.kind == UnitKind::Enemy)
            .map(|u| u.id)
            .collect()
    }

    /// Friendly units (players and pets) in creation order
    pub fn allies(&self) -> Vec<UnitId> {
        self.units
            .iter()
            .filter(|u| u.kind != UnitKind::Enemy)
            .map(|u| u.id)
            .collect()
    }

    /// The first enemy; its death ends health-based fights
    pub fn primary_target(&self) -> Option<UnitId> {
        self.units.iter().find(|u| u.kind == UnitKind::Enemy).map(|u| u.id)
    }

    // === Entity lookups ===

    pub fn aura(&self, id: AuraId) -> &crate::aura::Aura {
        &self.units[id.unit.0].auras[id.index]
    }

    pub(crate) fn aura_mut(&mut self, id: AuraId) -> &mut crate::aura::Aura {
        &mut self.units[id.unit.0].auras[id.index]
    }

    pub fn spell(&self, id: SpellId) -> &Spell {
        &self.spells[id.0]
    }

    pub(crate) fn spell_mut(&mut self, id: SpellId) -> &mut Spell {
        &mut self.spells[id.0]
    }

    pub fn dot(&self, id: DotId) -> &Dot {
        &self.dots[id.0]
    }

    pub(crate) fn dot_mut(&mut self, id: DotId) -> &mut Dot {
        &mut self.dots[id.0]
    }

    // === Event log ===

    pub fn event_log(&self) -> Option<&EventLog> {
        self.log.as_ref()
    }

    pub(crate) fn record(&mut self, entry: LogEntry) {
        if let Some(log) = &mut self.log {
            log.push(entry);
        }
    }

    // === Trial lifecycle ===

    /// True once a terminal condition ended the trial early
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn kill_time(&self) -> Option<Duration> {
        self.kill_time
    }

    /// End the trial at the current time
    pub fn finish(&mut self) {
        if !self.finished {
            debug!(time = ?self.now, "terminal condition reached");
            self.finished = true;
            self.kill_time = Some(self.now);
        }
    }

    /// Return every entity to its pre-fight state and reseed the RNG.
    ///
    /// Scheduled actions are dropped, auras and dots are silently cleared,
    /// then each aura's reset hook runs (permanent auras activate here) and
    /// periodic unit actions (auto attacks, regen) are started.
    pub fn reset(&mut self, seed: u64) {
        self.scheduler.clear();
        self.now = Duration::ZERO;
        self.finished = false;
        self.kill_time = None;
        self.rng = ChaCha8Rng::seed_from_u64(seed);
        self.timers.iter_mut().for_each(|t| *t = Duration::ZERO);
        if let Some(log) = &mut self.log {
            log.clear();
        }

        for unit in &mut self.units {
            unit.reset();
        }
        for spell in &mut self.spells {
            spell.reset();
        }
        for dot in &mut self.dots {
            dot.reset();
        }

        let mut unit = 0;
        while unit < self.units.len() {
            let mut index = 0;
            while index < self.units[unit].auras.len() {
                AuraId { unit: UnitId(unit), index }.run_reset(self);
                index += 1;
            }
            unit += 1;
        }

        for id in (0..self.units.len()).map(UnitId) {
            crate::autoattack::start_swinging(self, id);
            self.start_mana_regen(id);
        }
    }

    /// Dispatch every action due at or before `time`, then move the clock to `time`.
    ///
    /// Stops early if a terminal condition is reached.
    pub fn advance_to(&mut self, time: Duration) {
        while !self.finished {
            match self.scheduler.pop_due(time) {
                Some((at, callback)) => {
                    self.now = self.now.max(at);
                    callback(self, at);
                }
                None => break,
            }
        }
        if !self.finished && time > self.now {
            self.now = time;
        }
    }

    /// Run the current trial to completion and collect its results.
    ///
    /// Call [`Simulation::reset`] first.
    pub fn run_trial(&mut self) -> TrialResult {
        let end = self.duration();
        self.advance_to(end);
        let elapsed = self.now;
        self.expire_all_auras();
        TrialResult::collect(self, elapsed)
    }

    /// Reset with `seed` and run one trial
    pub fn run_single_trial(&mut self, seed: u64) -> TrialResult {
        self.reset(seed);
        self.run_trial()
    }

    /// Deactivate every active aura so uptime and stat round trips settle
    fn expire_all_auras(&mut self) {
        for unit in 0..self.units.len() {
            let mut index = 0;
            while index < self.units[unit].auras.len() {
                let id = AuraId { unit: UnitId(unit), index };
                if id.is_active(self) {
                    id.deactivate(self);
                }
                index += 1;
            }
        }
    }

    /// Mana ticks every 2s for every mana user; MP5 granted mid-trial counts
    /// from the next tick
    fn start_mana_regen(&mut self, unit: UnitId) {
        if !self.unit(unit).has_resource(ResourceKind::Mana) {
            return;
        }
        let tick = Duration::from_secs(2);
        self.scheduler.schedule(
            tick,
            tick,
            None,
            ActionPriority::Regen,
            Rc::new(move |sim: &mut Simulation, _| {
                let owner = sim.unit(unit);
                let amount = owner.stat(Stat::MP5) * owner.pseudo_stats.mana_regen_multiplier * 2.0 / 5.0;
                if amount <= 0.0 {
                    return;
                }
                let now = sim.now();
                sim.unit_mut(unit)
                    .gain_resource(ResourceKind::Mana, amount, crate::unit::MP5_ACTION, now);
            }),
        );
    }
}
