//! Aura - named, timed, possibly stacking modifiers with lifecycle hooks
//!
//! An aura is registered once on a unit and reused across trials. Every hook is
//! optional; an unset hook is a no-op. Hooks receive `&mut Simulation` and may
//! activate or deactivate any aura, including their own.

pub mod exclusive;
mod proc;

pub use exclusive::{ExclusiveEffectConfig, ExclusiveHook};
pub use proc::{make_proc_trigger_aura, ProcHandler, ProcRate, ProcTrigger};

use crate::error::ConfigError;
use crate::scheduler::{ActionHandle, ActionPriority};
use crate::sim::{LogEntry, Simulation};
use crate::spell::SpellResult;
use crate::timer::Cooldown;
use crate::types::{ActionId, AuraId, SpellId, UnitId, NEVER_EXPIRES};
use std::rc::Rc;
use std::time::Duration;
use tracing::debug;

/// Hook run on reset, gain and expire
pub type AuraHook = Rc<dyn Fn(&mut Simulation, AuraId)>;
/// Hook run with `(old, new)` whenever the stack count changes
pub type StacksHook = Rc<dyn Fn(&mut Simulation, AuraId, i32, i32)>;
/// Hook run for a resolved spell result on one of the unit's event channels
pub type SpellResultHook = Rc<dyn Fn(&mut Simulation, AuraId, SpellId, &SpellResult)>;
/// Hook run when one of the unit's casts completes
pub type CastHook = Rc<dyn Fn(&mut Simulation, AuraId, SpellId)>;

/// Unit-level event channels that auras (and proc triggers) listen on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventChannel {
    /// The unit landed (or failed to land) a direct hit
    SpellHitDealt,
    /// The unit was the target of a direct hit
    SpellHitTaken,
    /// A periodic damage tick dealt by the unit
    PeriodicDamageDealt,
    /// Direct or periodic healing done by the unit
    HealDealt,
    /// A cast by the unit finished
    CastComplete,
}

impl EventChannel {
    pub const COUNT: usize = 5;

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Aura indices listening on each channel, in registration order
#[derive(Debug, Clone, Default)]
pub(crate) struct Listeners([Vec<usize>; EventChannel::COUNT]);

impl Listeners {
    pub(crate) fn get(&self, channel: EventChannel) -> &[usize] {
        &self.0[channel.index()]
    }

    fn push(&mut self, channel: EventChannel, aura: usize) {
        self.0[channel.index()].push(aura);
    }
}

/// Everything needed to register an aura
#[derive(Clone)]
pub struct AuraConfig {
    pub label: String,
    pub action_id: ActionId,
    /// Free-form grouping tag (e.g. all dots of one spell share a tag)
    pub tag: String,
    /// `NEVER_EXPIRES` disables the scheduled expiry
    pub duration: Duration,
    /// 0 means "armed but dormant": the aura can be active with zero stacks
    pub max_stacks: i32,
    /// Gates fresh activations
    pub icd: Option<Cooldown>,

    pub on_reset: Option<AuraHook>,
    pub on_gain: Option<AuraHook>,
    pub on_expire: Option<AuraHook>,
    pub on_stacks_change: Option<StacksHook>,
    pub on_spell_hit_dealt: Option<SpellResultHook>,
    pub on_spell_hit_taken: Option<SpellResultHook>,
    pub on_periodic_damage_dealt: Option<SpellResultHook>,
    pub on_heal_dealt: Option<SpellResultHook>,
    pub on_cast_complete: Option<CastHook>,
}

impl Default for AuraConfig {
    fn default() -> Self {
        AuraConfig {
            label: String::new(),
            action_id: ActionId::default(),
            tag: String::new(),
            duration: NEVER_EXPIRES,
            max_stacks: 1,
            icd: None,
            on_reset: None,
            on_gain: None,
            on_expire: None,
            on_stacks_change: None,
            on_spell_hit_dealt: None,
            on_spell_hit_taken: None,
            on_periodic_damage_dealt: None,
            on_heal_dealt: None,
            on_cast_complete: None,
        }
    }
}

impl AuraConfig {
    pub fn new(label: impl Into<String>, action_id: ActionId) -> Self {
        AuraConfig {
            label: label.into(),
            action_id,
            ..Default::default()
        }
    }

    fn channels(&self) -> Vec<EventChannel> {
        let mut channels = Vec::new();
        if self.on_spell_hit_dealt.is_some() {
            channels.push(EventChannel::SpellHitDealt);
        }
        if self.on_spell_hit_taken.is_some() {
            channels.push(EventChannel::SpellHitTaken);
        }
        if self.on_periodic_damage_dealt.is_some() {
            channels.push(EventChannel::PeriodicDamageDealt);
        }
        if self.on_heal_dealt.is_some() {
            channels.push(EventChannel::HealDealt);
        }
        if self.on_cast_complete.is_some() {
            channels.push(EventChannel::CastComplete);
        }
        channels
    }
}

/// Registered aura and its per-trial state
pub struct Aura {
    pub label: String,
    pub action_id: ActionId,
    pub tag: String,
    pub duration: Duration,
    pub max_stacks: i32,
    pub icd: Option<Cooldown>,
    hooks: AuraConfig,
    permanent: bool,

    // === Trial state ===
    active: bool,
    stacks: i32,
    start_time: Duration,
    expires_at: Duration,
    expire_action: Option<ActionHandle>,
    pub(crate) exclusive_effects: Vec<usize>,

    // === Metrics ===
    uptime: Duration,
    activations: u32,
}

impl Aura {
    fn from_config(config: AuraConfig) -> Self {
        Aura {
            label: config.label.clone(),
            action_id: config.action_id,
            tag: config.tag.clone(),
            duration: config.duration,
            max_stacks: config.max_stacks,
            icd: config.icd,
            hooks: config,
            permanent: false,
            active: false,
            stacks: 0,
            start_time: Duration::ZERO,
            expires_at: Duration::ZERO,
            expire_action: None,
            exclusive_effects: Vec::new(),
            uptime: Duration::ZERO,
            activations: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_permanent(&self) -> bool {
        self.permanent
    }

    pub fn stacks(&self) -> i32 {
        self.stacks
    }

    /// Total active time in the current trial (closed intervals only)
    pub fn uptime(&self) -> Duration {
        self.uptime
    }

    /// Fresh activations in the current trial
    pub fn activations(&self) -> u32 {
        self.activations
    }

    pub(crate) fn reset_state(&mut self) {
        self.active = false;
        self.stacks = 0;
        self.start_time = Duration::ZERO;
        self.expires_at = Duration::ZERO;
        self.expire_action = None;
        self.uptime = Duration::ZERO;
        self.activations = 0;
    }
}

/// One independently owned aura per unit, indexed by unit id
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuraArray {
    auras: Vec<Option<AuraId>>,
}

impl AuraArray {
    pub fn get(&self, unit: UnitId) -> Option<AuraId> {
        self.auras.get(unit.0).copied().flatten()
    }

    pub fn iter(&self) -> impl Iterator<Item = AuraId> + '_ {
        self.auras.iter().flatten().copied()
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True if the aura on any unit is active
    pub fn any_active(&self, sim: &Simulation) -> bool {
        self.iter().any(|id| id.is_active(sim))
    }
}

// === Construction ===

impl Simulation {
    /// Register a new aura on `unit`. The label must be non-empty and unique on the unit.
    pub fn register_aura(&mut self, unit: UnitId, config: AuraConfig) -> Result<AuraId, ConfigError> {
        let owner = self.check_unit(unit)?;
        if config.label.is_empty() {
            return Err(ConfigError::EmptyAuraLabel {
                unit: owner.label.clone(),
            });
        }
        if owner.get_aura(&config.label).is_some() {
            return Err(ConfigError::DuplicateAuraLabel {
                unit: owner.label.clone(),
                label: config.label,
            });
        }
        if config.max_stacks < 0 {
            return Err(ConfigError::Validation(format!(
                "aura '{}' has negative max_stacks {}",
                config.label, config.max_stacks
            )));
        }

        let channels = config.channels();
        let owner = self.unit_mut(unit);
        let index = owner.push_aura(Aura::from_config(config));
        for channel in channels {
            owner.listeners.push(channel, index);
        }
        Ok(AuraId { unit, index })
    }

    /// Return the aura with the same label if one exists, otherwise register it
    pub fn get_or_register_aura(&mut self, unit: UnitId, config: AuraConfig) -> Result<AuraId, ConfigError> {
        if let Some(existing) = self.check_unit(unit)?.get_aura(&config.label) {
            return Ok(existing);
        }
        self.register_aura(unit, config)
    }

    /// Build one aura per enemy target
    pub fn new_enemy_aura_array<F>(&mut self, make: F) -> Result<AuraArray, ConfigError>
    where
        F: FnMut(&mut Simulation, UnitId) -> Result<AuraId, ConfigError>,
    {
        let targets = self.targets();
        self.new_aura_array(targets, make)
    }

    /// Build one aura per friendly unit
    pub fn new_ally_aura_array<F>(&mut self, make: F) -> Result<AuraArray, ConfigError>
    where
        F: FnMut(&mut Simulation, UnitId) -> Result<AuraId, ConfigError>,
    {
        let allies = self.allies();
        self.new_aura_array(allies, make)
    }

    fn new_aura_array<F>(&mut self, units: Vec<UnitId>, mut make: F) -> Result<AuraArray, ConfigError>
    where
        F: FnMut(&mut Simulation, UnitId) -> Result<AuraId, ConfigError>,
    {
        let mut auras = vec![None; self.units.len()];
        for unit in units {
            auras[unit.0] = Some(make(self, unit)?);
        }
        Ok(AuraArray { auras })
    }

    // === Event dispatch ===

    /// Run every listener of `channel` on `unit` for a spell result.
    ///
    /// The listener list is copied first, so auras registered during dispatch
    /// only hear later events.
    pub(crate) fn dispatch_spell_result(
        &mut self,
        unit: UnitId,
        channel: EventChannel,
        spell: SpellId,
        result: &SpellResult,
    ) {
        let listeners = self.units[unit.0].listeners.get(channel).to_vec();
        for index in listeners {
            let id = AuraId { unit, index };
            let aura = self.aura(id);
            if !(aura.active || aura.permanent) {
                continue;
            }
            let hook = match channel {
                EventChannel::SpellHitDealt => aura.hooks.on_spell_hit_dealt.clone(),
                EventChannel::SpellHitTaken => aura.hooks.on_spell_hit_taken.clone(),
                EventChannel::PeriodicDamageDealt => aura.hooks.on_periodic_damage_dealt.clone(),
                EventChannel::HealDealt => aura.hooks.on_heal_dealt.clone(),
                EventChannel::CastComplete => None,
            };
            if let Some(hook) = hook {
                hook(self, id, spell, result);
            }
        }
    }

    pub(crate) fn dispatch_cast_complete(&mut self, unit: UnitId, spell: SpellId) {
        let listeners = self.units[unit.0].listeners.get(EventChannel::CastComplete).to_vec();
        for index in listeners {
            let id = AuraId { unit, index };
            let aura = self.aura(id);
            if !(aura.active || aura.permanent) {
                continue;
            }
            if let Some(hook) = aura.hooks.on_cast_complete.clone() {
                hook(self, id, spell);
            }
        }
    }
}

// === Lifecycle ===

impl AuraId {
    pub fn is_active(self, sim: &Simulation) -> bool {
        sim.aura(self).active
    }

    pub fn stacks(self, sim: &Simulation) -> i32 {
        sim.aura(self).stacks
    }

    pub fn label(self, sim: &Simulation) -> &str {
        &sim.aura(self).label
    }

    /// Expiry time of an active aura (`NEVER_EXPIRES` if it has none, zero if inactive)
    pub fn expires_at(self, sim: &Simulation) -> Duration {
        let aura = sim.aura(self);
        if aura.active {
            aura.expires_at
        } else {
            Duration::ZERO
        }
    }

    pub fn remaining_duration(self, sim: &Simulation) -> Duration {
        let expires_at = self.expires_at(sim);
        if expires_at == NEVER_EXPIRES {
            return NEVER_EXPIRES;
        }
        expires_at.saturating_sub(sim.now())
    }

    /// Time since the current activation
    pub fn time_active(self, sim: &Simulation) -> Duration {
        let aura = sim.aura(self);
        if aura.active {
            sim.now().saturating_sub(aura.start_time)
        } else {
            Duration::ZERO
        }
    }

    /// Turn the aura into an always-on listener: it never expires, activates on
    /// every reset and receives events even while inactive.
    pub fn make_permanent(self, sim: &mut Simulation) -> AuraId {
        let aura = sim.aura_mut(self);
        aura.permanent = true;
        aura.duration = NEVER_EXPIRES;
        self
    }

    /// Register an exclusive effect owned by this aura
    pub fn new_exclusive_effect(
        self,
        sim: &mut Simulation,
        category: &str,
        single_aura: bool,
        config: ExclusiveEffectConfig,
    ) -> Result<crate::types::ExclusiveEffectId, ConfigError> {
        sim.new_exclusive_effect(self, category, single_aura, config)
    }

    /// Activate the aura.
    ///
    /// An active aura only has its duration refreshed. An inactive aura whose
    /// internal cooldown is not ready stays inactive. Otherwise the aura goes
    /// active, schedules its expiry, resolves its exclusive effects, runs
    /// `on_gain` and moves to one stack (unless it is dormant).
    pub fn activate(self, sim: &mut Simulation) {
        if self.is_active(sim) {
            self.refresh(sim);
            return;
        }
        let icd = sim.aura(self).icd;
        if let Some(icd) = icd {
            if !icd.is_ready(sim) {
                return;
            }
        }
        if exclusive::blocks_activation(sim, self) {
            debug!(time = ?sim.now(), aura = %self.label(sim), "activation refused by exclusive category");
            return;
        }
        if let Some(icd) = icd {
            icd.use_cooldown(sim);
        }

        let now = sim.now();
        let (duration, on_gain) = {
            let aura = sim.aura_mut(self);
            aura.active = true;
            aura.stacks = 0;
            aura.start_time = now;
            aura.activations += 1;
            (aura.duration, aura.hooks.on_gain.clone())
        };
        self.schedule_expiry(sim, now.saturating_add(duration));

        debug!(time = ?now, unit = self.unit.0, aura = %self.label(sim), "aura gained");
        let label = self.label(sim).to_string();
        sim.record(LogEntry::AuraGained {
            time: now,
            unit: self.unit,
            aura: label,
        });

        exclusive::on_aura_gain(sim, self);
        if let Some(hook) = on_gain {
            hook(sim, self);
        }

        let aura = sim.aura(self);
        if aura.active && aura.max_stacks > 0 && aura.stacks == 0 {
            self.change_stacks(sim, 1);
        }
    }

    /// Reset the remaining duration of an active aura to its full duration
    pub fn refresh(self, sim: &mut Simulation) {
        let aura = sim.aura(self);
        if !aura.active || aura.duration == NEVER_EXPIRES {
            return;
        }
        let expires_at = sim.now().saturating_add(aura.duration);
        self.schedule_expiry(sim, expires_at);
    }

    /// Move the expiry of an active aura to `expires_at`
    pub fn update_expires_at(self, sim: &mut Simulation, expires_at: Duration) {
        if self.is_active(sim) {
            self.schedule_expiry(sim, expires_at);
        }
    }

    fn schedule_expiry(self, sim: &mut Simulation, expires_at: Duration) {
        if let Some(handle) = sim.aura_mut(self).expire_action.take() {
            sim.scheduler_mut().cancel(handle);
        }
        let handle = (expires_at != NEVER_EXPIRES).then(|| {
            sim.scheduler_mut().schedule_once(
                expires_at,
                ActionPriority::Expiration,
                Rc::new(move |sim: &mut Simulation, _| self.deactivate(sim)),
            )
        });
        let aura = sim.aura_mut(self);
        aura.expires_at = expires_at;
        aura.expire_action = handle;
    }

    /// Deactivate the aura: runs `on_expire`, releases its exclusive effects and
    /// clears its stacks. A no-op on an inactive aura.
    pub fn deactivate(self, sim: &mut Simulation) {
        if !self.is_active(sim) {
            return;
        }
        let now = sim.now();
        let (handle, on_expire) = {
            let aura = sim.aura_mut(self);
            aura.active = false;
            aura.uptime += now.saturating_sub(aura.start_time);
            (aura.expire_action.take(), aura.hooks.on_expire.clone())
        };
        if let Some(handle) = handle {
            sim.scheduler_mut().cancel(handle);
        }

        debug!(time = ?now, unit = self.unit.0, aura = %self.label(sim), "aura expired");
        let label = self.label(sim).to_string();
        sim.record(LogEntry::AuraExpired {
            time: now,
            unit: self.unit,
            aura: label,
        });

        if let Some(hook) = on_expire {
            hook(sim, self);
        }
        exclusive::on_aura_expire(sim, self);

        let aura = sim.aura(self);
        if !aura.active && aura.stacks != 0 {
            self.change_stacks(sim, 0);
        }
    }

    /// Set the stack count, clamped to `[0, max_stacks]`.
    ///
    /// A positive count on an inactive aura activates it first; reaching zero
    /// deactivates it. `on_stacks_change` only fires on a net change.
    pub fn set_stacks(self, sim: &mut Simulation, stacks: i32) {
        let stacks = stacks.clamp(0, sim.aura(self).max_stacks);
        if !self.is_active(sim) {
            if stacks == 0 {
                return;
            }
            self.activate(sim);
            if !self.is_active(sim) {
                return;
            }
        }
        if sim.aura(self).stacks == stacks {
            return;
        }
        if stacks == 0 {
            self.deactivate(sim);
        } else {
            self.change_stacks(sim, stacks);
        }
    }

    pub fn add_stack(self, sim: &mut Simulation) {
        let stacks = self.stacks(sim);
        self.set_stacks(sim, stacks.saturating_add(1));
    }

    pub fn remove_stack(self, sim: &mut Simulation) {
        let stacks = self.stacks(sim);
        self.set_stacks(sim, stacks - 1);
    }

    fn change_stacks(self, sim: &mut Simulation, stacks: i32) {
        let (old, hook) = {
            let aura = sim.aura_mut(self);
            let old = aura.stacks;
            aura.stacks = stacks;
            (old, aura.hooks.on_stacks_change.clone())
        };
        if old != stacks {
            if let Some(hook) = hook {
                hook(sim, self, old, stacks);
            }
        }
    }

    /// Start-of-trial hook: run `on_reset`, then activate permanent auras
    pub(crate) fn run_reset(self, sim: &mut Simulation) {
        if let Some(hook) = sim.aura(self).hooks.on_reset.clone() {
            hook(sim, self);
        }
        if sim.aura(self).permanent {
            self.activate(sim);
        }
    }
}
