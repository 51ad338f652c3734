//! Dot/Hot - periodic damage or healing driven by the scheduler
//!
//! A dot owns an aura on the unit it ticks on (the caster for AoE and
//! self-only effects) and a periodic tick action. Tick amounts come from a
//! snapshot of the caster's multipliers taken when the dot is applied,
//! refreshed or rolled over.

use crate::aura::{AuraConfig, AuraHook};
use crate::combat::OutcomeKind;
use crate::error::ConfigError;
use crate::scheduler::{ActionHandle, ActionPriority};
use crate::sim::Simulation;
use crate::spell::SpellResult;
use crate::types::{AuraId, DotId, SpellId, UnitId};
use std::rc::Rc;
use std::time::Duration;
use tracing::debug;

/// Snapshot hook: `(sim, dot, is_rollover)`
pub type SnapshotHook = Rc<dyn Fn(&mut Simulation, DotId, bool)>;
pub type TickHook = Rc<dyn Fn(&mut Simulation, DotId)>;

#[derive(Clone)]
pub struct DotConfig {
    /// Aura template; its duration is replaced by `number_of_ticks * tick_length`
    pub aura: AuraConfig,
    pub number_of_ticks: u32,
    pub tick_length: Duration,
    /// One dot on the caster that ticks on every enemy (or ally, for hots)
    pub is_aoe: bool,
    /// The dot lives on the caster whatever the target
    pub self_only: bool,
    pub is_hot: bool,
    /// Table row rolled by the default tick
    pub tick_outcome: OutcomeKind,
    /// Required: fills the snapshot on apply, refresh and rollover
    pub on_snapshot: Option<SnapshotHook>,
    /// Replaces the default tick (snapshot damage or healing)
    pub on_tick: Option<TickHook>,
}

impl DotConfig {
    pub fn new(label: impl Into<String>) -> Self {
        DotConfig {
            aura: AuraConfig {
                label: label.into(),
                ..Default::default()
            },
            number_of_ticks: 0,
            tick_length: Duration::ZERO,
            is_aoe: false,
            self_only: false,
            is_hot: false,
            tick_outcome: OutcomeKind::Tick,
            on_snapshot: None,
            on_tick: None,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidDot {
            label: self.aura.label.clone(),
            reason: reason.to_string(),
        };
        if self.aura.label.is_empty() {
            return Err(invalid("missing label"));
        }
        if self.number_of_ticks == 0 {
            return Err(invalid("number_of_ticks must be at least 1"));
        }
        if self.tick_length.is_zero() {
            return Err(invalid("tick_length must be positive"));
        }
        if self.on_snapshot.is_none() {
            return Err(invalid("missing snapshot hook"));
        }
        Ok(())
    }

    fn duration(&self) -> Duration {
        self.tick_length.saturating_mul(self.number_of_ticks)
    }
}

/// Caster-side values captured when the dot is (re)applied
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Snapshot {
    pub base_amount: f64,
    pub attacker_multiplier: f64,
    /// Crit chance as a fraction, used by `TickSnapshotCrit`
    pub crit_chance: f64,
}

pub struct Dot {
    pub spell: SpellId,
    pub caster: UnitId,
    /// Unit the dot's aura lives on
    pub target: UnitId,
    pub aura: AuraId,
    pub number_of_ticks: u32,
    pub tick_length: Duration,
    pub is_aoe: bool,
    pub is_hot: bool,
    tick_outcome: OutcomeKind,
    on_snapshot: SnapshotHook,
    on_tick: Option<TickHook>,

    // === Trial state ===
    remaining_ticks: u32,
    next_tick: Duration,
    tick_action: Option<ActionHandle>,
    snapshot: Snapshot,
}

impl Dot {
    /// Register the dot's aura on `owner`. The spell validated `config` when it
    /// was registered.
    pub(crate) fn create(
        sim: &mut Simulation,
        id: DotId,
        spell: SpellId,
        caster: UnitId,
        owner: UnitId,
        config: DotConfig,
    ) -> Result<Dot, ConfigError> {
        let mut aura_config = config.aura.clone();
        aura_config.label = format!("{} ({})", config.aura.label, sim.unit(caster).label);
        aura_config.duration = config.duration();
        let inner = aura_config.on_expire.take();
        let on_expire: AuraHook = Rc::new(move |sim: &mut Simulation, aura: AuraId| {
            id.stop_ticking(sim);
            if let Some(hook) = &inner {
                hook(sim, aura);
            }
        });
        aura_config.on_expire = Some(on_expire);
        let aura = sim.register_aura(owner, aura_config)?;

        let on_snapshot = match config.on_snapshot {
            Some(hook) => hook,
            None => Rc::new(|_: &mut Simulation, _, _| {}),
        };
        Ok(Dot {
            spell,
            caster,
            target: owner,
            aura,
            number_of_ticks: config.number_of_ticks,
            tick_length: config.tick_length,
            is_aoe: config.is_aoe,
            is_hot: config.is_hot,
            tick_outcome: config.tick_outcome,
            on_snapshot,
            on_tick: config.on_tick,
            remaining_ticks: 0,
            next_tick: Duration::ZERO,
            tick_action: None,
            snapshot: Snapshot::default(),
        })
    }

    pub(crate) fn reset(&mut self) {
        self.remaining_ticks = 0;
        self.next_tick = Duration::ZERO;
        self.tick_action = None;
        self.snapshot = Snapshot::default();
    }

    pub fn remaining_ticks(&self) -> u32 {
        self.remaining_ticks
    }

    pub fn snapshot(&self) -> Snapshot {
        self.snapshot
    }

    /// Time of the next tick while the dot is active
    pub fn next_tick(&self) -> Duration {
        self.next_tick
    }
}

impl DotId {
    pub fn is_active(self, sim: &Simulation) -> bool {
        sim.dot(self).aura.is_active(sim)
    }

    pub fn aura(self, sim: &Simulation) -> AuraId {
        sim.dot(self).aura
    }

    pub fn remaining_ticks(self, sim: &Simulation) -> u32 {
        sim.dot(self).remaining_ticks
    }

    /// Apply or refresh the dot.
    ///
    /// A fresh application snapshots, activates the aura and starts ticking
    /// one tick length from now. A refresh re-snapshots and resets the
    /// remaining ticks to the full count while keeping the tick timer, so the
    /// aura now expires on the last of those ticks.
    pub fn apply(self, sim: &mut Simulation) {
        let (aura, on_snapshot, ticks, tick_length) = {
            let dot = sim.dot(self);
            (dot.aura, dot.on_snapshot.clone(), dot.number_of_ticks, dot.tick_length)
        };

        if aura.is_active(sim) {
            on_snapshot(sim, self, false);
            let next_tick = {
                let dot = sim.dot_mut(self);
                dot.remaining_ticks = ticks;
                dot.next_tick
            };
            let expires_at = next_tick.saturating_add(tick_length.saturating_mul(ticks - 1));
            aura.update_expires_at(sim, expires_at);
            debug!(time = ?sim.now(), aura = %aura.label(sim), "dot refreshed");
            return;
        }

        on_snapshot(sim, self, false);
        sim.dot_mut(self).remaining_ticks = ticks;
        aura.activate(sim);
        if !aura.is_active(sim) {
            sim.dot_mut(self).remaining_ticks = 0;
            return;
        }

        let next_tick = sim.now().saturating_add(tick_length);
        let handle = sim.scheduler_mut().schedule(
            next_tick,
            tick_length,
            None,
            ActionPriority::Dot,
            Rc::new(move |sim: &mut Simulation, _| self.tick(sim)),
        );
        let dot = sim.dot_mut(self);
        dot.next_tick = next_tick;
        dot.tick_action = Some(handle);
    }

    /// Re-snapshot an active dot without touching its ticks or duration
    pub fn rollover(self, sim: &mut Simulation) {
        if !self.is_active(sim) {
            return;
        }
        let on_snapshot = sim.dot(self).on_snapshot.clone();
        on_snapshot(sim, self, true);
    }

    /// Remove the dot before its last tick
    pub fn cancel(self, sim: &mut Simulation) {
        let aura = sim.dot(self).aura;
        aura.deactivate(sim);
    }

    fn stop_ticking(self, sim: &mut Simulation) {
        let handle = {
            let dot = sim.dot_mut(self);
            dot.remaining_ticks = 0;
            dot.tick_action.take()
        };
        if let Some(handle) = handle {
            sim.scheduler_mut().cancel(handle);
        }
    }

    fn tick(self, sim: &mut Simulation) {
        let now = sim.now();
        let on_tick = {
            let dot = sim.dot_mut(self);
            if dot.remaining_ticks == 0 {
                return;
            }
            dot.remaining_ticks -= 1;
            dot.next_tick = now.saturating_add(dot.tick_length);
            dot.on_tick.clone()
        };
        debug!(time = ?now, aura = %self.aura(sim).label(sim), remaining = self.remaining_ticks(sim), "dot tick");

        match on_tick {
            Some(hook) => hook(sim, self),
            None => self.default_tick(sim),
        }

        if self.remaining_ticks(sim) == 0 {
            self.aura(sim).deactivate(sim);
        }
    }

    fn default_tick(self, sim: &mut Simulation) {
        let (is_aoe, is_hot, owner) = {
            let dot = sim.dot(self);
            (dot.is_aoe, dot.is_hot, dot.target)
        };
        let targets = match (is_aoe, is_hot) {
            (false, _) => vec![owner],
            (true, false) => sim.targets(),
            (true, true) => sim.allies(),
        };
        let results: Vec<SpellResult> = targets
            .into_iter()
            .map(|target| {
                if is_hot {
                    self.calc_periodic_snapshot_healing(sim, target)
                } else {
                    self.calc_periodic_snapshot_damage(sim, target)
                }
            })
            .collect();
        let spell = sim.dot(self).spell;
        spell.deal_batch(sim, &results);
    }

    // === Snapshots ===

    pub fn snapshot(self, sim: &Simulation) -> Snapshot {
        sim.dot(self).snapshot
    }

    pub fn set_snapshot(self, sim: &mut Simulation, snapshot: Snapshot) {
        sim.dot_mut(self).snapshot = snapshot;
    }

    /// Capture `base_amount` with the caster's current multipliers and crit chance
    pub fn take_snapshot(self, sim: &mut Simulation, base_amount: f64) {
        let (spell, is_hot) = {
            let dot = sim.dot(self);
            (dot.spell, dot.is_hot)
        };
        let attacker_multiplier = if is_hot {
            spell.attacker_healing_multiplier(sim)
        } else {
            spell.attacker_damage_multiplier(sim)
        };
        let crit_chance = spell.crit_chance(sim);
        self.set_snapshot(
            sim,
            Snapshot {
                base_amount,
                attacker_multiplier,
                crit_chance,
            },
        );
    }

    /// Resolve one tick of snapshot damage on `target`. Defender-side
    /// modifiers are read now.
    pub fn calc_periodic_snapshot_damage(self, sim: &mut Simulation, target: UnitId) -> SpellResult {
        let (spell, snapshot, kind) = {
            let dot = sim.dot(self);
            (dot.spell, dot.snapshot, dot.tick_outcome)
        };
        spell.resolve_damage(
            sim,
            target,
            snapshot.base_amount * snapshot.attacker_multiplier,
            snapshot.crit_chance,
            kind,
            true,
        )
    }

    pub fn calc_periodic_snapshot_healing(self, sim: &mut Simulation, target: UnitId) -> SpellResult {
        let (spell, snapshot, kind) = {
            let dot = sim.dot(self);
            (dot.spell, dot.snapshot, dot.tick_outcome)
        };
        spell.resolve_healing(
            sim,
            target,
            snapshot.base_amount * snapshot.attacker_multiplier,
            snapshot.crit_chance,
            kind,
        )
    }

    pub fn calc_and_deal_periodic_snapshot_damage(self, sim: &mut Simulation, target: UnitId) -> SpellResult {
        let result = self.calc_periodic_snapshot_damage(sim, target);
        sim.dot(self).spell.deal_periodic_damage(sim, &result);
        result
    }

    pub fn calc_and_deal_periodic_snapshot_healing(self, sim: &mut Simulation, target: UnitId) -> SpellResult {
        let result = self.calc_periodic_snapshot_healing(sim, target);
        sim.dot(self).spell.deal_healing(sim, &result);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FightConfig;
    use crate::spell::SpellConfig;
    use crate::types::{ActionId, SpellSchool, UnitKind};

    fn setup(num_targets: usize) -> (Simulation, UnitId) {
        let mut sim = Simulation::new(FightConfig {
            num_targets,
            ..Default::default()
        });
        let player = sim.add_unit("Player", UnitKind::Player, 60);
        (sim, player)
    }

    fn dot_spell(sim: &mut Simulation, player: UnitId, is_aoe: bool) -> SpellId {
        sim.register_spell(
            player,
            SpellConfig {
                action_id: ActionId::spell(172),
                school: SpellSchool::Shadow,
                dot: Some(DotConfig {
                    number_of_ticks: 5,
                    tick_length: Duration::from_secs(3),
                    is_aoe,
                    on_snapshot: Some(Rc::new(|sim: &mut Simulation, dot: DotId, _| dot.take_snapshot(sim, 30.0))),
                    ..DotConfig::new("Corruption")
                }),
                ..Default::default()
            },
        )
        .unwrap()
    }

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn test_refresh_keeps_timer_and_resets_ticks() {
        let (mut sim, player) = setup(1);
        let target = sim.primary_target().unwrap();
        let spell = dot_spell(&mut sim, player, false);
        spell.cast(&mut sim, target);
        let dot = spell.dot(&sim, target).unwrap();

        sim.advance_to(secs(7));
        assert_eq!(dot.remaining_ticks(&sim), 3);
        dot.apply(&mut sim);
        assert_eq!(dot.remaining_ticks(&sim), 5);
        // Ticks stay on the 3s grid: 9, 12, 15, 18, 21
        assert_eq!(dot.aura(&sim).expires_at(&sim), secs(21));

        sim.advance_to(secs(30));
        assert_eq!(sim.spell(spell).metrics.ticks, 7);
        assert!(!dot.is_active(&sim));
    }

    #[test]
    fn test_rollover_resnapshots_only() {
        let (mut sim, player) = setup(1);
        let target = sim.primary_target().unwrap();
        let spell = dot_spell(&mut sim, player, false);
        spell.cast(&mut sim, target);
        let dot = spell.dot(&sim, target).unwrap();

        sim.advance_to(secs(4));
        sim.unit_mut(player).pseudo_stats.damage_dealt_multiplier = 2.0;
        sim.advance_to(secs(6));
        // Snapshot predates the multiplier
        assert_eq!(sim.spell(spell).metrics.damage, 60.0);

        dot.rollover(&mut sim);
        assert_eq!(dot.remaining_ticks(&sim), 3);
        assert_eq!(dot.snapshot(&sim).attacker_multiplier, 2.0);
        sim.advance_to(secs(20));
        assert_eq!(sim.spell(spell).metrics.damage, 60.0 + 3.0 * 60.0);
    }

    #[test]
    fn test_rollover_on_inactive_dot_is_noop() {
        let (mut sim, player) = setup(1);
        let target = sim.primary_target().unwrap();
        let spell = dot_spell(&mut sim, player, false);
        let dot = spell.dot(&sim, target).unwrap();
        dot.rollover(&mut sim);
        assert!(!dot.is_active(&sim));
        assert_eq!(dot.snapshot(&sim), Snapshot::default());
    }

    #[test]
    fn test_cancel_stops_ticks() {
        let (mut sim, player) = setup(1);
        let target = sim.primary_target().unwrap();
        let spell = dot_spell(&mut sim, player, false);
        spell.cast(&mut sim, target);
        let dot = spell.dot(&sim, target).unwrap();
        sim.advance_to(secs(4));
        dot.cancel(&mut sim);
        sim.advance_to(secs(20));
        assert_eq!(sim.spell(spell).metrics.ticks, 1);
        assert_eq!(dot.remaining_ticks(&sim), 0);
    }

    #[test]
    fn test_aoe_dot_lives_on_caster_and_hits_every_target() {
        let (mut sim, player) = setup(3);
        let target = sim.primary_target().unwrap();
        let spell = dot_spell(&mut sim, player, true);
        spell.cast(&mut sim, target);
        let dot = spell.dot(&sim, target).unwrap();
        assert_eq!(sim.dot(dot).target, player);
        assert_eq!(sim.aura(dot.aura(&sim)).label, "Corruption (Player)");

        sim.advance_to(secs(3));
        assert_eq!(sim.spell(spell).metrics.ticks, 3);
        assert_eq!(sim.spell(spell).metrics.damage, 90.0);
    }

    #[test]
    fn test_reset_clears_dot_state() {
        let (mut sim, player) = setup(1);
        let target = sim.primary_target().unwrap();
        let spell = dot_spell(&mut sim, player, false);
        spell.cast(&mut sim, target);
        let dot = spell.dot(&sim, target).unwrap();
        sim.reset(5);
        assert!(!dot.is_active(&sim));
        assert_eq!(dot.remaining_ticks(&sim), 0);
        sim.advance_to(secs(20));
        assert_eq!(sim.spell(spell).metrics.ticks, 0);
    }
}
