//! Unit - a participant in the fight (player, pet or enemy)
//!
//! A unit owns its stat sheet, pseudo-stats, dependency manager, resource
//! pools and every aura registered on it.

use crate::aura::exclusive::ExclusiveEffects;
use crate::aura::{Aura, Listeners};
use crate::autoattack::AutoAttackState;
use crate::error::ConfigError;
use crate::metrics::ResourceMetrics;
use crate::stats::{DependencyKind, Stat, StatDependency, StatDependencyId, StatDependencyManager, Stats};
use crate::types::{ActionId, DefenseType, ProcMask, ResourceKind, SpellSchool, UnitId, UnitKind};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tracing::debug;

/// Action id used for mana-per-5 regeneration metrics
pub const MP5_ACTION: ActionId = ActionId { spell_id: -1, tag: 5 };

/// Multipliers and flat modifiers that are not part of the stat sheet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PseudoStats {
    pub damage_dealt_multiplier: f64,
    pub school_damage_dealt_multiplier: [f64; SpellSchool::COUNT],
    pub school_damage_taken_multiplier: [f64; SpellSchool::COUNT],
    /// Added to every landed hit of the given defense type after all multipliers
    pub bonus_damage_taken_after_modifiers: [f64; DefenseType::COUNT],
    pub healing_dealt_multiplier: f64,
    pub healing_taken_multiplier: f64,
    pub melee_speed_multiplier: f64,
    pub ranged_speed_multiplier: f64,
    pub cast_speed_multiplier: f64,
    /// Scales mana regenerated from MP5
    pub mana_regen_multiplier: f64,
    pub threat_multiplier: f64,
}

impl Default for PseudoStats {
    fn default() -> Self {
        PseudoStats {
            damage_dealt_multiplier: 1.0,
            school_damage_dealt_multiplier: [1.0; SpellSchool::COUNT],
            school_damage_taken_multiplier: [1.0; SpellSchool::COUNT],
            bonus_damage_taken_after_modifiers: [0.0; DefenseType::COUNT],
            healing_dealt_multiplier: 1.0,
            healing_taken_multiplier: 1.0,
            melee_speed_multiplier: 1.0,
            ranged_speed_multiplier: 1.0,
            cast_speed_multiplier: 1.0,
            mana_regen_multiplier: 1.0,
            threat_multiplier: 1.0,
        }
    }
}

/// A weapon as the auto-attack loop and PPM procs see it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weapon {
    pub min_damage: f64,
    pub max_damage: f64,
    /// Base swing time in seconds
    pub swing_speed: f64,
}

impl Weapon {
    pub fn average_damage(&self) -> f64 {
        (self.min_damage + self.max_damage) / 2.0
    }
}

/// Which weapon an attack uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Hand {
    MainHand,
    OffHand,
    Ranged,
}

impl Hand {
    /// Hand implied by an action's proc mask (main hand unless off-hand or ranged)
    pub fn from_proc_mask(mask: ProcMask) -> Hand {
        if mask.matches(ProcMask::MELEE_OH) {
            Hand::OffHand
        } else if mask.matches(ProcMask::RANGED) {
            Hand::Ranged
        } else {
            Hand::MainHand
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Weapons {
    pub main_hand: Option<Weapon>,
    pub off_hand: Option<Weapon>,
    pub ranged: Option<Weapon>,
}

/// Current and maximum amount of one resource
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourcePool {
    pub current: f64,
    pub max: f64,
}

pub struct Unit {
    pub id: UnitId,
    pub label: String,
    pub kind: UnitKind,
    pub level: u32,

    // === Stats ===
    /// Sheet set up at build time
    base_stats: Stats,
    /// Additions made by auras during a trial
    dynamic_stats: Stats,
    /// Final sheet after dependencies
    stats: Stats,
    pub pseudo_stats: PseudoStats,
    /// Pseudo-stats as they were when the first trial started
    initial_pseudo_stats: Option<PseudoStats>,
    deps: StatDependencyManager,

    // === Content ===
    pub(crate) auras: Vec<Aura>,
    aura_labels: HashMap<String, usize>,
    pub(crate) exclusive: ExclusiveEffects,
    pub(crate) listeners: Listeners,

    // === Resources ===
    resources: BTreeMap<ResourceKind, ResourcePool>,
    resource_metrics: BTreeMap<(ResourceKind, ActionId), ResourceMetrics>,

    // === Attacks ===
    pub weapons: Weapons,
    pub(crate) auto: AutoAttackState,
    /// A hard cast in progress blocks other casts until this time
    pub(crate) hardcast_until: Duration,
}

impl Unit {
    pub(crate) fn new(id: UnitId, label: String, kind: UnitKind, level: u32) -> Self {
        Unit {
            id,
            label,
            kind,
            level,
            base_stats: Stats::default(),
            dynamic_stats: Stats::default(),
            stats: Stats::default(),
            pseudo_stats: PseudoStats::default(),
            initial_pseudo_stats: None,
            deps: StatDependencyManager::new(),
            auras: Vec::new(),
            aura_labels: HashMap::new(),
            exclusive: ExclusiveEffects::default(),
            listeners: Listeners::default(),
            resources: BTreeMap::new(),
            resource_metrics: BTreeMap::new(),
            weapons: Weapons::default(),
            auto: AutoAttackState::default(),
            hardcast_until: Duration::ZERO,
        }
    }

    pub fn is_enemy(&self) -> bool {
        self.kind == UnitKind::Enemy
    }

    // === Stat sheet ===

    /// Final stats after dynamic additions and enabled dependencies
    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn stat(&self, stat: Stat) -> f64 {
        self.stats[stat]
    }

    /// Build-time sheet without dynamic additions or dependencies
    pub fn base_stats(&self) -> &Stats {
        &self.base_stats
    }

    /// Permanently add to the build-time sheet
    pub fn add_stats(&mut self, stats: &Stats) {
        self.base_stats = self.base_stats.add(stats);
        self.update_stats();
    }

    pub fn add_stat(&mut self, stat: Stat, amount: f64) {
        self.base_stats[stat] += amount;
        self.update_stats();
    }

    /// Add to the sheet for the rest of the trial; reverted on reset
    pub fn add_stats_dynamic(&mut self, stats: &Stats) {
        self.dynamic_stats = self.dynamic_stats.add(stats);
        self.update_stats();
    }

    pub fn add_stat_dynamic(&mut self, stat: Stat, amount: f64) {
        self.dynamic_stats[stat] += amount;
        self.update_stats();
    }

    /// Register a dependency that is always on
    pub fn add_static_stat_dependency(&mut self, dep: StatDependency) -> Result<StatDependencyId, ConfigError> {
        let id = self.deps.add_static(dep)?;
        self.update_stats();
        Ok(id)
    }

    /// Register a dependency that auras toggle at runtime
    pub fn new_dynamic_stat_dependency(&mut self, dep: StatDependency) -> Result<StatDependencyId, ConfigError> {
        self.deps.add_dynamic(dep)
    }

    /// Shorthand for a dynamic `stat ×= factor`
    pub fn new_dynamic_multiply_stat(&mut self, stat: Stat, factor: f64) -> Result<StatDependencyId, ConfigError> {
        self.new_dynamic_stat_dependency(StatDependency {
            src: stat,
            dst: stat,
            kind: DependencyKind::Multiply { factor },
        })
    }

    pub fn enable_dynamic_stat_dep(&mut self, id: StatDependencyId) {
        self.deps.enable(id);
        self.update_stats();
    }

    pub fn disable_dynamic_stat_dep(&mut self, id: StatDependencyId) {
        self.deps.disable(id);
        self.update_stats();
    }

    pub fn stat_dependencies(&self) -> &StatDependencyManager {
        &self.deps
    }

    fn update_stats(&mut self) {
        self.stats = self.deps.apply(&self.base_stats.add(&self.dynamic_stats));
    }

    // === Weapons ===

    pub fn weapon(&self, hand: Hand) -> Option<&Weapon> {
        match hand {
            Hand::MainHand => self.weapons.main_hand.as_ref(),
            Hand::OffHand => self.weapons.off_hand.as_ref(),
            Hand::Ranged => self.weapons.ranged.as_ref(),
        }
    }

    /// Current swing time of `hand` in seconds, after speed multipliers
    pub fn swing_speed(&self, hand: Hand) -> Option<f64> {
        let multiplier = match hand {
            Hand::Ranged => self.pseudo_stats.ranged_speed_multiplier,
            _ => self.pseudo_stats.melee_speed_multiplier,
        };
        self.weapon(hand).map(|w| w.swing_speed / multiplier)
    }

    pub fn auto_attacks(&self) -> &AutoAttackState {
        &self.auto
    }

    // === Resources ===

    /// Give the unit a pool of `kind`, full at the start of every trial
    pub fn enable_resource(&mut self, kind: ResourceKind, max: f64) {
        self.resources.insert(kind, ResourcePool { current: max, max });
    }

    pub fn has_resource(&self, kind: ResourceKind) -> bool {
        self.resources.contains_key(&kind)
    }

    /// Current amount; 0 for a resource the unit does not have
    pub fn resource(&self, kind: ResourceKind) -> f64 {
        self.resources.get(&kind).map(|p| p.current).unwrap_or(0.0)
    }

    pub fn max_resource(&self, kind: ResourceKind) -> f64 {
        self.resources.get(&kind).map(|p| p.max).unwrap_or(0.0)
    }

    /// Add up to the cap and record the gain. Returns the amount actually gained.
    pub fn gain_resource(&mut self, kind: ResourceKind, amount: f64, action: ActionId, now: Duration) -> f64 {
        let Some(pool) = self.resources.get_mut(&kind) else {
            return 0.0;
        };
        let before = pool.current;
        pool.current = (pool.current + amount).min(pool.max);
        let actual = pool.current - before;
        self.resource_metrics
            .entry((kind, action))
            .or_default()
            .record(amount, actual);
        debug!(time = ?now, unit = %self.label, ?kind, amount, actual, "resource gained");
        actual
    }

    /// Spend `amount` if available. Returns false (and spends nothing) otherwise.
    pub fn spend_resource(&mut self, kind: ResourceKind, amount: f64) -> bool {
        match self.resources.get_mut(&kind) {
            Some(pool) if pool.current >= amount => {
                pool.current -= amount;
                true
            }
            _ => amount <= 0.0,
        }
    }

    /// Remove health. Returns true if this took the unit from alive to dead.
    pub(crate) fn take_damage(&mut self, amount: f64) -> bool {
        match self.resources.get_mut(&ResourceKind::Health) {
            Some(pool) if pool.current > 0.0 => {
                pool.current -= amount;
                pool.current <= 0.0
            }
            _ => false,
        }
    }

    pub fn resource_metrics(&self) -> &BTreeMap<(ResourceKind, ActionId), ResourceMetrics> {
        &self.resource_metrics
    }

    // === Auras ===

    /// Find a registered aura by label
    pub fn get_aura(&self, label: &str) -> Option<crate::types::AuraId> {
        self.aura_labels
            .get(label)
            .map(|&index| crate::types::AuraId { unit: self.id, index })
    }

    pub fn aura_count(&self) -> usize {
        self.auras.len()
    }

    pub fn has_active_aura_with_tag(&self, tag: &str) -> bool {
        self.auras.iter().any(|aura| aura.tag == tag && aura.is_active())
    }

    pub(crate) fn push_aura(&mut self, aura: Aura) -> usize {
        let index = self.auras.len();
        self.aura_labels.insert(aura.label.clone(), index);
        self.auras.push(aura);
        index
    }

    // === Trial lifecycle ===

    /// Silently return to the build-time state
    pub(crate) fn reset(&mut self) {
        self.dynamic_stats = Stats::default();
        self.deps.reset();
        match &self.initial_pseudo_stats {
            Some(initial) => self.pseudo_stats = initial.clone(),
            None => self.initial_pseudo_stats = Some(self.pseudo_stats.clone()),
        }
        self.update_stats();

        for aura in &mut self.auras {
            aura.reset_state();
        }
        self.exclusive.reset();

        for pool in self.resources.values_mut() {
            pool.current = pool.max;
        }
        self.resource_metrics.clear();
        self.auto.reset();
        self.hardcast_until = Duration::ZERO;
    }
}
