//! Exclusive effects - at most one member of a named category in effect per unit
//!
//! When the holder of a category is displaced or expires, the best remaining
//! member whose aura is still active takes over. With `single_aura` the
//! category also governs the auras themselves: a stronger aura deactivates the
//! holder, and a weaker (or equal) one refuses to activate.

use crate::error::ConfigError;
use crate::sim::Simulation;
use crate::types::{AuraId, ExclusiveEffectId, UnitId};
use std::collections::HashMap;
use std::rc::Rc;
use tracing::debug;

/// Hook run when an exclusive effect starts or stops being in effect
pub type ExclusiveHook = Rc<dyn Fn(&mut Simulation, ExclusiveEffectId)>;

#[derive(Clone, Default)]
pub struct ExclusiveEffectConfig {
    pub priority: f64,
    pub on_gain: Option<ExclusiveHook>,
    pub on_expire: Option<ExclusiveHook>,
}

struct ExclusiveEffect {
    aura: usize,
    category: usize,
    priority: f64,
    initial_priority: f64,
    in_effect: bool,
    on_gain: Option<ExclusiveHook>,
    on_expire: Option<ExclusiveHook>,
}

struct ExclusiveCategory {
    name: String,
    single_aura: bool,
    members: Vec<usize>,
    active: Option<usize>,
}

/// Per-unit registry of exclusive categories and their members
#[derive(Default)]
pub(crate) struct ExclusiveEffects {
    effects: Vec<ExclusiveEffect>,
    categories: Vec<ExclusiveCategory>,
    by_name: HashMap<String, usize>,
}

impl ExclusiveEffects {
    pub(crate) fn reset(&mut self) {
        for effect in &mut self.effects {
            effect.in_effect = false;
            effect.priority = effect.initial_priority;
        }
        for category in &mut self.categories {
            category.active = None;
        }
    }

    fn category_of(&self, effect: usize) -> &ExclusiveCategory {
        &self.categories[self.effects[effect].category]
    }
}

impl Simulation {
    /// Register an exclusive effect owned by `aura` in the unit-local `category`
    pub fn new_exclusive_effect(
        &mut self,
        aura: AuraId,
        category: &str,
        single_aura: bool,
        config: ExclusiveEffectConfig,
    ) -> Result<ExclusiveEffectId, ConfigError> {
        self.check_unit(aura.unit)?;
        if category.is_empty() {
            return Err(ConfigError::Validation(format!(
                "exclusive effect on '{}' has no category",
                self.aura(aura).label
            )));
        }
        if !config.priority.is_finite() {
            return Err(ConfigError::Validation(format!(
                "exclusive effect '{}' on '{}' has a non-finite priority",
                category,
                self.aura(aura).label
            )));
        }

        let registry = &mut self.units[aura.unit.0].exclusive;
        let category_index = match registry.by_name.get(category) {
            Some(&index) => {
                if registry.categories[index].single_aura != single_aura {
                    return Err(ConfigError::Validation(format!(
                        "exclusive category '{}' registered with conflicting single_aura flags",
                        category
                    )));
                }
                index
            }
            None => {
                registry.categories.push(ExclusiveCategory {
                    name: category.to_string(),
                    single_aura,
                    members: Vec::new(),
                    active: None,
                });
                let index = registry.categories.len() - 1;
                registry.by_name.insert(category.to_string(), index);
                index
            }
        };

        let index = registry.effects.len();
        registry.effects.push(ExclusiveEffect {
            aura: aura.index,
            category: category_index,
            priority: config.priority,
            initial_priority: config.priority,
            in_effect: false,
            on_gain: config.on_gain,
            on_expire: config.on_expire,
        });
        registry.categories[category_index].members.push(index);
        self.aura_mut(aura).exclusive_effects.push(index);

        Ok(ExclusiveEffectId { unit: aura.unit, index })
    }

    /// The member currently in effect in `category`, if any
    pub fn exclusive_category_active(&self, unit: UnitId, category: &str) -> Option<ExclusiveEffectId> {
        let registry = &self.unit(unit).exclusive;
        let &index = registry.by_name.get(category)?;
        registry.categories[index]
            .active
            .map(|index| ExclusiveEffectId { unit, index })
    }

    pub fn exclusive_category_any_active(&self, unit: UnitId, category: &str) -> bool {
        self.exclusive_category_active(unit, category).is_some()
    }

    fn exclusive_registry(&self, unit: UnitId) -> &ExclusiveEffects {
        &self.units[unit.0].exclusive
    }

    fn exclusive_registry_mut(&mut self, unit: UnitId) -> &mut ExclusiveEffects {
        &mut self.units[unit.0].exclusive
    }
}

impl ExclusiveEffectId {
    pub fn aura(self, sim: &Simulation) -> AuraId {
        AuraId {
            unit: self.unit,
            index: sim.exclusive_registry(self.unit).effects[self.index].aura,
        }
    }

    pub fn priority(self, sim: &Simulation) -> f64 {
        sim.exclusive_registry(self.unit).effects[self.index].priority
    }

    pub fn is_in_effect(self, sim: &Simulation) -> bool {
        sim.exclusive_registry(self.unit).effects[self.index].in_effect
    }

    pub fn category(self, sim: &Simulation) -> &str {
        &sim.exclusive_registry(self.unit).category_of(self.index).name
    }

    /// Change the priority and re-resolve which member of the category is in effect
    pub fn set_priority(self, sim: &mut Simulation, priority: f64) {
        sim.exclusive_registry_mut(self.unit).effects[self.index].priority = priority;

        let category = sim.exclusive_registry(self.unit).effects[self.index].category;
        let Some(best) = best_candidate(sim, self.unit, category) else {
            return;
        };
        match active_member(sim, self.unit, category) {
            None => take(sim, self.unit, best),
            Some(current) if current != best => {
                let registry = sim.exclusive_registry(self.unit);
                if registry.effects[best].priority > registry.effects[current].priority {
                    displace(sim, self.unit, current);
                    take(sim, self.unit, best);
                }
            }
            Some(_) => {}
        }
    }
}

fn active_member(sim: &Simulation, unit: UnitId, category: usize) -> Option<usize> {
    sim.exclusive_registry(unit).categories[category].active
}

/// Highest-priority member whose aura is active; the earliest registered wins ties
fn best_candidate(sim: &Simulation, unit: UnitId, category: usize) -> Option<usize> {
    let registry = sim.exclusive_registry(unit);
    let mut best: Option<usize> = None;
    for &member in &registry.categories[category].members {
        let aura = AuraId {
            unit,
            index: registry.effects[member].aura,
        };
        if !aura.is_active(sim) {
            continue;
        }
        match best {
            Some(b) if registry.effects[b].priority >= registry.effects[member].priority => {}
            _ => best = Some(member),
        }
    }
    best
}

/// Put `effect` in effect and run its gain hook
fn take(sim: &mut Simulation, unit: UnitId, effect: usize) {
    let registry = sim.exclusive_registry_mut(unit);
    let category = registry.effects[effect].category;
    registry.categories[category].active = Some(effect);
    registry.effects[effect].in_effect = true;
    let hook = registry.effects[effect].on_gain.clone();
    if let Some(hook) = hook {
        hook(sim, ExclusiveEffectId { unit, index: effect });
    }
}

/// Take `effect` out of effect, run its expire hook and, for single-aura
/// categories, deactivate its aura.
fn displace(sim: &mut Simulation, unit: UnitId, effect: usize) {
    let registry = sim.exclusive_registry_mut(unit);
    let category = registry.effects[effect].category;
    registry.categories[category].active = None;
    registry.effects[effect].in_effect = false;
    let hook = registry.effects[effect].on_expire.clone();
    let single_aura = registry.categories[category].single_aura;
    let aura = AuraId {
        unit,
        index: registry.effects[effect].aura,
    };
    if let Some(hook) = hook {
        hook(sim, ExclusiveEffectId { unit, index: effect });
    }
    if single_aura {
        aura.deactivate(sim);
    }
}

/// True if `aura` belongs to a single-aura category held by another aura of
/// equal or higher priority
pub(crate) fn blocks_activation(sim: &Simulation, aura: AuraId) -> bool {
    let registry = sim.exclusive_registry(aura.unit);
    sim.aura(aura).exclusive_effects.iter().any(|&effect| {
        let category = registry.category_of(effect);
        match category.active {
            Some(holder) if category.single_aura => {
                registry.effects[holder].aura != aura.index
                    && registry.effects[holder].priority >= registry.effects[effect].priority
            }
            _ => false,
        }
    })
}

/// Resolve every exclusive effect of an aura that just went active
pub(crate) fn on_aura_gain(sim: &mut Simulation, aura: AuraId) {
    let effects = sim.aura(aura).exclusive_effects.clone();
    for effect in effects {
        let registry = sim.exclusive_registry(aura.unit);
        let category = registry.effects[effect].category;
        match registry.categories[category].active {
            None => take(sim, aura.unit, effect),
            Some(current) if current == effect => {}
            Some(current) => {
                if registry.effects[effect].priority > registry.effects[current].priority {
                    displace(sim, aura.unit, current);
                    take(sim, aura.unit, effect);
                } else {
                    debug!(
                        time = ?sim.now(),
                        category = %registry.categories[category].name,
                        "exclusive effect suppressed by stronger member"
                    );
                }
            }
        }
    }
}

/// Release the exclusive effects of an aura that just went inactive and hand
/// each category over to its best remaining member
pub(crate) fn on_aura_expire(sim: &mut Simulation, aura: AuraId) {
    let effects = sim.aura(aura).exclusive_effects.clone();
    for effect in effects {
        let registry = sim.exclusive_registry(aura.unit);
        let category = registry.effects[effect].category;
        if registry.categories[category].active != Some(effect) {
            continue;
        }
        displace(sim, aura.unit, effect);
        if active_member(sim, aura.unit, category).is_none() {
            if let Some(next) = best_candidate(sim, aura.unit, category) {
                take(sim, aura.unit, next);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::aura::{AuraConfig, ExclusiveEffectConfig};
    use crate::config::FightConfig;
    use crate::sim::Simulation;
    use crate::stats::Stat;
    use crate::types::{ActionId, AuraId, ExclusiveEffectId, UnitId, UnitKind};
    use std::rc::Rc;
    use std::time::Duration;

    fn setup() -> (Simulation, UnitId) {
        let mut sim = Simulation::new(FightConfig::default());
        let player = sim.add_unit("Player", UnitKind::Player, 60);
        (sim, player)
    }

    /// Aura whose exclusive effect adds `amount` attack power while in effect
    fn ap_aura(sim: &mut Simulation, unit: UnitId, label: &str, amount: f64, single_aura: bool) -> AuraId {
        let aura = sim
            .register_aura(unit, AuraConfig::new(label, ActionId::spell(1)))
            .unwrap();
        aura.new_exclusive_effect(
            sim,
            "AttackPower",
            single_aura,
            ExclusiveEffectConfig {
                priority: amount,
                on_gain: Some(Rc::new(move |sim: &mut Simulation, id: ExclusiveEffectId| {
                    sim.unit_mut(id.unit).add_stat_dynamic(Stat::AttackPower, amount)
                })),
                on_expire: Some(Rc::new(move |sim: &mut Simulation, id: ExclusiveEffectId| {
                    sim.unit_mut(id.unit).add_stat_dynamic(Stat::AttackPower, -amount)
                })),
            },
        )
        .unwrap();
        aura
    }

    fn ap(sim: &Simulation, unit: UnitId) -> f64 {
        sim.unit(unit).stat(Stat::AttackPower)
    }

    #[test]
    fn test_stronger_member_takes_over_and_weaker_resumes() {
        let (mut sim, player) = setup();
        let weak = ap_aura(&mut sim, player, "Weak", 20.0, false);
        let strong = ap_aura(&mut sim, player, "Strong", 50.0, false);

        weak.activate(&mut sim);
        assert_eq!(ap(&sim, player), 20.0);
        strong.activate(&mut sim);
        assert_eq!(ap(&sim, player), 50.0);
        assert!(weak.is_active(&sim));

        strong.deactivate(&mut sim);
        assert_eq!(ap(&sim, player), 20.0);
        weak.deactivate(&mut sim);
        assert_eq!(ap(&sim, player), 0.0);
        assert!(!sim.exclusive_category_any_active(player, "AttackPower"));
    }

    #[test]
    fn test_weaker_member_is_suppressed() {
        let (mut sim, player) = setup();
        let strong = ap_aura(&mut sim, player, "Strong", 50.0, false);
        let weak = ap_aura(&mut sim, player, "Weak", 20.0, false);

        strong.activate(&mut sim);
        weak.activate(&mut sim);
        assert_eq!(ap(&sim, player), 50.0);
        weak.deactivate(&mut sim);
        assert_eq!(ap(&sim, player), 50.0);
    }

    #[test]
    fn test_equal_priority_keeps_holder() {
        let (mut sim, player) = setup();
        let first = ap_aura(&mut sim, player, "First", 30.0, false);
        let second = ap_aura(&mut sim, player, "Second", 30.0, false);
        first.activate(&mut sim);
        second.activate(&mut sim);
        let holder = sim.exclusive_category_active(player, "AttackPower").unwrap();
        assert_eq!(holder.aura(&sim), first);
        assert_eq!(ap(&sim, player), 30.0);
    }

    #[test]
    fn test_single_aura_category_replaces_and_refuses() {
        let (mut sim, player) = setup();
        let weak = ap_aura(&mut sim, player, "Weak", 20.0, true);
        let strong = ap_aura(&mut sim, player, "Strong", 50.0, true);

        weak.activate(&mut sim);
        strong.activate(&mut sim);
        assert!(!weak.is_active(&sim));
        assert_eq!(ap(&sim, player), 50.0);

        weak.activate(&mut sim);
        assert!(!weak.is_active(&sim));
        assert_eq!(ap(&sim, player), 50.0);
    }

    #[test]
    fn test_set_priority_reresolves() {
        let (mut sim, player) = setup();
        let a = ap_aura(&mut sim, player, "A", 20.0, false);
        let b = ap_aura(&mut sim, player, "B", 50.0, false);
        a.activate(&mut sim);
        b.activate(&mut sim);

        let effect_a = ExclusiveEffectId { unit: player, index: 0 };
        effect_a.set_priority(&mut sim, 80.0);
        assert!(effect_a.is_in_effect(&sim));
        assert_eq!(effect_a.category(&sim), "AttackPower");
        // Hooks add their captured amounts, so 20 is in effect again
        assert_eq!(ap(&sim, player), 20.0);
    }

    #[test]
    fn test_reset_restores_priority() {
        let (mut sim, player) = setup();
        ap_aura(&mut sim, player, "A", 20.0, false);
        let effect = ExclusiveEffectId { unit: player, index: 0 };
        effect.set_priority(&mut sim, 5.0);
        sim.reset(3);
        assert_eq!(effect.priority(&sim), 20.0);
        assert!(!effect.is_in_effect(&sim));
        sim.advance_to(Duration::from_secs(1));
    }

    #[test]
    fn test_conflicting_single_aura_flag_rejected() {
        let (mut sim, player) = setup();
        ap_aura(&mut sim, player, "A", 20.0, false);
        let b = sim
            .register_aura(player, AuraConfig::new("B", ActionId::spell(2)))
            .unwrap();
        let err = b.new_exclusive_effect(&mut sim, "AttackPower", true, ExclusiveEffectConfig::default());
        assert!(err.is_err());
    }
}
