//! Derived-stat formulas that auras enable and disable at runtime

use super::{Stat, StatValue, Stats};
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// How a dependency contributes to its destination stat
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DependencyKind {
    /// `dst += src × amount`
    Add { amount: f64 },
    /// `dst ×= factor` (src is ignored)
    Multiply { factor: f64 },
}

/// A derived-stat formula, e.g. "Attack Power += 2 × Strength"
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatDependency {
    pub src: Stat,
    pub dst: Stat,
    pub kind: DependencyKind,
}

/// Handle returned when registering a dependency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatDependencyId(pub usize);

#[derive(Debug, Clone)]
struct Entry {
    dep: StatDependency,
    /// Reference count of enables; the contribution applies once while > 0
    enabled: u32,
    is_static: bool,
}

/// Owns every dependency of a unit and the evaluation order derived from them.
///
/// Recomputation always starts from the base sheet, so enabling and then
/// disabling a dependency restores the exact previous result.
#[derive(Debug, Clone)]
pub struct StatDependencyManager {
    deps: Vec<Entry>,
    order: Vec<Stat>,
}

impl Default for StatDependencyManager {
    fn default() -> Self {
        Self::new()
    }
}

impl StatDependencyManager {
    pub fn new() -> Self {
        StatDependencyManager {
            deps: Vec::new(),
            order: Stat::all().to_vec(),
        }
    }

    /// Register a dependency that is always on
    pub fn add_static(&mut self, dep: StatDependency) -> Result<StatDependencyId, ConfigError> {
        self.push(dep, 1, true)
    }

    /// Register a dependency that starts disabled
    pub fn add_dynamic(&mut self, dep: StatDependency) -> Result<StatDependencyId, ConfigError> {
        self.push(dep, 0, false)
    }

    fn push(&mut self, dep: StatDependency, enabled: u32, is_static: bool) -> Result<StatDependencyId, ConfigError> {
        self.deps.push(Entry { dep, enabled, is_static });
        match self.compute_order() {
            Ok(order) => {
                self.order = order;
                Ok(StatDependencyId(self.deps.len() - 1))
            }
            Err(e) => {
                self.deps.pop();
                Err(e)
            }
        }
    }

    /// Enable a dynamic dependency. Enables are counted and must be paired with disables.
    pub fn enable(&mut self, id: StatDependencyId) {
        let entry = &mut self.deps[id.0];
        assert!(!entry.is_static, "static stat dependency {:?} cannot be toggled", entry.dep);
        entry.enabled += 1;
    }

    /// Disable a dynamic dependency. Disabling one that is not enabled is an invariant violation.
    pub fn disable(&mut self, id: StatDependencyId) {
        let entry = &mut self.deps[id.0];
        assert!(
            entry.enabled > 0,
            "stat dependency {:?} disabled more times than it was enabled",
            entry.dep
        );
        entry.enabled -= 1;
    }

    pub fn is_enabled(&self, id: StatDependencyId) -> bool {
        self.deps[id.0].enabled > 0
    }

    pub fn get(&self, id: StatDependencyId) -> &StatDependency {
        &self.deps[id.0].dep
    }

    /// Disable every dynamic dependency (start of a new trial)
    pub fn reset(&mut self) {
        for entry in self.deps.iter_mut().filter(|e| !e.is_static) {
            entry.enabled = 0;
        }
    }

    /// Compute the final sheet from `base` and the currently enabled dependencies
    pub fn apply(&self, base: &Stats) -> Stats {
        let mut out = *base;
        for &stat in &self.order {
            let mut value = StatValue::with_base(base[stat]);
            for entry in self.deps.iter().filter(|e| e.enabled > 0 && e.dep.dst == stat) {
                match entry.dep.kind {
                    DependencyKind::Add { amount } => value.add_flat(out[entry.dep.src] * amount),
                    DependencyKind::Multiply { factor } => value.add_multiplier(factor),
                }
            }
            out[stat] = value.compute();
        }
        out
    }

    /// Topological order of stats over the `Add` edges (src before dst)
    fn compute_order(&self) -> Result<Vec<Stat>, ConfigError> {
        let mut indegree = [0usize; Stat::COUNT];
        let edges: Vec<(Stat, Stat)> = self
            .deps
            .iter()
            .filter_map(|e| match e.dep.kind {
                DependencyKind::Add { .. } => Some((e.dep.src, e.dep.dst)),
                DependencyKind::Multiply { .. } => None,
            })
            .collect();

        for (src, dst) in &edges {
            if src == dst {
                return Err(ConfigError::StatDependencyCycle { stat: format!("{:?}", src) });
            }
            indegree[dst.index()] += 1;
        }

        let mut order = Vec::with_capacity(Stat::COUNT);
        let mut ready: Vec<Stat> = Stat::all()
            .iter()
            .copied()
            .filter(|s| indegree[s.index()] == 0)
            .rev()
            .collect();

        while let Some(stat) = ready.pop() {
            order.push(stat);
            for (_, dst) in edges.iter().filter(|(src, _)| *src == stat) {
                indegree[dst.index()] -= 1;
                if indegree[dst.index()] == 0 {
                    ready.push(*dst);
                }
            }
        }

        if order.len() != Stat::COUNT {
            let stuck = Stat::all()
                .iter()
                .find(|s| indegree[s.index()] > 0)
                .copied()
                .unwrap_or(Stat::Strength);
            return Err(ConfigError::StatDependencyCycle { stat: format!("{:?}", stuck) });
        }
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ap_from_strength(amount: f64) -> StatDependency {
        StatDependency {
            src: Stat::Strength,
            dst: Stat::AttackPower,
            kind: DependencyKind::Add { amount },
        }
    }

    fn multiply(stat: Stat, factor: f64) -> StatDependency {
        StatDependency {
            src: stat,
            dst: stat,
            kind: DependencyKind::Multiply { factor },
        }
    }

    #[test]
    fn test_static_dependency_applies() {
        let mut manager = StatDependencyManager::new();
        manager.add_static(ap_from_strength(2.0)).unwrap();
        let base = Stats::from_pairs(&[(Stat::Strength, 100.0), (Stat::AttackPower, 50.0)]);
        let out = manager.apply(&base);
        assert!((out[Stat::AttackPower] - 250.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_multiplier_feeds_downstream_dependency() {
        let mut manager = StatDependencyManager::new();
        manager.add_static(ap_from_strength(2.0)).unwrap();
        let kings = manager.add_dynamic(multiply(Stat::Strength, 1.1)).unwrap();
        let base = Stats::from_pairs(&[(Stat::Strength, 100.0)]);

        manager.enable(kings);
        let out = manager.apply(&base);
        assert!((out[Stat::Strength] - 110.0).abs() < 0.0001);
        assert!((out[Stat::AttackPower] - 220.0).abs() < 0.0001);
    }

    #[test]
    fn test_enable_disable_restores_exactly() {
        let mut manager = StatDependencyManager::new();
        manager.add_static(ap_from_strength(2.0)).unwrap();
        let dep = manager.add_dynamic(multiply(Stat::Strength, 1.15)).unwrap();
        let base = Stats::from_pairs(&[(Stat::Strength, 83.7), (Stat::AttackPower, 12.3)]);
        let before = manager.apply(&base);

        for _ in 0..1000 {
            manager.enable(dep);
            manager.disable(dep);
        }
        assert_eq!(manager.apply(&base), before);
    }

    #[test]
    fn test_reference_counted_enable() {
        let mut manager = StatDependencyManager::new();
        let dep = manager.add_dynamic(multiply(Stat::Agility, 2.0)).unwrap();
        let base = Stats::from_pairs(&[(Stat::Agility, 10.0)]);

        manager.enable(dep);
        manager.enable(dep);
        // Contribution applies once regardless of the count
        assert!((manager.apply(&base)[Stat::Agility] - 20.0).abs() < f64::EPSILON);
        manager.disable(dep);
        assert!(manager.is_enabled(dep));
        manager.disable(dep);
        assert!(!manager.is_enabled(dep));
    }

    #[test]
    #[should_panic(expected = "disabled more times")]
    fn test_unpaired_disable_panics() {
        let mut manager = StatDependencyManager::new();
        let dep = manager.add_dynamic(multiply(Stat::Agility, 2.0)).unwrap();
        manager.disable(dep);
    }

    #[test]
    fn test_cycle_rejected() {
        let mut manager = StatDependencyManager::new();
        manager.add_static(ap_from_strength(1.0)).unwrap();
        let err = manager.add_dynamic(StatDependency {
            src: Stat::AttackPower,
            dst: Stat::Strength,
            kind: DependencyKind::Add { amount: 0.1 },
        });
        assert!(matches!(err, Err(ConfigError::StatDependencyCycle { .. })));
        // The rejected dependency is not kept
        let base = Stats::from_pairs(&[(Stat::Strength, 10.0)]);
        assert!((manager.apply(&base)[Stat::AttackPower] - 10.0).abs() < f64::EPSILON);
    }
}
