//! Metrics sinks and per-trial / per-batch reports

use crate::sim::{EventLog, Simulation};
use crate::types::{ActionId, ResourceKind, UnitKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Gains of one resource from one action
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceMetrics {
    pub events: u32,
    /// Amount the action tried to give
    pub gain: f64,
    /// Amount actually gained after the pool cap
    pub actual_gain: f64,
}

impl ResourceMetrics {
    pub fn record(&mut self, gain: f64, actual_gain: f64) {
        self.events += 1;
        self.gain += gain;
        self.actual_gain += actual_gain;
    }

    /// Gain lost to the pool cap
    pub fn overflow(&self) -> f64 {
        self.gain - self.actual_gain
    }
}

/// Counters kept for every spell
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SpellMetrics {
    pub casts: u32,
    pub hits: u32,
    pub crits: u32,
    pub misses: u32,
    pub ticks: u32,
    pub damage: f64,
    pub healing: f64,
    pub threat: f64,
}

/// Per-action row of a trial report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionMetrics {
    pub unit: String,
    pub action: ActionId,
    pub metrics: SpellMetrics,
}

/// Per-aura row of a trial report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuraMetrics {
    pub unit: String,
    pub label: String,
    pub action: ActionId,
    pub uptime_secs: f64,
    pub activations: u32,
}

/// Per-resource row of a trial report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceReport {
    pub unit: String,
    pub resource: ResourceKind,
    pub action: ActionId,
    pub metrics: ResourceMetrics,
}

/// Everything measured in one trial
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialResult {
    /// Simulated length of the trial (shorter than configured if the target died)
    pub duration_secs: f64,
    pub kill_time_secs: Option<f64>,
    /// Damage dealt by friendly units
    pub damage: f64,
    pub healing: f64,
    pub dps: f64,
    pub hps: f64,
    pub actions: Vec<ActionMetrics>,
    pub auras: Vec<AuraMetrics>,
    pub resources: Vec<ResourceReport>,
    pub events: Option<EventLog>,
}

impl TrialResult {
    /// Gather the report from a simulation whose trial just ended
    pub fn collect(sim: &Simulation, elapsed: Duration) -> Self {
        let duration_secs = elapsed.as_secs_f64();

        let mut damage = 0.0;
        let mut healing = 0.0;
        let mut actions = Vec::new();
        for spell in &sim.spells {
            let unit = sim.unit(spell.unit);
            if unit.kind != UnitKind::Enemy {
                damage += spell.metrics.damage;
                healing += spell.metrics.healing;
            }
            if spell.metrics != SpellMetrics::default() {
                actions.push(ActionMetrics {
                    unit: unit.label.clone(),
                    action: spell.action_id,
                    metrics: spell.metrics,
                });
            }
        }

        let mut auras = Vec::new();
        let mut resources = Vec::new();
        for unit in sim.units() {
            for aura in &unit.auras {
                if aura.activations() > 0 {
                    auras.push(AuraMetrics {
                        unit: unit.label.clone(),
                        label: aura.label.clone(),
                        action: aura.action_id,
                        uptime_secs: aura.uptime().as_secs_f64(),
                        activations: aura.activations(),
                    });
                }
            }
            for ((resource, action), metrics) in unit.resource_metrics() {
                resources.push(ResourceReport {
                    unit: unit.label.clone(),
                    resource: *resource,
                    action: *action,
                    metrics: *metrics,
                });
            }
        }

        let per_second = |total: f64| if duration_secs > 0.0 { total / duration_secs } else { 0.0 };
        TrialResult {
            duration_secs,
            kill_time_secs: sim.kill_time().map(|t| t.as_secs_f64()),
            damage,
            healing,
            dps: per_second(damage),
            hps: per_second(healing),
            actions,
            auras,
            resources,
            events: sim.event_log().cloned(),
        }
    }
}

/// Summary statistics of one quantity across trials
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DistributionMetrics {
    pub mean: f64,
    pub stdev: f64,
    pub min: f64,
    pub max: f64,
}

impl DistributionMetrics {
    /// Sample statistics; an empty slice gives all zeros
    pub fn from_samples(samples: &[f64]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }
        let n = samples.len() as f64;
        let mean = samples.iter().sum::<f64>() / n;
        let variance = if samples.len() > 1 {
            samples.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / (n - 1.0)
        } else {
            0.0
        };
        DistributionMetrics {
            mean,
            stdev: variance.sqrt(),
            min: samples.iter().copied().fold(f64::INFINITY, f64::min),
            max: samples.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

/// Average of one action across a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionSummary {
    pub unit: String,
    pub action: ActionId,
    pub avg_casts: f64,
    pub avg_damage: f64,
    pub avg_healing: f64,
}

/// Average uptime of one aura across a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuraSummary {
    pub unit: String,
    pub label: String,
    /// Fraction of fight time the aura was active
    pub avg_uptime: f64,
}

/// Aggregate over every trial of a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    pub iterations: usize,
    pub dps: DistributionMetrics,
    pub hps: DistributionMetrics,
    pub duration: DistributionMetrics,
    pub actions: Vec<ActionSummary>,
    pub auras: Vec<AuraSummary>,
}

impl BatchResult {
    /// Aggregate trials in the given order
    pub fn from_trials(trials: &[TrialResult]) -> Self {
        let n = trials.len().max(1) as f64;
        let dps: Vec<f64> = trials.iter().map(|t| t.dps).collect();
        let hps: Vec<f64> = trials.iter().map(|t| t.hps).collect();
        let durations: Vec<f64> = trials.iter().map(|t| t.duration_secs).collect();

        let mut actions: BTreeMap<(String, ActionId), (f64, f64, f64)> = BTreeMap::new();
        let mut auras: BTreeMap<(String, String), f64> = BTreeMap::new();
        for trial in trials {
            for row in &trial.actions {
                let entry = actions.entry((row.unit.clone(), row.action)).or_default();
                entry.0 += row.metrics.casts as f64;
                entry.1 += row.metrics.damage;
                entry.2 += row.metrics.healing;
            }
            for row in &trial.auras {
                if trial.duration_secs > 0.0 {
                    *auras.entry((row.unit.clone(), row.label.clone())).or_default() +=
                        row.uptime_secs / trial.duration_secs;
                }
            }
        }

        BatchResult {
            iterations: trials.len(),
            dps: DistributionMetrics::from_samples(&dps),
            hps: DistributionMetrics::from_samples(&hps),
            duration: DistributionMetrics::from_samples(&durations),
            actions: actions
                .into_iter()
                .map(|((unit, action), (casts, damage, healing))| ActionSummary {
                    unit,
                    action,
                    avg_casts: casts / n,
                    avg_damage: damage / n,
                    avg_healing: healing / n,
                })
                .collect(),
            auras: auras
                .into_iter()
                .map(|((unit, label), uptime)| AuraSummary {
                    unit,
                    label,
                    avg_uptime: uptime / n,
                })
                .collect(),
        }
    }
}
