//! Configuration loading from TOML files

mod buffs;

pub use buffs::{BuffSelection, IndividualBuffs, PartyBuffs, RaidBuffs, TristateEffect};

use crate::combat::CombatConstants;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Load a TOML file and deserialize it
pub fn load_toml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: T = toml::from_str(&content)?;
    Ok(config)
}

/// Load a TOML string and deserialize it
pub fn parse_toml<T: serde::de::DeserializeOwned>(content: &str) -> Result<T, ConfigError> {
    let config: T = toml::from_str(content)?;
    Ok(config)
}

/// Settings for one fight and the batch of trials run over it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FightConfig {
    /// Fight length in seconds
    #[serde(default = "default_duration_secs")]
    pub duration_secs: f64,
    /// Number of trials in a batch
    #[serde(default = "default_iterations")]
    pub iterations: usize,
    /// Base seed; trial `i` uses `seed + i`
    #[serde(default)]
    pub seed: u64,
    #[serde(default = "default_num_targets")]
    pub num_targets: usize,
    #[serde(default = "default_target_level")]
    pub target_level: u32,
    #[serde(default = "default_target_armor")]
    pub target_armor: f64,
    /// Health of each target. When set, the fight ends once the primary target dies.
    #[serde(default)]
    pub target_health: Option<f64>,
    /// Record a structured event log for every trial
    #[serde(default)]
    pub record_events: bool,
    #[serde(default)]
    pub combat: CombatConstants,
    #[serde(default)]
    pub buffs: BuffSelection,
}

impl Default for FightConfig {
    fn default() -> Self {
        FightConfig {
            duration_secs: default_duration_secs(),
            iterations: default_iterations(),
            seed: 0,
            num_targets: default_num_targets(),
            target_level: default_target_level(),
            target_armor: default_target_armor(),
            target_health: None,
            record_events: false,
            combat: CombatConstants::default(),
            buffs: BuffSelection::default(),
        }
    }
}

impl FightConfig {
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.duration_secs)
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.duration_secs.is_finite() || self.duration_secs <= 0.0 {
            return Err(ConfigError::Validation(format!(
                "duration_secs must be positive, got {}",
                self.duration_secs
            )));
        }
        if self.num_targets == 0 {
            return Err(ConfigError::Validation("num_targets must be at least 1".to_string()));
        }
        if let Some(health) = self.target_health {
            if health <= 0.0 {
                return Err(ConfigError::Validation(format!(
                    "target_health must be positive, got {}",
                    health
                )));
            }
        }
        Ok(())
    }
}

fn default_duration_secs() -> f64 {
    180.0
}
fn default_iterations() -> usize {
    1000
}
fn default_num_targets() -> usize {
    1
}
fn default_target_level() -> u32 {
    63
}
fn default_target_armor() -> f64 {
    3731.0
}

/// Load and validate a fight configuration file
pub fn load_fight_config(path: &Path) -> Result<FightConfig, ConfigError> {
    let config: FightConfig = load_toml(path)?;
    config.validate()?;
    Ok(config)
}

/// Parse and validate a fight configuration string
pub fn parse_fight_config(content: &str) -> Result<FightConfig, ConfigError> {
    let config: FightConfig = parse_toml(content)?;
    config.validate()?;
    Ok(config)
}
