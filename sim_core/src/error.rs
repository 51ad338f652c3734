//! Error types for content construction and batch runs

use thiserror::Error;

/// Fatal configuration error raised while building a character or loading config.
///
/// These indicate a content-authoring bug; the batch is aborted instead of retried.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Aura registered without a label on unit '{unit}'")]
    EmptyAuraLabel { unit: String },
    #[error("Aura '{label}' is already registered on unit '{unit}'")]
    DuplicateAuraLabel { unit: String, label: String },
    #[error("Unit index {0} does not exist")]
    UnknownUnit(usize),
    #[error("Stat dependency cycle detected through {stat}")]
    StatDependencyCycle { stat: String },
    #[error("Invalid dot '{label}': {reason}")]
    InvalidDot { label: String, reason: String },
    #[error("Invalid proc trigger '{name}': {reason}")]
    InvalidProcTrigger { name: String, reason: String },
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Configuration validation error: {0}")]
    Validation(String),
}

/// Error returned by batch execution
#[derive(Error, Debug)]
pub enum SimError {
    #[error("Character build failed: {0}")]
    Build(#[from] ConfigError),
    #[error("Batch requested with zero iterations")]
    NoTrials,
}
