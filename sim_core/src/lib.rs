//! sim_core - Discrete-event combat simulation engine
//!
//! This library provides:
//! - Simulation: clock, RNG, units and the trial lifecycle
//! - Scheduler: prioritised one-shot and periodic actions
//! - Auras: timed effects with stacks, exclusive categories and proc triggers
//! - Spells and dots: casts, damage/healing resolution and periodic ticks
//! - StatDependencyManager: derived stats toggled at runtime
//! - Batch runner: many seeded trials in parallel with aggregated metrics

pub mod aura;
pub mod autoattack;
pub mod buffs;
pub mod combat;
pub mod config;
pub mod dot;
pub mod error;
pub mod metrics;
pub mod prelude;
pub mod scheduler;
pub mod sim;
pub mod spell;
pub mod stats;
pub mod timer;
pub mod types;
pub mod unit;

// Re-export core types for convenience
pub use aura::{Aura, AuraArray, AuraConfig, ExclusiveEffectConfig, ProcRate, ProcTrigger};
pub use buffs::{
    apply_buff_effects, apply_pet_buff_effects, make_exclusive_buff, new_temporary_stats_aura, register_external_cooldown,
    register_percent_damage_modifier_effect, BuffConfig, ExternalCooldownConfig, StatConfig,
};
pub use config::{load_fight_config, parse_fight_config, FightConfig};
pub use dot::DotConfig;
pub use error::{ConfigError, SimError};
pub use metrics::{BatchResult, TrialResult};
pub use sim::{run_batch, Simulation};
pub use spell::{SpellConfig, SpellResult};
pub use stats::{Stat, Stats};
pub use types::{ActionId, AuraId, DotId, ExclusiveEffectId, HitOutcome, ProcMask, SpellId, UnitId, NEVER_EXPIRES};
