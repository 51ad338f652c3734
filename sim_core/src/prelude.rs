//! Prelude module for convenient imports
//!
//! ```rust
//! use sim_core::prelude::*;
//! ```

// Environment
pub use crate::config::{FightConfig, IndividualBuffs, PartyBuffs, RaidBuffs, TristateEffect};
pub use crate::error::{ConfigError, SimError};
pub use crate::sim::{run_batch, Simulation};

// Content
pub use crate::aura::{make_proc_trigger_aura, AuraConfig, EventChannel, ExclusiveEffectConfig, ProcRate, ProcTrigger};
pub use crate::buffs::{apply_buff_effects, apply_pet_buff_effects, BuffConfig, StatConfig};
pub use crate::dot::DotConfig;
pub use crate::spell::{SpellConfig, SpellCost, SpellFlags, SpellResult};

// Combat
pub use crate::combat::OutcomeKind;
pub use crate::scheduler::ActionPriority;

// Identifiers and stats
pub use crate::stats::{Stat, Stats};
pub use crate::types::{
    ActionId, AuraId, DefenseType, DotId, ExclusiveEffectId, HitOutcome, ProcMask, ResourceKind, SpellId, SpellSchool, UnitId,
    UnitKind, NEVER_EXPIRES,
};
pub use crate::unit::Weapon;
