use crate::types::{HitOutcome, UnitId};
use serde::{Deserialize, Serialize};

/// Resolved outcome of one spell against one target
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpellResult {
    pub target: UnitId,
    pub outcome: HitOutcome,
    /// Damage or healing after every modifier
    pub amount: f64,
    pub threat: f64,
    pub is_healing: bool,
    pub is_periodic: bool,
}

impl SpellResult {
    pub fn landed(&self) -> bool {
        self.outcome.landed()
    }

    pub fn did_crit(&self) -> bool {
        self.outcome.did_crit()
    }
}
