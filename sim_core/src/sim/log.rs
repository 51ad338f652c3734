//! Structured event log for replay comparison

use crate::types::{ActionId, HitOutcome, UnitId};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One recorded simulation event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LogEntry {
    AuraGained {
        time: Duration,
        unit: UnitId,
        aura: String,
    },
    AuraExpired {
        time: Duration,
        unit: UnitId,
        aura: String,
    },
    Cast {
        time: Duration,
        unit: UnitId,
        action: ActionId,
    },
    Damage {
        time: Duration,
        source: UnitId,
        target: UnitId,
        action: ActionId,
        outcome: HitOutcome,
        amount: f64,
    },
    Healing {
        time: Duration,
        source: UnitId,
        target: UnitId,
        action: ActionId,
        outcome: HitOutcome,
        amount: f64,
    },
}

/// Ordered list of events recorded during one trial
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventLog {
    pub entries: Vec<LogEntry>,
}

impl EventLog {
    pub fn push(&mut self, entry: LogEntry) {
        self.entries.push(entry);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Damage events only, in order
    pub fn damage_events(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter().filter(|e| matches!(e, LogEntry::Damage { .. }))
    }
}
