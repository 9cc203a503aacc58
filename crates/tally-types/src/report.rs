//! Serializable results handed to the rendering layer.
//!
//! The engine defines no presentation format. Every module contribution is
//! a self-contained [`Contribution`] and the whole run is one
//! [`AnalysisReport`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{DropReason, EventKind, ModuleStatus};
use crate::event::{EncounterBounds, Timestamp};
use crate::ids::{ActorId, RunId};

// ---------------------------------------------------------------------------
// Module contributions
// ---------------------------------------------------------------------------

/// A single named statistic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "unit", content = "value", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum Stat {
    /// A number of occurrences.
    Count(u64),
    /// A summed quantity (damage, healing, resource).
    Amount(u64),
    /// A length of time in milliseconds.
    Duration(u64),
    /// A quantity per second.
    Rate(f64),
    /// A fraction in `0.0..=1.0`.
    Ratio(f64),
    /// Amounts broken down by a key (ability, resource, ...).
    Breakdown(BTreeMap<String, u64>),
}

/// A module's result: named statistics plus free-form notes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Contribution {
    /// Statistics keyed by name.
    pub stats: BTreeMap<String, Stat>,
    /// Human-readable observations.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

impl Contribution {
    /// An empty contribution.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a statistic, replacing any previous value with the same name.
    #[must_use]
    pub fn with(mut self, name: &str, stat: Stat) -> Self {
        self.stats.insert(String::from(name), stat);
        self
    }

    /// Add a note.
    #[must_use]
    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Look up a statistic by name.
    pub fn get(&self, name: &str) -> Option<&Stat> {
        self.stats.get(name)
    }

    /// Look up an integer-valued statistic (`Count`, `Amount`, `Duration`) by name.
    pub fn total(&self, name: &str) -> Option<u64> {
        match self.stats.get(name)? {
            Stat::Count(value) | Stat::Amount(value) | Stat::Duration(value) => Some(*value),
            Stat::Rate(_) | Stat::Ratio(_) | Stat::Breakdown(_) => None,
        }
    }
}

/// A handler failure recorded against a degraded module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ModuleFailure {
    /// Canonical sequence number of the event being handled.
    pub sequence: u64,
    /// Timestamp of that event.
    pub timestamp: Timestamp,
    /// Kind of that event.
    pub event_kind: EventKind,
    /// Description of the failure.
    pub message: String,
}

/// What one module reported for a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ModuleReport {
    /// Active, or degraded after a handler failure.
    pub status: ModuleStatus,
    /// Whether the contribution covers only part of the timeline.
    pub incomplete: bool,
    /// The module's statistics.
    pub contribution: Contribution,
    /// Failures that degraded the module.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ModuleFailure>,
}

// ---------------------------------------------------------------------------
// Normalization summary
// ---------------------------------------------------------------------------

/// Counters produced while normalizing raw records.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct NormalizationStats {
    /// Raw records received (including unparseable lines).
    pub received: u64,
    /// Raw records that became canonical events.
    pub accepted: u64,
    /// Exact duplicate records removed.
    pub duplicates: u64,
    /// Records with a kind the normalizer does not know.
    pub unrecognized: u64,
    /// Malformed records dropped, by reason.
    pub malformed: BTreeMap<DropReason, u64>,
    /// Cast cancellations with no open cast to close.
    pub orphaned: u64,
    /// Events generated by the normalizer (cast ends).
    pub synthesized: u64,
}

impl NormalizationStats {
    /// Record one malformed record.
    pub fn record_malformed(&mut self, reason: DropReason) {
        let count = self.malformed.entry(reason).or_insert(0);
        *count = count.saturating_add(1);
    }

    /// Total malformed records dropped.
    pub fn malformed_total(&self) -> u64 {
        self.malformed.values().fold(0, |acc, n| acc.saturating_add(*n))
    }

    /// Total records dropped for any reason (duplicates excluded).
    pub fn dropped(&self) -> u64 {
        self.malformed_total().saturating_add(self.unrecognized)
    }
}

// ---------------------------------------------------------------------------
// Run report
// ---------------------------------------------------------------------------

/// Everything one analysis run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct AnalysisReport {
    /// Identifier of the run.
    pub run_id: RunId,
    /// The participant under analysis.
    pub selected: ActorId,
    /// Encounter boundaries used for the replay.
    pub bounds: EncounterBounds,
    /// Normalization counters.
    pub normalization: NormalizationStats,
    /// Timeline events replayed (synthetic start/end markers excluded).
    pub events_replayed: u64,
    /// Contributions of every active or degraded module, keyed by module id.
    pub modules: BTreeMap<String, ModuleReport>,
}

impl AnalysisReport {
    /// The contribution of a module, if it was active.
    pub fn contribution(&self, module: &str) -> Option<&Contribution> {
        self.modules.get(module).map(|report| &report.contribution)
    }

    /// Ids of modules that degraded during replay.
    pub fn degraded(&self) -> Vec<&str> {
        self.modules
            .iter()
            .filter(|(_, report)| report.status == ModuleStatus::Degraded)
            .map(|(id, _)| id.as_str())
            .collect()
    }
}
