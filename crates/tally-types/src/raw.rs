//! Raw combat-log records as they arrive from the fetching layer.
//!
//! Every field is optional here. Which fields are required depends on the
//! record's kind, and the normalizer decides whether a record is usable.
//! Unknown fields are ignored.

use serde::{Deserialize, Serialize};

/// One loosely-structured record of the external combat-log schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawRecord {
    /// Milliseconds on the log's clock.
    pub timestamp: Option<u64>,
    /// Kind discriminator, e.g. `"damage"` or `"applybuff"`.
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// Actor that caused the record.
    pub source_id: Option<u64>,
    /// Actor the record happened to.
    pub target_id: Option<u64>,
    /// Ability, buff, or debuff involved.
    pub ability_id: Option<u32>,
    /// Primary numeric payload (damage, healing, resource change).
    pub amount: Option<i64>,
    /// Healing beyond maximum health.
    pub overheal: Option<u64>,
    /// Damage prevented by absorbs.
    pub absorbed: Option<u64>,
    /// Damage beyond what was needed to kill.
    pub overkill: Option<u64>,
    /// Stack count for stack-changing aura records.
    pub stacks: Option<u32>,
    /// Resource name for resource records, e.g. `"mana"`.
    pub resource_type: Option<String>,
    /// Portion of a resource gain lost to the cap.
    pub waste: Option<u64>,
    /// Phase number for phase-change records.
    pub phase: Option<u32>,
}

impl RawRecord {
    /// Start a record of the given kind at the given timestamp.
    pub fn new(kind: &str, timestamp: u64) -> Self {
        Self {
            timestamp: Some(timestamp),
            kind: Some(String::from(kind)),
            ..Self::default()
        }
    }

    /// Set the source actor.
    #[must_use]
    pub const fn source(mut self, id: u64) -> Self {
        self.source_id = Some(id);
        self
    }

    /// Set the target actor.
    #[must_use]
    pub const fn target(mut self, id: u64) -> Self {
        self.target_id = Some(id);
        self
    }

    /// Set the ability.
    #[must_use]
    pub const fn ability(mut self, id: u32) -> Self {
        self.ability_id = Some(id);
        self
    }

    /// Set the primary amount.
    #[must_use]
    pub const fn amount(mut self, amount: i64) -> Self {
        self.amount = Some(amount);
        self
    }

    /// Set the stack count.
    #[must_use]
    pub const fn stacks(mut self, stacks: u32) -> Self {
        self.stacks = Some(stacks);
        self
    }

    /// Set the phase number.
    #[must_use]
    pub const fn phase(mut self, phase: u32) -> Self {
        self.phase = Some(phase);
        self
    }

    /// Set the resource type by log name.
    #[must_use]
    pub fn resource(mut self, name: &str) -> Self {
        self.resource_type = Some(String::from(name));
        self
    }
}
