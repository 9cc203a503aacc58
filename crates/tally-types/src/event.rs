//! The canonical event model.
//!
//! An [`Event`] is immutable once the normalizer emits it. Events in a
//! canonical sequence are totally ordered by `(timestamp, sequence)`.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{AuraKind, CastOutcome, EventKind, ResourceType};
use crate::ids::{AbilityId, ActorId};

/// Milliseconds on the log's clock.
pub type Timestamp = u64;

/// A single occurrence in the canonical timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Event {
    /// When the event happened, in log milliseconds.
    pub timestamp: Timestamp,
    /// Position in the canonical sequence. Timeline events are numbered
    /// gap-free from [`Event::FIRST_SEQUENCE`]; the start marker alone
    /// carries [`Event::START_SEQUENCE`].
    pub sequence: u64,
    /// The actor that caused the event, if any.
    pub source: Option<ActorId>,
    /// The actor the event happened to, if any.
    pub target: Option<ActorId>,
    /// The ability involved, if any.
    pub ability: Option<AbilityId>,
    /// Kind-specific data.
    pub payload: EventPayload,
}

impl Event {
    /// Sequence number of the synthetic start marker.
    pub const START_SEQUENCE: u64 = 0;

    /// Sequence number of the first timeline event.
    pub const FIRST_SEQUENCE: u64 = 1;

    /// The kind discriminator of this event.
    pub const fn kind(&self) -> EventKind {
        self.payload.kind()
    }

    /// Build an engine-generated marker event with no actors.
    pub const fn marker(payload: EventPayload, timestamp: Timestamp, sequence: u64) -> Self {
        Self {
            timestamp,
            sequence,
            source: None,
            target: None,
            ability: None,
            payload,
        }
    }
}

/// Kind-specific event data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum EventPayload {
    /// See [`EventKind::EncounterStart`].
    EncounterStart,
    /// See [`EventKind::PhaseChange`].
    PhaseChange {
        /// The phase entered (1-based as logged).
        phase: u32,
    },
    /// See [`EventKind::CastBegin`].
    CastBegin,
    /// See [`EventKind::Cast`].
    Cast,
    /// See [`EventKind::CastEnd`].
    CastEnd {
        /// How the cast ended.
        outcome: CastOutcome,
        /// When the matching begin happened.
        began_at: Timestamp,
    },
    /// See [`EventKind::Damage`].
    Damage {
        /// Damage that landed.
        amount: u64,
        /// Damage prevented by the target's absorbs.
        absorbed: u64,
        /// Damage beyond what was needed to kill the target.
        overkill: u64,
    },
    /// See [`EventKind::Absorb`].
    Absorb {
        /// Damage prevented.
        amount: u64,
    },
    /// See [`EventKind::Heal`].
    Heal {
        /// Effective healing.
        amount: u64,
        /// Healing beyond the target's maximum health.
        overheal: u64,
    },
    /// See [`EventKind::ResourceChange`].
    ResourceChange {
        /// Which resource changed.
        resource: ResourceType,
        /// Signed change: gains are positive, spends negative.
        change: i64,
        /// Portion of a gain lost to the resource cap.
        waste: u64,
    },
    /// See [`EventKind::BuffRemove`].
    BuffRemove {
        /// Buff or debuff.
        aura: AuraKind,
    },
    /// See [`EventKind::BuffApply`].
    BuffApply {
        /// Buff or debuff.
        aura: AuraKind,
        /// Initial stack count.
        stacks: u32,
    },
    /// See [`EventKind::BuffRefresh`].
    BuffRefresh {
        /// Buff or debuff.
        aura: AuraKind,
    },
    /// See [`EventKind::BuffStack`].
    BuffStack {
        /// Buff or debuff.
        aura: AuraKind,
        /// Stack count after the change.
        stacks: u32,
    },
    /// See [`EventKind::Death`].
    Death,
    /// See [`EventKind::Resurrect`].
    Resurrect,
    /// See [`EventKind::EncounterEnd`].
    EncounterEnd,
}

impl EventPayload {
    /// The kind discriminator of this payload.
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::EncounterStart => EventKind::EncounterStart,
            Self::PhaseChange { .. } => EventKind::PhaseChange,
            Self::CastBegin => EventKind::CastBegin,
            Self::Cast => EventKind::Cast,
            Self::CastEnd { .. } => EventKind::CastEnd,
            Self::Damage { .. } => EventKind::Damage,
            Self::Absorb { .. } => EventKind::Absorb,
            Self::Heal { .. } => EventKind::Heal,
            Self::ResourceChange { .. } => EventKind::ResourceChange,
            Self::BuffRemove { .. } => EventKind::BuffRemove,
            Self::BuffApply { .. } => EventKind::BuffApply,
            Self::BuffRefresh { .. } => EventKind::BuffRefresh,
            Self::BuffStack { .. } => EventKind::BuffStack,
            Self::Death => EventKind::Death,
            Self::Resurrect => EventKind::Resurrect,
            Self::EncounterEnd => EventKind::EncounterEnd,
        }
    }
}

/// Start and end of an encounter in log milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct EncounterBounds {
    /// First millisecond of the encounter.
    pub start: Timestamp,
    /// Last millisecond of the encounter.
    pub end: Timestamp,
}

impl EncounterBounds {
    /// Create bounds, swapping the ends if they arrive reversed.
    pub const fn new(start: Timestamp, end: Timestamp) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self {
                start: end,
                end: start,
            }
        }
    }

    /// Encounter length in milliseconds.
    pub const fn duration(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    /// Milliseconds elapsed since the start, clamped at zero for pre-pull events.
    pub const fn offset(&self, timestamp: Timestamp) -> u64 {
        timestamp.saturating_sub(self.start)
    }

    /// Whether the timestamp falls inside the encounter (inclusive).
    pub const fn contains(&self, timestamp: Timestamp) -> bool {
        timestamp >= self.start && timestamp <= self.end
    }
}
