//! Shared type definitions for the Tally encounter analysis engine.
//!
//! This crate is the single source of truth for the data flowing through
//! the engine: raw records in, canonical events through the replay, and
//! reports out. Report types derive `ts-rs` bindings for the rendering
//! layer.
//!
//! # Modules
//!
//! - [`ids`] -- Typed wrappers for actor, ability, and run identifiers
//! - [`enums`] -- Event kinds, roles, resources, drop reasons, module status
//! - [`event`] -- The canonical [`Event`] model and encounter bounds
//! - [`participant`] -- Participants and the encounter [`Roster`]
//! - [`raw`] -- The loosely-structured [`RawRecord`] input schema
//! - [`report`] -- Contributions and the [`AnalysisReport`]

pub mod enums;
pub mod event;
pub mod ids;
pub mod participant;
pub mod raw;
pub mod report;

// Re-export all public types at crate root for convenience.
pub use enums::{
    AuraKind, CastOutcome, DropReason, EventKind, ModuleStatus, ParticipantKind, ResourceType,
    Role,
};
pub use event::{EncounterBounds, Event, EventPayload, Timestamp};
pub use ids::{AbilityId, ActorId, RunId};
pub use participant::{Participant, Roster};
pub use raw::RawRecord;
pub use report::{
    AnalysisReport, Contribution, ModuleFailure, ModuleReport, NormalizationStats, Stat,
};
