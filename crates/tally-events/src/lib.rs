//! Raw record normalization for the Tally analysis engine.
//!
//! Combat logs arrive as loosely-structured records that may be unsorted,
//! duplicated, or malformed. This crate turns them into the canonical event
//! sequence every analysis module replays. Normalization never fails:
//! unusable records are dropped and counted in [`NormalizationStats`] so the
//! engine can still produce best-effort results from corrupt input.
//!
//! # Modules
//!
//! - [`input`] -- Parsing JSON array and JSON-lines documents into records
//! - [`kind`] -- Raw kind discriminators and their required fields
//! - [`normalize`] -- Ordering, deduplication, and cast pairing
//!
//! [`NormalizationStats`]: tally_types::NormalizationStats

pub mod input;
pub mod kind;
pub mod normalize;

pub use input::{InputError, ParsedInput, parse_records};
pub use kind::RawKind;
pub use normalize::{NormalizedTimeline, Normalizer, normalize};
