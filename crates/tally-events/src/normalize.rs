//! Conversion of raw records into the canonical event timeline.
//!
//! Normalization runs in three passes:
//!
//! 1. **Canonicalize** -- each raw record is checked against the fields its
//!    kind requires. Unknown kinds and malformed records are dropped and
//!    counted; boundary markers are consumed.
//! 2. **Order** -- candidates are sorted by their full content key
//!    `(timestamp, kind, source, target, ability, payload)` and exact
//!    duplicates are removed. Because the key covers every field, any
//!    arrival order of the same records yields the same sequence.
//! 3. **Pair** -- cast begins are matched to the next completion or
//!    cancellation for the same caster and ability. Synthetic
//!    [`EventKind::CastEnd`] events are inserted directly after their cause,
//!    and casts still open at the end are closed at the final timestamp.
//!
//! [`EventKind::CastEnd`]: tally_types::EventKind::CastEnd

use std::collections::BTreeMap;

use tally_types::{
    AbilityId, ActorId, CastOutcome, DropReason, EncounterBounds, Event, EventKind, EventPayload,
    NormalizationStats, RawRecord, ResourceType, Timestamp,
};
use tracing::{debug, warn};

use crate::input::ParsedInput;
use crate::kind::RawKind;

/// The output of normalization: the canonical sequence and its context.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NormalizedTimeline {
    /// Canonical events, ordered by `(timestamp, sequence)`.
    pub events: Vec<Event>,
    /// Encounter boundaries.
    pub bounds: EncounterBounds,
    /// Counters describing what was kept, dropped, and synthesized.
    pub stats: NormalizationStats,
}

impl NormalizedTimeline {
    /// Timestamp of the last canonical event, if any.
    pub fn last_timestamp(&self) -> Option<Timestamp> {
        self.events.last().map(|event| event.timestamp)
    }
}

/// Normalizer settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Normalizer {
    start: Option<Timestamp>,
    end: Option<Timestamp>,
}

impl Normalizer {
    /// A normalizer deriving bounds from the records themselves.
    pub const fn new() -> Self {
        Self {
            start: None,
            end: None,
        }
    }

    /// Override the encounter boundaries instead of deriving them.
    ///
    /// The end is still extended to cover the last event so that the
    /// end-of-encounter marker always follows every timeline event.
    #[must_use]
    pub const fn with_bounds(mut self, bounds: EncounterBounds) -> Self {
        self.start = Some(bounds.start);
        self.end = Some(bounds.end);
        self
    }

    /// Override only the encounter start.
    #[must_use]
    pub const fn with_start(mut self, start: Timestamp) -> Self {
        self.start = Some(start);
        self
    }

    /// Override only the encounter end (still extended to the last event).
    #[must_use]
    pub const fn with_end(mut self, end: Timestamp) -> Self {
        self.end = Some(end);
        self
    }

    /// Normalize records parsed from a document, carrying over the count of
    /// unparseable entries.
    pub fn normalize_parsed(&self, input: ParsedInput) -> NormalizedTimeline {
        let unparseable = input.unparseable;
        let mut timeline = self.normalize(input.records);
        timeline.stats.received = timeline.stats.received.saturating_add(unparseable);
        if unparseable > 0 {
            let entry = timeline.stats.malformed.entry(DropReason::Unparseable).or_insert(0);
            *entry = entry.saturating_add(unparseable);
        }
        timeline
    }

    /// Normalize raw records into a canonical timeline.
    ///
    /// Never fails: anything unusable is dropped and counted.
    pub fn normalize(&self, records: impl IntoIterator<Item = RawRecord>) -> NormalizedTimeline {
        let mut stats = NormalizationStats::default();
        let mut markers = Markers::default();
        let mut candidates = Vec::new();

        for record in records {
            stats.received = stats.received.saturating_add(1);
            match canonicalize(&record) {
                Ok(Canonical::Candidate(candidate)) => candidates.push(candidate),
                Ok(Canonical::Boundary { start, timestamp }) => markers.observe(start, timestamp),
                Err(Rejection::Unrecognized) => {
                    stats.unrecognized = stats.unrecognized.saturating_add(1);
                }
                Err(Rejection::Malformed(reason)) => stats.record_malformed(reason),
            }
        }

        // Pass 2: content order, duplicates removed.
        candidates.sort_unstable();
        let before = candidates.len();
        candidates.dedup();
        let duplicates = before.saturating_sub(candidates.len());
        stats.duplicates = u64::try_from(duplicates).unwrap_or(u64::MAX);

        let first = candidates.first().map(|c| c.timestamp);
        let last = candidates.last().map(|c| c.timestamp);
        let bounds = self.resolve_bounds(&markers, first, last);

        // Pass 3: cast pairing and sequencing.
        let mut pairing = CastPairing::new(candidates.len());
        for candidate in candidates {
            pairing.push(candidate, &mut stats);
        }
        let events = pairing.finish(bounds.end, &mut stats);

        if stats.dropped() > 0 {
            warn!(
                dropped = stats.dropped(),
                unrecognized = stats.unrecognized,
                malformed = stats.malformed_total(),
                "Dropped raw records during normalization"
            );
        }
        debug!(
            received = stats.received,
            accepted = stats.accepted,
            duplicates = stats.duplicates,
            synthesized = stats.synthesized,
            start = bounds.start,
            end = bounds.end,
            "Normalized timeline"
        );

        NormalizedTimeline {
            events,
            bounds,
            stats,
        }
    }

    fn resolve_bounds(
        &self,
        markers: &Markers,
        first: Option<Timestamp>,
        last: Option<Timestamp>,
    ) -> EncounterBounds {
        let declared_start = self.start.or(markers.start);
        let declared_end = self.end.or(markers.end);

        let start = declared_start.or(first).unwrap_or(0);
        let end = match (declared_end, last) {
            (Some(end), Some(last)) => end.max(last),
            (Some(end), None) => end,
            (None, Some(last)) => last,
            (None, None) => start,
        };
        EncounterBounds::new(start, end.max(start))
    }
}

/// Normalize with default settings.
pub fn normalize(records: impl IntoIterator<Item = RawRecord>) -> NormalizedTimeline {
    Normalizer::new().normalize(records)
}

// ---------------------------------------------------------------------------
// Pass 1: canonicalization
// ---------------------------------------------------------------------------

/// Earliest start marker and latest end marker seen.
#[derive(Debug, Default)]
struct Markers {
    start: Option<Timestamp>,
    end: Option<Timestamp>,
}

impl Markers {
    fn observe(&mut self, start: bool, timestamp: Timestamp) {
        if start {
            self.start = Some(self.start.map_or(timestamp, |t| t.min(timestamp)));
        } else {
            self.end = Some(self.end.map_or(timestamp, |t| t.max(timestamp)));
        }
    }
}

/// What a raw record contributes before ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Step {
    /// A cast began.
    Begin,
    /// A cast completed.
    Complete,
    /// A cast was cancelled.
    Cancel,
    /// Any other timeline event, passed through as-is.
    Timeline(EventPayload),
}

impl Step {
    const fn kind(&self) -> EventKind {
        match self {
            Self::Begin => EventKind::CastBegin,
            Self::Complete => EventKind::Cast,
            Self::Cancel => EventKind::CastEnd,
            Self::Timeline(payload) => payload.kind(),
        }
    }
}

/// A validated record awaiting ordering.
///
/// Field order is the sort key: timestamp first, then the kind rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Candidate {
    timestamp: Timestamp,
    kind: EventKind,
    source: Option<ActorId>,
    target: Option<ActorId>,
    ability: Option<AbilityId>,
    step: Step,
}

enum Canonical {
    Candidate(Candidate),
    Boundary { start: bool, timestamp: Timestamp },
}

enum Rejection {
    Unrecognized,
    Malformed(DropReason),
}

fn canonicalize(record: &RawRecord) -> Result<Canonical, Rejection> {
    let name = record
        .kind
        .as_deref()
        .ok_or(Rejection::Malformed(DropReason::MissingKind))?;
    let kind = RawKind::parse(name).ok_or(Rejection::Unrecognized)?;
    let timestamp = record
        .timestamp
        .ok_or(Rejection::Malformed(DropReason::MissingTimestamp))?;

    let source = record.source_id.map(ActorId);
    let target = record.target_id.map(ActorId);
    let ability = record.ability_id.map(AbilityId);

    if kind.requires_source() && source.is_none() {
        return Err(Rejection::Malformed(DropReason::MissingSource));
    }
    if kind.requires_target() && target.is_none() {
        return Err(Rejection::Malformed(DropReason::MissingTarget));
    }
    if kind.requires_ability() && ability.is_none() {
        return Err(Rejection::Malformed(DropReason::MissingAbility));
    }

    let step = match kind {
        RawKind::BeginCast => Step::Begin,
        RawKind::Cast => Step::Complete,
        RawKind::CastCancelled => Step::Cancel,
        RawKind::Damage => Step::Timeline(EventPayload::Damage {
            amount: unsigned_amount(record)?,
            absorbed: record.absorbed.unwrap_or(0),
            overkill: record.overkill.unwrap_or(0),
        }),
        RawKind::Heal => Step::Timeline(EventPayload::Heal {
            amount: unsigned_amount(record)?,
            overheal: record.overheal.unwrap_or(0),
        }),
        RawKind::Absorbed => Step::Timeline(EventPayload::Absorb {
            amount: unsigned_amount(record)?,
        }),
        RawKind::ApplyAura(aura) => Step::Timeline(EventPayload::BuffApply {
            aura,
            stacks: record.stacks.unwrap_or(1),
        }),
        RawKind::RefreshAura(aura) => Step::Timeline(EventPayload::BuffRefresh { aura }),
        RawKind::AuraStack(aura) => Step::Timeline(EventPayload::BuffStack {
            aura,
            stacks: record
                .stacks
                .ok_or(Rejection::Malformed(DropReason::MissingStacks))?,
        }),
        RawKind::RemoveAura(aura) => Step::Timeline(EventPayload::BuffRemove { aura }),
        RawKind::Resource => Step::Timeline(EventPayload::ResourceChange {
            resource: record
                .resource_type
                .as_deref()
                .and_then(ResourceType::from_log_name)
                .ok_or(Rejection::Malformed(DropReason::MissingResource))?,
            change: record
                .amount
                .ok_or(Rejection::Malformed(DropReason::MissingAmount))?,
            waste: record.waste.unwrap_or(0),
        }),
        RawKind::Death => Step::Timeline(EventPayload::Death),
        RawKind::Resurrect => Step::Timeline(EventPayload::Resurrect),
        RawKind::Phase => Step::Timeline(EventPayload::PhaseChange {
            phase: record
                .phase
                .ok_or(Rejection::Malformed(DropReason::MissingPhase))?,
        }),
        RawKind::EncounterStart | RawKind::EncounterEnd => {
            return Ok(Canonical::Boundary {
                start: kind == RawKind::EncounterStart,
                timestamp,
            });
        }
    };

    Ok(Canonical::Candidate(Candidate {
        timestamp,
        kind: step.kind(),
        source,
        target,
        ability,
        step,
    }))
}

fn unsigned_amount(record: &RawRecord) -> Result<u64, Rejection> {
    let amount = record
        .amount
        .ok_or(Rejection::Malformed(DropReason::MissingAmount))?;
    u64::try_from(amount).map_err(|_overflow| Rejection::Malformed(DropReason::NegativeAmount))
}

// ---------------------------------------------------------------------------
// Pass 3: cast pairing
// ---------------------------------------------------------------------------

/// Builds the final sequence, pairing cast begins with their ends.
struct CastPairing {
    events: Vec<Event>,
    open: BTreeMap<(ActorId, AbilityId), Timestamp>,
}

impl CastPairing {
    fn new(capacity: usize) -> Self {
        Self {
            events: Vec::with_capacity(capacity),
            open: BTreeMap::new(),
        }
    }

    fn emit(&mut self, candidate: &Candidate, payload: EventPayload) {
        let sequence = u64::try_from(self.events.len())
            .map_or(u64::MAX, |n| n.saturating_add(Event::FIRST_SEQUENCE));
        self.events.push(Event {
            timestamp: candidate.timestamp,
            sequence,
            source: candidate.source,
            target: candidate.target,
            ability: candidate.ability,
            payload,
        });
    }

    fn emit_cast_end(
        &mut self,
        candidate: &Candidate,
        outcome: CastOutcome,
        began_at: Timestamp,
        stats: &mut NormalizationStats,
    ) {
        let end = Candidate {
            target: None,
            ..*candidate
        };
        self.emit(&end, EventPayload::CastEnd { outcome, began_at });
        stats.synthesized = stats.synthesized.saturating_add(1);
    }

    fn push(&mut self, candidate: Candidate, stats: &mut NormalizationStats) {
        let key = candidate.source.zip(candidate.ability);

        match candidate.step {
            Step::Begin => {
                if let Some(key) = key {
                    if let Some(began_at) = self.open.insert(key, candidate.timestamp) {
                        // A new begin supersedes the one still in progress.
                        self.emit_cast_end(&candidate, CastOutcome::Cancelled, began_at, stats);
                    }
                }
                self.emit(&candidate, EventPayload::CastBegin);
                stats.accepted = stats.accepted.saturating_add(1);
            }
            Step::Complete => {
                self.emit(&candidate, EventPayload::Cast);
                stats.accepted = stats.accepted.saturating_add(1);
                if let Some(began_at) = key.and_then(|key| self.open.remove(&key)) {
                    self.emit_cast_end(&candidate, CastOutcome::Completed, began_at, stats);
                }
            }
            Step::Cancel => match key.and_then(|key| self.open.remove(&key)) {
                Some(began_at) => {
                    stats.accepted = stats.accepted.saturating_add(1);
                    self.emit(
                        &Candidate {
                            target: None,
                            ..candidate
                        },
                        EventPayload::CastEnd {
                            outcome: CastOutcome::Cancelled,
                            began_at,
                        },
                    );
                }
                None => stats.orphaned = stats.orphaned.saturating_add(1),
            },
            Step::Timeline(payload) => {
                self.emit(&candidate, payload);
                stats.accepted = stats.accepted.saturating_add(1);
            }
        }
    }

    /// Close every cast still open at `end` and return the sequence.
    fn finish(mut self, end: Timestamp, stats: &mut NormalizationStats) -> Vec<Event> {
        let open = std::mem::take(&mut self.open);
        for ((source, ability), began_at) in open {
            let closing = Candidate {
                timestamp: end,
                kind: EventKind::CastEnd,
                source: Some(source),
                target: None,
                ability: Some(ability),
                step: Step::Cancel,
            };
            self.emit_cast_end(&closing, CastOutcome::Unfinished, began_at, stats);
        }
        self.events
    }
}
