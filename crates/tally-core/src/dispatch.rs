//! Deterministic replay of a canonical timeline through built modules.
//!
//! The dispatcher is single-threaded and never suspends. For every event it
//! walks modules in resolved order, so a dependent always observes its
//! dependencies already updated for the current event.
//!
//! ```text
//!  EncounterStart ──► e0 ──► e1 ──► ... ──► eN ──► EncounterEnd
//!                      │
//!                      ├─► module[0] handlers (if active)
//!                      ├─► module[1] handlers (reads module[0])
//!                      └─► ...
//! ```
//!
//! A handler that returns an error or panics degrades its own module only.

use std::panic::{self, AssertUnwindSafe};

use tally_types::{Event, EventPayload, ModuleFailure, ModuleStatus, Timestamp};
use tracing::{debug, warn};

use crate::context::{DispatchScope, EncounterContext};
use crate::module::{ErasedModule, ModuleId};

// ---------------------------------------------------------------------------
// Module slots
// ---------------------------------------------------------------------------

/// One built module instance plus its run-time status.
pub struct ModuleSlot {
    id: ModuleId,
    instance: Box<dyn ErasedModule>,
    status: ModuleStatus,
    failures: Vec<ModuleFailure>,
}

impl ModuleSlot {
    pub(crate) fn new(id: ModuleId, instance: Box<dyn ErasedModule>, active: bool) -> Self {
        Self {
            id,
            instance,
            status: if active {
                ModuleStatus::Active
            } else {
                ModuleStatus::Inactive
            },
            failures: Vec::new(),
        }
    }

    /// The module's identifier.
    pub const fn id(&self) -> ModuleId {
        self.id
    }

    /// Active, inactive, or degraded.
    pub const fn status(&self) -> ModuleStatus {
        self.status
    }

    /// Failures recorded against the module.
    pub fn failures(&self) -> &[ModuleFailure] {
        &self.failures
    }

    pub(crate) fn instance(&self) -> &dyn ErasedModule {
        self.instance.as_ref()
    }

    fn degrade(&mut self, event: &Event, message: String) {
        warn!(
            module = %self.id,
            sequence = event.sequence,
            timestamp = event.timestamp,
            kind = ?event.kind(),
            error = %message,
            "Module degraded"
        );
        self.status = ModuleStatus::Degraded;
        self.failures.push(ModuleFailure {
            sequence: event.sequence,
            timestamp: event.timestamp,
            event_kind: event.kind(),
            message,
        });
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// Counters from one replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReplaySummary {
    /// Timeline events delivered, markers excluded.
    pub events_replayed: u64,
    /// Timestamp of the delivered end marker.
    pub ended_at: Timestamp,
    /// Modules that degraded during the replay.
    pub degraded: usize,
}

/// Replays events into module slots.
pub struct Dispatcher<'a> {
    encounter: &'a EncounterContext,
    now: Timestamp,
}

impl<'a> Dispatcher<'a> {
    /// A dispatcher positioned at the encounter start.
    pub const fn new(encounter: &'a EncounterContext) -> Self {
        Self {
            encounter,
            now: encounter.bounds().start,
        }
    }

    /// Current simulated time.
    pub const fn now(&self) -> Timestamp {
        self.now
    }

    /// Deliver the start marker, every event, then exactly one end marker.
    ///
    /// `events` must be a canonical sequence (non-decreasing timestamps).
    pub fn run(&mut self, events: &[Event], slots: &mut [ModuleSlot]) -> ReplaySummary {
        let bounds = self.encounter.bounds();
        let first = events.first().map_or(bounds.start, |e| e.timestamp);
        let last = events.last().map_or(bounds.end, |e| e.timestamp);

        let start = Event::marker(
            EventPayload::EncounterStart,
            bounds.start.min(first),
            Event::START_SEQUENCE,
        );
        self.deliver(&start, slots);

        let mut replayed: u64 = 0;
        for event in events {
            self.deliver(event, slots);
            replayed = replayed.saturating_add(1);
        }

        let end_sequence = events
            .last()
            .map_or(Event::FIRST_SEQUENCE, |e| e.sequence.saturating_add(1));
        let end = Event::marker(EventPayload::EncounterEnd, bounds.end.max(last), end_sequence);
        self.deliver(&end, slots);

        let degraded = slots
            .iter()
            .filter(|slot| slot.status == ModuleStatus::Degraded)
            .count();
        debug!(
            events = replayed,
            ended_at = end.timestamp,
            degraded,
            "Replay complete"
        );
        ReplaySummary {
            events_replayed: replayed,
            ended_at: end.timestamp,
            degraded,
        }
    }

    fn deliver(&mut self, event: &Event, slots: &mut [ModuleSlot]) {
        self.now = event.timestamp;
        for index in 0..slots.len() {
            let Some((earlier, rest)) = slots.split_at_mut_checked(index) else {
                break;
            };
            let Some(slot) = rest.first_mut() else {
                break;
            };
            if slot.status != ModuleStatus::Active {
                continue;
            }
            let scope = DispatchScope::new(self.encounter, self.now, earlier);
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                slot.instance.dispatch(event, &scope)
            }));
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(err)) => slot.degrade(event, err.to_string()),
                Err(payload) => slot.degrade(event, panic_message(payload.as_ref())),
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| String::from(*s))
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| String::from("unknown panic"));
    format!("handler panicked: {detail}")
}

