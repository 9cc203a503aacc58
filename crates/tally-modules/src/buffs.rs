//! Aura state derived from buff events, and uptime built on top of it.
//!
//! [`BuffTracker`] is the only place aura state lives. Participants never
//! carry their own buff lists; anything that needs to know whether an aura
//! is up asks the tracker through a dependency handle.

use std::collections::{BTreeMap, BTreeSet};

use tally_core::{
    ActorFilter, BuildContext, BuildError, Dep, DispatchScope, HandlerError, Handlers, Module,
    ModuleId,
};
use tally_types::{
    AbilityId, ActorId, AuraKind, Contribution, Event, EventKind, EventPayload, Stat, Timestamp,
};
use tracing::debug;

use crate::stats;

// ---------------------------------------------------------------------------
// Tracker
// ---------------------------------------------------------------------------

/// An aura currently applied to a participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveAura {
    /// When the current application began.
    pub applied_at: Timestamp,
    /// Current stack count.
    pub stacks: u32,
    /// Buff or debuff.
    pub kind: AuraKind,
    /// Who applied it, when known.
    pub source: Option<ActorId>,
}

/// Tracks which auras are up on which participants.
#[derive(Debug, Default)]
pub struct BuffTracker {
    active: BTreeMap<(ActorId, AbilityId), ActiveAura>,
    /// Uptime of already-closed applications, in milliseconds.
    closed: BTreeMap<(ActorId, AbilityId), u64>,
    applications: u64,
    encounter_start: Timestamp,
}

impl BuffTracker {
    /// Whether `aura` is currently up on `target`, optionally only when
    /// applied by `source`.
    pub fn is_active(&self, target: ActorId, aura: AbilityId, source: Option<ActorId>) -> bool {
        self.active
            .get(&(target, aura))
            .is_some_and(|active| source.is_none_or(|source| active.source == Some(source)))
    }

    /// The current application of `aura` on `target`, if any.
    pub fn active(&self, target: ActorId, aura: AbilityId) -> Option<&ActiveAura> {
        self.active.get(&(target, aura))
    }

    /// Total milliseconds `aura` has been up on `target` as of `now`.
    pub fn uptime(&self, target: ActorId, aura: AbilityId, now: Timestamp) -> u64 {
        let closed = self.closed.get(&(target, aura)).copied().unwrap_or(0);
        let open = self
            .active
            .get(&(target, aura))
            .map_or(0, |a| now.saturating_sub(a.applied_at));
        closed.saturating_add(open)
    }

    /// Every aura seen on `target`, up or not.
    pub fn auras_on(&self, target: ActorId) -> BTreeSet<AbilityId> {
        self.active
            .keys()
            .chain(self.closed.keys())
            .filter(|(actor, _)| *actor == target)
            .map(|&(_, aura)| aura)
            .collect()
    }

    /// Number of fresh applications seen.
    pub const fn applications(&self) -> u64 {
        self.applications
    }

    fn seen(&self, key: (ActorId, AbilityId)) -> bool {
        self.active.contains_key(&key) || self.closed.contains_key(&key)
    }

    fn open(&mut self, key: (ActorId, AbilityId), at: Timestamp, aura: ActiveAura) {
        self.active.entry(key).or_insert(ActiveAura {
            applied_at: at,
            ..aura
        });
    }

    /// Open on a refresh or stack change. An aura never seen on the target
    /// was applied before the pull.
    fn carry(&mut self, key: (ActorId, AbilityId), at: Timestamp, aura: ActiveAura) {
        let at = if self.seen(key) {
            at
        } else {
            self.encounter_start
        };
        self.open(key, at, aura);
    }

    fn close(&mut self, key: (ActorId, AbilityId), at: Timestamp) {
        let applied_at = match self.active.remove(&key) {
            Some(active) => active.applied_at,
            // Never seen: the aura was up before the pull.
            None if !self.closed.contains_key(&key) => self.encounter_start,
            None => {
                debug!(
                    actor = %key.0,
                    aura = %key.1,
                    at,
                    "Ignoring removal of an aura that is not up"
                );
                return;
            }
        };
        let entry = self.closed.entry(key).or_insert(0);
        *entry = entry.saturating_add(at.saturating_sub(applied_at));
    }

    fn on_aura(&mut self, event: &Event, _: &DispatchScope<'_>) -> Result<(), HandlerError> {
        let (Some(target), Some(aura)) = (event.target, event.ability) else {
            return Ok(());
        };
        let key = (target, aura);
        let fresh = |kind, stacks| ActiveAura {
            applied_at: event.timestamp,
            stacks,
            kind,
            source: event.source,
        };
        match event.payload {
            EventPayload::BuffApply { aura: kind, stacks } => {
                self.applications = self.applications.saturating_add(1);
                self.open(key, event.timestamp, fresh(kind, stacks.max(1)));
            }
            EventPayload::BuffRefresh { aura: kind } => {
                self.carry(key, event.timestamp, fresh(kind, 1));
            }
            EventPayload::BuffStack { aura: kind, stacks } => {
                self.carry(key, event.timestamp, fresh(kind, stacks));
                if let Some(active) = self.active.get_mut(&key) {
                    active.stacks = stacks;
                }
            }
            EventPayload::BuffRemove { .. } => self.close(key, event.timestamp),
            _ => {}
        }
        Ok(())
    }

    fn on_start(&mut self, event: &Event, _: &DispatchScope<'_>) -> Result<(), HandlerError> {
        self.encounter_start = event.timestamp;
        Ok(())
    }
}

impl Module for BuffTracker {
    const ID: ModuleId = ModuleId::new("buff_tracker");

    fn build(_: &mut BuildContext<'_>) -> Result<Self, BuildError> {
        Ok(Self::default())
    }

    fn register(&self, handlers: &mut Handlers<Self>) {
        handlers
            .on(EventKind::EncounterStart, ActorFilter::Any, Self::on_start)
            .on_each(
                &[
                    EventKind::BuffApply,
                    EventKind::BuffRefresh,
                    EventKind::BuffStack,
                    EventKind::BuffRemove,
                ],
                ActorFilter::Any,
                Self::on_aura,
            );
    }

    fn contribution(&self) -> Contribution {
        let tracked: BTreeSet<_> = self.active.keys().chain(self.closed.keys()).collect();
        Contribution::new()
            .with("applications", Stat::Count(self.applications))
            .with("active_at_end", Stat::Count(self.active.len() as u64))
            .with("auras_tracked", Stat::Count(tracked.len() as u64))
    }
}

// ---------------------------------------------------------------------------
// Uptime
// ---------------------------------------------------------------------------

/// Per-aura uptime on the selected participant.
#[derive(Debug)]
pub struct BuffUptime {
    tracker: Dep<BuffTracker>,
    uptime_ms: BTreeMap<AbilityId, u64>,
    duration_ms: u64,
}

impl BuffUptime {
    fn on_end(&mut self, event: &Event, scope: &DispatchScope<'_>) -> Result<(), HandlerError> {
        let tracker = scope.get(self.tracker)?;
        let selected = scope.encounter().selected();
        self.duration_ms = event
            .timestamp
            .saturating_sub(scope.encounter().bounds().start);
        self.uptime_ms = tracker
            .auras_on(selected)
            .into_iter()
            .map(|aura| (aura, tracker.uptime(selected, aura, event.timestamp)))
            .collect();
        Ok(())
    }

    /// Uptime of one aura as a fraction of the encounter.
    pub fn ratio(&self, aura: AbilityId) -> f64 {
        stats::ratio(
            self.uptime_ms.get(&aura).copied().unwrap_or(0),
            self.duration_ms,
        )
    }
}

impl Module for BuffUptime {
    const ID: ModuleId = ModuleId::new("buff_uptime");
    const DEPENDENCIES: &'static [ModuleId] = &[BuffTracker::ID];

    fn build(ctx: &mut BuildContext<'_>) -> Result<Self, BuildError> {
        Ok(Self {
            tracker: ctx.dependency::<BuffTracker>()?,
            uptime_ms: BTreeMap::new(),
            duration_ms: 0,
        })
    }

    fn register(&self, handlers: &mut Handlers<Self>) {
        handlers.on(EventKind::EncounterEnd, ActorFilter::Any, Self::on_end);
    }

    fn contribution(&self) -> Contribution {
        let mut contribution = Contribution::new()
            .with(
                "uptime_ms",
                Stat::Breakdown(
                    self.uptime_ms
                        .iter()
                        .map(|(aura, ms)| (aura.to_string(), *ms))
                        .collect(),
                ),
            )
            .with("encounter_ms", Stat::Duration(self.duration_ms));
        for aura in self.uptime_ms.keys() {
            contribution = contribution.with(&format!("uptime:{aura}"), Stat::Ratio(self.ratio(*aura)));
        }
        contribution
    }
}
