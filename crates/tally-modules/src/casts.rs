//! Cast accounting and the active-time estimate derived from it.

use std::collections::{BTreeMap, BTreeSet};

use tally_core::{
    ActorFilter, BuildContext, BuildError, Dep, DispatchScope, HandlerError, Handlers, Module,
    ModuleId,
};
use tally_types::{AbilityId, CastOutcome, Contribution, Event, EventKind, EventPayload, Role, Stat};

use crate::config::ActiveTimeSettings;
use crate::stats;

// ---------------------------------------------------------------------------
// Casts
// ---------------------------------------------------------------------------

/// Completed, cancelled, and unfinished casts of the selected participant.
#[derive(Debug, Default)]
pub struct Casts {
    casting: BTreeSet<AbilityId>,
    completed: u64,
    instant: u64,
    cancelled: u64,
    unfinished: u64,
    /// Time spent in cast bars, whatever the outcome.
    cast_time_ms: u64,
    /// Cast-bar time of completed casts only.
    completed_cast_time_ms: u64,
    by_ability: BTreeMap<String, u64>,
}

impl Casts {
    /// Casts that went off, instant or not.
    pub const fn completed(&self) -> u64 {
        self.completed
    }

    /// Casts with no cast bar.
    pub const fn instant(&self) -> u64 {
        self.instant
    }

    /// Milliseconds spent casting.
    pub const fn cast_time_ms(&self) -> u64 {
        self.cast_time_ms
    }

    fn on_begin(&mut self, event: &Event, _: &DispatchScope<'_>) -> Result<(), HandlerError> {
        if let Some(ability) = event.ability {
            self.casting.insert(ability);
        }
        Ok(())
    }

    fn on_cast(&mut self, event: &Event, _: &DispatchScope<'_>) -> Result<(), HandlerError> {
        self.completed = self.completed.saturating_add(1);
        let had_cast_bar = event.ability.is_some_and(|a| self.casting.contains(&a));
        if !had_cast_bar {
            self.instant = self.instant.saturating_add(1);
        }
        stats::add_to(&mut self.by_ability, stats::ability_key(event.ability), 1);
        Ok(())
    }

    fn on_end(&mut self, event: &Event, _: &DispatchScope<'_>) -> Result<(), HandlerError> {
        let EventPayload::CastEnd { outcome, began_at } = event.payload else {
            return Ok(());
        };
        if let Some(ability) = event.ability {
            self.casting.remove(&ability);
        }
        let elapsed = event.timestamp.saturating_sub(began_at);
        self.cast_time_ms = self.cast_time_ms.saturating_add(elapsed);
        match outcome {
            CastOutcome::Completed => {
                self.completed_cast_time_ms = self.completed_cast_time_ms.saturating_add(elapsed);
            }
            CastOutcome::Cancelled => self.cancelled = self.cancelled.saturating_add(1),
            CastOutcome::Unfinished => self.unfinished = self.unfinished.saturating_add(1),
        }
        Ok(())
    }
}

impl Module for Casts {
    const ID: ModuleId = ModuleId::new("casts");

    fn build(_: &mut BuildContext<'_>) -> Result<Self, BuildError> {
        Ok(Self::default())
    }

    fn register(&self, handlers: &mut Handlers<Self>) {
        handlers
            .on(EventKind::CastBegin, ActorFilter::BySelected, Self::on_begin)
            .on(EventKind::Cast, ActorFilter::BySelected, Self::on_cast)
            .on(EventKind::CastEnd, ActorFilter::BySelected, Self::on_end);
    }

    fn contribution(&self) -> Contribution {
        let cast_bar = self.completed.saturating_sub(self.instant);
        let average = self
            .completed_cast_time_ms
            .checked_div(cast_bar)
            .unwrap_or(0);
        Contribution::new()
            .with("casts", Stat::Count(self.completed))
            .with("instant", Stat::Count(self.instant))
            .with("cancelled", Stat::Count(self.cancelled))
            .with("unfinished", Stat::Count(self.unfinished))
            .with("average_cast_time", Stat::Duration(average))
            .with("by_ability", Stat::Breakdown(self.by_ability.clone()))
    }
}

// ---------------------------------------------------------------------------
// Active time
// ---------------------------------------------------------------------------

/// Share of the encounter the selected participant spent casting.
///
/// Not meaningful for tanks, whose uptime is not cast-driven, so the module
/// switches itself off for them.
#[derive(Debug)]
pub struct ActiveTime {
    casts: Dep<Casts>,
    gcd_ms: u64,
    active_ms: u64,
    duration_ms: u64,
}

impl ActiveTime {
    fn on_end(&mut self, event: &Event, scope: &DispatchScope<'_>) -> Result<(), HandlerError> {
        let casts = scope.get(self.casts)?;
        self.duration_ms = scope.encounter().bounds().offset(event.timestamp);
        self.active_ms = casts
            .cast_time_ms()
            .saturating_add(casts.instant().saturating_mul(self.gcd_ms))
            .min(self.duration_ms);
        Ok(())
    }
}

impl Module for ActiveTime {
    const ID: ModuleId = ModuleId::new("active_time");
    const DEPENDENCIES: &'static [ModuleId] = &[Casts::ID];

    fn build(ctx: &mut BuildContext<'_>) -> Result<Self, BuildError> {
        let settings: ActiveTimeSettings = ctx.settings()?;
        let is_tank = ctx
            .selected_participant()
            .is_some_and(|p| p.role == Some(Role::Tank));
        ctx.set_active(!is_tank);
        Ok(Self {
            casts: ctx.dependency::<Casts>()?,
            gcd_ms: settings.gcd_ms,
            active_ms: 0,
            duration_ms: 0,
        })
    }

    fn register(&self, handlers: &mut Handlers<Self>) {
        handlers.on(EventKind::EncounterEnd, ActorFilter::Any, Self::on_end);
    }

    fn contribution(&self) -> Contribution {
        Contribution::new()
            .with("active_time", Stat::Duration(self.active_ms))
            .with(
                "active_ratio",
                Stat::Ratio(stats::ratio(self.active_ms, self.duration_ms)),
            )
    }
}
