//! Deaths and resurrections of the selected participant.

use tally_core::{
    ActorFilter, BuildContext, BuildError, DispatchScope, HandlerError, Handlers, Module, ModuleId,
};
use tally_types::{Contribution, Event, EventKind, Stat, Timestamp};

/// Death count and time spent dead.
#[derive(Debug, Default)]
pub struct Deaths {
    deaths: u64,
    resurrects: u64,
    died_at: Option<Timestamp>,
    time_dead_ms: u64,
}

impl Deaths {
    fn revive(&mut self, at: Timestamp) {
        if let Some(died_at) = self.died_at.take() {
            self.time_dead_ms = self.time_dead_ms.saturating_add(at.saturating_sub(died_at));
        }
    }

    fn on_death(&mut self, event: &Event, _: &DispatchScope<'_>) -> Result<(), HandlerError> {
        self.deaths = self.deaths.saturating_add(1);
        // A second death without a resurrect keeps the first timestamp.
        self.died_at.get_or_insert(event.timestamp);
        Ok(())
    }

    fn on_resurrect(&mut self, event: &Event, _: &DispatchScope<'_>) -> Result<(), HandlerError> {
        self.resurrects = self.resurrects.saturating_add(1);
        self.revive(event.timestamp);
        Ok(())
    }

    fn on_end(&mut self, event: &Event, _: &DispatchScope<'_>) -> Result<(), HandlerError> {
        self.revive(event.timestamp);
        Ok(())
    }
}

impl Module for Deaths {
    const ID: ModuleId = ModuleId::new("deaths");

    fn build(_: &mut BuildContext<'_>) -> Result<Self, BuildError> {
        Ok(Self::default())
    }

    fn register(&self, handlers: &mut Handlers<Self>) {
        handlers
            .on(EventKind::Death, ActorFilter::ToSelected, Self::on_death)
            .on(EventKind::Resurrect, ActorFilter::ToSelected, Self::on_resurrect)
            .on(EventKind::EncounterEnd, ActorFilter::Any, Self::on_end);
    }

    fn contribution(&self) -> Contribution {
        Contribution::new()
            .with("deaths", Stat::Count(self.deaths))
            .with("resurrects", Stat::Count(self.resurrects))
            .with("time_dead", Stat::Duration(self.time_dead_ms))
    }
}
