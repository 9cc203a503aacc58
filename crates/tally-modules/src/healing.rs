//! Healing and absorbs done by the selected participant.

use std::collections::BTreeMap;

use tally_core::{
    ActorFilter, BuildContext, BuildError, DispatchScope, HandlerError, Handlers, Module, ModuleId,
};
use tally_types::{Contribution, Event, EventKind, EventPayload, Stat};

use crate::stats;

/// Effective healing, overhealing, and absorbs.
#[derive(Debug, Default)]
pub struct HealingDone {
    effective: u64,
    overheal: u64,
    absorbs: u64,
    by_ability: BTreeMap<String, u64>,
    duration_ms: u64,
}

impl HealingDone {
    fn on_heal(&mut self, event: &Event, _: &DispatchScope<'_>) -> Result<(), HandlerError> {
        if let EventPayload::Heal { amount, overheal } = event.payload {
            self.effective = self.effective.saturating_add(amount);
            self.overheal = self.overheal.saturating_add(overheal);
            stats::add_to(&mut self.by_ability, stats::ability_key(event.ability), amount);
        }
        Ok(())
    }

    fn on_absorb(&mut self, event: &Event, _: &DispatchScope<'_>) -> Result<(), HandlerError> {
        if let EventPayload::Absorb { amount } = event.payload {
            self.absorbs = self.absorbs.saturating_add(amount);
            stats::add_to(&mut self.by_ability, stats::ability_key(event.ability), amount);
        }
        Ok(())
    }

    fn on_end(&mut self, event: &Event, scope: &DispatchScope<'_>) -> Result<(), HandlerError> {
        self.duration_ms = scope.encounter().bounds().offset(event.timestamp);
        Ok(())
    }
}

impl Module for HealingDone {
    const ID: ModuleId = ModuleId::new("healing_done");

    fn build(_: &mut BuildContext<'_>) -> Result<Self, BuildError> {
        Ok(Self::default())
    }

    fn register(&self, handlers: &mut Handlers<Self>) {
        handlers
            .on(EventKind::Heal, ActorFilter::BySelectedOrPets, Self::on_heal)
            .on(EventKind::Absorb, ActorFilter::BySelectedOrPets, Self::on_absorb)
            .on(EventKind::EncounterEnd, ActorFilter::Any, Self::on_end);
    }

    fn contribution(&self) -> Contribution {
        let total = self.effective.saturating_add(self.absorbs);
        let raw = self.effective.saturating_add(self.overheal);
        Contribution::new()
            .with("effective", Stat::Amount(self.effective))
            .with("overheal", Stat::Amount(self.overheal))
            .with("absorbs", Stat::Amount(self.absorbs))
            .with("hps", Stat::Rate(stats::per_second(total, self.duration_ms)))
            .with("overheal_ratio", Stat::Ratio(stats::ratio(self.overheal, raw)))
            .with("by_ability", Stat::Breakdown(self.by_ability.clone()))
    }
}
