//! Damage dealt and damage taken by the selected participant.

use std::collections::BTreeMap;

use tally_core::{
    ActorFilter, BuildContext, BuildError, DispatchScope, HandlerError, Handlers, Module, ModuleId,
};
use tally_types::{Contribution, Event, EventKind, EventPayload, Stat};

use crate::config::DamageDoneSettings;
use crate::stats;

/// Damage dealt by the selected participant, pets folded into the owner.
#[derive(Debug, Default)]
pub struct DamageDone {
    include_pets: bool,
    total: u64,
    by_pets: u64,
    by_ability: BTreeMap<String, u64>,
    duration_ms: u64,
}

impl DamageDone {
    /// Damage dealt so far.
    pub const fn total(&self) -> u64 {
        self.total
    }

    /// Whether pet damage is folded into [`DamageDone::total`].
    pub const fn include_pets(&self) -> bool {
        self.include_pets
    }

    fn on_damage(&mut self, event: &Event, scope: &DispatchScope<'_>) -> Result<(), HandlerError> {
        let EventPayload::Damage { amount, .. } = event.payload else {
            return Ok(());
        };
        let selected = scope.encounter().selected();
        if event.source != Some(selected) {
            self.by_pets = self.by_pets.saturating_add(amount);
        }
        self.total = self.total.saturating_add(amount);
        stats::add_to(&mut self.by_ability, stats::ability_key(event.ability), amount);
        Ok(())
    }

    fn on_end(&mut self, event: &Event, scope: &DispatchScope<'_>) -> Result<(), HandlerError> {
        self.duration_ms = scope.encounter().bounds().offset(event.timestamp);
        Ok(())
    }
}

impl Module for DamageDone {
    const ID: ModuleId = ModuleId::new("damage_done");

    fn build(ctx: &mut BuildContext<'_>) -> Result<Self, BuildError> {
        let settings: DamageDoneSettings = ctx.settings()?;
        Ok(Self {
            include_pets: settings.include_pets,
            ..Self::default()
        })
    }

    fn register(&self, handlers: &mut Handlers<Self>) {
        let filter = if self.include_pets {
            ActorFilter::BySelectedOrPets
        } else {
            ActorFilter::BySelected
        };
        handlers
            .on(EventKind::Damage, filter, Self::on_damage)
            .on(EventKind::EncounterEnd, ActorFilter::Any, Self::on_end);
    }

    fn contribution(&self) -> Contribution {
        Contribution::new()
            .with("total", Stat::Amount(self.total))
            .with("pets", Stat::Amount(self.by_pets))
            .with("dps", Stat::Rate(stats::per_second(self.total, self.duration_ms)))
            .with("by_ability", Stat::Breakdown(self.by_ability.clone()))
    }
}

/// Damage taken by the selected participant.
#[derive(Debug, Default)]
pub struct DamageTaken {
    total: u64,
    absorbed: u64,
    by_ability: BTreeMap<String, u64>,
}

impl DamageTaken {
    fn on_damage(&mut self, event: &Event, _: &DispatchScope<'_>) -> Result<(), HandlerError> {
        let EventPayload::Damage {
            amount, absorbed, ..
        } = event.payload
        else {
            return Ok(());
        };
        self.total = self.total.saturating_add(amount);
        self.absorbed = self.absorbed.saturating_add(absorbed);
        stats::add_to(&mut self.by_ability, stats::ability_key(event.ability), amount);
        Ok(())
    }
}

impl Module for DamageTaken {
    const ID: ModuleId = ModuleId::new("damage_taken");

    fn build(_: &mut BuildContext<'_>) -> Result<Self, BuildError> {
        Ok(Self::default())
    }

    fn register(&self, handlers: &mut Handlers<Self>) {
        handlers.on(EventKind::Damage, ActorFilter::ToSelected, Self::on_damage);
    }

    fn contribution(&self) -> Contribution {
        Contribution::new()
            .with("total", Stat::Amount(self.total))
            .with("absorbed", Stat::Amount(self.absorbed))
            .with("by_ability", Stat::Breakdown(self.by_ability.clone()))
    }
}
