//! Damage dealt inside cooldown windows.
//!
//! A window is the span during which a configured aura is up on the
//! selected participant. Hits landing inside a window are buffered and
//! summed when the window closes, or at the end of the encounter if it
//! never does.

use tally_core::{
    ActorFilter, BoundedQueue, BuildContext, BuildError, Dep, DispatchScope, HandlerError,
    Handlers, Module, ModuleId,
};
use tally_types::{AbilityId, Contribution, Event, EventKind, EventPayload, Stat, Timestamp};
use tracing::debug;

use crate::buffs::BuffTracker;
use crate::config::CooldownWindowsSettings;
use crate::damage::DamageDone;
use crate::stats;

/// One closed window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    /// When the aura went up.
    pub opened_at: Timestamp,
    /// When the aura dropped, or the encounter ended.
    pub closed_at: Timestamp,
    /// Damage landed inside the window.
    pub damage: u64,
    /// Hits landed inside the window.
    pub hits: u64,
}

/// Damage dealt while a cooldown aura is up.
#[derive(Debug)]
pub struct CooldownWindows {
    tracker: Dep<BuffTracker>,
    damage: Dep<DamageDone>,
    aura: AbilityId,
    pending: BoundedQueue<u64>,
    opened_at: Option<Timestamp>,
    windows: Vec<Window>,
    total_damage: u64,
}

impl CooldownWindows {
    /// Windows closed so far, in order.
    pub fn windows(&self) -> &[Window] {
        &self.windows
    }

    fn flush(&mut self, closed_at: Timestamp) {
        let Some(opened_at) = self.opened_at.take() else {
            self.pending.clear();
            return;
        };
        let (damage, hits) = self.pending.flush((0_u64, 0_u64), |(sum, n), amount| {
            (sum.saturating_add(amount), n.saturating_add(1))
        });
        debug!(
            aura = %self.aura,
            opened_at,
            closed_at,
            damage,
            hits,
            "Cooldown window closed"
        );
        self.windows.push(Window {
            opened_at,
            closed_at,
            damage,
            hits,
        });
    }

    fn on_damage(&mut self, event: &Event, scope: &DispatchScope<'_>) -> Result<(), HandlerError> {
        let EventPayload::Damage { amount, .. } = event.payload else {
            return Ok(());
        };
        let selected = scope.encounter().selected();
        // Same pet basis as the damage total.
        if event.source != Some(selected) && !scope.get(self.damage)?.include_pets() {
            return Ok(());
        }
        if scope.get(self.tracker)?.is_active(selected, self.aura, None) {
            self.pending.push(amount)?;
        }
        Ok(())
    }

    fn on_aura(&mut self, event: &Event, _: &DispatchScope<'_>) -> Result<(), HandlerError> {
        if event.ability != Some(self.aura) {
            return Ok(());
        }
        match event.kind() {
            // A reapply while up extends the running window.
            EventKind::BuffApply => {
                self.opened_at.get_or_insert(event.timestamp);
            }
            EventKind::BuffRemove => self.flush(event.timestamp),
            _ => {}
        }
        Ok(())
    }

    fn on_end(&mut self, event: &Event, scope: &DispatchScope<'_>) -> Result<(), HandlerError> {
        if self.opened_at.is_some() {
            self.flush(event.timestamp);
        }
        self.total_damage = scope.get(self.damage)?.total();
        Ok(())
    }
}

impl Module for CooldownWindows {
    const ID: ModuleId = ModuleId::new("cooldown_windows");
    const DEPENDENCIES: &'static [ModuleId] = &[BuffTracker::ID, DamageDone::ID];

    fn build(ctx: &mut BuildContext<'_>) -> Result<Self, BuildError> {
        let settings: CooldownWindowsSettings = ctx.settings()?;
        let talent_held = settings.talent.is_none_or(|talent| {
            ctx.selected_participant()
                .is_some_and(|p| p.has_talent(talent))
        });
        ctx.set_active(settings.aura.is_some() && talent_held);
        Ok(Self {
            tracker: ctx.dependency::<BuffTracker>()?,
            damage: ctx.dependency::<DamageDone>()?,
            aura: settings.aura.unwrap_or_default(),
            pending: BoundedQueue::new(settings.capacity),
            opened_at: None,
            windows: Vec::new(),
            total_damage: 0,
        })
    }

    fn register(&self, handlers: &mut Handlers<Self>) {
        handlers
            .on(EventKind::Damage, ActorFilter::BySelectedOrPets, Self::on_damage)
            .on_each(
                &[EventKind::BuffApply, EventKind::BuffRemove],
                ActorFilter::ToSelected,
                Self::on_aura,
            )
            .on(EventKind::EncounterEnd, ActorFilter::Any, Self::on_end);
    }

    fn contribution(&self) -> Contribution {
        let window_damage = self
            .windows
            .iter()
            .fold(0_u64, |acc, w| acc.saturating_add(w.damage));
        let best = self.windows.iter().map(|w| w.damage).max().unwrap_or(0);
        let window_ms = self.windows.iter().fold(0_u64, |acc, w| {
            acc.saturating_add(w.closed_at.saturating_sub(w.opened_at))
        });
        Contribution::new()
            .with("windows", Stat::Count(self.windows.len() as u64))
            .with("window_damage", Stat::Amount(window_damage))
            .with("best_window", Stat::Amount(best))
            .with("window_time", Stat::Duration(window_ms))
            .with(
                "damage_share",
                Stat::Ratio(stats::ratio(window_damage, self.total_damage)),
            )
    }
}
