//! Resource ledgers and spending efficiency.

use std::collections::{BTreeMap, BTreeSet};

use tally_core::{
    ActorFilter, BuildContext, BuildError, Dep, DispatchScope, HandlerError, Handlers, Module,
    ModuleId,
};
use tally_types::{ActorId, Contribution, Event, EventKind, EventPayload, ResourceType, Stat};

use crate::casts::Casts;
use crate::config::ResourceEfficiencySettings;
use crate::stats;

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// Running totals for one resource of one participant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceLedger {
    /// Net change since the start of the encounter.
    pub level: i64,
    /// Sum of all positive changes.
    pub gained: u64,
    /// Sum of all spends.
    pub spent: u64,
    /// Gains lost to the resource cap.
    pub wasted: u64,
}

impl ResourceLedger {
    fn apply(&mut self, change: i64, waste: u64) {
        self.level = self.level.saturating_add(change);
        if change >= 0 {
            self.gained = self.gained.saturating_add(change.unsigned_abs());
        } else {
            self.spent = self.spent.saturating_add(change.unsigned_abs());
        }
        self.wasted = self.wasted.saturating_add(waste);
    }
}

// ---------------------------------------------------------------------------
// Tracker
// ---------------------------------------------------------------------------

/// Per-participant resource ledgers built from resource changes.
#[derive(Debug, Default)]
pub struct ResourceTracker {
    selected: ActorId,
    ledgers: BTreeMap<(ActorId, ResourceType), ResourceLedger>,
}

impl ResourceTracker {
    /// The ledger for one resource of one participant.
    pub fn ledger(&self, actor: ActorId, resource: ResourceType) -> ResourceLedger {
        self.ledgers
            .get(&(actor, resource))
            .copied()
            .unwrap_or_default()
    }

    fn on_change(&mut self, event: &Event, _: &DispatchScope<'_>) -> Result<(), HandlerError> {
        let EventPayload::ResourceChange {
            resource,
            change,
            waste,
        } = event.payload
        else {
            return Ok(());
        };
        let Some(actor) = event.target.or(event.source) else {
            return Ok(());
        };
        self.ledgers
            .entry((actor, resource))
            .or_default()
            .apply(change, waste);
        Ok(())
    }

    fn breakdown_for(
        &self,
        actor: ActorId,
        field: impl Fn(&ResourceLedger) -> u64,
    ) -> BTreeMap<String, u64> {
        self.ledgers
            .iter()
            .filter(|((owner, _), _)| *owner == actor)
            .map(|((_, resource), ledger)| (String::from(resource.log_name()), field(ledger)))
            .collect()
    }
}

impl Module for ResourceTracker {
    const ID: ModuleId = ModuleId::new("resource_tracker");

    fn build(ctx: &mut BuildContext<'_>) -> Result<Self, BuildError> {
        Ok(Self {
            selected: ctx.encounter().selected(),
            ledgers: BTreeMap::new(),
        })
    }

    fn register(&self, handlers: &mut Handlers<Self>) {
        handlers.on(EventKind::ResourceChange, ActorFilter::Any, Self::on_change);
    }

    fn contribution(&self) -> Contribution {
        let actors: BTreeSet<ActorId> = self.ledgers.keys().map(|(actor, _)| *actor).collect();
        let selected = self.selected;
        Contribution::new()
            .with("actors_tracked", Stat::Count(actors.len() as u64))
            .with(
                "gained",
                Stat::Breakdown(self.breakdown_for(selected, |l| l.gained)),
            )
            .with("spent", Stat::Breakdown(self.breakdown_for(selected, |l| l.spent)))
            .with(
                "wasted",
                Stat::Breakdown(self.breakdown_for(selected, |l| l.wasted)),
            )
    }
}

// ---------------------------------------------------------------------------
// Efficiency
// ---------------------------------------------------------------------------

/// Waste and spend efficiency of the selected participant's main resource.
///
/// Runs only when a resource is known, either from settings or from the
/// participant's primary resource.
#[derive(Debug)]
pub struct ResourceEfficiency {
    tracker: Dep<ResourceTracker>,
    casts: Dep<Casts>,
    resource: Option<ResourceType>,
    ledger: ResourceLedger,
    casts_seen: u64,
}

impl ResourceEfficiency {
    fn on_end(&mut self, _: &Event, scope: &DispatchScope<'_>) -> Result<(), HandlerError> {
        let Some(resource) = self.resource else {
            return Ok(());
        };
        let tracker = scope.get(self.tracker)?;
        let casts = scope.get(self.casts)?;
        self.ledger = tracker.ledger(scope.encounter().selected(), resource);
        self.casts_seen = casts.completed();
        Ok(())
    }
}

impl Module for ResourceEfficiency {
    const ID: ModuleId = ModuleId::new("resource_efficiency");
    const DEPENDENCIES: &'static [ModuleId] = &[ResourceTracker::ID, Casts::ID];

    fn build(ctx: &mut BuildContext<'_>) -> Result<Self, BuildError> {
        let settings: ResourceEfficiencySettings = ctx.settings()?;
        let resource = settings
            .resource
            .or_else(|| ctx.selected_participant().and_then(|p| p.primary_resource));
        ctx.set_active(resource.is_some());
        Ok(Self {
            tracker: ctx.dependency::<ResourceTracker>()?,
            casts: ctx.dependency::<Casts>()?,
            resource,
            ledger: ResourceLedger::default(),
            casts_seen: 0,
        })
    }

    fn register(&self, handlers: &mut Handlers<Self>) {
        handlers.on(EventKind::EncounterEnd, ActorFilter::Any, Self::on_end);
    }

    fn contribution(&self) -> Contribution {
        let casts_per_thousand = if self.ledger.spent == 0 {
            0.0
        } else {
            #[allow(clippy::cast_precision_loss)]
            let value = self.casts_seen as f64 * 1_000.0 / self.ledger.spent as f64;
            value
        };
        let mut contribution = Contribution::new()
            .with("gained", Stat::Amount(self.ledger.gained))
            .with("spent", Stat::Amount(self.ledger.spent))
            .with("wasted", Stat::Amount(self.ledger.wasted))
            .with(
                "waste_ratio",
                Stat::Ratio(stats::ratio(self.ledger.wasted, self.ledger.gained)),
            )
            .with("casts_per_1000_spent", Stat::Rate(casts_per_thousand));
        if let Some(resource) = self.resource {
            contribution = contribution.note(format!("resource: {}", resource.log_name()));
        }
        contribution
    }
}
