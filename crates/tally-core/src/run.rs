//! One analysis invocation: resolved modules, their instances, and replay.
//!
//! A [`RunContext`] owns everything a single analysis needs. It is built
//! once from a registry, a configuration, and a normalized timeline,
//! replayed exactly once, and then queried for results. Nothing in it is
//! shared with other runs.

use tally_events::NormalizedTimeline;
use tally_types::{
    AnalysisReport, Event, ModuleReport, ModuleStatus, NormalizationStats, RunId,
};
use tracing::debug;

use crate::config::AnalysisConfig;
use crate::context::{BuildContext, EncounterContext};
use crate::dispatch::{Dispatcher, ModuleSlot, ReplaySummary};
use crate::error::RunError;
use crate::module::{Module, ModuleId};
use crate::registry::ModuleRegistry;

/// State of a single analysis run.
pub struct RunContext {
    run_id: RunId,
    encounter: EncounterContext,
    events: Vec<Event>,
    normalization: NormalizationStats,
    slots: Vec<ModuleSlot>,
    summary: Option<ReplaySummary>,
}

impl RunContext {
    /// Resolve the configured modules and build them in dependency order.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::Resolve`] if the module graph is invalid and
    /// [`RunError::Build`] if any constructor fails.
    pub fn build(
        registry: &ModuleRegistry,
        config: &AnalysisConfig,
        timeline: NormalizedTimeline,
    ) -> Result<Self, RunError> {
        let order = registry.resolve(&config.modules.enabled)?;
        let encounter = EncounterContext::new(config.selected, config.roster(), timeline.bounds)
            .with_settings(config.modules.settings.clone());

        let mut slots: Vec<ModuleSlot> = Vec::with_capacity(order.len());
        for descriptor in order {
            let mut ctx = BuildContext::new(
                descriptor.id(),
                descriptor.dependencies(),
                &slots,
                &encounter,
            );
            let instance = descriptor.build(&mut ctx)?;
            let active = ctx.is_active();
            debug!(module = %descriptor.id(), active, "Built module");
            slots.push(ModuleSlot::new(descriptor.id(), instance, active));
        }

        Ok(Self {
            run_id: RunId::new(),
            encounter,
            events: timeline.events,
            normalization: timeline.stats,
            slots,
            summary: None,
        })
    }

    /// Replay the timeline through every active module.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::AlreadyReplayed`] on any call after the first.
    pub fn replay(&mut self) -> Result<ReplaySummary, RunError> {
        if self.summary.is_some() {
            return Err(RunError::AlreadyReplayed);
        }
        let summary = Dispatcher::new(&self.encounter).run(&self.events, &mut self.slots);
        self.summary = Some(summary);
        Ok(summary)
    }

    /// Collect every active or degraded module's contribution.
    ///
    /// Inactive modules are omitted. Calling this before [`RunContext::replay`]
    /// yields the modules' initial state.
    pub fn report(&self) -> AnalysisReport {
        let modules = self
            .slots
            .iter()
            .filter(|slot| slot.status() != ModuleStatus::Inactive)
            .map(|slot| {
                let status = slot.status();
                let report = ModuleReport {
                    status,
                    incomplete: status == ModuleStatus::Degraded,
                    contribution: slot.instance().contribution(),
                    errors: slot.failures().to_vec(),
                };
                (String::from(slot.id().as_str()), report)
            })
            .collect();

        AnalysisReport {
            run_id: self.run_id,
            selected: self.encounter.selected(),
            bounds: self.encounter.bounds(),
            normalization: self.normalization.clone(),
            events_replayed: self.summary.map_or(0, |s| s.events_replayed),
            modules,
        }
    }

    /// Typed access to a built module, active or not.
    pub fn module<T: Module>(&self) -> Option<&T> {
        self.slots
            .iter()
            .find(|slot| slot.id() == T::ID)
            .and_then(|slot| slot.instance().as_any().downcast_ref::<T>())
    }

    /// Status of a module in this run, if it was built.
    pub fn status(&self, id: &str) -> Option<ModuleStatus> {
        self.slots
            .iter()
            .find(|slot| slot.id().as_str() == id)
            .map(ModuleSlot::status)
    }

    /// Module ids in resolved order.
    pub fn order(&self) -> Vec<ModuleId> {
        self.slots.iter().map(ModuleSlot::id).collect()
    }

    /// Identifier of this run.
    pub const fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Shared encounter information.
    pub const fn encounter(&self) -> &EncounterContext {
        &self.encounter
    }

    /// The canonical events this run replays.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Whether [`RunContext::replay`] has run.
    pub const fn is_replayed(&self) -> bool {
        self.summary.is_some()
    }
}
