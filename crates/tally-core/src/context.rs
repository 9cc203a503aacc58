//! Contexts handed to modules at build time and during dispatch.
//!
//! [`EncounterContext`] is the read-only information shared by every module
//! of a run. [`BuildContext`] adds dependency lookup and the activity flag
//! for the module being constructed. [`DispatchScope`] gives handlers the
//! current simulated time and shared access to modules earlier in the
//! resolved order.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use tally_types::{ActorId, EncounterBounds, ModuleStatus, Participant, Roster, Timestamp};

use crate::dispatch::ModuleSlot;
use crate::error::{BuildError, HandlerError};
use crate::module::{Dep, Module, ModuleId};

// ---------------------------------------------------------------------------
// Encounter
// ---------------------------------------------------------------------------

/// Static information about the encounter under analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct EncounterContext {
    selected: ActorId,
    roster: Roster,
    bounds: EncounterBounds,
    settings: BTreeMap<String, serde_json::Value>,
}

impl EncounterContext {
    /// Create a context with no module settings.
    pub const fn new(selected: ActorId, roster: Roster, bounds: EncounterBounds) -> Self {
        Self {
            selected,
            roster,
            bounds,
            settings: BTreeMap::new(),
        }
    }

    /// Attach per-module settings, keyed by module id.
    #[must_use]
    pub fn with_settings(mut self, settings: BTreeMap<String, serde_json::Value>) -> Self {
        self.settings = settings;
        self
    }

    /// The participant under analysis.
    pub const fn selected(&self) -> ActorId {
        self.selected
    }

    /// Roster entry of the participant under analysis, if configured.
    pub fn selected_participant(&self) -> Option<&Participant> {
        self.roster.get(self.selected)
    }

    /// All known participants.
    pub const fn roster(&self) -> &Roster {
        &self.roster
    }

    /// Encounter boundaries.
    pub const fn bounds(&self) -> EncounterBounds {
        self.bounds
    }

    /// Raw settings section for one module.
    pub fn settings_for(&self, module: ModuleId) -> Option<&serde_json::Value> {
        self.settings.get(module.as_str())
    }
}

// ---------------------------------------------------------------------------
// Build
// ---------------------------------------------------------------------------

/// What a module constructor sees.
pub struct BuildContext<'a> {
    module: ModuleId,
    declared: &'static [ModuleId],
    built: &'a [ModuleSlot],
    encounter: &'a EncounterContext,
    active: bool,
}

impl<'a> BuildContext<'a> {
    pub(crate) const fn new(
        module: ModuleId,
        declared: &'static [ModuleId],
        built: &'a [ModuleSlot],
        encounter: &'a EncounterContext,
    ) -> Self {
        Self {
            module,
            declared,
            built,
            encounter,
            active: true,
        }
    }

    /// Resolve a typed handle to a declared dependency.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::UndeclaredDependency`] if `T` is not in the
    /// module's declared list, [`BuildError::MissingDependency`] if it has
    /// not been built, and [`BuildError::DependencyType`] if the module
    /// registered under `T::ID` is not a `T`.
    pub fn dependency<T: Module>(&self) -> Result<Dep<T>, BuildError> {
        if !self.declared.contains(&T::ID) {
            return Err(BuildError::UndeclaredDependency {
                module: self.module,
                dependency: T::ID,
            });
        }
        let (index, slot) = self
            .built
            .iter()
            .enumerate()
            .find(|(_, slot)| slot.id() == T::ID)
            .ok_or(BuildError::MissingDependency {
                module: self.module,
                dependency: T::ID,
            })?;
        if !slot.instance().as_any().is::<T>() {
            return Err(BuildError::DependencyType {
                module: self.module,
                dependency: T::ID,
            });
        }
        Ok(Dep::new(index))
    }

    /// Whether a resolved dependency is itself active.
    pub fn dependency_status<T: Module>(&self, dep: Dep<T>) -> ModuleStatus {
        self.built
            .get(dep.index())
            .map_or(ModuleStatus::Inactive, ModuleSlot::status)
    }

    /// Decode this module's settings section, or its default when absent.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Settings`] if the section does not decode as `S`.
    pub fn settings<S: DeserializeOwned + Default>(&self) -> Result<S, BuildError> {
        match self.encounter.settings_for(self.module) {
            Some(value) => {
                serde_json::from_value(value.clone()).map_err(|source| BuildError::Settings {
                    module: self.module,
                    source,
                })
            }
            None => Ok(S::default()),
        }
    }

    /// The module being built.
    pub const fn module(&self) -> ModuleId {
        self.module
    }

    /// Shared encounter information.
    pub const fn encounter(&self) -> &EncounterContext {
        self.encounter
    }

    /// Roster entry of the participant under analysis, if configured.
    pub fn selected_participant(&self) -> Option<&Participant> {
        self.encounter.selected_participant()
    }

    /// Decide whether the module receives events this run. Defaults to active.
    pub const fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    pub(crate) const fn is_active(&self) -> bool {
        self.active
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// What a handler sees besides its own module and the event.
pub struct DispatchScope<'a> {
    encounter: &'a EncounterContext,
    now: Timestamp,
    earlier: &'a [ModuleSlot],
}

impl<'a> DispatchScope<'a> {
    pub(crate) const fn new(
        encounter: &'a EncounterContext,
        now: Timestamp,
        earlier: &'a [ModuleSlot],
    ) -> Self {
        Self {
            encounter,
            now,
            earlier,
        }
    }

    /// Live state of a dependency, already updated for the current event.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError::MissingDependency`] if the handle does not
    /// point at an earlier module of type `T`.
    pub fn get<T: Module>(&self, dep: Dep<T>) -> Result<&'a T, HandlerError> {
        self.earlier
            .get(dep.index())
            .and_then(|slot| slot.instance().as_any().downcast_ref::<T>())
            .ok_or(HandlerError::MissingDependency(T::ID))
    }

    /// Current status of a dependency.
    pub fn status<T: Module>(&self, dep: Dep<T>) -> ModuleStatus {
        self.earlier
            .get(dep.index())
            .map_or(ModuleStatus::Inactive, ModuleSlot::status)
    }

    /// Current simulated time.
    pub const fn now(&self) -> Timestamp {
        self.now
    }

    /// Shared encounter information.
    pub const fn encounter(&self) -> &'a EncounterContext {
        self.encounter
    }
}
