//! The contract every analysis module implements.
//!
//! A module declares its identifier and dependencies as constants, builds
//! itself from a [`BuildContext`], registers explicit handlers for
//! `(event kind, actor filter)` pairs, and reports a [`Contribution`] once
//! replay has finished.
//!
//! ```text
//!  build(ctx) ──► register(handlers) ──► handle(event)* ──► contribution()
//!     │                                        ▲
//!     └── ctx.dependency::<T>() -> Dep<T> ─────┘ scope.get(dep) -> &T
//! ```
//!
//! [`BuildContext`]: crate::context::BuildContext

use std::any::Any;
use std::collections::BTreeMap;
use std::marker::PhantomData;

use tally_types::{Contribution, Event, EventKind};

use crate::context::{BuildContext, DispatchScope, EncounterContext};
use crate::error::{BuildError, HandlerError};

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Stable identifier of an analysis module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModuleId(&'static str);

impl ModuleId {
    /// Wrap a static identifier.
    pub const fn new(id: &'static str) -> Self {
        Self(id)
    }

    /// The identifier as a string.
    pub const fn as_str(self) -> &'static str {
        self.0
    }
}

impl core::fmt::Display for ModuleId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.0)
    }
}

// ---------------------------------------------------------------------------
// Module trait
// ---------------------------------------------------------------------------

/// A unit of analysis logic with declared dependencies and event handlers.
///
/// One instance is built per run. The instance is never shared across runs.
pub trait Module: Any + Sized {
    /// Identifier, unique within a registry.
    const ID: ModuleId;

    /// Identifiers of modules this one reads from. No duplicates, no self.
    const DEPENDENCIES: &'static [ModuleId] = &[];

    /// Construct the module, resolve dependency handles, and decide whether
    /// it is active for this encounter.
    ///
    /// The activity decision must be pure: it may only inspect the context.
    fn build(ctx: &mut BuildContext<'_>) -> Result<Self, BuildError>;

    /// Declare the handlers this module wants. Called once, right after
    /// [`Module::build`]; registrations are static for the run.
    fn register(&self, handlers: &mut Handlers<Self>);

    /// The module's result, computed only from its own accumulated state.
    fn contribution(&self) -> Contribution;
}

/// Typed handle to a dependency, valid for the run that issued it.
pub struct Dep<T> {
    index: usize,
    marker: PhantomData<fn() -> T>,
}

impl<T> Dep<T> {
    pub(crate) const fn new(index: usize) -> Self {
        Self {
            index,
            marker: PhantomData,
        }
    }

    pub(crate) const fn index(self) -> usize {
        self.index
    }
}

impl<T> Clone for Dep<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Dep<T> {}

impl<T> core::fmt::Debug for Dep<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Dep").field("index", &self.index).finish()
    }
}

// ---------------------------------------------------------------------------
// Handler registration
// ---------------------------------------------------------------------------

/// Which events a handler wants, relative to the participant under analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ActorFilter {
    /// Every event of the kind.
    Any,
    /// Events whose source is the selected participant.
    BySelected,
    /// Events whose target is the selected participant.
    ToSelected,
    /// Events whose source is the selected participant or one of its pets.
    BySelectedOrPets,
    /// Events with the selected participant as source or target.
    Involving,
}

impl ActorFilter {
    /// Whether `event` passes this filter.
    pub fn matches(self, event: &Event, encounter: &EncounterContext) -> bool {
        let selected = encounter.selected();
        match self {
            Self::Any => true,
            Self::BySelected => event.source == Some(selected),
            Self::ToSelected => event.target == Some(selected),
            Self::BySelectedOrPets => event
                .source
                .is_some_and(|source| encounter.roster().is_self_or_pet(source, selected)),
            Self::Involving => event.source == Some(selected) || event.target == Some(selected),
        }
    }
}

/// A handler function for module `M`.
pub type Handler<M> = fn(&mut M, &Event, &DispatchScope<'_>) -> Result<(), HandlerError>;

/// The explicit `(kind, filter) -> handler` table of one module.
pub struct Handlers<M> {
    by_kind: BTreeMap<EventKind, Vec<(ActorFilter, Handler<M>)>>,
}

impl<M> Handlers<M> {
    pub(crate) const fn new() -> Self {
        Self {
            by_kind: BTreeMap::new(),
        }
    }

    /// Register `handler` for events of `kind` passing `filter`.
    ///
    /// Several handlers may share a kind; they run in registration order.
    pub fn on(&mut self, kind: EventKind, filter: ActorFilter, handler: Handler<M>) -> &mut Self {
        self.by_kind.entry(kind).or_default().push((filter, handler));
        self
    }

    /// Register the same handler for several kinds.
    pub fn on_each(
        &mut self,
        kinds: &[EventKind],
        filter: ActorFilter,
        handler: Handler<M>,
    ) -> &mut Self {
        for &kind in kinds {
            self.on(kind, filter, handler);
        }
        self
    }

    /// Number of registrations.
    pub fn len(&self) -> usize {
        self.by_kind.values().map(Vec::len).sum()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.by_kind.is_empty()
    }

    fn for_kind(&self, kind: EventKind) -> &[(ActorFilter, Handler<M>)] {
        self.by_kind.get(&kind).map_or(&[], Vec::as_slice)
    }
}

// ---------------------------------------------------------------------------
// Type erasure
// ---------------------------------------------------------------------------

/// Object-safe view of a built module and its handler table.
pub(crate) trait ErasedModule {
    /// The module value itself, for typed downcasts by dependents.
    fn as_any(&self) -> &dyn Any;

    /// Run every matching handler for `event`, stopping at the first error.
    fn dispatch(&mut self, event: &Event, scope: &DispatchScope<'_>) -> Result<(), HandlerError>;

    /// See [`Module::contribution`].
    fn contribution(&self) -> Contribution;
}

struct Instance<M> {
    module: M,
    handlers: Handlers<M>,
}

impl<M: Module> ErasedModule for Instance<M> {
    fn as_any(&self) -> &dyn Any {
        &self.module
    }

    fn dispatch(&mut self, event: &Event, scope: &DispatchScope<'_>) -> Result<(), HandlerError> {
        let kind = event.kind();
        // Lifecycle markers reach every active module regardless of filters.
        let lifecycle = matches!(kind, EventKind::EncounterStart | EventKind::EncounterEnd);
        for &(filter, handler) in self.handlers.for_kind(kind) {
            if lifecycle || filter.matches(event, scope.encounter()) {
                handler(&mut self.module, event, scope)?;
            }
        }
        Ok(())
    }

    fn contribution(&self) -> Contribution {
        self.module.contribution()
    }
}

/// Build `M` and its handler table behind the erased interface.
pub(crate) fn build_erased<M: Module>(
    ctx: &mut BuildContext<'_>,
) -> Result<Box<dyn ErasedModule>, BuildError> {
    let module = M::build(ctx)?;
    let mut handlers = Handlers::new();
    module.register(&mut handlers);
    Ok(Box::new(Instance { module, handlers }))
}
