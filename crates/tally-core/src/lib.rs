//! Module orchestration and deterministic event replay for Tally.
//!
//! This crate turns a normalized timeline into per-module results:
//! modules are resolved in dependency order, built with typed handles to
//! their dependencies, fed every canonical event through explicit handler
//! registrations, and finally asked for their contributions.
//!
//! # Modules
//!
//! - [`module`] -- The [`Module`] trait, handler tables, and actor filters
//! - [`context`] -- Encounter, build, and dispatch contexts
//! - [`registry`] -- [`ModuleRegistry`] and dependency resolution
//! - [`dispatch`] -- The [`Dispatcher`] and per-module failure isolation
//! - [`queue`] -- [`BoundedQueue`] for deferred, window-based analysis
//! - [`run`] -- [`RunContext`], one per analysis invocation
//! - [`config`] -- YAML configuration loading
//! - [`analysis`] -- [`analyze`] and friends, the top-level entry points
//! - [`error`] -- Error types

pub mod analysis;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod module;
pub mod queue;
pub mod registry;
pub mod run;

pub use analysis::{analyze, analyze_text, analyze_timeline};
pub use config::{AnalysisConfig, ConfigError, EncounterOverride, LoggingConfig, ModulesConfig};
pub use context::{BuildContext, DispatchScope, EncounterContext};
pub use dispatch::{Dispatcher, ModuleSlot, ReplaySummary};
pub use error::{AnalysisError, BuildError, HandlerError, ResolveError, RunError};
pub use module::{ActorFilter, Dep, Handler, Handlers, Module, ModuleId};
pub use queue::BoundedQueue;
pub use registry::{ModuleDescriptor, ModuleRegistry};
pub use run::RunContext;
