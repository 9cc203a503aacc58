//! Error types for the tally-core crate.
//!
//! Construction-time problems (bad descriptors, cycles, failing
//! constructors) are fatal and surface as [`ResolveError`] or
//! [`BuildError`]. Handler failures during replay are [`HandlerError`]s and
//! only ever degrade the module that raised them.

use tally_events::InputError;

use crate::module::ModuleId;

/// Errors raised while registering or ordering module descriptors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    /// Two descriptors share an identifier.
    #[error("module `{0}` is registered twice")]
    DuplicateModule(ModuleId),

    /// A descriptor lists itself as a dependency.
    #[error("module `{0}` depends on itself")]
    SelfDependency(ModuleId),

    /// A descriptor lists the same dependency more than once.
    #[error("module `{module}` declares dependency `{dependency}` more than once")]
    DuplicateDependency {
        /// The declaring module.
        module: ModuleId,
        /// The repeated dependency.
        dependency: ModuleId,
    },

    /// A selected module id is not registered.
    #[error("unknown module `{0}`")]
    UnknownModule(String),

    /// A module depends on an id that is not registered.
    #[error("module `{module}` depends on unknown module `{dependency}`")]
    UnknownDependency {
        /// The declaring module.
        module: ModuleId,
        /// The missing dependency.
        dependency: ModuleId,
    },

    /// The dependency graph contains a cycle.
    #[error("dependency cycle: {}", format_cycle(.cycle))]
    DependencyCycle {
        /// Module ids along the cycle, starting and ending at the same id.
        cycle: Vec<ModuleId>,
    },
}

fn format_cycle(cycle: &[ModuleId]) -> String {
    cycle
        .iter()
        .map(|id| id.as_str())
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Errors raised by a module constructor.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// The constructor asked for a module it did not declare.
    #[error("module `{module}` requested undeclared dependency `{dependency}`")]
    UndeclaredDependency {
        /// The requesting module.
        module: ModuleId,
        /// The requested id.
        dependency: ModuleId,
    },

    /// A declared dependency was not built before the requester.
    #[error("module `{module}` requested `{dependency}` before it was built")]
    MissingDependency {
        /// The requesting module.
        module: ModuleId,
        /// The requested id.
        dependency: ModuleId,
    },

    /// The dependency exists but is not of the requested type.
    #[error("module `{module}` requested `{dependency}` with the wrong type")]
    DependencyType {
        /// The requesting module.
        module: ModuleId,
        /// The requested id.
        dependency: ModuleId,
    },

    /// The module's settings section could not be decoded.
    #[error("invalid settings for module `{module}`: {source}")]
    Settings {
        /// The module whose settings failed to decode.
        module: ModuleId,
        /// The underlying decode error.
        source: serde_json::Error,
    },

    /// The constructor rejected the configuration.
    #[error("module `{module}` failed to build: {reason}")]
    Failed {
        /// The failing module.
        module: ModuleId,
        /// Description of the failure.
        reason: String,
    },
}

/// Errors a handler can return during replay.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HandlerError {
    /// A dependency handle did not resolve to an earlier module.
    #[error("dependency `{0}` is not available")]
    MissingDependency(ModuleId),

    /// A bounded queue was full.
    #[error("queue overflow at capacity {capacity}")]
    QueueOverflow {
        /// The queue's fixed capacity.
        capacity: usize,
    },

    /// Module-specific failure.
    #[error("{message}")]
    Failed {
        /// Description of the failure.
        message: String,
    },
}

impl HandlerError {
    /// Shorthand for [`HandlerError::Failed`].
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }
}

/// Errors raised while building or replaying a run.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// The module graph could not be resolved.
    #[error("resolve error: {source}")]
    Resolve {
        /// The underlying resolve error.
        #[from]
        source: ResolveError,
    },

    /// A module constructor failed.
    #[error("build error: {source}")]
    Build {
        /// The underlying build error.
        #[from]
        source: BuildError,
    },

    /// `replay` was called on a run that has already replayed.
    #[error("run has already been replayed")]
    AlreadyReplayed,
}

/// Errors from the top-level analysis entry points.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    /// The raw input document could not be read.
    #[error("input error: {source}")]
    Input {
        /// The underlying input error.
        #[from]
        source: InputError,
    },

    /// Building or replaying the run failed.
    #[error("run error: {source}")]
    Run {
        /// The underlying run error.
        #[from]
        source: RunError,
    },
}
