//! Error types for the `tally` binary.
//!
//! [`CliError`] wraps every failure mode between reading arguments and
//! printing the last report, so `main` can propagate with `?`.

use std::path::PathBuf;

/// Top-level error for the `tally` binary.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// The command line could not be understood.
    #[error("usage error: {message}")]
    Usage {
        /// What was wrong with the arguments.
        message: String,
    },

    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: tally_core::ConfigError,
    },

    /// The module registry could not be assembled.
    #[error("registry error: {source}")]
    Registry {
        /// The underlying resolution error.
        #[from]
        source: tally_core::ResolveError,
    },

    /// A log file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        /// The file that failed.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Analysis of a log file failed.
    #[error("analysis of {} failed: {source}", path.display())]
    Analysis {
        /// The file that failed.
        path: PathBuf,
        /// The underlying analysis error.
        source: tally_core::AnalysisError,
    },

    /// A blocking analysis task panicked or was cancelled.
    #[error("analysis task failed: {message}")]
    Task {
        /// Description of the task failure.
        message: String,
    },

    /// Reports could not be serialized.
    #[error("output error: {source}")]
    Output {
        /// The underlying serialization error.
        #[from]
        source: serde_json::Error,
    },

    /// Some files could not be analyzed; the rest were reported.
    #[error("{failed} of {total} log files failed")]
    Incomplete {
        /// Files that failed.
        failed: usize,
        /// Files given on the command line.
        total: usize,
    },
}
