//! Command-line runner for the Tally analysis engine.
//!
//! Loads the analysis configuration, analyzes every log file given on the
//! command line, and prints the reports as one JSON array on stdout. Logs
//! go to stderr.
//!
//! # Startup Sequence
//!
//! 1. Parse arguments
//! 2. Load configuration from `tally-config.yaml` (or `--config`)
//! 3. Initialize structured logging (tracing)
//! 4. Build the default module registry
//! 5. Analyze each file on the blocking pool, one run per file
//! 6. Print the reports in command-line order

mod args;
mod error;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tally_core::{AnalysisConfig, ModuleRegistry};
use tally_types::{ActorId, AnalysisReport};
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::args::{CliArgs, USAGE};
use crate::error::CliError;

/// One analyzed file in the output array.
#[derive(Debug, Serialize)]
struct FileReport {
    /// The log file, as given on the command line.
    file: PathBuf,
    /// When the analysis finished.
    generated_at: DateTime<Utc>,
    /// The analysis result.
    report: AnalysisReport,
}

/// Application entry point.
///
/// # Errors
///
/// Returns an error for bad arguments, an unreadable config, or when any
/// log file fails to analyze. Reports for the files that succeeded are
/// still printed.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Parse arguments.
    let args = CliArgs::parse(std::env::args().skip(1)).inspect_err(|_| eprintln!("{USAGE}"))?;
    if args.help {
        println!("{USAGE}");
        return Ok(());
    }

    // 2. Load configuration.
    let (mut config, config_found) = load_config(&args)?;
    if let Some(selected) = args.selected {
        config.selected = ActorId(selected);
    }

    // 3. Initialize structured logging.
    init_logging(&config);
    if !config_found {
        info!(path = %args.config.display(), "Config file not found, using defaults");
    }
    info!(
        selected = %config.selected,
        participants = config.participants.len(),
        enabled = config.modules.enabled.len(),
        files = args.logs.len(),
        "tally starting"
    );

    // 4. Build the module registry.
    let registry = Arc::new(tally_modules::default_registry()?);
    let config = Arc::new(config);

    // 5. Analyze every file concurrently. Each task owns its own run.
    let total = args.logs.len();
    let mut tasks = JoinSet::new();
    for (index, path) in args.logs.into_iter().enumerate() {
        let registry = Arc::clone(&registry);
        let config = Arc::clone(&config);
        tasks.spawn_blocking(move || (index, analyze_file(&registry, &config, path)));
    }

    let mut reports = Vec::with_capacity(total);
    let mut failed: usize = 0;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, Ok(report))) => reports.push((index, report)),
            Ok((_, Err(e))) => {
                error!(error = %e, "Log file skipped");
                failed = failed.saturating_add(1);
            }
            Err(e) => {
                return Err(CliError::Task {
                    message: format!("{e}"),
                }
                .into());
            }
        }
    }

    // 6. Print in command-line order.
    reports.sort_by_key(|(index, _)| *index);
    let reports: Vec<FileReport> = reports.into_iter().map(|(_, report)| report).collect();
    println!("{}", render(&reports)?);

    info!(analyzed = reports.len(), failed, "tally finished");
    if failed > 0 {
        return Err(CliError::Incomplete { failed, total }.into());
    }
    Ok(())
}

/// Load the analysis configuration.
///
/// A missing default config falls back to defaults; a missing file named
/// with `--config` is an error. The flag says whether a file was read.
fn load_config(args: &CliArgs) -> Result<(AnalysisConfig, bool), CliError> {
    if args.config_explicit || args.config.exists() {
        Ok((AnalysisConfig::from_file(&args.config)?, true))
    } else {
        let mut config = AnalysisConfig::default();
        config.logging.apply_env_overrides();
        Ok((config, false))
    }
}

/// Install the global subscriber. `RUST_LOG` wins over the config level.
fn init_logging(config: &AnalysisConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);
    if config.logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Read and analyze one log file.
fn analyze_file(
    registry: &ModuleRegistry,
    config: &AnalysisConfig,
    path: PathBuf,
) -> Result<FileReport, CliError> {
    let text = read_log(&path)?;
    let report = tally_core::analyze_text(registry, config, &text).map_err(|source| {
        CliError::Analysis {
            path: path.clone(),
            source,
        }
    })?;
    if !report.degraded().is_empty() {
        warn!(
            file = %path.display(),
            degraded = ?report.degraded(),
            "Some modules degraded; their results are incomplete"
        );
    }
    Ok(FileReport {
        file: path,
        generated_at: Utc::now(),
        report,
    })
}

/// Serialize the reports as one pretty-printed JSON array.
fn render(reports: &[FileReport]) -> Result<String, CliError> {
    Ok(serde_json::to_string_pretty(reports)?)
}

fn read_log(path: &Path) -> Result<String, CliError> {
    std::fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })
}
