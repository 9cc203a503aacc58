//! Top-level entry points chaining normalize, build, replay, and report.

use tally_events::{NormalizedTimeline, parse_records};
use tally_types::{AnalysisReport, RawRecord};
use tracing::info;

use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, RunError};
use crate::registry::ModuleRegistry;
use crate::run::RunContext;

/// Analyze raw records for the configured participant.
///
/// # Errors
///
/// Returns [`AnalysisError::Run`] if the module graph cannot be resolved
/// or a module fails to build. Malformed records and handler failures are
/// never errors; they are reported in the result.
pub fn analyze(
    registry: &ModuleRegistry,
    config: &AnalysisConfig,
    records: impl IntoIterator<Item = RawRecord>,
) -> Result<AnalysisReport, AnalysisError> {
    let timeline = config.normalizer().normalize(records);
    Ok(analyze_timeline(registry, config, timeline)?)
}

/// Analyze a JSON array or JSON-lines document.
///
/// # Errors
///
/// Returns [`AnalysisError::Input`] if the document is a broken JSON array,
/// otherwise as [`analyze`].
pub fn analyze_text(
    registry: &ModuleRegistry,
    config: &AnalysisConfig,
    text: &str,
) -> Result<AnalysisReport, AnalysisError> {
    let parsed = parse_records(text)?;
    let timeline = config.normalizer().normalize_parsed(parsed);
    Ok(analyze_timeline(registry, config, timeline)?)
}

/// Analyze an already normalized timeline.
///
/// # Errors
///
/// See [`RunContext::build`].
pub fn analyze_timeline(
    registry: &ModuleRegistry,
    config: &AnalysisConfig,
    timeline: NormalizedTimeline,
) -> Result<AnalysisReport, RunError> {
    let mut run = RunContext::build(registry, config, timeline)?;
    info!(
        run_id = %run.run_id(),
        selected = %config.selected,
        modules = run.order().len(),
        events = run.events().len(),
        "Analysis starting"
    );

    let summary = run.replay()?;
    let report = run.report();
    info!(
        run_id = %report.run_id,
        events = summary.events_replayed,
        degraded = summary.degraded,
        dropped = report.normalization.dropped(),
        "Analysis complete"
    );
    Ok(report)
}
