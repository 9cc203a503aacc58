//! Analysis configuration loaded from YAML.
//!
//! The canonical configuration lives in `tally-config.yaml`. It names the
//! participant under analysis, the roster with static attributes, which
//! modules run and their settings, optional encounter boundary overrides,
//! and the log level.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use tally_events::Normalizer;
use tally_types::{ActorId, Participant, Roster, Timestamp};

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level analysis configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AnalysisConfig {
    /// The participant whose performance is analyzed.
    #[serde(default)]
    pub selected: ActorId,

    /// Static participant attributes for the encounter.
    #[serde(default)]
    pub participants: Vec<Participant>,

    /// Module selection and per-module settings.
    #[serde(default)]
    pub modules: ModulesConfig,

    /// Optional encounter boundary overrides.
    #[serde(default)]
    pub encounter: EncounterOverride,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AnalysisConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML for this shape.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string. `TALLY_LOG` overrides the
    /// log level.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.logging.apply_env_overrides();
        Ok(config)
    }

    /// A config analyzing `selected` with the given roster and defaults elsewhere.
    pub fn for_participant(selected: ActorId, participants: Vec<Participant>) -> Self {
        Self {
            selected,
            participants,
            ..Self::default()
        }
    }

    /// The roster built from `participants`.
    pub fn roster(&self) -> Roster {
        Roster::new(self.participants.iter().cloned())
    }

    /// A normalizer applying the configured boundary overrides.
    pub const fn normalizer(&self) -> Normalizer {
        let mut normalizer = Normalizer::new();
        if let Some(start) = self.encounter.start {
            normalizer = normalizer.with_start(start);
        }
        if let Some(end) = self.encounter.end {
            normalizer = normalizer.with_end(end);
        }
        normalizer
    }
}

/// Which modules run and how they are configured.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ModulesConfig {
    /// Module ids to run. Dependencies are added automatically; an empty
    /// list runs every registered module.
    #[serde(default)]
    pub enabled: Vec<String>,

    /// Per-module settings keyed by module id, decoded by each module.
    #[serde(default)]
    pub settings: BTreeMap<String, serde_json::Value>,
}

/// Encounter boundary overrides. Unset ends are derived from the log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct EncounterOverride {
    /// Encounter start in log milliseconds.
    #[serde(default)]
    pub start: Option<Timestamp>,

    /// Encounter end in log milliseconds.
    #[serde(default)]
    pub end: Option<Timestamp>,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON log lines instead of human-readable ones.
    #[serde(default)]
    pub json: bool,
}

impl LoggingConfig {
    /// Apply the `TALLY_LOG` environment variable over the file value.
    pub fn apply_env_overrides(&mut self) {
        self.override_level(std::env::var("TALLY_LOG").ok());
    }

    fn override_level(&mut self, level: Option<String>) {
        if let Some(level) = level {
            self.level = level;
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    String::from("info")
}
