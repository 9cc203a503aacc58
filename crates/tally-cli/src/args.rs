//! Command-line parsing.

use std::path::PathBuf;

use crate::error::CliError;

/// Config file read when `--config` is not given.
pub const DEFAULT_CONFIG: &str = "tally-config.yaml";

/// Usage text printed for `--help` and bad invocations.
pub const USAGE: &str = "\
usage: tally [--config <path>] [--selected <actor-id>] <log-file>...

Analyzes each combat-log file (JSON array or JSON lines) for the configured
participant and prints one JSON report per file.

options:
  -c, --config <path>        analysis config (default: tally-config.yaml)
  -s, --selected <actor-id>  override the participant under analysis
  -h, --help                 print this help";

/// Parsed command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliArgs {
    /// Config file to load.
    pub config: PathBuf,
    /// Whether `config` was given explicitly (a missing explicit file is an error).
    pub config_explicit: bool,
    /// Actor id overriding the config's `selected`.
    pub selected: Option<u64>,
    /// Log files to analyze, in command-line order.
    pub logs: Vec<PathBuf>,
    /// `--help` was requested.
    pub help: bool,
}

impl CliArgs {
    /// Parse arguments, excluding the program name.
    pub fn parse(args: impl IntoIterator<Item = String>) -> Result<Self, CliError> {
        let mut parsed = Self {
            config: PathBuf::from(DEFAULT_CONFIG),
            config_explicit: false,
            selected: None,
            logs: Vec::new(),
            help: false,
        };
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "-h" | "--help" => parsed.help = true,
                "-c" | "--config" => {
                    parsed.config = PathBuf::from(value_for(&arg, args.next())?);
                    parsed.config_explicit = true;
                }
                "-s" | "--selected" => {
                    let value = value_for(&arg, args.next())?;
                    let id = value.parse::<u64>().map_err(|e| CliError::Usage {
                        message: format!("invalid actor id {value:?}: {e}"),
                    })?;
                    parsed.selected = Some(id);
                }
                flag if flag.starts_with('-') && flag.len() > 1 => {
                    return Err(CliError::Usage {
                        message: format!("unknown option {flag}"),
                    });
                }
                _ => parsed.logs.push(PathBuf::from(arg)),
            }
        }

        if parsed.logs.is_empty() && !parsed.help {
            return Err(CliError::Usage {
                message: String::from("no log files given"),
            });
        }
        Ok(parsed)
    }
}

fn value_for(flag: &str, value: Option<String>) -> Result<String, CliError> {
    value.ok_or_else(|| CliError::Usage {
        message: format!("{flag} needs a value"),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<CliArgs, CliError> {
        CliArgs::parse(args.iter().map(|s| String::from(*s)))
    }

    #[test]
    fn defaults_to_the_workspace_config() {
        let args = parse(&["pull-1.json", "pull-2.jsonl"]).unwrap();
        assert_eq!(args.config, PathBuf::from(DEFAULT_CONFIG));
        assert!(!args.config_explicit);
        assert_eq!(args.logs.len(), 2);
        assert_eq!(args.selected, None);
    }

    #[test]
    fn reads_options_anywhere() {
        let args = parse(&["a.json", "--config", "raid.yaml", "-s", "42", "b.json"]).unwrap();
        assert_eq!(args.config, PathBuf::from("raid.yaml"));
        assert!(args.config_explicit);
        assert_eq!(args.selected, Some(42));
        assert_eq!(
            args.logs,
            vec![PathBuf::from("a.json"), PathBuf::from("b.json")]
        );
    }

    #[test]
    fn rejects_bad_invocations() {
        assert!(matches!(parse(&[]), Err(CliError::Usage { .. })));
        assert!(matches!(parse(&["--config"]), Err(CliError::Usage { .. })));
        assert!(matches!(parse(&["-s", "boss", "a.json"]), Err(CliError::Usage { .. })));
        assert!(matches!(parse(&["--verbose", "a.json"]), Err(CliError::Usage { .. })));
        assert!(parse(&["--help"]).unwrap().help);
    }
}
