//! CLI argument parsing via clap.

use clap::Parser;
use pilot::build_info::{HELP_BUILD_METADATA, LONG_VERSION};

/// Interactive session controller for a terminal coding agent.
#[derive(Debug, Parser)]
#[command(
    name = "pilot",
    version,
    long_version = LONG_VERSION,
    after_help = HELP_BUILD_METADATA
)]
pub struct Args {
    /// Prompt to send. If provided, runs in one-shot mode and exits when idle.
    pub prompt: Option<String>,

    /// Path to config file (default: ./pilot.toml or ~/.config/pilot/pilot.toml).
    #[arg(short = 'c', long = "config")]
    pub config: Option<String>,

    /// Start in Plan mode (tool calls are refused).
    #[arg(long = "plan")]
    pub plan: bool,

    /// Write logs to this file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH")]
    pub log_file: Option<String>,

    /// Override the auto-compact token threshold.
    #[arg(long = "compact-threshold", value_name = "TOKENS")]
    pub compact_threshold: Option<u64>,

    /// Disable color output.
    #[arg(long = "no-color")]
    pub no_color: bool,
}

#[cfg(test)]
mod tests {
    use super::Args;
    use clap::Parser;

    #[test]
    fn prompt_is_optional() {
        let args = Args::parse_from(["pilot"]);
        assert!(args.prompt.is_none());
        assert!(!args.plan);
    }

    #[test]
    fn one_shot_with_overrides() {
        let args = Args::parse_from([
            "pilot",
            "--plan",
            "--compact-threshold",
            "5000",
            "-c",
            "dev.toml",
            "explain this repo",
        ]);
        assert_eq!(args.prompt.as_deref(), Some("explain this repo"));
        assert!(args.plan);
        assert_eq!(args.compact_threshold, Some(5000));
        assert_eq!(args.config.as_deref(), Some("dev.toml"));
    }

    #[test]
    fn threshold_must_be_a_number() {
        let err = Args::try_parse_from(["pilot", "--compact-threshold", "lots"])
            .expect_err("non-numeric threshold");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }
}
