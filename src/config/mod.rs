//! Configuration loading from TOML files and environment variables.
//!
//! Config is loaded in this order of precedence (highest wins):
//! 1. Environment variables (`PILOT_COMPACT_THRESHOLD`,
//!    `PILOT_RETRY_MAX_ATTEMPTS`, `PILOT_APPROVAL_TIMEOUT_SECS`)
//! 2. TOML file specified via `--config`
//! 3. `./pilot.toml` in the current directory
//! 4. `$XDG_CONFIG_HOME/pilot/pilot.toml` (or `~/.config/pilot/pilot.toml`)
//! 5. Built-in defaults

use crate::error::ConfigError;
use std::path::{Path, PathBuf};

mod defaults;
mod env;
mod types;

use defaults::CONFIG_FILE_NAME;
use env::apply_env_overrides;
pub use types::{ApprovalConfig, BackoffPolicy, CompactionConfig, Config, RetryConfig};

/// Where the effective config text came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Explicit(PathBuf),
    Local,
    Global(PathBuf),
    BuiltInDefaults,
}

/// Load configuration from disk and environment.
///
/// `path_override` is an explicit config file path (from `--config`).
pub fn load_config(path_override: Option<&str>) -> Result<(Config, ConfigSource), ConfigError> {
    load_config_from_sources(
        path_override,
        |path| std::fs::read_to_string(path),
        |name| std::env::var(name).ok(),
        config_root_dir,
    )
}

fn load_config_from_sources<FRead, FEnv, FRoot>(
    path_override: Option<&str>,
    read_file: FRead,
    env_lookup: FEnv,
    config_root: FRoot,
) -> Result<(Config, ConfigSource), ConfigError>
where
    FRead: Fn(&Path) -> Result<String, std::io::Error>,
    FEnv: Fn(&str) -> Option<String>,
    FRoot: Fn() -> Option<PathBuf>,
{
    let (text, source) = read_config_text(path_override, &read_file, &config_root)?;
    let mut config: Config = toml::from_str(&text)?;
    apply_env_overrides(&mut config, &env_lookup)?;
    validate(&config)?;
    tracing::debug!(?source, "configuration loaded");
    Ok((config, source))
}

fn read_config_text<FRead, FRoot>(
    path_override: Option<&str>,
    read_file: &FRead,
    config_root: &FRoot,
) -> Result<(String, ConfigSource), ConfigError>
where
    FRead: Fn(&Path) -> Result<String, std::io::Error>,
    FRoot: Fn() -> Option<PathBuf>,
{
    if let Some(p) = path_override {
        // An explicit path must exist; silently falling back would hide typos.
        let path = PathBuf::from(p);
        let text = read_file(&path)?;
        return Ok((text, ConfigSource::Explicit(path)));
    }

    if let Ok(text) = read_file(Path::new(CONFIG_FILE_NAME)) {
        return Ok((text, ConfigSource::Local));
    }
    if let Some(dir) = config_root() {
        let global = dir.join("pilot").join(CONFIG_FILE_NAME);
        if let Ok(text) = read_file(&global) {
            return Ok((text, ConfigSource::Global(global)));
        }
    }

    Ok((String::new(), ConfigSource::BuiltInDefaults))
}

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.retry.max_attempts == 0 {
        return Err(ConfigError::Invalid(
            "retry.max_attempts must be at least 1".into(),
        ));
    }
    if config.retry.initial_delay_ms > config.retry.max_delay_ms {
        return Err(ConfigError::Invalid(format!(
            "retry.initial_delay_ms ({}) exceeds retry.max_delay_ms ({})",
            config.retry.initial_delay_ms, config.retry.max_delay_ms
        )));
    }
    Ok(())
}

/// Root directory for per-user config (`$XDG_CONFIG_HOME` or `~/.config`).
pub fn config_root_dir() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("XDG_CONFIG_HOME") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }
    dirs::home_dir()
        .map(|home| home.join(".config"))
        .or_else(dirs::config_dir)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io;

    fn not_found(_: &Path) -> Result<String, io::Error> {
        Err(io::Error::new(io::ErrorKind::NotFound, "missing"))
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn defaults_are_sensible() {
        let c = Config::default();
        assert_eq!(c.retry.max_attempts, 3);
        assert_eq!(c.retry.policy, BackoffPolicy::Exponential);
        assert!(c.compaction.enabled);
        assert_eq!(c.compaction.threshold_tokens, 150_000);
        assert_eq!(c.approval.timeout(), None);
    }

    #[test]
    fn missing_files_fall_back_to_defaults() {
        let (config, source) =
            load_config_from_sources(None, not_found, no_env, || None).expect("load");
        assert_eq!(config, Config::default());
        assert_eq!(source, ConfigSource::BuiltInDefaults);
    }

    #[test]
    fn parse_partial_toml() {
        let text = r#"
            [retry]
            policy = "fixed"
            initial_delay_ms = 500

            [approval]
            timeout_secs = 30
        "#;
        let (config, source) = load_config_from_sources(
            Some("custom.toml"),
            |_| Ok(text.to_string()),
            no_env,
            || None,
        )
        .expect("load");
        assert_eq!(source, ConfigSource::Explicit(PathBuf::from("custom.toml")));
        assert_eq!(config.retry.policy, BackoffPolicy::Fixed);
        assert_eq!(config.retry.initial_delay_ms, 500);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(
            config.approval.timeout(),
            Some(std::time::Duration::from_secs(30))
        );
    }

    #[test]
    fn explicit_path_must_exist() {
        let err = load_config_from_sources(Some("nope.toml"), not_found, no_env, || None)
            .expect_err("missing explicit config should fail");
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn global_config_is_used_when_no_local_file() {
        let root = PathBuf::from("/home/test/.config");
        let expected = root.join("pilot").join("pilot.toml");
        let expected_clone = expected.clone();
        let (config, source) = load_config_from_sources(
            None,
            move |path| {
                if path == expected_clone {
                    Ok("[compaction]\nenabled = false\n".to_string())
                } else {
                    not_found(path)
                }
            },
            no_env,
            move || Some(root.clone()),
        )
        .expect("load");
        assert!(!config.compaction.enabled);
        assert_eq!(source, ConfigSource::Global(expected));
    }

    #[test]
    fn env_overrides_win_over_file() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("PILOT_COMPACT_THRESHOLD", "42000"),
            ("PILOT_RETRY_MAX_ATTEMPTS", "5"),
        ]);
        let (config, _) = load_config_from_sources(
            None,
            |_| Ok("[compaction]\nthreshold_tokens = 10\n".to_string()),
            |name| env.get(name).map(|v| v.to_string()),
            || None,
        )
        .expect("load");
        assert_eq!(config.compaction.threshold_tokens, 42_000);
        assert_eq!(config.retry.max_attempts, 5);
    }

    #[test]
    fn invalid_env_value_is_rejected() {
        let err = load_config_from_sources(
            None,
            not_found,
            |name| (name == "PILOT_APPROVAL_TIMEOUT_SECS").then(|| "soon".to_string()),
            || None,
        )
        .expect_err("non-numeric timeout should fail");
        assert!(err.to_string().contains("PILOT_APPROVAL_TIMEOUT_SECS"), "{err}");
    }

    #[test]
    fn zero_attempts_is_invalid() {
        let err = load_config_from_sources(
            None,
            |_| Ok("[retry]\nmax_attempts = 0\n".to_string()),
            no_env,
            || None,
        )
        .expect_err("zero attempts should fail validation");
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}
