//! Environment variable overrides.
//!
//! `PILOT_*` variables win over file values so a single run can be tuned
//! without editing `pilot.toml`.

use crate::error::ConfigError;

use super::Config;

pub(super) const ENV_COMPACT_THRESHOLD: &str = "PILOT_COMPACT_THRESHOLD";
pub(super) const ENV_RETRY_MAX_ATTEMPTS: &str = "PILOT_RETRY_MAX_ATTEMPTS";
pub(super) const ENV_APPROVAL_TIMEOUT_SECS: &str = "PILOT_APPROVAL_TIMEOUT_SECS";

pub(super) fn apply_env_overrides<FEnv>(
    config: &mut Config,
    env_lookup: &FEnv,
) -> Result<(), ConfigError>
where
    FEnv: Fn(&str) -> Option<String>,
{
    if let Some(raw) = env_lookup(ENV_COMPACT_THRESHOLD) {
        config.compaction.threshold_tokens = parse_u64(ENV_COMPACT_THRESHOLD, &raw)?;
    }
    if let Some(raw) = env_lookup(ENV_RETRY_MAX_ATTEMPTS) {
        let attempts = parse_u64(ENV_RETRY_MAX_ATTEMPTS, &raw)?;
        config.retry.max_attempts = u32::try_from(attempts).map_err(|_| {
            ConfigError::Invalid(format!("{ENV_RETRY_MAX_ATTEMPTS} value `{raw}` is too large"))
        })?;
    }
    if let Some(raw) = env_lookup(ENV_APPROVAL_TIMEOUT_SECS) {
        config.approval.timeout_secs = parse_u64(ENV_APPROVAL_TIMEOUT_SECS, &raw)?;
    }
    Ok(())
}

fn parse_u64(name: &str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim().parse::<u64>().map_err(|_| {
        ConfigError::Invalid(format!(
            "invalid {name} value `{raw}`: expected a non-negative integer"
        ))
    })
}
