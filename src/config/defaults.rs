//! Default configuration constants.

/// Attempts (initial run included) before a rate-limited prompt is given up.
pub(super) const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 3;
/// First retry delay; doubled per attempt under the exponential policy.
pub(super) const DEFAULT_RETRY_INITIAL_DELAY_MS: u64 = 2_000;
/// Cap on any single retry delay.
pub(super) const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 30_000;
/// Context size (tokens) that triggers automatic compaction.
pub(super) const DEFAULT_COMPACT_THRESHOLD_TOKENS: u64 = 150_000;
/// Config file name searched in the working directory and config root.
pub(super) const CONFIG_FILE_NAME: &str = "pilot.toml";
