//! Configuration data model.
//!
//! Struct/enum definitions plus their defaults. Loading and precedence rules
//! live in `config::mod`.

use serde::Deserialize;
use std::time::Duration;

use super::defaults::{
    DEFAULT_COMPACT_THRESHOLD_TOKENS, DEFAULT_RETRY_INITIAL_DELAY_MS, DEFAULT_RETRY_MAX_ATTEMPTS,
    DEFAULT_RETRY_MAX_DELAY_MS,
};

/// Top-level session controller configuration.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub retry: RetryConfig,
    pub compaction: CompactionConfig,
    pub approval: ApprovalConfig,
}

/// Delay curve between rate-limit retries.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackoffPolicy {
    /// Every retry waits `initial_delay_ms`.
    Fixed,
    /// `initial_delay_ms * 2^(attempt-1)`, capped at `max_delay_ms`.
    #[default]
    Exponential,
}

/// `[retry]` section.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub policy: BackoffPolicy,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RETRY_MAX_ATTEMPTS,
            policy: BackoffPolicy::default(),
            initial_delay_ms: DEFAULT_RETRY_INITIAL_DELAY_MS,
            max_delay_ms: DEFAULT_RETRY_MAX_DELAY_MS,
        }
    }
}

/// `[compaction]` section.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CompactionConfig {
    pub enabled: bool,
    pub threshold_tokens: u64,
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold_tokens: DEFAULT_COMPACT_THRESHOLD_TOKENS,
        }
    }
}

/// `[approval]` section.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ApprovalConfig {
    /// Seconds an agent waits for an approval reply. `0` waits indefinitely.
    pub timeout_secs: u64,
}

impl ApprovalConfig {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}
