//! Rate-limit retry governor.
//!
//! Classifies run failures, counts consecutive rate-limit hits, and holds the
//! single pending retry (prompt plus deadline) while the countdown runs.

use crate::config::{BackoffPolicy, RetryConfig};
use crate::error::RunError;
use std::time::{Duration, Instant};

/// Interval between countdown ticks while a retry is pending.
pub const RETRY_TICK: Duration = Duration::from_secs(1);

const RATE_LIMIT_MARKERS: &[&str] = &[
    "rate limit",
    "rate_limit",
    "ratelimit",
    "429",
    "overloaded",
    "too many requests",
];

/// True when any message in the error chain looks like a rate limit.
pub fn is_rate_limited(err: &RunError) -> bool {
    err.chain().iter().any(|message| {
        let lower = message.to_ascii_lowercase();
        RATE_LIMIT_MARKERS.iter().any(|marker| lower.contains(marker))
    })
}

/// Bounded backoff policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Upper bound on total attempts, including the initial run.
    pub max_attempts: u32,
    pub backoff: BackoffPolicy,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff: config.policy,
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self.backoff {
            BackoffPolicy::Fixed => self.initial_delay.min(self.max_delay),
            BackoffPolicy::Exponential => {
                let pow = 2u32.saturating_pow(attempt.saturating_sub(1));
                let millis = self
                    .initial_delay
                    .as_millis()
                    .saturating_mul(pow as u128)
                    .min(self.max_delay.as_millis());
                Duration::from_millis(millis as u64)
            }
        }
    }
}

/// Outcome of reporting one failed run to the governor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry scheduled; `attempt` is the consecutive failure count.
    Scheduled { attempt: u32, delay: Duration },
    /// Rate limited, but the attempt budget is spent.
    Exhausted { attempts: u32 },
    /// Not a rate limit at all.
    NotRetryable,
}

/// What a countdown tick should do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// No retry pending; ignore the tick.
    Idle,
    /// Still counting down; tick again after this long.
    Wait(Duration),
    /// Deadline reached; resubmit this prompt.
    Fire(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingRetry {
    prompt: String,
    at: Instant,
}

/// Retry counter plus the pending retry, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryGovernor {
    policy: RetryPolicy,
    count: u32,
    pending: Option<PendingRetry>,
}

impl RetryGovernor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            count: 0,
            pending: None,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Consecutive rate-limit failures seen so far.
    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Time left before the pending retry fires.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.pending
            .as_ref()
            .map(|pending| pending.at.saturating_duration_since(now))
    }

    /// Classify a failure of `prompt` and schedule a retry if the budget allows.
    pub fn on_failure(&mut self, err: &RunError, prompt: &str, now: Instant) -> RetryDecision {
        if !is_rate_limited(err) {
            self.count = 0;
            return RetryDecision::NotRetryable;
        }
        self.count = self.count.saturating_add(1);
        if self.count >= self.policy.max_attempts {
            let attempts = self.count;
            self.count = 0;
            tracing::warn!(attempts, "rate limited; retry budget exhausted");
            return RetryDecision::Exhausted { attempts };
        }
        let delay = self.policy.delay_for(self.count);
        self.pending = Some(PendingRetry {
            prompt: prompt.to_string(),
            at: now + delay,
        });
        tracing::info!(attempt = self.count, ?delay, "rate limited; retry scheduled");
        RetryDecision::Scheduled {
            attempt: self.count,
            delay,
        }
    }

    /// A run completed successfully.
    pub fn on_success(&mut self) {
        self.count = 0;
        self.pending = None;
    }

    /// Drop the pending retry. Returns its prompt if one was pending.
    pub fn cancel(&mut self) -> Option<String> {
        self.count = 0;
        self.pending.take().map(|pending| pending.prompt)
    }

    /// Advance the countdown.
    pub fn tick(&mut self, now: Instant) -> TickOutcome {
        let Some(remaining) = self.remaining(now) else {
            return TickOutcome::Idle;
        };
        if !remaining.is_zero() {
            return TickOutcome::Wait(remaining.min(RETRY_TICK));
        }
        match self.pending.take() {
            Some(pending) => TickOutcome::Fire(pending.prompt),
            None => TickOutcome::Idle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(backoff: BackoffPolicy) -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            backoff,
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(5),
        }
    }

    #[test]
    fn classification_is_case_insensitive_over_chain() {
        assert!(is_rate_limited(&RunError::new("Rate Limit exceeded")));
        assert!(is_rate_limited(
            &RunError::new("status 429").context("model request failed")
        ));
        assert!(is_rate_limited(&RunError::new("upstream OVERLOADED")));
        assert!(is_rate_limited(&RunError::new("Too Many Requests")));
        assert!(is_rate_limited(&RunError::new("code: rate_limit_error")));
        assert!(!is_rate_limited(&RunError::new("connection refused")));
    }

    #[test]
    fn exponential_delay_doubles_and_caps() {
        let p = policy(BackoffPolicy::Exponential);
        assert_eq!(p.delay_for(1), Duration::from_secs(2));
        assert_eq!(p.delay_for(2), Duration::from_secs(4));
        assert_eq!(p.delay_for(3), Duration::from_secs(5));
        assert_eq!(p.delay_for(40), Duration::from_secs(5));
    }

    #[test]
    fn fixed_delay_is_constant() {
        let p = policy(BackoffPolicy::Fixed);
        assert_eq!(p.delay_for(1), p.delay_for(7));
    }

    #[test]
    fn three_rate_limits_retry_twice_then_exhaust() {
        let mut governor = RetryGovernor::new(policy(BackoffPolicy::Exponential));
        let err = RunError::new("rate limit exceeded");
        let now = Instant::now();

        let first = governor.on_failure(&err, "p", now);
        assert!(matches!(first, RetryDecision::Scheduled { attempt: 1, .. }));
        assert_eq!(governor.tick(now + Duration::from_secs(2)), TickOutcome::Fire("p".into()));

        let second = governor.on_failure(&err, "p", now);
        assert!(matches!(second, RetryDecision::Scheduled { attempt: 2, .. }));
        assert_eq!(governor.tick(now + Duration::from_secs(4)), TickOutcome::Fire("p".into()));

        let third = governor.on_failure(&err, "p", now);
        assert_eq!(third, RetryDecision::Exhausted { attempts: 3 });
        assert!(!governor.is_pending());
        assert_eq!(governor.count(), 0);
    }

    #[test]
    fn tick_counts_down_in_whole_seconds() {
        let mut governor = RetryGovernor::new(policy(BackoffPolicy::Fixed));
        let now = Instant::now();
        governor.on_failure(&RunError::new("429"), "again", now);
        assert_eq!(governor.tick(now), TickOutcome::Wait(RETRY_TICK));
        assert_eq!(
            governor.tick(now + Duration::from_millis(1_500)),
            TickOutcome::Wait(Duration::from_millis(500))
        );
        assert!(governor.is_pending());
        assert_eq!(
            governor.tick(now + Duration::from_secs(3)),
            TickOutcome::Fire("again".into())
        );
        assert_eq!(governor.tick(now + Duration::from_secs(4)), TickOutcome::Idle);
    }

    #[test]
    fn success_resets_count() {
        let mut governor = RetryGovernor::new(policy(BackoffPolicy::Fixed));
        let now = Instant::now();
        governor.on_failure(&RunError::new("429"), "p", now);
        governor.tick(now + Duration::from_secs(2));
        governor.on_success();
        assert_eq!(governor.count(), 0);
        assert!(matches!(
            governor.on_failure(&RunError::new("429"), "p", now),
            RetryDecision::Scheduled { attempt: 1, .. }
        ));
    }

    #[test]
    fn other_errors_are_not_retried() {
        let mut governor = RetryGovernor::new(policy(BackoffPolicy::Fixed));
        assert_eq!(
            governor.on_failure(&RunError::new("invalid api key"), "p", Instant::now()),
            RetryDecision::NotRetryable
        );
        assert!(!governor.is_pending());
    }

    #[test]
    fn cancel_drops_pending_retry() {
        let mut governor = RetryGovernor::new(policy(BackoffPolicy::Fixed));
        let now = Instant::now();
        governor.on_failure(&RunError::new("overloaded"), "p", now);
        assert_eq!(governor.cancel(), Some("p".to_string()));
        assert_eq!(governor.tick(now + Duration::from_secs(60)), TickOutcome::Idle);
    }

    #[test]
    fn single_attempt_policy_never_retries() {
        let mut governor = RetryGovernor::new(RetryPolicy {
            max_attempts: 1,
            ..policy(BackoffPolicy::Fixed)
        });
        assert_eq!(
            governor.on_failure(&RunError::new("429"), "p", Instant::now()),
            RetryDecision::Exhausted { attempts: 1 }
        );
    }
}
