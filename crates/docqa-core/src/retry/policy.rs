use std::time::Duration;

use super::classify::ErrorInfo;

/// Decision returned by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Do not retry this error.
    NoRetry,
    /// Retry after the given delay.
    RetryAfter(Duration),
}

/// Exponential backoff policy: delay before attempt `n + 1` is `base_delay * 2^(n - 1)`.
///
/// No jitter. There is no cap unless `max_delay` is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Base delay for backoff.
    pub base_delay: Duration,
    /// Optional upper bound on backoff delay.
    pub max_delay: Option<Duration>,
    /// Optional per-attempt deadline; an attempt exceeding it fails as a timeout.
    pub attempt_timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(1000))
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: None,
            attempt_timeout: None,
        }
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = Some(max_delay);
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = Some(timeout);
        self
    }

    /// Backoff to wait after the given (1-based) failed attempt.
    pub fn backoff(&self, attempt: u32) -> Duration {
        exponential_delay(self.base_delay, attempt.saturating_sub(1), self.max_delay)
    }

    /// Decide what to do after `attempt` (1-based) failed with `info`.
    pub fn decide(&self, attempt: u32, info: &ErrorInfo) -> RetryDecision {
        if !info.can_retry || attempt >= self.max_attempts {
            return RetryDecision::NoRetry;
        }
        RetryDecision::RetryAfter(self.backoff(attempt))
    }
}

/// `base * 2^exponent`, saturating, optionally capped.
///
/// Shared by the retry executor and the health monitor's poll interval.
pub fn exponential_delay(base: Duration, exponent: u32, cap: Option<Duration>) -> Duration {
    let factor = 1u32.checked_shl(exponent).unwrap_or(u32::MAX);
    let raw = base.saturating_mul(factor);
    match cap {
        Some(cap) => raw.min(cap),
        None => raw,
    }
}
