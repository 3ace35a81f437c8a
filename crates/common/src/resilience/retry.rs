//! Exponential backoff with a bounded number of attempts
//!
//! Attempts are zero-based: `attempt` is the index of the attempt that just
//! failed, so the delay before the second attempt is `delay_for(0)`.

use std::time::Duration;

#[cfg(feature = "observability")]
use tracing::debug;

use crate::error::ErrorClassification;

/// Decision for whether to retry an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after waiting for the given delay
    RetryAfter(Duration),
    /// Don't retry the operation
    Stop,
}

/// `min(base * 2^attempt, max)`, saturating instead of overflowing
pub fn backoff_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    let multiplier = 1u32.checked_shl(attempt.min(31)).unwrap_or(u32::MAX);
    base.saturating_mul(multiplier).min(max)
}

/// True when another attempt is allowed and the error is transient
pub fn should_retry<E: ErrorClassification + ?Sized>(
    attempt: u32,
    max_attempts: u32,
    error: &E,
) -> bool {
    attempt.saturating_add(1) < max_attempts && error.is_retryable()
}

/// Retry policy: attempt bound plus exponential backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// `max_attempts` counts the first attempt and is clamped to at least 1
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self { max_attempts: max_attempts.max(1), base_delay, max_delay: max_delay.max(base_delay) }
    }

    /// A policy that never retries
    pub fn no_retry() -> Self {
        Self { max_attempts: 1, ..Self::default() }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    pub fn should_retry<E: ErrorClassification + ?Sized>(&self, attempt: u32, error: &E) -> bool {
        should_retry(attempt, self.max_attempts, error)
    }

    /// Delay to wait after attempt `attempt` failed
    pub fn delay_for(&self, attempt: u32) -> Duration {
        backoff_delay(attempt, self.base_delay, self.max_delay)
    }

    /// Combine the predicate and the backoff
    pub fn decide<E: ErrorClassification + ?Sized>(&self, attempt: u32, error: &E) -> RetryDecision {
        if !self.should_retry(attempt, error) {
            return RetryDecision::Stop;
        }

        RetryDecision::RetryAfter(self.delay_for(attempt))
    }

    /// Suspend the current task for the backoff of `attempt`
    ///
    /// Only the calling task sleeps; other requests keep running.
    #[cfg(feature = "runtime")]
    pub async fn wait(&self, delay: Duration) {
        #[cfg(feature = "observability")]
        debug!(delay_ms = delay.as_millis() as u64, "backing off before retry");

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}
