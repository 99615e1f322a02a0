//! Retry policy for device requests
//!
//! Exponential backoff truncated to `[min_backoff, max_backoff]`, with a
//! per-request timeout covering all attempts together.

use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};

use crate::error::{ProbeError, Result};

/// Retry and timeout settings shared by every request of every probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts after the first try
    pub max_retries: u32,
    /// Delay before the first retry, and lower bound of every delay
    pub min_backoff: Duration,
    /// Upper bound of every delay
    pub max_backoff: Duration,
    /// Budget of one logical request, all attempts included
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            min_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(5),
            timeout: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries
    pub fn none(timeout: Duration) -> Self {
        Self {
            max_retries: 0,
            timeout,
            ..Default::default()
        }
    }

    /// Calculate delay for a given retry number (0-indexed)
    ///
    /// Returns None if no more retries should be attempted
    pub fn delay_for_attempt(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_retries {
            return None;
        }

        let factor = 2u32.saturating_pow(attempt);
        let delay = self.min_backoff.saturating_mul(factor);
        Some(delay.clamp(self.min_backoff, self.max_backoff.max(self.min_backoff)))
    }

    /// Deadline of one logical request started now, capped by the probe deadline
    pub fn request_deadline(&self, probe_deadline: Instant) -> Instant {
        (Instant::now() + self.timeout).min(probe_deadline)
    }
}

/// Execute an async operation with retry logic
///
/// Only errors for which [`ProbeError::is_retryable`] holds are retried. A
/// backoff sleep that would cross `deadline` ends the loop with
/// [`ProbeError::DeadlineExceeded`].
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    deadline: Instant,
    mut operation: F,
) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match operation(attempt).await {
            Ok(result) => return Ok(result),
            Err(e) if e.is_retryable() => match policy.delay_for_attempt(attempt) {
                Some(delay) => {
                    let wake = Instant::now() + delay;
                    if wake >= deadline {
                        return Err(ProbeError::DeadlineExceeded);
                    }
                    tracing::debug!(attempt, ?delay, error = %e, "retrying request");
                    sleep_until(wake).await;
                    attempt += 1;
                }
                None => return Err(e),
            },
            Err(e) => return Err(e),
        }
    }
}
