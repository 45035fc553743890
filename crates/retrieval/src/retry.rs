//! Exponential backoff for calls to the search service.
//!
//! Retrying is opt-in: [`RetrievalConfig::retry`](crate::RetrievalConfig) is `None` unless a
//! policy is configured, and only errors the caller marks as transient are retried.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::warn;

/// Configuration for retry behavior.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry, in milliseconds.
    #[serde(with = "crate::serde_millis")]
    pub base_delay: Duration,
    /// Upper bound on any single delay, in milliseconds.
    #[serde(with = "crate::serde_millis")]
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    /// Spread delays by ±25% so concurrent callers do not retry in lockstep.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay before retry number `attempt` (attempt 0 is the first try and never waits).
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let exponential =
            self.base_delay.as_millis() as f64 * self.backoff_multiplier.powi((attempt - 1) as i32);
        let delay_ms = exponential.min(self.max_delay.as_millis() as f64) as u64;

        if self.jitter {
            let jitter_range = delay_ms / 4;
            if jitter_range > 0 {
                let jitter = fastrand::u64(0..jitter_range * 2);
                return Duration::from_millis(delay_ms.saturating_sub(jitter_range) + jitter);
            }
        }

        Duration::from_millis(delay_ms)
    }
}

/// Outcome of a retried operation.
#[derive(Debug, Clone)]
pub struct RetryResult<T, E> {
    pub result: Result<T, E>,
    /// Attempts made, 1 when the first try settled it.
    pub attempts: u32,
    pub total_duration: Duration,
}

impl<T, E> RetryResult<T, E> {
    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }

    pub fn into_result(self) -> Result<T, E> {
        self.result
    }
}

/// Runs `operation` until it succeeds, fails with an error `should_retry` rejects, or the
/// retry budget is spent. The last error is returned unchanged.
pub async fn execute_with_retry_async<T, E, F, Fut, R>(
    config: &RetryConfig,
    should_retry: R,
    mut operation: F,
) -> RetryResult<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    R: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let start = Instant::now();
    let mut attempt = 0;

    loop {
        match operation(attempt).await {
            Ok(value) => {
                return RetryResult {
                    result: Ok(value),
                    attempts: attempt + 1,
                    total_duration: start.elapsed(),
                };
            }
            Err(err) if attempt < config.max_retries && should_retry(&err) => {
                attempt += 1;
                let delay = config.calculate_delay(attempt);
                warn!(attempt, delay_ms = delay.as_millis() as u64, error = %err, "retrying");
                if !delay.is_zero() {
                    sleep(delay).await;
                }
            }
            Err(err) => {
                return RetryResult {
                    result: Err(err),
                    attempts: attempt + 1,
                    total_duration: start.elapsed(),
                };
            }
        }
    }
}
