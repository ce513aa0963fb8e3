//! Bounded retry with exponential backoff.
//!
//! Retry is a first-class policy here rather than incidental transport
//! behavior: only errors classified transient by
//! [`EngineError::is_transient`](super::EngineError::is_transient) are
//! retried, and only up to the configured attempt budget.

use super::error::EngineError;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Retry policy for transient engine failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt (0 disables retrying).
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    /// Backoff delay before retry number `retry` (1-indexed), doubling each
    /// time and capped at `max_delay`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(16);
        let delay = self.initial_delay.saturating_mul(1u32 << exp);
        delay.min(self.max_delay)
    }

    /// Run `operation`, retrying transient failures until the budget is
    /// exhausted. Terminal failures are returned immediately.
    pub async fn run<F, Fut, T>(&self, mut operation: F) -> Result<T, EngineError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, EngineError>>,
    {
        let mut retry = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && retry < self.max_retries => {
                    retry += 1;
                    let delay = self.delay_for(retry);
                    debug!(
                        retry,
                        max_retries = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transient engine failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
