//! Retry logic with exponential backoff.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::RetryConfig;
use crate::error::{SettleError, SettleResult};

/// Retry policy with exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the initial attempt)
    max_attempts: u32,
    /// Base delay between retries
    base_delay: Duration,
    /// Maximum delay between retries
    max_delay: Duration,
}

impl RetryPolicy {
    /// Create a new retry policy.
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay,
        }
    }

    /// Create from retry config.
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay: config.base_delay,
            max_delay: config.max_delay,
        }
    }

    /// Maximum number of attempts, including the first.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Backoff before `attempt` (0-indexed; the first attempt never waits).
    ///
    /// `base_delay * 2^(attempt-1)`, capped at `max_delay`, with +-25% jitter.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
        let capped = self.base_delay.saturating_mul(factor).min(self.max_delay);

        let capped_ms = capped.as_millis() as u64;
        let spread = capped_ms / 4;
        if spread == 0 {
            return capped;
        }
        let offset = rand::thread_rng().gen_range(0..=spread * 2);
        Duration::from_millis(capped_ms - spread + offset)
    }

    /// Execute an async operation with retry logic.
    ///
    /// Only network errors are retried. Anything else, including a
    /// confirmation timeout, is returned immediately.
    pub async fn execute<F, Fut, T>(&self, operation: F) -> SettleResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = SettleResult<T>>,
    {
        self.execute_when(operation, SettleError::is_retryable).await
    }

    /// Execute an async operation, retrying the errors `retryable` accepts.
    ///
    /// Runs at least once even when configured with zero attempts. The last
    /// error is returned once attempts run out.
    pub async fn execute_when<F, Fut, T, E, R>(&self, mut operation: F, retryable: R) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
        R: Fn(&E) -> bool,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            // Wait before retry (no wait for first attempt)
            let delay = self.delay_for_attempt(attempt);
            if !delay.is_zero() {
                debug!(attempt, ?delay, "Retrying call");
                sleep(delay).await;
            }

            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if retryable(&e) && attempt + 1 < max_attempts => {
                    warn!(
                        attempt = attempt + 1,
                        max_attempts,
                        error = %e,
                        "Transient error"
                    );
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }
}
