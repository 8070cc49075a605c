//! Configuration types for the job pipeline.

use std::time::Duration;

/// Worker pool behavior.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum jobs processed at once.
    pub concurrency: usize,
    /// Sleep between polls of an empty durable queue.
    pub idle_poll_interval: Duration,
    /// How long a claimed durable item stays hidden before redelivery.
    ///
    /// Must exceed the ledger's confirmation timeout, or a slow payment can
    /// be picked up by a second worker.
    pub visibility_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            idle_poll_interval: Duration::from_millis(500),
            // 120s ledger timeout plus two gateway round trips
            visibility_timeout: Duration::from_secs(300),
        }
    }
}

impl WorkerConfig {
    /// Set the concurrency (at least 1).
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Set the idle poll interval.
    pub fn with_idle_poll_interval(mut self, interval: Duration) -> Self {
        self.idle_poll_interval = interval;
        self
    }

    /// Set the visibility timeout.
    pub fn with_visibility_timeout(mut self, timeout: Duration) -> Self {
        self.visibility_timeout = timeout;
        self
    }
}

/// Client-side polling behavior.
#[derive(Debug, Clone, Copy)]
pub struct PollConfig {
    /// Time between reads.
    pub interval: Duration,
    /// Give up after this long.
    pub timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            // Covers a full ledger confirmation wait
            timeout: Duration::from_secs(180),
        }
    }
}
