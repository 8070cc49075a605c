//! Error types for the job pipeline.

use paynotify_store::{JobId, JobStatus, StoreError};
use paynotify_x402::NotifyError;
use std::time::Duration;
use thiserror::Error;

/// Result type for pipeline operations.
pub type OpsResult<T> = std::result::Result<T, OpsError>;

/// Errors that can occur in the job pipeline.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum OpsError {
    /// No subscription for the user.
    #[error("subscriber not found: {0}")]
    SubscriberNotFound(String),

    /// Caller input was rejected.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The queue refused or lost an item.
    #[error("queue error: {0}")]
    Queue(String),

    /// The queue has been closed.
    #[error("queue closed")]
    QueueClosed,

    /// A spawned delivery task panicked or was cancelled.
    #[error("delivery task failed: {0}")]
    TaskFailed(String),

    /// Delivery failed.
    #[error(transparent)]
    Notify(#[from] NotifyError),

    /// Storage error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl OpsError {
    /// Create an invalid input error.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        OpsError::InvalidInput(msg.into())
    }

    /// Create a queue error.
    pub fn queue(msg: impl Into<String>) -> Self {
        OpsError::Queue(msg.into())
    }

    /// True for "no such user" / "no such job".
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::SubscriberNotFound(_) => true,
            Self::Store(e) => e.is_not_found(),
            _ => false,
        }
    }

    /// Get a user-friendly suggestion for recovering from this error.
    pub fn suggestion(&self) -> &str {
        match self {
            Self::SubscriberNotFound(_) => {
                "Subscribe the user first with 'paynotify subscribe <user> <destination>'."
            }
            Self::InvalidInput(_) => "Check the request parameters and try again.",
            Self::Queue(_) | Self::QueueClosed => {
                "The work queue is unavailable. Check that workers are running."
            }
            Self::TaskFailed(_) => "A delivery task crashed. Check the service logs.",
            Self::Notify(e) => e.suggestion(),
            Self::Store(_) => "Check the data directory and database file permissions.",
        }
    }
}

/// Errors ending a job poll.
#[derive(Debug, Error)]
pub enum PollError {
    /// The job did not reach a terminal state in time.
    #[error("job {job_id} still {} after {:.1}s", last_status.map(|s| s.as_str()).unwrap_or("not visible"), waited.as_secs_f64())]
    TimedOut {
        /// Job being polled
        job_id: JobId,
        /// Last status observed, if the job was ever seen
        last_status: Option<JobStatus>,
        /// Time spent polling
        waited: Duration,
    },

    /// Reading the job failed.
    #[error("failed to read job: {0}")]
    Store(#[from] StoreError),

    /// The stream ended without a terminal record.
    #[error("poll stream ended early")]
    Ended,
}
