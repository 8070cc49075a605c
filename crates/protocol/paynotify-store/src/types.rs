//! Job and subscription records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};

/// Unique job identifier (UUID v4 in its hyphenated form).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Generate a fresh random id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wrap an existing id without validation.
    ///
    /// Ids arrive from HTTP paths and older rows; any string is accepted.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Lifecycle state of a job.
///
/// ```text
/// queued ──► running ──┬──► finished
///                      ├──► failed
///                      └──► unconfirmed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Accepted, waiting for a worker.
    Queued,
    /// A worker is delivering it.
    Running,
    /// Delivered; `result` holds the gateway response.
    Finished,
    /// Delivery failed; `error` says why.
    Failed,
    /// Payment was broadcast but never confirmed. Funds may have moved.
    Unconfirmed,
}

impl JobStatus {
    /// All statuses in lifecycle order.
    pub const ALL: [JobStatus; 5] = [
        JobStatus::Queued,
        JobStatus::Running,
        JobStatus::Finished,
        JobStatus::Failed,
        JobStatus::Unconfirmed,
    ];

    /// Storage and wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Finished => "finished",
            Self::Failed => "failed",
            Self::Unconfirmed => "unconfirmed",
        }
    }

    /// True once no further transition is allowed.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Failed | Self::Unconfirmed)
    }

    /// Position in the lifecycle (terminal states share the last rank).
    fn rank(&self) -> u8 {
        match self {
            Self::Queued => 0,
            Self::Running => 1,
            Self::Finished | Self::Failed | Self::Unconfirmed => 2,
        }
    }

    /// Whether moving from `self` to `next` goes forward.
    ///
    /// Re-writing the same non-terminal status is allowed, and `queued` may
    /// jump straight to a terminal state (e.g. when the queue push fails).
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        next.rank() >= self.rank()
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| StoreError::invalid_data(format!("unknown job status: {}", s)))
    }
}

/// Stored state of one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    /// Unique id.
    pub job_id: JobId,
    /// Subscriber the job was created for.
    pub user_id: String,
    /// Current status.
    pub status: JobStatus,
    /// Gateway response, when finished.
    pub result: Option<serde_json::Value>,
    /// Failure description, when failed or unconfirmed.
    pub error: Option<String>,
    /// Transaction that paid for the delivery, once known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_tx: Option<String>,
    /// When the job was created. Never changes.
    pub created_at: DateTime<Utc>,
    /// When the record was last written.
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    /// A freshly queued record.
    pub fn queued(job_id: JobId, user_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            job_id,
            user_id: user_id.into(),
            status: JobStatus::Queued,
            result: None,
            error: None,
            payment_tx: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// True once the job will not change again.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// A status write for [`JobStore::apply_update`](crate::JobStore::apply_update).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobUpdate {
    /// New status.
    pub status: JobStatus,
    /// Result payload.
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    /// Error text.
    #[serde(default)]
    pub error: Option<String>,
    /// Payment transaction to record. `None` keeps whatever is stored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_tx: Option<String>,
}

impl JobUpdate {
    /// Mark the job running.
    pub fn running() -> Self {
        Self {
            status: JobStatus::Running,
            result: None,
            error: None,
            payment_tx: None,
        }
    }

    /// Mark the job finished with the gateway's response.
    pub fn finished(result: serde_json::Value) -> Self {
        Self {
            status: JobStatus::Finished,
            result: Some(result),
            error: None,
            payment_tx: None,
        }
    }

    /// Mark the job failed.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Failed,
            result: None,
            error: Some(error.into()),
            payment_tx: None,
        }
    }

    /// Mark the job unconfirmed (payment outcome unknown).
    pub fn unconfirmed(error: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Unconfirmed,
            result: None,
            error: Some(error.into()),
            payment_tx: None,
        }
    }

    /// Record the transaction that paid for this job.
    pub fn with_payment_tx(mut self, tx: impl Into<String>) -> Self {
        self.payment_tx = Some(tx.into());
        self
    }

    /// Check that the payload fields fit the status: `result` only with
    /// `finished`, `error` only with `failed` or `unconfirmed`.
    pub fn check_fields(&self) -> StoreResult<()> {
        if self.result.is_some() && self.status != JobStatus::Finished {
            return Err(StoreError::invalid_data(format!(
                "result is only allowed with status finished, not {}",
                self.status
            )));
        }
        if self.error.is_some()
            && !matches!(self.status, JobStatus::Failed | JobStatus::Unconfirmed)
        {
            return Err(StoreError::invalid_data(format!(
                "error is only allowed with status failed or unconfirmed, not {}",
                self.status
            )));
        }
        Ok(())
    }
}

/// What the queue carries from the enqueuer to a worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    /// Job this work belongs to.
    pub job_id: JobId,
    /// Subscriber.
    pub user_id: String,
    /// Resolved delivery destination.
    pub destination: String,
    /// Message body.
    pub message: String,
}

/// A work item claimed from the durable queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimedWork {
    /// Queue row id, used to acknowledge.
    pub queue_id: i64,
    /// The work itself.
    pub item: WorkItem,
    /// How many times this row has been claimed, including this one.
    pub attempts: u32,
}

/// A subscriber and where to reach them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    /// Subscriber id.
    pub user_id: String,
    /// Delivery destination (e.g. a chat id).
    pub destination: String,
    /// When the subscription was first created.
    pub created_at: DateTime<Utc>,
}
