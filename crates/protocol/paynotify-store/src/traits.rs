//! Trait definitions for storage components.
//!
//! Implementations may vary (in-memory vs SQLite) but must satisfy these
//! interfaces.

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::types::{JobId, JobRecord, JobUpdate, Subscription};

// =============================================================================
// Job Storage
// =============================================================================

/// Durable keyed record of job state.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a new `queued` record.
    ///
    /// Fails with `JobExists` if the id is taken.
    async fn create(&self, job_id: &JobId, user_id: &str) -> StoreResult<JobRecord>;

    /// Write a status change.
    ///
    /// Upsert: an unknown id gets a new record. `created_at` and `user_id`
    /// of an existing record are kept, `updated_at` is refreshed, and
    /// `status`/`result`/`error` are overwritten as given. `payment_tx` is
    /// only overwritten by an update that carries one. There is no
    /// ordering check; callers that need forward-only moves check
    /// [`JobStatus::can_transition_to`](crate::JobStatus::can_transition_to)
    /// first. Atomic per job id.
    async fn apply_update(&self, job_id: &JobId, update: JobUpdate) -> StoreResult<JobRecord>;

    /// Load a record, or `NotFound`.
    async fn get(&self, job_id: &JobId) -> StoreResult<JobRecord>;
}

/// Read-only view of job records, local or remote.
///
/// Every [`JobStore`] is a reader; remote readers (e.g. over HTTP) implement
/// it directly.
#[async_trait]
pub trait JobReader: Send + Sync {
    /// Load a record, or `NotFound`.
    async fn read_job(&self, job_id: &JobId) -> StoreResult<JobRecord>;
}

#[async_trait]
impl<T: JobStore + ?Sized> JobReader for T {
    async fn read_job(&self, job_id: &JobId) -> StoreResult<JobRecord> {
        self.get(job_id).await
    }
}

// =============================================================================
// Subscriber Storage
// =============================================================================

/// Maps subscriber ids to delivery destinations.
#[async_trait]
pub trait SubscriberStore: Send + Sync {
    /// Create or replace a subscription. The original `created_at` is kept.
    async fn subscribe(&self, user_id: &str, destination: &str) -> StoreResult<Subscription>;

    /// Remove a subscription. Returns whether one existed.
    async fn unsubscribe(&self, user_id: &str) -> StoreResult<bool>;

    /// Destination for `user_id`, or `None`.
    async fn resolve(&self, user_id: &str) -> StoreResult<Option<String>>;

    /// All subscriptions, oldest first.
    async fn list(&self) -> StoreResult<Vec<Subscription>>;
}
