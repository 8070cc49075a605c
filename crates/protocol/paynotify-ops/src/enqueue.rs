//! Accepting notification jobs.

use std::sync::Arc;

use paynotify_store::{JobId, JobStore, JobUpdate, SubscriberStore, WorkItem};
use tracing::{error, info};

use crate::error::{OpsError, OpsResult};
use crate::queue::QueueBackend;

/// Turns `(user_id, message)` into a queued job.
///
/// Returns as soon as the work is on the queue; delivery happens in a
/// [`WorkerPool`](crate::WorkerPool).
#[derive(Clone)]
pub struct Enqueuer {
    jobs: Arc<dyn JobStore>,
    subscribers: Arc<dyn SubscriberStore>,
    queue: Arc<dyn QueueBackend>,
}

impl Enqueuer {
    /// Create an enqueuer over the given stores and queue.
    pub fn new(
        jobs: Arc<dyn JobStore>,
        subscribers: Arc<dyn SubscriberStore>,
        queue: Arc<dyn QueueBackend>,
    ) -> Self {
        Self {
            jobs,
            subscribers,
            queue,
        }
    }

    /// Queue a notification for a subscriber. Returns the new job id.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` for an empty user id or message
    /// - `SubscriberNotFound` when the user has no destination; no job is created
    /// - `QueueClosed` / `Queue` when the push fails; the job is marked `failed`
    pub async fn enqueue(&self, user_id: &str, message: &str) -> OpsResult<JobId> {
        if user_id.trim().is_empty() {
            return Err(OpsError::invalid_input("user_id must not be empty"));
        }
        if message.is_empty() {
            return Err(OpsError::invalid_input("message must not be empty"));
        }

        let destination = self
            .subscribers
            .resolve(user_id)
            .await?
            .ok_or_else(|| OpsError::SubscriberNotFound(user_id.to_string()))?;

        let job_id = JobId::generate();
        self.jobs.create(&job_id, user_id).await?;

        let item = WorkItem {
            job_id: job_id.clone(),
            user_id: user_id.to_string(),
            destination,
            message: message.to_string(),
        };

        if let Err(e) = self.queue.push(item).await {
            error!(job_id = %job_id, error = %e, "Failed to queue job");
            let reason = format!("could not queue job: {}", e);
            if let Err(store_err) = self.jobs.apply_update(&job_id, JobUpdate::failed(reason)).await
            {
                error!(job_id = %job_id, error = %store_err, "Failed to mark unqueued job failed");
            }
            return Err(e);
        }

        info!(job_id = %job_id, user_id, "Job queued");
        Ok(job_id)
    }
}
