//! Processing one work item.

use std::sync::Arc;
use std::time::Duration;

use paynotify_settle::{PaymentProof, RetryPolicy};
use paynotify_store::{
    JobId, JobRecord, JobStatus, JobStore, JobUpdate, StoreError, StoreResult, WorkItem,
};
use paynotify_x402::Notifier;
use tracing::{debug, error, info, warn};

use crate::error::OpsResult;

/// Result of [`Worker::process`].
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessOutcome {
    /// The job ran and reached this terminal record.
    Completed(JobRecord),
    /// The job was already terminal; nothing was sent.
    Skipped(JobStatus),
}

/// Drives one job from `queued` to a terminal status.
#[derive(Clone)]
pub struct Worker {
    jobs: Arc<dyn JobStore>,
    notifier: Arc<dyn Notifier>,
    store_retry: RetryPolicy,
}

impl Worker {
    /// Create a worker.
    pub fn new(jobs: Arc<dyn JobStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            jobs,
            notifier,
            store_retry: RetryPolicy::new(5, Duration::from_millis(100), Duration::from_secs(2)),
        }
    }

    /// Replace the backoff used for job-store writes.
    pub fn with_store_retry(mut self, policy: RetryPolicy) -> Self {
        self.store_retry = policy;
        self
    }

    /// Write an update, retrying while the store reports busy or unreachable.
    async fn write(&self, job_id: &JobId, update: JobUpdate) -> StoreResult<JobRecord> {
        self.store_retry
            .execute_when(
                || self.jobs.apply_update(job_id, update.clone()),
                StoreError::is_transient,
            )
            .await
    }

    /// Run one item to completion.
    ///
    /// Writes `running`, delivers, then writes exactly one terminal update.
    /// Delivery errors become a terminal update, never an `Err`; an `Err`
    /// means the store could not be written and the item should not be
    /// acknowledged.
    ///
    /// A payment is recorded on the job as soon as delivery returns. A job
    /// found `running` with a recorded payment is resumed with that proof,
    /// so redelivery never pays twice.
    pub async fn process(&self, item: &WorkItem) -> OpsResult<ProcessOutcome> {
        let job_id = &item.job_id;
        let mut proof = None;

        match self.jobs.get(job_id).await {
            Ok(record) if record.is_terminal() => {
                info!(job_id = %job_id, status = %record.status, "Job already terminal, skipping");
                return Ok(ProcessOutcome::Skipped(record.status));
            }
            Ok(record) if record.status == JobStatus::Running => {
                proof = record.payment_tx.map(PaymentProof::new);
                match &proof {
                    Some(tx) => warn!(job_id = %job_id, tx = %tx, "Resuming paid job with its proof"),
                    None => warn!(job_id = %job_id, "Resuming job left running by an earlier attempt"),
                }
            }
            Ok(_) => {}
            Err(e) if e.is_not_found() => {
                warn!(job_id = %job_id, "Job record missing, processing anyway");
            }
            Err(e) => return Err(e.into()),
        }

        self.write(job_id, JobUpdate::running()).await?;
        debug!(job_id = %job_id, destination = %item.destination, "Delivering");

        let outcome = self
            .notifier
            .notify_paid(&item.destination, &item.message, proof.as_ref())
            .await;

        let update = match outcome {
            Ok(delivery) => {
                let update = JobUpdate::finished(delivery.result);
                match delivery.proof {
                    Some(tx) if proof.as_ref() != Some(&tx) => {
                        self.record_payment(job_id, &tx).await;
                        update.with_payment_tx(tx.as_str())
                    }
                    Some(tx) => update.with_payment_tx(tx.as_str()),
                    None => update,
                }
            }
            Err(e) if e.is_ambiguous() => {
                warn!(job_id = %job_id, error = %e, "Payment unconfirmed");
                JobUpdate::unconfirmed(e.to_string())
            }
            Err(e) => match e.spent_proof() {
                Some(tx) => {
                    warn!(job_id = %job_id, tx = %tx, error = %e, "Delivery failed after payment");
                    JobUpdate::failed(e.to_string()).with_payment_tx(tx.as_str())
                }
                None => {
                    warn!(job_id = %job_id, error = %e, "Delivery failed");
                    JobUpdate::failed(e.to_string())
                }
            },
        };

        let record = self.write(job_id, update).await?;
        info!(job_id = %job_id, status = %record.status, "Job complete");
        Ok(ProcessOutcome::Completed(record))
    }

    /// Persist a fresh payment before the terminal write.
    ///
    /// A failure here is logged only: the terminal write carries the same
    /// proof and gets its own retries.
    async fn record_payment(&self, job_id: &JobId, tx: &PaymentProof) {
        let update = JobUpdate::running().with_payment_tx(tx.as_str());
        if let Err(e) = self.write(job_id, update).await {
            error!(job_id = %job_id, tx = %tx, error = %e, "Could not record payment");
        }
    }
}
