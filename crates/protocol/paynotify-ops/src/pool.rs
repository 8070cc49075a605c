//! Background pool of workers fed by a queue backend.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Semaphore};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use crate::config::WorkerConfig;
use crate::error::{OpsError, OpsResult};
use crate::queue::QueueBackend;
use crate::worker::{ProcessOutcome, Worker};

/// Counters returned when a pool stops.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Jobs that reached a terminal status in this run.
    pub completed: u64,
    /// Redelivered jobs that were already terminal.
    pub skipped: u64,
    /// Items left unacknowledged because processing errored.
    pub errors: u64,
}

impl PoolStats {
    fn record(&mut self, joined: Result<OpsResult<ProcessOutcome>, JoinError>) {
        match joined {
            Ok(Ok(ProcessOutcome::Completed(_))) => self.completed += 1,
            Ok(Ok(ProcessOutcome::Skipped(_))) => self.skipped += 1,
            Ok(Err(_)) => self.errors += 1,
            Err(e) => {
                error!(error = %e, "Worker task panicked");
                self.errors += 1;
            }
        }
    }
}

/// Runs up to `concurrency` [`Worker`]s over a [`QueueBackend`].
pub struct WorkerPool {
    worker: Worker,
    queue: Arc<dyn QueueBackend>,
    concurrency: usize,
    idle_poll_interval: Duration,
}

impl WorkerPool {
    /// Create a pool.
    pub fn new(worker: Worker, queue: Arc<dyn QueueBackend>, config: &WorkerConfig) -> Self {
        Self {
            worker,
            queue,
            concurrency: config.concurrency.max(1),
            idle_poll_interval: config.idle_poll_interval,
        }
    }

    /// Run the pool on a background task.
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<OpsResult<PoolStats>> {
        tokio::spawn(self.run(shutdown))
    }

    /// Process work until `shutdown` flips to `true` (or its sender is
    /// dropped) or the queue closes, then wait for in-flight jobs.
    ///
    /// An item is acknowledged only after its terminal status is written.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> OpsResult<PoolStats> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks: JoinSet<OpsResult<ProcessOutcome>> = JoinSet::new();
        let mut stats = PoolStats::default();

        info!(
            concurrency = self.concurrency,
            guarantee = ?self.queue.guarantee(),
            "Worker pool started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let permit = tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    stats.record(joined);
                    continue;
                }
                permit = Arc::clone(&semaphore).acquire_owned() => {
                    permit.map_err(|_| OpsError::queue("worker semaphore closed"))?
                }
            };

            let delivery = tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                popped = self.queue.pop() => match popped {
                    Ok(Some(delivery)) => delivery,
                    Ok(None) => {
                        info!("Queue closed, worker pool stopping");
                        break;
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to pop work");
                        tokio::select! {
                            changed = shutdown.changed() => {
                                if changed.is_err() {
                                    break;
                                }
                            }
                            _ = tokio::time::sleep(self.idle_poll_interval) => {}
                        }
                        continue;
                    }
                },
            };

            let worker = self.worker.clone();
            let queue = Arc::clone(&self.queue);
            tasks.spawn(async move {
                let _permit = permit;
                let job_id = delivery.item.job_id.clone();
                match worker.process(&delivery.item).await {
                    Ok(outcome) => {
                        if let Err(e) = queue.ack(&delivery).await {
                            warn!(job_id = %job_id, error = %e, "Failed to acknowledge work");
                        }
                        Ok(outcome)
                    }
                    Err(e) => {
                        error!(job_id = %job_id, error = %e, "Job processing failed, leaving unacknowledged");
                        Err(e)
                    }
                }
            });
        }

        debug!(in_flight = tasks.len(), "Draining worker pool");
        while let Some(joined) = tasks.join_next().await {
            stats.record(joined);
        }

        info!(
            completed = stats.completed,
            skipped = stats.skipped,
            errors = stats.errors,
            "Worker pool stopped"
        );
        Ok(stats)
    }
}
