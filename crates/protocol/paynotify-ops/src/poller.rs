//! Waiting for a job to finish by polling its record.
//!
//! Works against any [`JobReader`]: a local store, or the job API over HTTP.
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use futures::StreamExt;
//! use paynotify_ops::JobPoller;
//! use paynotify_store::{JobId, MemoryJobStore};
//!
//! # async fn example(job_id: JobId) {
//! let store = Arc::new(MemoryJobStore::new());
//! let poller = JobPoller::new(store, job_id, Duration::from_secs(2), Duration::from_secs(180));
//!
//! let mut updates = Box::pin(poller.into_stream());
//! while let Some(update) = updates.next().await {
//!     match update {
//!         Ok(record) => println!("{}: {}", record.job_id, record.status),
//!         Err(e) => eprintln!("{}", e),
//!     }
//! }
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures::{Stream, StreamExt};
use paynotify_store::{JobId, JobReader, JobRecord, JobStatus, StoreError};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::PollError;

/// Polls one job until it reaches a terminal status.
pub struct JobPoller<R: JobReader + ?Sized> {
    reader: Arc<R>,
    job_id: JobId,
    interval: Duration,
    timeout: Duration,
}

struct PollState<R: JobReader + ?Sized> {
    reader: Arc<R>,
    job_id: JobId,
    interval: Duration,
    started: Instant,
    deadline: Instant,
    last_status: Option<JobStatus>,
    first: bool,
    done: bool,
}

impl<R: JobReader + ?Sized> PollState<R> {
    async fn next_item(&mut self) -> Option<Result<JobRecord, PollError>> {
        if self.done {
            return None;
        }

        loop {
            if self.first {
                self.first = false;
            } else {
                let now = Instant::now();
                let remaining = self.deadline.saturating_duration_since(now);
                tokio::time::sleep(self.interval.min(remaining)).await;
            }

            match self.reader.read_job(&self.job_id).await {
                Ok(record) if record.is_terminal() => {
                    self.done = true;
                    return Some(Ok(record));
                }
                Ok(record) if self.last_status != Some(record.status) => {
                    self.last_status = Some(record.status);
                    return Some(Ok(record));
                }
                Ok(_) => {}
                Err(StoreError::NotFound(_)) => {
                    debug!(job_id = %self.job_id, "Job not visible yet");
                }
                Err(StoreError::Unavailable(reason)) => {
                    warn!(job_id = %self.job_id, reason = %reason, "Job source unavailable, still polling");
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(PollError::Store(e)));
                }
            }

            if Instant::now() >= self.deadline {
                self.done = true;
                return Some(Err(PollError::TimedOut {
                    job_id: self.job_id.clone(),
                    last_status: self.last_status,
                    waited: self.started.elapsed(),
                }));
            }
        }
    }
}

impl<R: JobReader + ?Sized> JobPoller<R> {
    /// Create a poller reading every `interval` for at most `timeout`.
    pub fn new(reader: Arc<R>, job_id: JobId, interval: Duration, timeout: Duration) -> Self {
        Self {
            reader,
            job_id,
            interval,
            timeout,
        }
    }

    /// Snapshots of the job, one per observed status change.
    ///
    /// The first read happens when the stream is first polled. The stream
    /// ends right after a terminal snapshot, or after a single
    /// `PollError::TimedOut` / `PollError::Store` item.
    pub fn into_stream(self) -> impl Stream<Item = Result<JobRecord, PollError>> {
        let started = Instant::now();
        let state = PollState {
            reader: self.reader,
            job_id: self.job_id,
            interval: self.interval,
            started,
            deadline: started + self.timeout,
            last_status: None,
            first: true,
            done: false,
        };

        futures::stream::unfold(state, |mut state| async move {
            let item = state.next_item().await?;
            Some((item, state))
        })
    }

    /// Poll until the job is terminal and return its final record.
    pub async fn wait(self) -> Result<JobRecord, PollError> {
        let stream = self.into_stream();
        futures::pin_mut!(stream);

        while let Some(update) = stream.next().await {
            let record = update?;
            if record.is_terminal() {
                return Ok(record);
            }
        }
        Err(PollError::Ended)
    }
}
