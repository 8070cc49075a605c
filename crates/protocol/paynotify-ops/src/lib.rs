//! Job pipeline for paynotify.
//!
//! This crate turns "notify this user" into a tracked background job and
//! runs it through the x402 payment flow.
//!
//! ```text
//!  Enqueuer ──create(queued)──→ JobStore ←──running / terminal── Worker
//!     │                            ↑                               ↑
//!     └──push──→ QueueBackend ──pop─┼──────→ WorkerPool ───────────┘
//!                                   │
//!                      JobPoller ───┘ (read until terminal)
//! ```
//!
//! # Module Organization
//!
//! - [`error`] - [`OpsError`] and [`PollError`]
//! - [`config`] - [`WorkerConfig`] and [`PollConfig`]
//! - [`queue`] - [`QueueBackend`] with in-process and durable backends
//! - [`enqueue`] - [`Enqueuer`]
//! - [`worker`] - [`Worker`], one job at a time
//! - [`pool`] - [`WorkerPool`], bounded concurrent workers with shutdown
//! - [`poller`] - [`JobPoller`], a finite stream of status snapshots
//! - [`fanout`] - [`fan_out`], one message to many destinations
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use paynotify_ops::{Enqueuer, InProcessQueue, Worker, WorkerConfig, WorkerPool};
//! use paynotify_store::{MemoryJobStore, MemorySubscriberStore, SubscriberStore};
//! # use paynotify_x402::Notifier;
//!
//! # async fn example(notifier: Arc<dyn Notifier>) -> paynotify_ops::OpsResult<()> {
//! let jobs = Arc::new(MemoryJobStore::new());
//! let subscribers = Arc::new(MemorySubscriberStore::new());
//! let queue = Arc::new(InProcessQueue::new());
//!
//! subscribers.subscribe("alice", "123456789").await?;
//!
//! let enqueuer = Enqueuer::new(jobs.clone(), subscribers, queue.clone());
//! let job_id = enqueuer.enqueue("alice", "Whale alert").await?;
//!
//! let (_shutdown, rx) = tokio::sync::watch::channel(false);
//! let pool = WorkerPool::new(Worker::new(jobs, notifier), queue, &WorkerConfig::default());
//! pool.spawn(rx);
//! # let _ = job_id;
//! # Ok(())
//! # }
//! ```
//!
//! # Delivery Guarantees
//!
//! Each job gets exactly one terminal update per processing attempt. With
//! [`InProcessQueue`] a crash mid-job leaves it `running` forever. With
//! [`DurableQueue`] the item is redelivered after the visibility timeout; a
//! redelivered job that already reached a terminal status is skipped, but
//! one that crashed after paying will pay again.

pub mod config;
pub mod enqueue;
pub mod error;
pub mod fanout;
pub mod poller;
pub mod pool;
pub mod queue;
pub mod worker;

pub use config::{PollConfig, WorkerConfig};
pub use enqueue::Enqueuer;
pub use error::{OpsError, OpsResult, PollError};
pub use fanout::{fan_out, spawn_fan_out, FanOutOutcome};
pub use poller::JobPoller;
pub use pool::{PoolStats, WorkerPool};
pub use queue::{
    Delivery, DeliveryGuarantee, DurableQueue, InProcessQueue, QueueBackend,
    DEFAULT_IN_PROCESS_CAPACITY,
};
pub use worker::{ProcessOutcome, Worker};
