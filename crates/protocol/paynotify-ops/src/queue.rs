//! Work queue backends.
//!
//! The [`Enqueuer`](crate::Enqueuer) pushes work and the
//! [`WorkerPool`](crate::WorkerPool) pops it. Two backends exist:
//!
//! | Backend           | Storage          | Guarantee      |
//! |-------------------|------------------|----------------|
//! | [`InProcessQueue`] | bounded tokio mpsc | at-most-once |
//! | [`DurableQueue`]   | SQLite work_queue | at-least-once  |

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use paynotify_store::{SqliteWorkQueue, WorkItem};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::error::{OpsError, OpsResult};

/// What a backend promises about lost or repeated work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryGuarantee {
    /// Lost on crash, never repeated.
    AtMostOnce,
    /// Repeated after a crash, never lost.
    AtLeastOnce,
}

/// A popped work item plus the handle needed to acknowledge it.
#[derive(Debug, Clone)]
pub struct Delivery {
    /// The work.
    pub item: WorkItem,
    /// Backend receipt (durable queue row id).
    pub receipt: Option<i64>,
    /// How many times this item has been handed out, including now.
    pub attempts: u32,
}

/// Queue between the enqueuer and the workers.
#[async_trait]
pub trait QueueBackend: Send + Sync {
    /// Add an item.
    async fn push(&self, item: WorkItem) -> OpsResult<()>;

    /// Wait for the next item. `None` once the queue is closed and drained.
    ///
    /// Must be cancel-safe: dropping the future loses no item.
    async fn pop(&self) -> OpsResult<Option<Delivery>>;

    /// Mark a delivery as processed.
    async fn ack(&self, delivery: &Delivery) -> OpsResult<()>;

    /// The backend's delivery guarantee.
    fn guarantee(&self) -> DeliveryGuarantee;

    /// Stop accepting pushes and end `pop` once drained.
    fn close(&self);
}

// =============================================================================
// In-process
// =============================================================================

/// Default number of items an [`InProcessQueue`] holds before refusing pushes.
pub const DEFAULT_IN_PROCESS_CAPACITY: usize = 1024;

/// Bounded tokio channel. Items die with the process.
///
/// A full queue refuses the push with [`OpsError::Queue`] instead of
/// waiting, so callers see back-pressure at once.
pub struct InProcessQueue {
    tx: Mutex<Option<mpsc::Sender<WorkItem>>>,
    rx: tokio::sync::Mutex<mpsc::Receiver<WorkItem>>,
    capacity: usize,
}

impl Default for InProcessQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl InProcessQueue {
    /// Create an empty queue with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_IN_PROCESS_CAPACITY)
    }

    /// Create an empty queue holding at most `capacity` items (at least 1).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            tx: Mutex::new(Some(tx)),
            rx: tokio::sync::Mutex::new(rx),
            capacity,
        }
    }

    fn sender(&self) -> OpsResult<mpsc::Sender<WorkItem>> {
        self.tx
            .lock()
            .map_err(|_| OpsError::queue("queue sender lock poisoned"))?
            .clone()
            .ok_or(OpsError::QueueClosed)
    }
}

#[async_trait]
impl QueueBackend for InProcessQueue {
    async fn push(&self, item: WorkItem) -> OpsResult<()> {
        let job_id = item.job_id.clone();
        self.sender()?.try_send(item).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => OpsError::queue(format!(
                "in-process queue is full ({} items)",
                self.capacity
            )),
            mpsc::error::TrySendError::Closed(_) => OpsError::QueueClosed,
        })?;
        trace!(job_id = %job_id, "Work pushed to in-process queue");
        Ok(())
    }

    async fn pop(&self) -> OpsResult<Option<Delivery>> {
        let mut rx = self.rx.lock().await;
        Ok(rx.recv().await.map(|item| Delivery {
            item,
            receipt: None,
            attempts: 1,
        }))
    }

    async fn ack(&self, _delivery: &Delivery) -> OpsResult<()> {
        Ok(())
    }

    fn guarantee(&self) -> DeliveryGuarantee {
        DeliveryGuarantee::AtMostOnce
    }

    fn close(&self) {
        if let Ok(mut tx) = self.tx.lock() {
            tx.take();
        }
    }
}

// =============================================================================
// Durable
// =============================================================================

/// SQLite-backed queue with claim and visibility timeout.
pub struct DurableQueue {
    queue: SqliteWorkQueue,
    visibility_timeout: Duration,
    idle_poll_interval: Duration,
    closed: AtomicBool,
}

impl DurableQueue {
    /// Wrap a work queue table.
    pub fn new(
        queue: SqliteWorkQueue,
        visibility_timeout: Duration,
        idle_poll_interval: Duration,
    ) -> Self {
        Self {
            queue,
            visibility_timeout,
            idle_poll_interval,
            closed: AtomicBool::new(false),
        }
    }

    /// Items not yet acknowledged.
    pub fn depth(&self) -> OpsResult<u64> {
        Ok(self.queue.depth()?)
    }
}

#[async_trait]
impl QueueBackend for DurableQueue {
    async fn push(&self, item: WorkItem) -> OpsResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(OpsError::QueueClosed);
        }
        self.queue.push(&item)?;
        Ok(())
    }

    async fn pop(&self) -> OpsResult<Option<Delivery>> {
        loop {
            if self.closed.load(Ordering::SeqCst) {
                return Ok(None);
            }
            match self.queue.claim(self.visibility_timeout) {
                Ok(Some(claimed)) => {
                    debug!(
                        queue_id = claimed.queue_id,
                        job_id = %claimed.item.job_id,
                        attempts = claimed.attempts,
                        "Claimed work"
                    );
                    return Ok(Some(Delivery {
                        item: claimed.item,
                        receipt: Some(claimed.queue_id),
                        attempts: claimed.attempts,
                    }));
                }
                Ok(None) => {}
                // Another connection holds the write lock; poll again.
                Err(e) if e.is_transient() => {
                    warn!(error = %e, "Work queue busy, retrying claim");
                }
                Err(e) => return Err(e.into()),
            }
            tokio::time::sleep(self.idle_poll_interval).await;
        }
    }

    async fn ack(&self, delivery: &Delivery) -> OpsResult<()> {
        let queue_id = delivery
            .receipt
            .ok_or_else(|| OpsError::queue("delivery has no queue receipt"))?;
        if !self.queue.ack(queue_id)? {
            debug!(queue_id, "Ack for work that was already removed");
        }
        Ok(())
    }

    fn guarantee(&self) -> DeliveryGuarantee {
        DeliveryGuarantee::AtLeastOnce
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use paynotify_store::{Database, JobId};

    fn item(n: u32) -> WorkItem {
        WorkItem {
            job_id: JobId::new(format!("job-{}", n)),
            user_id: "alice".into(),
            destination: "1001".into(),
            message: format!("msg {}", n),
        }
    }

    #[tokio::test]
    async fn test_in_process_fifo() {
        let queue = InProcessQueue::new();
        queue.push(item(1)).await.unwrap();
        queue.push(item(2)).await.unwrap();

        let first = queue.pop().await.unwrap().unwrap();
        let second = queue.pop().await.unwrap().unwrap();
        assert_eq!(first.item.job_id.as_str(), "job-1");
        assert_eq!(second.item.job_id.as_str(), "job-2");
        assert_eq!(queue.guarantee(), DeliveryGuarantee::AtMostOnce);
    }

    #[tokio::test]
    async fn test_in_process_close_drains_then_ends() {
        let queue = InProcessQueue::new();
        queue.push(item(1)).await.unwrap();
        queue.close();

        assert!(matches!(
            queue.push(item(2)).await,
            Err(OpsError::QueueClosed)
        ));
        assert!(queue.pop().await.unwrap().is_some());
        assert!(queue.pop().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_in_process_full_queue_refuses_push() {
        let queue = InProcessQueue::with_capacity(2);
        queue.push(item(1)).await.unwrap();
        queue.push(item(2)).await.unwrap();

        let err = queue.push(item(3)).await.unwrap_err();
        assert!(matches!(err, OpsError::Queue(ref m) if m.contains("full")));

        // Popping frees a slot.
        queue.pop().await.unwrap().unwrap();
        queue.push(item(3)).await.unwrap();
    }

    #[tokio::test]
    async fn test_durable_ack_removes() {
        let db = Database::open_in_memory().unwrap();
        let queue = DurableQueue::new(
            db.queue.clone(),
            Duration::from_secs(60),
            Duration::from_millis(10),
        );
        queue.push(item(1)).await.unwrap();

        let delivery = queue.pop().await.unwrap().unwrap();
        assert_eq!(delivery.attempts, 1);
        assert!(delivery.receipt.is_some());
        assert_eq!(queue.depth().unwrap(), 1);

        queue.ack(&delivery).await.unwrap();
        assert_eq!(queue.depth().unwrap(), 0);
        assert_eq!(queue.guarantee(), DeliveryGuarantee::AtLeastOnce);
    }

    #[tokio::test]
    async fn test_durable_claimed_item_hidden_until_timeout() {
        let db = Database::open_in_memory().unwrap();
        let queue = DurableQueue::new(
            db.queue.clone(),
            Duration::from_secs(60),
            Duration::from_millis(10),
        );
        queue.push(item(1)).await.unwrap();
        let _claimed = queue.pop().await.unwrap().unwrap();

        let second = tokio::time::timeout(Duration::from_millis(100), queue.pop()).await;
        assert!(second.is_err(), "claimed item must stay hidden");
    }

    #[tokio::test]
    async fn test_durable_close_ends_pop() {
        let db = Database::open_in_memory().unwrap();
        let queue = DurableQueue::new(
            db.queue.clone(),
            Duration::from_secs(60),
            Duration::from_millis(10),
        );
        queue.close();
        assert!(queue.pop().await.unwrap().is_none());
        assert!(matches!(
            queue.push(item(1)).await,
            Err(OpsError::QueueClosed)
        ));
    }
}
