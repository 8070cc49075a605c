//! Durable work queue table.
//!
//! Rows stay in `work_queue` until acknowledged. A claim stamps
//! `claimed_at`; a claimed row that is not acknowledged within the
//! visibility timeout can be claimed again, which gives at-least-once
//! delivery across worker crashes.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::types::{ClaimedWork, JobId, WorkItem};

/// SQLite-backed work queue.
#[derive(Clone)]
pub struct SqliteWorkQueue {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteWorkQueue {
    /// Create a work queue over the given connection.
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn lock(&self) -> StoreResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::lock_poisoned("database connection lock poisoned"))
    }

    /// Append an item. Returns its queue id.
    pub fn push(&self, item: &WorkItem) -> StoreResult<i64> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO work_queue (job_id, user_id, destination, message, enqueued_at, claimed_at, attempts)
             VALUES (?1, ?2, ?3, ?4, ?5, NULL, 0)",
            params![
                item.job_id.as_str(),
                item.user_id,
                item.destination,
                item.message,
                Utc::now().timestamp_millis(),
            ],
        )?;
        let id = conn.last_insert_rowid();
        debug!(queue_id = id, job_id = %item.job_id, "Work queued");
        Ok(id)
    }

    /// Claim the oldest visible item.
    ///
    /// An item is visible if it was never claimed or its claim is older than
    /// `visibility_timeout`. The select-and-stamp is one statement.
    pub fn claim(&self, visibility_timeout: Duration) -> StoreResult<Option<ClaimedWork>> {
        let now = Utc::now().timestamp_millis();
        let expired_before = now - visibility_timeout.as_millis() as i64;

        let conn = self.lock()?;
        let claimed = conn
            .query_row(
                "UPDATE work_queue SET claimed_at = ?1, attempts = attempts + 1
                 WHERE id = (
                    SELECT id FROM work_queue
                    WHERE claimed_at IS NULL OR claimed_at <= ?2
                    ORDER BY id ASC LIMIT 1
                 )
                 RETURNING id, job_id, user_id, destination, message, attempts",
                params![now, expired_before],
                |row| {
                    Ok(ClaimedWork {
                        queue_id: row.get(0)?,
                        item: WorkItem {
                            job_id: JobId::new(row.get::<_, String>(1)?),
                            user_id: row.get(2)?,
                            destination: row.get(3)?,
                            message: row.get(4)?,
                        },
                        attempts: row.get(5)?,
                    })
                },
            )
            .optional()?;

        if let Some(work) = &claimed {
            if work.attempts > 1 {
                warn!(
                    queue_id = work.queue_id,
                    job_id = %work.item.job_id,
                    attempts = work.attempts,
                    "Redelivering unacknowledged work"
                );
            }
        }
        Ok(claimed)
    }

    /// Remove an item after it has been processed. Returns whether it existed.
    pub fn ack(&self, queue_id: i64) -> StoreResult<bool> {
        let conn = self.lock()?;
        let removed = conn.execute("DELETE FROM work_queue WHERE id = ?1", [queue_id])?;
        Ok(removed > 0)
    }

    /// Number of items not yet acknowledged (claimed or not).
    pub fn depth(&self) -> StoreResult<u64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM work_queue", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::initialize_schema;

    fn queue() -> SqliteWorkQueue {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();
        SqliteWorkQueue::new(Arc::new(Mutex::new(conn)))
    }

    fn item(n: u32) -> WorkItem {
        WorkItem {
            job_id: JobId::new(format!("job-{}", n)),
            user_id: "alice".into(),
            destination: "1001".into(),
            message: format!("msg {}", n),
        }
    }

    #[test]
    fn test_claim_in_order_and_ack() {
        let queue = queue();
        queue.push(&item(1)).unwrap();
        queue.push(&item(2)).unwrap();

        let first = queue.claim(Duration::from_secs(30)).unwrap().unwrap();
        assert_eq!(first.item, item(1));
        assert_eq!(first.attempts, 1);

        let second = queue.claim(Duration::from_secs(30)).unwrap().unwrap();
        assert_eq!(second.item, item(2));

        // Both claimed, nothing visible
        assert!(queue.claim(Duration::from_secs(30)).unwrap().is_none());

        assert!(queue.ack(first.queue_id).unwrap());
        assert!(!queue.ack(first.queue_id).unwrap());
        assert_eq!(queue.depth().unwrap(), 1);
    }

    #[test]
    fn test_unacked_item_redelivered_after_visibility_timeout() {
        let queue = queue();
        queue.push(&item(7)).unwrap();

        let first = queue.claim(Duration::from_millis(40)).unwrap().unwrap();
        assert!(queue.claim(Duration::from_millis(40)).unwrap().is_none());

        std::thread::sleep(Duration::from_millis(80));

        let again = queue.claim(Duration::from_millis(40)).unwrap().unwrap();
        assert_eq!(again.queue_id, first.queue_id);
        assert_eq!(again.item, item(7));
        assert_eq!(again.attempts, 2);
    }

    #[test]
    fn test_empty_queue() {
        let queue = queue();
        assert!(queue.claim(Duration::from_secs(1)).unwrap().is_none());
        assert_eq!(queue.depth().unwrap(), 0);
    }
}
