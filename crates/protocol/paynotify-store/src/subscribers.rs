//! SQLite subscription storage.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use crate::error::{StoreError, StoreResult};
use crate::jobs::{format_timestamp, parse_timestamp};
use crate::traits::SubscriberStore;
use crate::types::Subscription;

/// SQLite-backed subscriber directory.
#[derive(Clone)]
pub struct SqliteSubscriberStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSubscriberStore {
    /// Create a subscriber store over the given connection.
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn lock(&self) -> StoreResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::lock_poisoned("database connection lock poisoned"))
    }
}

fn row_to_parts(row: &rusqlite::Row) -> rusqlite::Result<(String, String, String)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
}

fn parts_to_subscription(parts: (String, String, String)) -> StoreResult<Subscription> {
    let (user_id, destination, created_at) = parts;
    Ok(Subscription {
        user_id,
        destination,
        created_at: parse_timestamp(&created_at)?,
    })
}

#[async_trait]
impl SubscriberStore for SqliteSubscriberStore {
    async fn subscribe(&self, user_id: &str, destination: &str) -> StoreResult<Subscription> {
        let now = format_timestamp(&Utc::now());
        let conn = self.lock()?;
        let parts = conn.query_row(
            "INSERT INTO subscriptions (user_id, destination, created_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(user_id) DO UPDATE SET destination = excluded.destination
             RETURNING user_id, destination, created_at",
            params![user_id, destination, now],
            row_to_parts,
        )?;
        drop(conn);

        info!(user_id, destination, "Subscribed");
        parts_to_subscription(parts)
    }

    async fn unsubscribe(&self, user_id: &str) -> StoreResult<bool> {
        let conn = self.lock()?;
        let removed = conn.execute("DELETE FROM subscriptions WHERE user_id = ?1", [user_id])?;
        if removed > 0 {
            info!(user_id, "Unsubscribed");
        }
        Ok(removed > 0)
    }

    async fn resolve(&self, user_id: &str) -> StoreResult<Option<String>> {
        let conn = self.lock()?;
        let destination = conn
            .query_row(
                "SELECT destination FROM subscriptions WHERE user_id = ?1",
                [user_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(destination)
    }

    async fn list(&self) -> StoreResult<Vec<Subscription>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT user_id, destination, created_at FROM subscriptions
             ORDER BY created_at ASC, user_id ASC",
        )?;
        let rows: Vec<(String, String, String)> = stmt
            .query_map([], row_to_parts)?
            .collect::<rusqlite::Result<_>>()?;
        drop(stmt);
        drop(conn);

        rows.into_iter().map(parts_to_subscription).collect()
    }
}
