//! Storage layer for paynotify.
//!
//! This crate persists everything the job pipeline needs:
//!
//! - **Jobs** (SQLite or memory): one [`JobRecord`] per enqueued delivery
//! - **Subscriptions** (SQLite or memory): user id → delivery destination
//! - **Work queue** (SQLite): durable queue with claim + visibility timeout
//!
//! # Storage Layout
//!
//! ```text
//! ~/.local/share/paynotify/
//! ├── paynotify.toml           # Service configuration
//! └── paynotify.db             # SQLite: jobs, subscriptions, work_queue
//! ```
//!
//! # Example
//!
//! ```no_run
//! use paynotify_store::{Database, JobId, JobStore, StoreConfig};
//!
//! # async fn example() -> paynotify_store::StoreResult<()> {
//! let db = Database::open(StoreConfig::new("/tmp/paynotify"))?;
//!
//! let id = JobId::generate();
//! db.jobs.create(&id, "alice").await?;
//! let record = db.jobs.get(&id).await?;
//! assert_eq!(record.user_id, "alice");
//! # Ok(())
//! # }
//! ```
//!
//! # Trait-Based Design
//!
//! [`JobStore`] and [`SubscriberStore`] have SQLite and in-memory
//! implementations. [`JobReader`] is the read-only slice used by pollers and
//! is implemented for every job store.

pub mod error;
pub mod jobs;
pub mod memory;
pub mod queue;
pub mod schema;
pub mod subscribers;
pub mod traits;
pub mod types;

// Re-export error types
pub use error::{StoreError, StoreResult};

// Re-export traits
pub use traits::{JobReader, JobStore, SubscriberStore};

// Re-export types
pub use types::{ClaimedWork, JobId, JobRecord, JobStatus, JobUpdate, Subscription, WorkItem};

// Re-export implementations
pub use jobs::SqliteJobStore;
pub use memory::{MemoryJobStore, MemorySubscriberStore};
pub use queue::SqliteWorkQueue;
pub use subscribers::SqliteSubscriberStore;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rusqlite::Connection;

/// Get the default data directory.
///
/// Priority:
/// 1. `PAYNOTIFY_DATA_DIR` environment variable (if set)
/// 2. Platform-specific data directory
/// 3. Fallback to `$HOME/.paynotify`
pub fn default_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("PAYNOTIFY_DATA_DIR") {
        return PathBuf::from(dir);
    }

    directories::ProjectDirs::from("io", "paynotify", "paynotify")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| {
            std::env::var("HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("."))
                .join(".paynotify")
        })
}

/// Where the database lives.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Base directory for all data.
    pub base_dir: PathBuf,
    /// Database file path (default: base_dir/paynotify.db).
    pub database_path: Option<PathBuf>,
}

impl StoreConfig {
    /// Create a new configuration with the given base directory.
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
            database_path: None,
        }
    }

    /// Set the database path.
    pub fn with_database_path(mut self, path: impl AsRef<Path>) -> Self {
        self.database_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Get the database path.
    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| self.base_dir.join("paynotify.db"))
    }
}

/// All SQLite-backed stores over one shared connection.
pub struct Database {
    /// Job records.
    pub jobs: SqliteJobStore,
    /// Subscriber directory.
    pub subscribers: SqliteSubscriberStore,
    /// Durable work queue.
    pub queue: SqliteWorkQueue,
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the database described by `config`.
    pub fn open(config: StoreConfig) -> StoreResult<Self> {
        std::fs::create_dir_all(&config.base_dir)?;

        let db_path = config.database_path();
        tracing::info!(db_path = %db_path.display(), "Opening paynotify database");
        let conn = Connection::open(&db_path)?;
        Self::from_connection(conn)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> StoreResult<Self> {
        schema::initialize_schema(&conn)?;
        let conn = Arc::new(Mutex::new(conn));

        Ok(Self {
            jobs: SqliteJobStore::new(Arc::clone(&conn)),
            subscribers: SqliteSubscriberStore::new(Arc::clone(&conn)),
            queue: SqliteWorkQueue::new(Arc::clone(&conn)),
            conn,
        })
    }

    /// Get a reference to the shared database connection.
    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_config_paths() {
        let config = StoreConfig::new("/data");
        assert_eq!(config.database_path(), PathBuf::from("/data/paynotify.db"));

        let config = config.with_database_path("/elsewhere/db.sqlite");
        assert_eq!(config.database_path(), PathBuf::from("/elsewhere/db.sqlite"));
    }

    #[tokio::test]
    async fn test_open_in_memory_shares_connection() {
        let db = Database::open_in_memory().unwrap();
        let id = JobId::generate();
        db.jobs.create(&id, "alice").await.unwrap();
        db.queue
            .push(&WorkItem {
                job_id: id.clone(),
                user_id: "alice".into(),
                destination: "1".into(),
                message: "hi".into(),
            })
            .unwrap();

        let conn = db.connection();
        let conn = conn.lock().unwrap();
        let jobs: i64 = conn
            .query_row("SELECT COUNT(*) FROM jobs", [], |r| r.get(0))
            .unwrap();
        assert_eq!(jobs, 1);
    }
}
