//! SQLite job storage.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::traits::JobStore;
use crate::types::{JobId, JobRecord, JobStatus, JobUpdate};

const JOB_COLUMNS: &str =
    "job_id, user_id, status, result, error, payment_tx, created_at, updated_at";

/// SQLite-backed job store.
#[derive(Clone)]
pub struct SqliteJobStore {
    conn: Arc<Mutex<Connection>>,
}

/// Job row as stored, before parsing.
struct RawJob {
    job_id: String,
    user_id: String,
    status: String,
    result: Option<String>,
    error: Option<String>,
    payment_tx: Option<String>,
    created_at: String,
    updated_at: String,
}

impl RawJob {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            job_id: row.get(0)?,
            user_id: row.get(1)?,
            status: row.get(2)?,
            result: row.get(3)?,
            error: row.get(4)?,
            payment_tx: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }

    fn into_record(self) -> StoreResult<JobRecord> {
        Ok(JobRecord {
            job_id: JobId::new(self.job_id),
            user_id: self.user_id,
            status: self.status.parse()?,
            result: self
                .result
                .as_deref()
                .map(serde_json::from_str)
                .transpose()?,
            error: self.error,
            payment_tx: self.payment_tx,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(s: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| StoreError::invalid_data(format!("bad timestamp {:?}: {}", s, e)))
}

impl SqliteJobStore {
    /// Create a job store over the given connection.
    ///
    /// The schema must already be initialized.
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn lock(&self) -> StoreResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::lock_poisoned("database connection lock poisoned"))
    }

    /// Count jobs in each status.
    pub fn count_by_status(&self) -> StoreResult<Vec<(JobStatus, u64)>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM jobs GROUP BY status")?;
        let rows: Vec<(String, i64)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<_>>()?;

        rows.into_iter()
            .map(|(status, count)| Ok((status.parse()?, count as u64)))
            .collect()
    }
}

#[async_trait]
impl JobStore for SqliteJobStore {
    async fn create(&self, job_id: &JobId, user_id: &str) -> StoreResult<JobRecord> {
        let record = JobRecord::queued(job_id.clone(), user_id, Utc::now());
        let now = format_timestamp(&record.created_at);

        let conn = self.lock()?;
        let inserted = conn.execute(
            "INSERT INTO jobs (job_id, user_id, status, result, error, created_at, updated_at)
             VALUES (?1, ?2, ?3, NULL, NULL, ?4, ?4)",
            params![job_id.as_str(), user_id, JobStatus::Queued.as_str(), now],
        );

        match inserted {
            Ok(_) => {
                debug!(job_id = %job_id, user_id, "Job created");
                Ok(record)
            }
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == ErrorCode::ConstraintViolation =>
            {
                Err(StoreError::JobExists(job_id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn apply_update(&self, job_id: &JobId, update: JobUpdate) -> StoreResult<JobRecord> {
        let now = format_timestamp(&Utc::now());
        let result = update
            .result
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let conn = self.lock()?;
        let raw = conn.query_row(
            &format!(
                "INSERT INTO jobs (job_id, user_id, status, result, error, payment_tx, created_at, updated_at)
                 VALUES (?1, '', ?2, ?3, ?4, ?5, ?6, ?6)
                 ON CONFLICT(job_id) DO UPDATE SET
                    status = excluded.status,
                    result = excluded.result,
                    error = excluded.error,
                    payment_tx = COALESCE(excluded.payment_tx, jobs.payment_tx),
                    updated_at = excluded.updated_at
                 RETURNING {}",
                JOB_COLUMNS
            ),
            params![
                job_id.as_str(),
                update.status.as_str(),
                result,
                update.error,
                update.payment_tx,
                now
            ],
            RawJob::from_row,
        )?;
        drop(conn);

        debug!(job_id = %job_id, status = %update.status, "Job updated");
        raw.into_record()
    }

    async fn get(&self, job_id: &JobId) -> StoreResult<JobRecord> {
        let conn = self.lock()?;
        let raw = conn
            .query_row(
                &format!("SELECT {} FROM jobs WHERE job_id = ?1", JOB_COLUMNS),
                [job_id.as_str()],
                RawJob::from_row,
            )
            .optional()?;
        drop(conn);

        raw.ok_or_else(|| StoreError::NotFound(job_id.to_string()))?
            .into_record()
    }
}
