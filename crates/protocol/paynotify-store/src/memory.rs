//! In-memory stores for tests and single-process runs.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::error::{StoreError, StoreResult};
use crate::traits::{JobStore, SubscriberStore};
use crate::types::{JobId, JobRecord, JobUpdate, Subscription};

/// Job store held in a map.
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<JobId, JobRecord>>,
}

impl MemoryJobStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored jobs.
    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    /// True if no jobs are stored.
    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }

    /// Snapshot of every stored job, in no particular order.
    pub async fn all(&self) -> Vec<JobRecord> {
        self.jobs.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create(&self, job_id: &JobId, user_id: &str) -> StoreResult<JobRecord> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(job_id) {
            return Err(StoreError::JobExists(job_id.to_string()));
        }
        let record = JobRecord::queued(job_id.clone(), user_id, Utc::now());
        jobs.insert(job_id.clone(), record.clone());
        Ok(record)
    }

    async fn apply_update(&self, job_id: &JobId, update: JobUpdate) -> StoreResult<JobRecord> {
        let now = Utc::now();
        let mut jobs = self.jobs.write().await;
        let record = jobs
            .entry(job_id.clone())
            .or_insert_with(|| JobRecord::queued(job_id.clone(), "", now));

        record.status = update.status;
        record.result = update.result;
        record.error = update.error;
        if update.payment_tx.is_some() {
            record.payment_tx = update.payment_tx;
        }
        record.updated_at = now;
        Ok(record.clone())
    }

    async fn get(&self, job_id: &JobId) -> StoreResult<JobRecord> {
        self.jobs
            .read()
            .await
            .get(job_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(job_id.to_string()))
    }
}

/// Subscriber directory held in a map.
#[derive(Default)]
pub struct MemorySubscriberStore {
    subscriptions: RwLock<HashMap<String, Subscription>>,
}

impl MemorySubscriberStore {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SubscriberStore for MemorySubscriberStore {
    async fn subscribe(&self, user_id: &str, destination: &str) -> StoreResult<Subscription> {
        let mut subs = self.subscriptions.write().await;
        let sub = subs
            .entry(user_id.to_string())
            .or_insert_with(|| Subscription {
                user_id: user_id.to_string(),
                destination: destination.to_string(),
                created_at: Utc::now(),
            });
        sub.destination = destination.to_string();
        Ok(sub.clone())
    }

    async fn unsubscribe(&self, user_id: &str) -> StoreResult<bool> {
        Ok(self.subscriptions.write().await.remove(user_id).is_some())
    }

    async fn resolve(&self, user_id: &str) -> StoreResult<Option<String>> {
        Ok(self
            .subscriptions
            .read()
            .await
            .get(user_id)
            .map(|s| s.destination.clone()))
    }

    async fn list(&self) -> StoreResult<Vec<Subscription>> {
        let mut subs: Vec<Subscription> =
            self.subscriptions.read().await.values().cloned().collect();
        subs.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.user_id.cmp(&b.user_id))
        });
        Ok(subs)
    }
}
