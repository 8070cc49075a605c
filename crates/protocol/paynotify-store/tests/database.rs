//! File-backed database behavior.

use std::sync::Arc;

use paynotify_store::{
    Database, JobId, JobStatus, JobStore, JobUpdate, StoreConfig, SubscriberStore, WorkItem,
};
use serde_json::json;
use tempfile::TempDir;

#[tokio::test]
async fn test_state_survives_reopen() {
    let temp = TempDir::new().unwrap();
    let id = JobId::generate();

    {
        let db = Database::open(StoreConfig::new(temp.path())).unwrap();
        db.subscribers.subscribe("alice", "1001").await.unwrap();
        db.jobs.create(&id, "alice").await.unwrap();
        db.jobs
            .apply_update(&id, JobUpdate::finished(json!({"ok": true})))
            .await
            .unwrap();
        db.queue
            .push(&WorkItem {
                job_id: id.clone(),
                user_id: "alice".into(),
                destination: "1001".into(),
                message: "hello".into(),
            })
            .unwrap();
    }

    let db = Database::open(StoreConfig::new(temp.path())).unwrap();
    let record = db.jobs.get(&id).await.unwrap();
    assert_eq!(record.status, JobStatus::Finished);
    assert_eq!(record.result, Some(json!({"ok": true})));
    assert_eq!(
        db.subscribers.resolve("alice").await.unwrap().as_deref(),
        Some("1001")
    );
    assert_eq!(db.queue.depth().unwrap(), 1);
}

#[tokio::test]
async fn test_created_at_invariant_across_many_updates() {
    let temp = TempDir::new().unwrap();
    let db = Database::open(StoreConfig::new(temp.path())).unwrap();
    let id = JobId::generate();
    let created = db.jobs.create(&id, "alice").await.unwrap();

    for update in [
        JobUpdate::running(),
        JobUpdate::running(),
        JobUpdate::failed("gateway down"),
        JobUpdate::failed("gateway down"),
    ] {
        let record = db.jobs.apply_update(&id, update).await.unwrap();
        assert_eq!(record.created_at, created.created_at);
        assert_eq!(record.user_id, "alice");
    }
}

#[tokio::test]
async fn test_concurrent_updates_leave_one_consistent_row() {
    let temp = TempDir::new().unwrap();
    let db = Arc::new(Database::open(StoreConfig::new(temp.path())).unwrap());
    let id = JobId::generate();
    db.jobs.create(&id, "alice").await.unwrap();

    let mut handles = Vec::new();
    for n in 0..16 {
        let db = Arc::clone(&db);
        let id = id.clone();
        handles.push(tokio::spawn(async move {
            db.jobs
                .apply_update(&id, JobUpdate::finished(json!({"n": n})))
                .await
                .unwrap()
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let record = db.jobs.get(&id).await.unwrap();
    assert_eq!(record.status, JobStatus::Finished);
    let n = record.result.unwrap()["n"].as_i64().unwrap();
    assert!((0..16).contains(&n));
    assert!(record.error.is_none());
}

#[tokio::test]
async fn test_two_jobs_same_user_distinct() {
    let db = Database::open_in_memory().unwrap();
    let a = JobId::generate();
    let b = JobId::generate();
    assert_ne!(a, b);

    db.jobs.create(&a, "alice").await.unwrap();
    db.jobs.create(&b, "alice").await.unwrap();
    assert_eq!(db.jobs.get(&a).await.unwrap().user_id, "alice");
    assert_eq!(db.jobs.get(&b).await.unwrap().user_id, "alice");
}
