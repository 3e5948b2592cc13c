//! Access log database on disk and in memory.

use labgate_core::{CardUid, DoorRole, ScanEvent};
use labgate_storage::connection::{Database, DatabaseConfig};
use labgate_storage::{ScanEventRepository, SqliteScanEventRepository};
use std::sync::Arc;
use tokio::sync::Barrier;
use tokio::task::JoinSet;

#[tokio::test]
async fn test_in_memory_database_starts_empty() {
    let db = Database::in_memory().await.unwrap();
    let records = SqliteScanEventRepository::new(db.pool().clone()).recent(10).await.unwrap();

    assert!(records.is_empty());
    db.close().await;
}

#[tokio::test]
async fn test_file_database_uses_wal() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::new(DatabaseConfig::new(dir.path().join("labgate.db")))
        .await
        .unwrap();

    let (mode,): (String,) = sqlx::query_as("PRAGMA journal_mode").fetch_one(db.pool()).await.unwrap();

    assert_eq!(mode.to_lowercase(), "wal");
    db.close().await;
}

#[tokio::test]
async fn test_migration_idempotency() {
    let db = Database::in_memory().await.unwrap();

    db.migrate().await.unwrap();
    db.migrate().await.unwrap();

    let result: (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='scan_events'")
            .fetch_one(db.pool())
            .await
            .unwrap();

    assert_eq!(result.0, 1);

    db.close().await;
}

#[tokio::test]
async fn test_file_database_persists_across_pools() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("labgate.db");

    let mut event = ScanEvent::new(CardUid::from_hex("04a2b3c4").unwrap(), DoorRole::Outside);
    event.complete(false, false);

    {
        let db = Database::new(DatabaseConfig::new(path.clone())).await.unwrap();
        SqliteScanEventRepository::new(db.pool().clone())
            .insert(&event)
            .await
            .unwrap();
        db.close().await;
    }

    let db = Database::new(DatabaseConfig::new(path)).await.unwrap();
    let records = SqliteScanEventRepository::new(db.pool().clone())
        .recent(5)
        .await
        .unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, event.id.to_string());
    assert!(!records[0].success);
    db.close().await;
}

#[tokio::test]
async fn test_concurrent_inserts_from_two_doors() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("labgate.db");
    let db = Database::new(DatabaseConfig::new(path))
        .await
        .unwrap();

    const PER_DOOR: usize = 10;
    let barrier = Arc::new(Barrier::new(2));
    let mut tasks = JoinSet::new();

    for role in [DoorRole::Inside, DoorRole::Outside] {
        let repo = SqliteScanEventRepository::new(db.pool().clone());
        let barrier = Arc::clone(&barrier);

        tasks.spawn(async move {
            barrier.wait().await;
            for _ in 0..PER_DOOR {
                let mut event = ScanEvent::new(CardUid::from_hex("04a2b3c4").unwrap(), role);
                event.complete(true, true);
                repo.insert(&event).await.unwrap();
            }
        });
    }

    while let Some(result) = tasks.join_next().await {
        result.unwrap();
    }

    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM scan_events")
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(count, (PER_DOOR * 2) as i64);

    db.close().await;
}
