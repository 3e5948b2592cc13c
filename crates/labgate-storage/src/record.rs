#![allow(async_fn_in_trait)]

use crate::error::{StorageError, StorageResult};
use chrono::{DateTime, Utc};
use labgate_core::{CardUid, Direction, DoorRole, ScanEvent};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

/// One row of the `scan_events` table.
///
/// Written once per processed scan and never updated. `created_at` is the
/// time the row was written, `timestamp` the time the card was detected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ScanRecord {
    /// ScanEvent id (UUID text)
    pub id: String,

    /// Card UID as lowercase hex
    pub uid: String,

    /// `inside` or `outside`
    pub role: String,

    /// `inside` or `outside`
    pub direction: String,

    pub timestamp: DateTime<Utc>,

    /// The decision service answered
    pub success: bool,

    pub door_opened: bool,

    pub created_at: DateTime<Utc>,
}

impl ScanRecord {
    /// Map the row back to domain types.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InvalidRecord` if the row holds text that is
    /// not a valid UID, role or direction.
    pub fn parts(&self) -> StorageResult<(CardUid, DoorRole, Direction)> {
        let invalid = |e: labgate_core::Error| StorageError::InvalidRecord(format!("{}: {e}", self.id));
        Ok((
            self.uid.parse().map_err(invalid)?,
            self.role.parse().map_err(invalid)?,
            self.direction.parse().map_err(invalid)?,
        ))
    }
}

/// Repository trait for processed scans
pub trait ScanEventRepository: Send + Sync {
    /// Insert a processed scan
    async fn insert(&self, event: &ScanEvent) -> StorageResult<()>;

    /// Most recent scans first
    async fn recent(&self, limit: i64) -> StorageResult<Vec<ScanRecord>>;

    /// Scans of one card, most recent first
    async fn find_by_uid(&self, uid: &CardUid, limit: i64) -> StorageResult<Vec<ScanRecord>>;

    /// Number of scans since `since` that opened the door
    async fn count_opened_since(&self, since: DateTime<Utc>) -> StorageResult<i64>;
}

/// SQLite implementation of [`ScanEventRepository`]
#[derive(Debug, Clone)]
pub struct SqliteScanEventRepository {
    pool: SqlitePool,
}

impl SqliteScanEventRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl ScanEventRepository for SqliteScanEventRepository {
    async fn insert(&self, event: &ScanEvent) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO scan_events (
                id, uid, role, direction, timestamp, success, door_opened
            )
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(event.id.to_string())
        .bind(event.uid.to_hex())
        .bind(event.role.as_str())
        .bind(event.direction.as_str())
        .bind(event.timestamp)
        .bind(event.success)
        .bind(event.door_opened)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn recent(&self, limit: i64) -> StorageResult<Vec<ScanRecord>> {
        let records = sqlx::query_as::<_, ScanRecord>(
            r#"
            SELECT id, uid, role, direction, timestamp,
                   success, door_opened, created_at
            FROM scan_events
            ORDER BY timestamp DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn find_by_uid(&self, uid: &CardUid, limit: i64) -> StorageResult<Vec<ScanRecord>> {
        let records = sqlx::query_as::<_, ScanRecord>(
            r#"
            SELECT id, uid, role, direction, timestamp,
                   success, door_opened, created_at
            FROM scan_events
            WHERE uid = ?
            ORDER BY timestamp DESC
            LIMIT ?
            "#,
        )
        .bind(uid.to_hex())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn count_opened_since(&self, since: DateTime<Utc>) -> StorageResult<i64> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM scan_events
            WHERE door_opened = 1 AND timestamp >= ?
            "#,
        )
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Database;
    use chrono::Duration;

    fn event(hex: &str, role: DoorRole, opened: bool, at: DateTime<Utc>) -> ScanEvent {
        let mut event = ScanEvent::at(CardUid::from_hex(hex).unwrap(), role, at);
        event.complete(true, opened);
        event
    }

    #[tokio::test]
    async fn test_insert_and_recent() {
        let db = Database::in_memory().await.unwrap();
        let repo = SqliteScanEventRepository::new(db.pool().clone());
        let now = Utc::now();

        repo.insert(&event("04a2b3c4", DoorRole::Inside, true, now - Duration::seconds(10)))
            .await
            .unwrap();
        repo.insert(&event("04e68f2a", DoorRole::Outside, false, now)).await.unwrap();

        let records = repo.recent(10).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].uid, "04e68f2a");
        assert_eq!(records[0].role, "outside");
        assert!(!records[0].door_opened);
        assert_eq!(records[1].direction, "inside");

        let (uid, role, direction) = records[1].parts().unwrap();
        assert_eq!(uid.to_hex(), "04a2b3c4");
        assert_eq!(role, DoorRole::Inside);
        assert_eq!(direction, Direction::Inside);
    }

    #[tokio::test]
    async fn test_find_by_uid_and_count() {
        let db = Database::in_memory().await.unwrap();
        let repo = SqliteScanEventRepository::new(db.pool().clone());
        let now = Utc::now();

        for (offset, opened) in [(30, true), (20, false), (10, true)] {
            repo.insert(&event("04a2b3c4", DoorRole::Inside, opened, now - Duration::seconds(offset)))
                .await
                .unwrap();
        }
        repo.insert(&event("04e68f2a", DoorRole::Inside, true, now)).await.unwrap();

        assert_eq!(
            repo.find_by_uid(&CardUid::from_hex("04a2b3c4").unwrap(), 10)
                .await
                .unwrap()
                .len(),
            3
        );
        assert_eq!(repo.count_opened_since(now - Duration::seconds(15)).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let db = Database::in_memory().await.unwrap();
        let repo = SqliteScanEventRepository::new(db.pool().clone());
        let event = event("04a2b3c4", DoorRole::Inside, true, Utc::now());

        repo.insert(&event).await.unwrap();
        assert!(matches!(repo.insert(&event).await, Err(StorageError::Database(_))));
    }
}
