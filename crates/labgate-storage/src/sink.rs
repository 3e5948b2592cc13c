//! Destinations for processed scan events.
//!
//! A session hands every processed [`ScanEvent`] to one [`EventSink`]. The
//! concrete sinks are picked at startup and usually combined with a
//! [`FanoutSink`] so a scan lands in the log, the JSON-lines file and the
//! database at once.

#![allow(async_fn_in_trait)]

use crate::connection::Database;
use crate::error::{StorageError, StorageResult};
use crate::record::{ScanEventRepository, SqliteScanEventRepository};
use labgate_core::ScanEvent;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

/// Receives processed scan events.
pub trait EventSink: Send + Sync {
    async fn record(&self, event: &ScanEvent) -> StorageResult<()>;
}

/// Emits one structured `info` record per scan.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    async fn record(&self, event: &ScanEvent) -> StorageResult<()> {
        info!(
            target: "labgate::access",
            event_id = %event.id,
            uid = %event.uid,
            role = %event.role,
            direction = %event.direction,
            timestamp = %event.timestamp.to_rfc3339(),
            success = event.success,
            door_opened = event.door_opened,
            "Card scan processed"
        );
        Ok(())
    }
}

/// Appends one JSON object per line to a file.
#[derive(Debug)]
pub struct JsonlSink {
    path: PathBuf,
    file: tokio::sync::Mutex<File>,
}

impl JsonlSink {
    /// Open `path` for appending, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the file cannot be opened.
    pub async fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| StorageError::io(&path, e))?;

        Ok(Self {
            path,
            file: tokio::sync::Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EventSink for JsonlSink {
    async fn record(&self, event: &ScanEvent) -> StorageResult<()> {
        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');

        let mut file = self.file.lock().await;
        file.write_all(&line).await.map_err(|e| StorageError::io(&self.path, e))?;
        file.flush().await.map_err(|e| StorageError::io(&self.path, e))?;
        Ok(())
    }
}

/// Writes each scan as a row of the `scan_events` table.
#[derive(Debug, Clone)]
pub struct SqliteSink {
    repository: SqliteScanEventRepository,
}

impl SqliteSink {
    pub fn new(database: &Database) -> Self {
        Self {
            repository: SqliteScanEventRepository::new(database.pool().clone()),
        }
    }

    pub fn repository(&self) -> &SqliteScanEventRepository {
        &self.repository
    }
}

impl EventSink for SqliteSink {
    async fn record(&self, event: &ScanEvent) -> StorageResult<()> {
        self.repository.insert(event).await
    }
}

/// Keeps events in memory. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<ScanEvent>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ScanEvent> {
        self.events.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl EventSink for MemorySink {
    async fn record(&self, event: &ScanEvent) -> StorageResult<()> {
        self.events.lock().push(event.clone());
        Ok(())
    }
}

/// Any single sink.
#[derive(Debug)]
pub enum AnyEventSink {
    Tracing(TracingSink),
    Jsonl(JsonlSink),
    Sqlite(SqliteSink),
    Memory(MemorySink),
}

impl AnyEventSink {
    /// Short name of the variant, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Tracing(_) => "tracing",
            Self::Jsonl(_) => "jsonl",
            Self::Sqlite(_) => "sqlite",
            Self::Memory(_) => "memory",
        }
    }
}

impl EventSink for AnyEventSink {
    async fn record(&self, event: &ScanEvent) -> StorageResult<()> {
        match self {
            Self::Tracing(sink) => sink.record(event).await,
            Self::Jsonl(sink) => sink.record(event).await,
            Self::Sqlite(sink) => sink.record(event).await,
            Self::Memory(sink) => sink.record(event).await,
        }
    }
}

/// Hands each event to every member sink in order.
///
/// A failing member does not stop the others. The failure is logged here
/// and the last one is returned.
#[derive(Debug, Default)]
pub struct FanoutSink {
    sinks: Vec<AnyEventSink>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, sink: AnyEventSink) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn push(&mut self, sink: AnyEventSink) {
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl EventSink for FanoutSink {
    async fn record(&self, event: &ScanEvent) -> StorageResult<()> {
        let mut last_error = None;
        for sink in &self.sinks {
            if let Err(e) = sink.record(event).await {
                warn!(sink = sink.kind(), event_id = %event.id, error = %e, "Event sink failed");
                last_error = Some(e);
            }
        }
        last_error.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use labgate_core::{CardUid, DoorRole};

    fn event() -> ScanEvent {
        let mut event = ScanEvent::new(CardUid::from_hex("04a2b3c4").unwrap(), DoorRole::Inside);
        event.complete(true, true);
        event
    }

    #[tokio::test]
    async fn test_memory_sink_clones_share_buffer() {
        let sink = MemorySink::new();
        let observer = sink.clone();

        sink.record(&event()).await.unwrap();

        assert_eq!(observer.len(), 1);
        assert!(observer.events()[0].processed);
    }

    #[tokio::test]
    async fn test_tracing_sink_never_fails() {
        assert!(TracingSink.record(&event()).await.is_ok());
    }

    #[tokio::test]
    async fn test_fanout_reaches_every_sink() {
        let first = MemorySink::new();
        let second = MemorySink::new();
        let fanout = FanoutSink::new()
            .with(AnyEventSink::Memory(first.clone()))
            .with(AnyEventSink::Tracing(TracingSink))
            .with(AnyEventSink::Memory(second.clone()));

        fanout.record(&event()).await.unwrap();

        assert_eq!(fanout.len(), 3);
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_fanout_is_ok() {
        assert!(FanoutSink::new().record(&event()).await.is_ok());
    }
}
