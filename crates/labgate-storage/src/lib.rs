//! Access log storage for labgate.
//!
//! Every processed card scan ends up here. The crate provides the
//! [`EventSink`] seam used by reader sessions and the sinks behind it:
//!
//! - [`TracingSink`] - one structured log record per scan
//! - [`JsonlSink`] - one JSON object per line in an append-only file
//! - [`SqliteSink`] - one row per scan in the `scan_events` table
//! - [`MemorySink`] - in-memory buffer for tests
//! - [`FanoutSink`] - hands each scan to several of the above
//!
//! # Examples
//!
//! ```no_run
//! use labgate_core::{CardUid, DoorRole, ScanEvent};
//! use labgate_storage::{AnyEventSink, Database, DatabaseConfig, EventSink, FanoutSink, SqliteSink, TracingSink};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::new(DatabaseConfig::new("labgate.db")).await?;
//! let sink = FanoutSink::new()
//!     .with(AnyEventSink::Tracing(TracingSink))
//!     .with(AnyEventSink::Sqlite(SqliteSink::new(&db)));
//!
//! let mut event = ScanEvent::new(CardUid::from_hex("04a2b3c4")?, DoorRole::Inside);
//! event.complete(true, true);
//! sink.record(&event).await?;
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod error;
pub mod record;
pub mod sink;

pub use connection::{Database, DatabaseConfig};
pub use error::{StorageError, StorageResult};
pub use record::{ScanEventRepository, ScanRecord, SqliteScanEventRepository};
pub use sink::{AnyEventSink, EventSink, FanoutSink, JsonlSink, MemorySink, SqliteSink, TracingSink};
