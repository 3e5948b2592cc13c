//! File-backed sink behaviour.

use labgate_core::{CardUid, DoorRole, ScanEvent};
use labgate_storage::{AnyEventSink, Database, EventSink, FanoutSink, JsonlSink, MemorySink, ScanEventRepository, SqliteSink, StorageError};
use rstest::rstest;

fn processed(hex: &str, role: DoorRole, success: bool, opened: bool) -> ScanEvent {
    let mut event = ScanEvent::new(CardUid::from_hex(hex).unwrap(), role);
    event.complete(success, opened);
    event
}

#[tokio::test]
async fn test_jsonl_sink_appends_one_line_per_event() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("access_log.jsonl");

    let sink = JsonlSink::open(&path).await.unwrap();
    sink.record(&processed("04a2b3c4", DoorRole::Inside, true, true)).await.unwrap();
    sink.record(&processed("04e68f2a", DoorRole::Outside, false, false)).await.unwrap();
    drop(sink);

    // Reopening appends rather than truncating.
    let sink = JsonlSink::open(&path).await.unwrap();
    sink.record(&processed("04eea537", DoorRole::Inside, true, false)).await.unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<serde_json::Value> = text.lines().map(|l| serde_json::from_str(l).unwrap()).collect();

    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0]["uid"], "04a2b3c4");
    assert_eq!(lines[0]["role"], "inside");
    assert_eq!(lines[0]["door_opened"], true);
    assert_eq!(lines[1]["direction"], "outside");
    assert_eq!(lines[1]["success"], false);
    assert_eq!(lines[2]["processed"], true);
}

#[tokio::test]
async fn test_jsonl_sink_open_fails_for_missing_directory() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing").join("log.jsonl");

    let err = JsonlSink::open(&path).await.unwrap_err();
    assert!(matches!(err, StorageError::Io { .. }));
}

#[rstest]
#[case(true, true)]
#[case(true, false)]
#[case(false, false)]
#[tokio::test]
async fn test_sqlite_sink_stores_outcome(#[case] success: bool, #[case] opened: bool) {
    let db = Database::in_memory().await.unwrap();
    let sink = SqliteSink::new(&db);

    sink.record(&processed("04a2b3c4", DoorRole::Inside, success, opened)).await.unwrap();

    let records = sink.repository().recent(1).await.unwrap();
    assert_eq!(records[0].success, success);
    assert_eq!(records[0].door_opened, opened);
}

#[tokio::test]
async fn test_fanout_continues_after_member_failure() {
    let db = Database::in_memory().await.unwrap();
    let memory = MemorySink::new();
    let fanout = FanoutSink::new()
        .with(AnyEventSink::Sqlite(SqliteSink::new(&db)))
        .with(AnyEventSink::Memory(memory.clone()));

    let event = processed("04a2b3c4", DoorRole::Inside, true, true);
    fanout.record(&event).await.unwrap();

    // Same id again: the database rejects it, memory still records it.
    let result = fanout.record(&event).await;

    assert!(matches!(result, Err(StorageError::Database(_))));
    assert_eq!(memory.len(), 2);
}
