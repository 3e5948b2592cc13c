//! Full simulated access point: config in, scans logged out.

use labgate_cli::{AppConfig, build};
use labgate_core::DoorRole;
use labgate_storage::{Database, DatabaseConfig, ScanEventRepository};
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn simulated_config(dir: &TempDir) -> AppConfig {
    let events = dir.path().join("logs/access.jsonl");
    let database = dir.path().join("labgate.db");
    std::fs::create_dir_all(events.parent().unwrap()).unwrap();

    AppConfig::from_toml(&format!(
        r#"
        mode = "simulated"
        site_name = "TEST LAB"

        [decision]
        kind = "simulated"

        [relay]
        duration_ms = 50

        [display]
        refresh_ms = 100
        hold_ms = 200

        [log]
        events_file = "{}"
        database = "{}"
        "#,
        events.display(),
        database.display()
    ))
    .unwrap()
}

#[tokio::test]
async fn test_generated_taps_reach_every_sink() {
    let dir = TempDir::new().unwrap();
    let config = simulated_config(&dir);

    let access_point = build(&config).await.unwrap();
    assert!(access_point.database.is_some());
    let generator = access_point
        .generator
        .unwrap()
        .with_interval(Duration::from_millis(200))
        .with_hold(Duration::from_millis(150));

    let handle = access_point.orchestrator.start();
    let cancel = CancellationToken::new();
    let taps = tokio::spawn(generator.run(cancel.clone()));
    tokio::time::sleep(Duration::from_millis(1500)).await;
    cancel.cancel();
    let taps = taps.await.unwrap();
    let report = handle.shutdown(Duration::from_secs(5)).await;
    access_point.database.unwrap().close().await;

    assert!(taps >= 2);
    assert!(report.is_clean());
    assert!(report.mux_reset);
    assert_eq!(report.sessions.len(), 2);
    assert!(report.display_renders.unwrap_or_default() > 0);
    let opened: u64 = report.sessions.iter().map(|s| s.stats.doors_opened).sum();
    assert!(opened >= 1);

    let log = std::fs::read_to_string(dir.path().join("logs/access.jsonl")).unwrap();
    let lines: Vec<serde_json::Value> = log.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
    assert_eq!(lines.len() as u64, opened);
    assert!(lines.iter().all(|l| l["door_opened"] == true));

    let database = Database::new(DatabaseConfig::new(dir.path().join("labgate.db")))
        .await
        .unwrap();
    let records = labgate_storage::SqliteScanEventRepository::new(database.pool().clone())
        .recent(100)
        .await
        .unwrap();
    assert_eq!(records.len(), lines.len());
    let (_, role, _) = records[0].parts().unwrap();
    assert!(matches!(role, DoorRole::Inside | DoorRole::Outside));
}

#[tokio::test]
async fn test_hardware_mode_without_bus_fails_to_build() {
    let config = AppConfig::from_toml(
        r#"
        mode = "hardware"

        [bus]
        device = "/nonexistent/i2c-9"
        "#,
    )
    .unwrap();

    assert!(build(&config).await.is_err());
}
