//! Two doors and the display sharing one bus.

mod common;

use common::{CARD, Rig, card, channel, door, indicator, mock_reader, rig};
use labgate_core::{DoorRole, RetryPolicy};
use labgate_hardware::mock::{MOCK_CMD_POLL, MockNfcReaderHandle, TransactionKind};
use labgate_hardware::{DisplayBoard, VirtualDisplay};
use labgate_network::Decision;
use labgate_reader::{IdleDisplayRefresher, Orchestrator, SessionState};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

const READER_ADDRESS: u8 = 0x24;

fn two_doors(rig: &Rig) -> (Orchestrator, MockNfcReaderHandle, MockNfcReaderHandle) {
    let mut orchestrator = Orchestrator::new(
        Arc::clone(&rig.mux),
        RetryPolicy::default(),
        rig.collaborators.clone(),
    );
    let (inside, inside_handle) = mock_reader(0);
    let (outside, outside_handle) = mock_reader(1);
    orchestrator.add_session(door(DoorRole::Inside, 0), inside);
    orchestrator.add_session(door(DoorRole::Outside, 1), outside);
    (orchestrator, inside_handle, outside_handle)
}

#[tokio::test(start_paused = true)]
async fn test_every_reader_operation_runs_on_its_own_branch() {
    let rig = rig(Decision::Granted, Duration::from_millis(300));
    let (orchestrator, inside, outside) = two_doors(&rig);
    let display = VirtualDisplay::new(4, 20);
    let orchestrator = orchestrator.with_display(IdleDisplayRefresher::new(
        display.clone(),
        channel(2),
        Arc::clone(&rig.mux),
        DisplayBoard::new(),
    ));

    let handle = orchestrator.start();
    inside.present(card(CARD));
    outside.present(card("04e68f2a"));
    tokio::time::sleep(Duration::from_secs(10)).await;
    let report = handle.shutdown(Duration::from_secs(5)).await;

    assert!(report.is_clean());
    assert_eq!(report.sessions.len(), 2);
    assert!(report.display_renders.unwrap_or_default() >= 9);
    assert!(display.render_count() >= 9);

    let polls: Vec<_> = rig
        .bus
        .transactions()
        .into_iter()
        .filter(|t| t.kind == TransactionKind::Write && t.address == READER_ADDRESS)
        .filter(|t| t.data.first() == Some(&MOCK_CMD_POLL))
        .collect();
    assert!(!polls.is_empty());
    for poll in &polls {
        assert_eq!(poll.routed.map(|c| c.as_u8()), Some(poll.data[1]));
    }
    assert!(polls.iter().any(|t| t.data[1] == 0));
    assert!(polls.iter().any(|t| t.data[1] == 1));

    // Multiplexer traffic interleaves the three branches.
    let writes = rig.bus.mux_writes();
    for mask in [0b001, 0b010, 0b100] {
        assert!(writes.contains(&mask));
    }
}

#[tokio::test(start_paused = true)]
async fn test_strike_triggers_never_overlap() {
    let relay = Duration::from_millis(300);
    let rig = rig(Decision::Granted, relay);
    let (orchestrator, inside, outside) = two_doors(&rig);

    let handle = orchestrator.start();
    inside.present(card(CARD));
    outside.present(card("04e68f2a"));
    tokio::time::sleep(Duration::from_millis(200)).await;
    inside.remove();
    outside.remove();
    tokio::time::sleep(Duration::from_secs(1)).await;
    handle.shutdown(Duration::from_secs(5)).await;

    let triggers = rig.relay.triggers();
    assert_eq!(triggers.len(), 2);
    let (first_at, first_for) = triggers[0];
    let (second_at, _) = triggers[1];
    assert!(second_at >= first_at + first_for);

    let events = rig.events.events();
    assert_eq!(events.len(), 2);
    assert!(events.iter().any(|e| e.role == DoorRole::Inside));
    assert!(events.iter().any(|e| e.role == DoorRole::Outside));
}

#[tokio::test(start_paused = true)]
async fn test_one_failing_reader_does_not_affect_the_other() {
    let rig = rig(Decision::Granted, Duration::from_millis(300));
    let (orchestrator, inside, outside) = two_doors(&rig);
    inside.fail_next_inits(u32::MAX);

    let handle = orchestrator.start();
    tokio::time::sleep(Duration::from_secs(90)).await;
    outside.present(card(CARD));
    tokio::time::sleep(Duration::from_millis(500)).await;
    let report = handle.shutdown(Duration::from_secs(5)).await;

    let inside_report = report.session(DoorRole::Inside).unwrap();
    let outside_report = report.session(DoorRole::Outside).unwrap();
    assert_eq!(inside_report.final_state, SessionState::Disabled);
    assert_eq!(outside_report.final_state, SessionState::Scanning);
    assert_eq!(outside_report.stats.doors_opened, 1);
    assert_eq!(rig.events.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_is_prompt_and_resets_mux() {
    let rig = rig(Decision::Granted, Duration::from_millis(300));
    let (mut orchestrator, inside, _outside) = two_doors(&rig);
    let (led, led_handle) = indicator("inside");
    orchestrator.add_indicator(DoorRole::Inside, led);

    let handle = orchestrator.start();
    tokio::time::sleep(Duration::from_secs(2)).await;

    let stopping = Instant::now();
    let report = handle.shutdown(Duration::from_secs(5)).await;

    assert!(stopping.elapsed() < Duration::from_millis(100));
    assert!(report.is_clean());
    assert!(report.mux_reset);
    assert_eq!(report.sessions.len(), 2);
    assert_eq!(report.display_renders, None);
    assert_eq!(rig.mux.current_channel().await, None);
    assert_eq!(rig.bus.mux_writes().last(), Some(&0x00));
    assert_eq!(inside.release_count(), 1);
    assert!(led_handle.calls().contains(&labgate_hardware::mock::IndicatorCall::Off));
}

#[tokio::test(start_paused = true)]
async fn test_stragglers_are_aborted_after_timeout() {
    let rig = rig(Decision::Granted, Duration::from_secs(30));
    let (orchestrator, inside, _outside) = two_doors(&rig);

    let handle = orchestrator.start();
    inside.present(card(CARD));
    tokio::time::sleep(Duration::from_secs(1)).await;

    let stopping = Instant::now();
    let report = handle.shutdown(Duration::from_secs(2)).await;

    assert!(stopping.elapsed() >= Duration::from_secs(2));
    assert!(stopping.elapsed() < Duration::from_secs(3));
    assert_eq!(report.cancelled, 1);
    assert_eq!(report.panicked, 0);
    assert_eq!(report.sessions.len(), 1);
    assert!(report.session(DoorRole::Outside).is_some());
    assert!(report.mux_reset);
}

#[tokio::test(start_paused = true)]
async fn test_registering_a_role_twice_keeps_one_session() {
    let rig = rig(Decision::Granted, Duration::from_millis(300));
    let (mut orchestrator, _inside, _outside) = two_doors(&rig);
    let (replacement, replacement_handle) = mock_reader(3);
    orchestrator.add_session(door(DoorRole::Inside, 3), replacement);
    assert_eq!(orchestrator.session_count(), 2);

    let handle = orchestrator.start();
    tokio::time::sleep(Duration::from_millis(500)).await;
    let report = handle.shutdown(Duration::from_secs(5)).await;

    assert_eq!(report.session(DoorRole::Inside).unwrap().channel, channel(3));
    assert!(replacement_handle.init_count() >= 1);
}
