//! Shared fixtures for the reader integration tests.
//!
//! A [`Rig`] is one access point on a mock bus: the multiplexer, a scripted
//! decision service, a simulated strike and an in-memory event sink. Each
//! piece comes with the handle tests use to script or inspect it.

#![allow(dead_code)]

use labgate_core::{BusAddress, CardUid, Channel, DoorConfig, DoorRole, RetryPolicy};
use labgate_hardware::mock::{
    MockBus, MockBusHandle, MockNfcReader, MockNfcReaderHandle, SimulatedIndicator, SimulatedIndicatorHandle,
    SimulatedRelay, SimulatedRelayHandle,
};
use labgate_hardware::{AnyActuator, AnyIndicator, AnyNfcReader, ChannelMux, MuxConfig};
use labgate_network::{AnyDecisionService, Decision, MockDecisionHandle, MockDecisionService};
use labgate_reader::{AccessSettings, Collaborators, ReaderSession};
use labgate_storage::{AnyEventSink, FanoutSink, MemorySink};
use std::sync::Arc;
use std::time::Duration;

pub const CARD: &str = "04a2";

pub struct Rig {
    pub mux: Arc<ChannelMux>,
    pub bus: MockBusHandle,
    pub decision: MockDecisionHandle,
    pub relay: SimulatedRelayHandle,
    pub events: MemorySink,
    pub collaborators: Collaborators,
}

/// Rig whose decision service answers `default` and whose strike holds for
/// `relay_duration`.
pub fn rig(default: Decision, relay_duration: Duration) -> Rig {
    let (bus, bus_handle) = MockBus::new();
    let mux = Arc::new(ChannelMux::new(Box::new(bus), MuxConfig::default()));
    let (decision, decision_handle) = MockDecisionService::new(default);
    let (relay, relay_handle) = SimulatedRelay::new();
    let events = MemorySink::new();

    let collaborators = Collaborators::new(
        AnyDecisionService::Mock(decision),
        AnyActuator::Simulated(relay),
        FanoutSink::new().with(AnyEventSink::Memory(events.clone())),
    )
    .with_settings(AccessSettings {
        relay_duration,
        ..AccessSettings::default()
    });

    Rig {
        mux,
        bus: bus_handle,
        decision: decision_handle,
        relay: relay_handle,
        events,
        collaborators,
    }
}

pub fn channel(raw: u8) -> Channel {
    Channel::new(raw).unwrap()
}

pub fn door(role: DoorRole, raw: u8) -> DoorConfig {
    DoorConfig::new(role, channel(raw), BusAddress::DEFAULT_READER)
}

pub fn card(hex: &str) -> CardUid {
    CardUid::from_hex(hex).unwrap()
}

pub fn mock_reader(raw: u8) -> (AnyNfcReader, MockNfcReaderHandle) {
    let (reader, handle) = MockNfcReader::new(channel(raw));
    (AnyNfcReader::Mock(reader), handle)
}

pub fn indicator(name: &str) -> (AnyIndicator, SimulatedIndicatorHandle) {
    let (indicator, handle) = SimulatedIndicator::new(name);
    (AnyIndicator::Simulated(indicator), handle)
}

impl Rig {
    /// Session for the door with `role` on branch `raw`.
    pub fn session(&self, role: DoorRole, raw: u8, policy: RetryPolicy) -> (ReaderSession, MockNfcReaderHandle) {
        let (reader, handle) = mock_reader(raw);
        let session = ReaderSession::new(
            door(role, raw),
            reader,
            Arc::clone(&self.mux),
            policy,
            self.collaborators.clone(),
        );
        (session, handle)
    }
}
