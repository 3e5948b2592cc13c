//! Session supervisor.
//!
//! The orchestrator owns the multiplexer, builds one [`ReaderSession`] per
//! door and runs each of them, plus the optional display refresher, in its
//! own tokio task:
//!
//! ```text
//!              ┌─────────────────────┐
//!              │    Orchestrator     │
//!              └──────────┬──────────┘
//!        ┌────────────────┼────────────────┐
//!        ▼                ▼                ▼
//! ┌─────────────┐  ┌─────────────┐  ┌─────────────┐
//! │  session    │  │  session    │  │  display    │
//! │  (inside)   │  │  (outside)  │  │  refresher  │
//! └──────┬──────┘  └──────┬──────┘  └──────┬──────┘
//!        └────────────────┼────────────────┘
//!                         ▼
//!                 ChannelMux (one bus)
//! ```
//!
//! A session that fails, stops or panics never takes the others down.
//!
//! # Examples
//!
//! ```no_run
//! use labgate_core::{BusAddress, Channel, DoorConfig, DoorRole, RetryPolicy};
//! use labgate_hardware::mock::{MockBus, MockNfcReader, SimulatedRelay};
//! use labgate_hardware::{AnyActuator, AnyNfcReader, ChannelMux, MuxConfig};
//! use labgate_network::{AnyDecisionService, MockDecisionService};
//! use labgate_reader::{Collaborators, Orchestrator};
//! use labgate_storage::FanoutSink;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() {
//! let (bus, _) = MockBus::new();
//! let mux = Arc::new(ChannelMux::new(Box::new(bus), MuxConfig::default()));
//! let (decision, _) = MockDecisionService::granting();
//! let (relay, _) = SimulatedRelay::new();
//! let collaborators = Collaborators::new(
//!     AnyDecisionService::Mock(decision),
//!     AnyActuator::Simulated(relay),
//!     FanoutSink::new(),
//! );
//!
//! let channel = Channel::new(0).unwrap();
//! let (reader, _) = MockNfcReader::new(channel);
//! let mut orchestrator = Orchestrator::new(mux, RetryPolicy::default(), collaborators);
//! orchestrator.add_session(
//!     DoorConfig::new(DoorRole::Inside, channel, BusAddress::DEFAULT_READER),
//!     AnyNfcReader::Mock(reader),
//! );
//!
//! let handle = orchestrator.start();
//! let report = handle.shutdown(Duration::from_secs(5)).await;
//! assert_eq!(report.sessions.len(), 1);
//! # }
//! ```

use crate::collaborators::Collaborators;
use crate::display::IdleDisplayRefresher;
use crate::session::{ReaderSession, SessionReport};
use labgate_core::{DoorConfig, DoorRole, RetryPolicy};
use labgate_hardware::{AnyIndicator, AnyNfcReader, ChannelMux};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// What a finished task hands back.
#[derive(Debug)]
enum TaskOutcome {
    Session(SessionReport),
    Display { renders: u64 },
}

/// How a task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskTermination {
    Completed,
    Cancelled,
    Panicked,
}

/// Builder and owner of the per-door sessions.
#[derive(Debug)]
pub struct Orchestrator {
    mux: Arc<ChannelMux>,
    policy: RetryPolicy,
    collaborators: Collaborators,
    doors: Vec<(DoorConfig, AnyNfcReader)>,
    indicators: HashMap<DoorRole, AnyIndicator>,
    display: Option<IdleDisplayRefresher>,
}

impl Orchestrator {
    pub fn new(mux: Arc<ChannelMux>, policy: RetryPolicy, collaborators: Collaborators) -> Self {
        Self {
            mux,
            policy,
            collaborators,
            doors: Vec::new(),
            indicators: HashMap::new(),
            display: None,
        }
    }

    /// Register a door and its reader. A second door with the same role
    /// replaces the first.
    pub fn add_session(&mut self, door: DoorConfig, reader: AnyNfcReader) {
        if let Some(existing) = self.doors.iter_mut().find(|(d, _)| d.role == door.role) {
            warn!(role = %door.role, "Door registered twice, replacing reader");
            *existing = (door, reader);
        } else {
            self.doors.push((door, reader));
        }
    }

    /// Attach the indicator of the door with `role`.
    pub fn add_indicator(&mut self, role: DoorRole, indicator: AnyIndicator) {
        self.indicators.insert(role, indicator);
    }

    #[must_use]
    pub fn with_display(mut self, refresher: IdleDisplayRefresher) -> Self {
        self.display = Some(refresher);
        self
    }

    pub fn session_count(&self) -> usize {
        self.doors.len()
    }

    pub fn mux(&self) -> &Arc<ChannelMux> {
        &self.mux
    }

    /// Spawn every session and the refresher.
    pub fn start(mut self) -> OrchestratorHandle {
        let cancel = CancellationToken::new();
        let mut tasks = JoinSet::new();

        for (door, reader) in self.doors.drain(..) {
            let mut session = ReaderSession::new(
                door,
                reader,
                Arc::clone(&self.mux),
                self.policy.clone(),
                self.collaborators.clone(),
            );
            if let Some(indicator) = self.indicators.remove(&door.role) {
                session = session.with_indicator(indicator);
            }
            let token = cancel.clone();
            tasks.spawn(async move { TaskOutcome::Session(session.run(token).await) });
        }

        if let Some(refresher) = self.display.take() {
            let token = cancel.clone();
            tasks.spawn(async move {
                TaskOutcome::Display {
                    renders: refresher.run(token).await,
                }
            });
        }

        info!(tasks = tasks.len(), "Orchestrator started");
        OrchestratorHandle {
            mux: self.mux,
            cancel,
            tasks,
        }
    }
}

/// Summary of a shutdown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Reports of sessions that stopped on their own, in completion order
    pub sessions: Vec<SessionReport>,
    pub display_renders: Option<u64>,
    pub panicked: usize,
    /// Tasks aborted after the timeout ran out
    pub cancelled: usize,
    /// Whether the final multiplexer reset succeeded
    pub mux_reset: bool,
}

impl ShutdownReport {
    pub fn session(&self, role: DoorRole) -> Option<&SessionReport> {
        self.sessions.iter().find(|report| report.role == role)
    }

    /// True when every task ended on its own.
    pub fn is_clean(&self) -> bool {
        self.panicked == 0 && self.cancelled == 0
    }
}

/// Running orchestrator.
#[derive(Debug)]
pub struct OrchestratorHandle {
    mux: Arc<ChannelMux>,
    cancel: CancellationToken,
    tasks: JoinSet<TaskOutcome>,
}

impl OrchestratorHandle {
    /// Token shared by every task. Cancelling it stops them.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// True when no task is left running.
    pub fn is_finished(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Stop every task and reset the multiplexer.
    ///
    /// Tasks get `timeout` in total to notice the token. Whatever is still
    /// running afterwards is aborted.
    pub async fn shutdown(mut self, timeout: Duration) -> ShutdownReport {
        info!(timeout_ms = timeout.as_millis() as u64, "Orchestrator shutting down");
        self.cancel.cancel();

        let mut report = ShutdownReport::default();
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            match tokio::time::timeout_at(deadline, self.tasks.join_next()).await {
                Ok(Some(result)) => record(&mut report, result),
                Ok(None) => break,
                Err(_) => {
                    warn!(remaining = self.tasks.len(), "Shutdown timed out, aborting tasks");
                    self.tasks.abort_all();
                    while let Some(result) = self.tasks.join_next().await {
                        record(&mut report, result);
                    }
                    break;
                }
            }
        }

        match self.mux.reset().await {
            Ok(()) => report.mux_reset = true,
            Err(e) => error!(error = %e, "Multiplexer reset failed during shutdown"),
        }

        info!(
            sessions = report.sessions.len(),
            panicked = report.panicked,
            cancelled = report.cancelled,
            mux_reset = report.mux_reset,
            "Orchestrator stopped"
        );
        report
    }
}

fn classify(result: &Result<TaskOutcome, JoinError>) -> TaskTermination {
    match result {
        Ok(_) => TaskTermination::Completed,
        Err(e) if e.is_cancelled() => TaskTermination::Cancelled,
        Err(_) => TaskTermination::Panicked,
    }
}

fn record(report: &mut ShutdownReport, result: Result<TaskOutcome, JoinError>) {
    match classify(&result) {
        TaskTermination::Completed => {}
        TaskTermination::Cancelled => {
            report.cancelled += 1;
            warn!("Task aborted during shutdown");
        }
        TaskTermination::Panicked => {
            report.panicked += 1;
            error!(error = ?result.as_ref().err(), "Task panicked");
        }
    }

    match result {
        Ok(TaskOutcome::Session(session)) => {
            info!(
                role = %session.role,
                final_state = %session.final_state,
                scans = session.stats.scans_accepted,
                doors_opened = session.stats.doors_opened,
                "Session finished"
            );
            report.sessions.push(session);
        }
        Ok(TaskOutcome::Display { renders }) => report.display_renders = Some(renders),
        Err(_) => {}
    }
}
