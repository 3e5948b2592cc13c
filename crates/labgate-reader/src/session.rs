//! Per-door reader session.
//!
//! A session owns one reader and drives it through the
//! [`SessionState`] machine: initialize with bounded retries, poll for
//! cards, debounce, process accepted scans, and escalate failures. Every bus
//! access goes through the shared [`ChannelMux`], which keeps the session's
//! branch routed for the whole select-then-operate sequence.
//!
//! Sessions never share mutable state. Two sessions only meet at the mux
//! lock, the actuator lock and the event sink.

use crate::collaborators::{Collaborators, Feedback};
use crate::debounce::ScanDebouncer;
use crate::escalation::{Escalation, FailureEscalation, Restart};
use crate::state::{SessionState, SessionStateMachine, StateTransition};
use labgate_core::{CardUid, Channel, DoorConfig, DoorRole, RetryPolicy, ScanEvent};
use labgate_hardware::{
    Actuator, AnyIndicator, AnyNfcReader, ChannelMux, FirmwareInfo, HardwareError, Indicator, MuxError, MuxGuard,
    NfcReader,
};
use labgate_network::{Decision, DecisionService};
use labgate_storage::EventSink;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// Result of one [`ReaderSession::step`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// More work to do
    Continue,
    /// Nothing left to do until shutdown
    Idle,
    /// Cancellation observed
    Stopped,
}

/// Counters kept by a session for its report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub init_attempts: u32,
    pub polls: u64,
    pub poll_errors: u64,
    pub scans_accepted: u64,
    pub scans_suppressed: u64,
    pub doors_opened: u64,
    pub restarts: u32,
}

/// Summary returned when a session ends
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub role: DoorRole,
    pub channel: Channel,
    pub final_state: SessionState,
    pub transitions: usize,
    pub stats: SessionStats,
}

#[derive(Debug, Clone, Copy)]
struct InitPlan {
    attempts: u32,
    supervisory: bool,
}

impl InitPlan {
    fn regular(policy: &RetryPolicy) -> Self {
        Self {
            attempts: policy.max_init_retries,
            supervisory: false,
        }
    }

    fn supervisory() -> Self {
        Self {
            attempts: 1,
            supervisory: true,
        }
    }
}

/// State machine for one door's reader
#[derive(Debug)]
pub struct ReaderSession {
    door: DoorConfig,
    reader: AnyNfcReader,
    indicator: Option<AnyIndicator>,
    mux: Arc<ChannelMux>,
    policy: RetryPolicy,
    collaborators: Collaborators,
    machine: SessionStateMachine,
    debouncer: ScanDebouncer,
    escalation: FailureEscalation,
    plan: InitPlan,
    halted: bool,
    stats: SessionStats,
}

impl ReaderSession {
    pub fn new(
        door: DoorConfig,
        reader: AnyNfcReader,
        mux: Arc<ChannelMux>,
        policy: RetryPolicy,
        collaborators: Collaborators,
    ) -> Self {
        Self {
            debouncer: ScanDebouncer::new(policy.cooldown_window),
            escalation: FailureEscalation::new(&policy),
            plan: InitPlan::regular(&policy),
            door,
            reader,
            indicator: None,
            mux,
            policy,
            collaborators,
            machine: SessionStateMachine::new(),
            halted: false,
            stats: SessionStats::default(),
        }
    }

    #[must_use]
    pub fn with_indicator(mut self, indicator: AnyIndicator) -> Self {
        self.indicator = Some(indicator);
        self
    }

    pub fn role(&self) -> DoorRole {
        self.door.role
    }

    pub fn channel(&self) -> Channel {
        self.door.channel
    }

    pub fn state(&self) -> SessionState {
        self.machine.current()
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.escalation.consecutive_errors()
    }

    pub fn history(&self) -> &VecDeque<StateTransition> {
        self.machine.history()
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Drive the session until `cancel` fires.
    ///
    /// The token is checked before every step and raced against every
    /// delay, so a stop is seen within one polling interval. A bus operation
    /// or scan already in progress is finished first.
    pub async fn run(mut self, cancel: CancellationToken) -> SessionReport {
        info!(
            role = %self.door.role,
            channel = %self.door.channel,
            reader = self.reader.kind(),
            "Reader session started"
        );

        loop {
            if cancel.is_cancelled() {
                break;
            }
            match self.step(&cancel).await {
                Step::Continue => {}
                Step::Idle => {
                    cancel.cancelled().await;
                    break;
                }
                Step::Stopped => break,
            }
        }

        if let Err(e) = self.reader.release().await {
            debug!(role = %self.door.role, error = %e, "Reader release failed");
        }
        if let Some(indicator) = self.indicator.as_mut()
            && let Err(e) = indicator.off().await
        {
            debug!(role = %self.door.role, error = %e, "Indicator off failed");
        }

        let report = self.report();
        info!(
            role = %report.role,
            final_state = %report.final_state,
            scans = report.stats.scans_accepted,
            "Reader session stopped"
        );
        report
    }

    /// Run one unit of work for the current state.
    pub async fn step(&mut self, cancel: &CancellationToken) -> Step {
        if self.halted {
            return Step::Idle;
        }

        match self.machine.current() {
            SessionState::Uninitialized => {
                self.plan = InitPlan::regular(&self.policy);
                self.transition(SessionState::Initializing);
                Step::Continue
            }
            SessionState::Initializing => self.initialize(cancel).await,
            SessionState::Scanning => self.scan(cancel).await,
            SessionState::ErrorBackoff => self.back_off(cancel).await,
            SessionState::Disabled => self.disabled(cancel).await,
        }
    }

    pub fn report(&self) -> SessionReport {
        SessionReport {
            role: self.door.role,
            channel: self.door.channel,
            final_state: self.machine.current(),
            transitions: self.machine.history().len(),
            stats: self.stats,
        }
    }

    fn transition(&mut self, to: SessionState) {
        match self.machine.transition_to(to) {
            Ok(transition) => info!(
                role = %self.door.role,
                from = %transition.from,
                to = %transition.to,
                "Reader session state changed"
            ),
            Err(e) => {
                error!(role = %self.door.role, error = %e, "Reader session halted");
                self.halted = true;
            }
        }
    }

    async fn initialize(&mut self, cancel: &CancellationToken) -> Step {
        let InitPlan { attempts, supervisory } = self.plan;

        for attempt in 1..=attempts {
            if cancel.is_cancelled() {
                return Step::Stopped;
            }
            self.stats.init_attempts += 1;

            match self.try_initialize().await {
                Ok(firmware) => {
                    info!(
                        role = %self.door.role,
                        channel = %self.door.channel,
                        attempt,
                        firmware = %firmware,
                        "Reader initialized"
                    );
                    if supervisory {
                        self.escalation.reset();
                        self.debouncer.reset();
                    } else {
                        self.escalation.clear_errors();
                    }
                    self.transition(SessionState::Scanning);
                    return Step::Continue;
                }
                Err(e) => {
                    warn!(
                        role = %self.door.role,
                        channel = %self.door.channel,
                        attempt,
                        max_attempts = attempts,
                        error = %e,
                        "Reader initialization failed"
                    );
                    if attempt < attempts && !sleep_or_cancel(self.policy.retry_delay, cancel).await {
                        return Step::Stopped;
                    }
                }
            }
        }

        error!(role = %self.door.role, attempts, "Reader initialization exhausted");
        self.transition(SessionState::Disabled);
        Step::Continue
    }

    async fn try_initialize(&mut self) -> Result<FirmwareInfo, HardwareError> {
        let bound = self.policy.init_timeout();
        let mut guard = lock_channel(&self.mux, self.door.channel, &self.policy).await?;
        tokio::time::timeout(bound, self.reader.initialize(guard.bus()))
            .await
            .map_err(|_| HardwareError::timeout(bound.as_millis() as u64))?
    }

    async fn scan(&mut self, cancel: &CancellationToken) -> Step {
        match self.poll_reader().await {
            Ok(detected) => {
                self.stats.polls += 1;
                self.escalation.record_success();
                if let Some(uid) = detected {
                    self.on_detect(uid).await;
                }
            }
            Err(e) => {
                self.stats.poll_errors += 1;
                match self.escalation.record_failure() {
                    Escalation::Continue => debug!(
                        role = %self.door.role,
                        consecutive_errors = self.escalation.consecutive_errors(),
                        error = %e,
                        "Poll failed"
                    ),
                    Escalation::Backoff => {
                        warn!(
                            role = %self.door.role,
                            consecutive_errors = self.escalation.consecutive_errors(),
                            error = %e,
                            "Error threshold reached"
                        );
                        self.transition(SessionState::ErrorBackoff);
                        return Step::Continue;
                    }
                }
            }
        }

        if sleep_or_cancel(self.policy.poll_interval, cancel).await {
            Step::Continue
        } else {
            Step::Stopped
        }
    }

    /// One poll with the session's branch routed. The mux lock is released
    /// before any scan processing starts.
    async fn poll_reader(&mut self) -> Result<Option<CardUid>, HardwareError> {
        let timeout = self.policy.poll_timeout;
        let bound = self.policy.poll_deadline();
        let mut guard = lock_channel(&self.mux, self.door.channel, &self.policy).await?;
        tokio::time::timeout(bound, self.reader.poll(guard.bus(), timeout))
            .await
            .map_err(|_| HardwareError::timeout(bound.as_millis() as u64))?
    }

    async fn on_detect(&mut self, uid: CardUid) {
        if !self.debouncer.accept(&uid, Instant::now()) {
            self.stats.scans_suppressed += 1;
            trace!(role = %self.door.role, uid = %uid, "Repeated detection suppressed");
            return;
        }

        self.stats.scans_accepted += 1;
        self.process_scan(uid).await;
    }

    async fn process_scan(&mut self, uid: CardUid) {
        let mut event = ScanEvent::new(uid, self.door.role);
        let settings = self.collaborators.settings;
        info!(
            event_id = %event.id,
            uid = %event.uid,
            role = %event.role,
            direction = %event.direction,
            "Card scan accepted"
        );

        let decision = self.collaborators.decision.decide(&event.uid, event.direction);
        let verdict = match tokio::time::timeout(settings.decision_timeout, decision).await {
            Ok(Ok(verdict)) => Some(verdict),
            Ok(Err(e)) => {
                warn!(uid = %event.uid, error = %e, "Access decision unavailable");
                None
            }
            Err(_) => {
                warn!(
                    uid = %event.uid,
                    timeout_ms = settings.decision_timeout.as_millis() as u64,
                    "Access decision timed out"
                );
                None
            }
        };

        let mut door_opened = false;
        if verdict.is_some_and(Decision::opens_door) {
            let mut actuator = self.collaborators.actuator.lock().await;
            match actuator.trigger(settings.relay_duration).await {
                Ok(()) => door_opened = true,
                Err(e) => error!(uid = %event.uid, error = %e, "Door strike failed"),
            }
        }
        if door_opened {
            self.stats.doors_opened += 1;
        }

        self.indicate(&Feedback::for_scan(verdict, event.direction, door_opened))
            .await;

        event.complete(verdict.is_some(), door_opened);
        if let Err(e) = self.collaborators.sink.record(&event).await {
            warn!(event_id = %event.id, error = %e, "Failed to log scan event");
        }
    }

    async fn indicate(&mut self, feedback: &Feedback) {
        let role = self.door.role;
        let Some(indicator) = self.indicator.as_mut() else {
            return;
        };

        if let Err(e) = indicator.set_color(feedback.color).await {
            warn!(role = %role, error = %e, "Indicator LED failed");
        }
        if let Err(e) = indicator.pulse(&feedback.beeps).await {
            warn!(role = %role, error = %e, "Indicator buzzer failed");
        }
        if let Err(e) = indicator.show_text(&feedback.lines).await {
            warn!(role = %role, error = %e, "Display text failed");
        }
    }

    async fn back_off(&mut self, cancel: &CancellationToken) -> Step {
        if let Err(e) = self.reader.release().await {
            debug!(role = %self.door.role, error = %e, "Reader release failed");
        }
        self.indicate(&Feedback::reader_fault(self.door.role.direction()))
            .await;

        match self.escalation.begin_restart() {
            Restart::Retry { attempt } => {
                self.stats.restarts += 1;
                warn!(
                    role = %self.door.role,
                    attempt,
                    max_attempts = self.policy.max_restart_attempts,
                    backoff_ms = self.policy.backoff_delay.as_millis() as u64,
                    "Restarting reader"
                );
                if !sleep_or_cancel(self.policy.backoff_delay, cancel).await {
                    return Step::Stopped;
                }
                self.plan = InitPlan::regular(&self.policy);
                self.transition(SessionState::Initializing);
            }
            Restart::Exhausted => {
                error!(
                    role = %self.door.role,
                    attempts = self.escalation.restart_attempts(),
                    "Restart attempts exhausted"
                );
                self.transition(SessionState::Disabled);
            }
        }
        Step::Continue
    }

    async fn disabled(&mut self, cancel: &CancellationToken) -> Step {
        if !self.escalation.take_supervisory_reinit() {
            error!(
                role = %self.door.role,
                channel = %self.door.channel,
                "Reader disabled for the rest of the run"
            );
            return Step::Idle;
        }

        if let Err(e) = self.reader.release().await {
            debug!(role = %self.door.role, error = %e, "Reader release failed");
        }
        warn!(
            role = %self.door.role,
            delay_ms = self.policy.hardware_reset_delay.as_millis() as u64,
            "Reader disabled, reinitializing once after delay"
        );
        if !sleep_or_cancel(self.policy.hardware_reset_delay, cancel).await {
            return Step::Stopped;
        }

        self.plan = InitPlan::supervisory();
        self.transition(SessionState::Initializing);
        Step::Continue
    }
}

/// Lock the mux on `channel`, retrying a failed select a bounded number of
/// times before giving up.
async fn lock_channel<'a>(
    mux: &'a ChannelMux,
    channel: Channel,
    policy: &RetryPolicy,
) -> Result<MuxGuard<'a>, MuxError> {
    let mut attempt = 1;
    loop {
        match mux.lock(channel.as_u8()).await {
            Ok(guard) => return Ok(guard),
            Err(e) if e.is_transient() && attempt < policy.select_retries => {
                trace!(channel = %channel, attempt, error = %e, "Channel select failed, retrying");
                attempt += 1;
                tokio::time::sleep(policy.select_retry_delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Sleep for `duration` unless cancelled first. Returns `false` on cancel.
pub(crate) async fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}
