//! Relay that only logs and counts.

use crate::error::{HardwareError, Result};
use crate::traits::Actuator;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::info;

#[derive(Debug, Default)]
struct RelayState {
    triggers: Vec<(Instant, Duration)>,
    fail_next: u32,
}

/// Door strike stand-in.
///
/// Holds for the requested duration like a real relay, so timing seen by the
/// caller matches hardware.
#[derive(Debug)]
pub struct SimulatedRelay {
    state: Arc<Mutex<RelayState>>,
}

impl SimulatedRelay {
    pub fn new() -> (Self, SimulatedRelayHandle) {
        let state = Arc::new(Mutex::new(RelayState::default()));
        (
            Self {
                state: Arc::clone(&state),
            },
            SimulatedRelayHandle { state },
        )
    }
}

impl Actuator for SimulatedRelay {
    async fn trigger(&mut self, duration: Duration) -> Result<()> {
        {
            let mut state = self.state.lock();
            if state.fail_next > 0 {
                state.fail_next -= 1;
                return Err(HardwareError::communication("simulated relay failure"));
            }
            state.triggers.push((Instant::now(), duration));
        }

        info!(duration_ms = duration.as_millis() as u64, "Relay energized (simulated)");
        tokio::time::sleep(duration).await;
        info!("Relay released (simulated)");
        Ok(())
    }
}

/// Handle for inspecting a [`SimulatedRelay`].
#[derive(Debug, Clone)]
pub struct SimulatedRelayHandle {
    state: Arc<Mutex<RelayState>>,
}

impl SimulatedRelayHandle {
    pub fn trigger_count(&self) -> usize {
        self.state.lock().triggers.len()
    }

    /// Start time and duration of every trigger.
    pub fn triggers(&self) -> Vec<(Instant, Duration)> {
        self.state.lock().triggers.clone()
    }

    /// Fail the next `count` triggers.
    pub fn fail_next(&self, count: u32) {
        self.state.lock().fail_next = count;
    }
}
