//! Everything a session talks to besides its own reader.

use labgate_core::constants::{DEFAULT_DECISION_TIMEOUT_MS, DEFAULT_RELAY_DURATION_MS};
use labgate_core::Direction;
use labgate_hardware::{AnyActuator, LedColor};
use labgate_network::{AnyDecisionService, Decision};
use labgate_storage::FanoutSink;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Bounds on the per-scan side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessSettings {
    /// Longest wait for the decision service
    pub decision_timeout: Duration,
    /// How long the strike stays energized
    pub relay_duration: Duration,
}

impl Default for AccessSettings {
    fn default() -> Self {
        Self {
            decision_timeout: Duration::from_millis(DEFAULT_DECISION_TIMEOUT_MS),
            relay_duration: Duration::from_millis(DEFAULT_RELAY_DURATION_MS),
        }
    }
}

/// Collaborators shared by every session.
///
/// Cloning is cheap. The actuator sits behind an async mutex because both
/// doors drive the same strike and triggers must not overlap.
#[derive(Debug, Clone)]
pub struct Collaborators {
    pub decision: Arc<AnyDecisionService>,
    pub actuator: Arc<Mutex<AnyActuator>>,
    pub sink: Arc<FanoutSink>,
    pub settings: AccessSettings,
}

impl Collaborators {
    pub fn new(decision: AnyDecisionService, actuator: AnyActuator, sink: FanoutSink) -> Self {
        Self {
            decision: Arc::new(decision),
            actuator: Arc::new(Mutex::new(actuator)),
            sink: Arc::new(sink),
            settings: AccessSettings::default(),
        }
    }

    #[must_use]
    pub fn with_settings(mut self, settings: AccessSettings) -> Self {
        self.settings = settings;
        self
    }
}

const SHORT_BEEP: Duration = Duration::from_millis(100);
const LONG_BEEP: Duration = Duration::from_secs(1);

/// What the person at the door sees and hears after a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feedback {
    pub color: LedColor,
    pub beeps: Vec<Duration>,
    pub lines: Vec<String>,
}

impl Feedback {
    /// Feedback for a processed scan. `verdict` is `None` when the decision
    /// service could not be reached.
    pub fn for_scan(verdict: Option<Decision>, direction: Direction, door_opened: bool) -> Self {
        let (color, beeps) = match verdict {
            Some(Decision::Granted) => (LedColor::Green, vec![SHORT_BEEP, SHORT_BEEP]),
            Some(Decision::Denied) => (LedColor::Blue, vec![SHORT_BEEP]),
            None => (LedColor::Red, vec![LONG_BEEP]),
        };
        let outcome = if door_opened { "Door opened" } else { "Door not opened" };

        Self {
            color,
            beeps,
            lines: vec![
                "Card read".to_string(),
                direction.display_text().to_string(),
                outcome.to_string(),
            ],
        }
    }

    /// Feedback when the reader itself keeps failing.
    pub fn reader_fault(direction: Direction) -> Self {
        Self {
            color: LedColor::Red,
            beeps: vec![LONG_BEEP],
            lines: vec![
                "Reader error".to_string(),
                direction.display_text().to_string(),
                "Please wait".to_string(),
            ],
        }
    }
}
