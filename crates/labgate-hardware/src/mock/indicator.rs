//! Indicator that records what it was asked to show.

use crate::display::DisplayBoard;
use crate::error::IndicatorError;
use crate::traits::Indicator;
use crate::types::LedColor;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// One call made on a [`SimulatedIndicator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndicatorCall {
    SetColor(LedColor),
    Pulse(Vec<Duration>),
    Flash { color: LedColor, times: u32 },
    Off,
    ShowText(Vec<String>),
}

#[derive(Debug, Default)]
struct IndicatorState {
    calls: Vec<IndicatorCall>,
    color: Option<LedColor>,
    failing: bool,
}

/// Indicator for simulation mode and tests.
///
/// Logs each call at info level, so a simulated run shows the LED and
/// buzzer activity in the log. Text is forwarded to a [`DisplayBoard`] when
/// one is attached.
#[derive(Debug)]
pub struct SimulatedIndicator {
    name: String,
    state: Arc<Mutex<IndicatorState>>,
    board: Option<(DisplayBoard, Duration)>,
}

impl SimulatedIndicator {
    pub fn new(name: impl Into<String>) -> (Self, SimulatedIndicatorHandle) {
        let state = Arc::new(Mutex::new(IndicatorState::default()));
        (
            Self {
                name: name.into(),
                state: Arc::clone(&state),
                board: None,
            },
            SimulatedIndicatorHandle { state },
        )
    }

    /// Post text to `board`, keeping each message for `hold`.
    pub fn with_board(mut self, board: DisplayBoard, hold: Duration) -> Self {
        self.board = Some((board, hold));
        self
    }

    fn record(&self, call: IndicatorCall) -> Result<(), IndicatorError> {
        let mut state = self.state.lock();
        if state.failing {
            return Err(IndicatorError::Device(format!("{} is failing", self.name)));
        }
        match &call {
            IndicatorCall::SetColor(color) => state.color = Some(*color),
            IndicatorCall::Off => state.color = Some(LedColor::Off),
            _ => {}
        }
        state.calls.push(call);
        Ok(())
    }
}

impl Indicator for SimulatedIndicator {
    async fn set_color(&mut self, color: LedColor) -> Result<(), IndicatorError> {
        info!(indicator = %self.name, color = ?color, "LED");
        self.record(IndicatorCall::SetColor(color))
    }

    async fn pulse(&mut self, pattern: &[Duration]) -> Result<(), IndicatorError> {
        info!(
            indicator = %self.name,
            pattern_ms = ?pattern.iter().map(Duration::as_millis).collect::<Vec<_>>(),
            "Buzzer"
        );
        self.record(IndicatorCall::Pulse(pattern.to_vec()))
    }

    async fn flash(&mut self, color: LedColor, times: u32, _period: Duration) -> Result<(), IndicatorError> {
        self.record(IndicatorCall::Flash { color, times })
    }

    async fn off(&mut self) -> Result<(), IndicatorError> {
        self.record(IndicatorCall::Off)
    }

    async fn show_text(&mut self, lines: &[String]) -> Result<(), IndicatorError> {
        self.record(IndicatorCall::ShowText(lines.to_vec()))?;
        if let Some((board, hold)) = &self.board {
            board.show(lines.to_vec(), *hold);
        }
        Ok(())
    }
}

/// Handle for inspecting a [`SimulatedIndicator`].
#[derive(Debug, Clone)]
pub struct SimulatedIndicatorHandle {
    state: Arc<Mutex<IndicatorState>>,
}

impl SimulatedIndicatorHandle {
    pub fn calls(&self) -> Vec<IndicatorCall> {
        self.state.lock().calls.clone()
    }

    /// Last color set, `None` if the LED was never touched.
    pub fn color(&self) -> Option<LedColor> {
        self.state.lock().color
    }

    /// Buzzer patterns played, in order.
    pub fn pulses(&self) -> Vec<Vec<Duration>> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                IndicatorCall::Pulse(p) => Some(p.clone()),
                _ => None,
            })
            .collect()
    }

    /// Text messages shown, in order.
    pub fn texts(&self) -> Vec<Vec<String>> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                IndicatorCall::ShowText(t) => Some(t.clone()),
                _ => None,
            })
            .collect()
    }

    /// Make every call fail until switched off again.
    pub fn set_failing(&self, failing: bool) {
        self.state.lock().failing = failing;
    }

    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.calls.clear();
        state.color = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_calls_in_order() {
        let (mut indicator, handle) = SimulatedIndicator::new("inside");

        indicator.set_color(LedColor::Green).await.unwrap();
        indicator
            .pulse(&[Duration::from_millis(100), Duration::from_millis(100)])
            .await
            .unwrap();
        indicator.off().await.unwrap();

        assert_eq!(handle.calls().len(), 3);
        assert_eq!(handle.color(), Some(LedColor::Off));
        assert_eq!(handle.pulses(), vec![vec![Duration::from_millis(100); 2]]);
    }

    #[tokio::test]
    async fn test_failing_indicator() {
        let (mut indicator, handle) = SimulatedIndicator::new("outside");
        handle.set_failing(true);

        assert!(indicator.set_color(LedColor::Red).await.is_err());
        assert!(handle.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_text_forwarded_to_board() {
        let board = DisplayBoard::new();
        let (indicator, handle) = SimulatedIndicator::new("inside");
        let mut indicator = indicator.with_board(board.clone(), Duration::from_secs(1));

        indicator.show_text(&["Card read".to_string()]).await.unwrap();

        assert_eq!(handle.texts(), vec![vec!["Card read".to_string()]]);
        assert_eq!(board.current(), Some(vec!["Card read".to_string()]));
    }
}
