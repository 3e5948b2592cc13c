//! Reader session state machine.
//!
//! Each door's reader runs through the following states:
//!
//! ```text
//!  Uninitialized ──► Initializing ──► Scanning ──► ErrorBackoff
//!                      ▲    │                        │     │
//!                      │    ▼                        │     │
//!                      │  Disabled ◄─────────────────┘     │
//!                      │    │                              │
//!                      └────┴──────────────────────────────┘
//! ```
//!
//! `Disabled → Initializing` is the supervisory reinit path, taken at most
//! once per run. Any transition not drawn above is rejected.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use thiserror::Error;
use tokio::time::Instant;

/// Maximum number of transitions kept in history
const MAX_HISTORY_SIZE: usize = 100;

/// States of a reader session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Created, reader never touched
    Uninitialized,

    /// Resetting the reader and reading its firmware version
    Initializing,

    /// Polling for cards
    Scanning,

    /// Too many consecutive failures, deciding whether to restart
    ErrorBackoff,

    /// Given up on the reader
    Disabled,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state_str = match self {
            SessionState::Uninitialized => "Uninitialized",
            SessionState::Initializing => "Initializing",
            SessionState::Scanning => "Scanning",
            SessionState::ErrorBackoff => "ErrorBackoff",
            SessionState::Disabled => "Disabled",
        };
        write!(f, "{}", state_str)
    }
}

impl SessionState {
    /// Check if transition from current state to target state is valid
    pub fn can_transition_to(&self, target: &SessionState) -> bool {
        matches!(
            (self, target),
            (SessionState::Uninitialized, SessionState::Initializing)
                | (SessionState::Initializing, SessionState::Scanning | SessionState::Disabled)
                | (SessionState::Scanning, SessionState::ErrorBackoff)
                | (SessionState::ErrorBackoff, SessionState::Initializing | SessionState::Disabled)
                | (SessionState::Disabled, SessionState::Initializing)
        )
    }
}

/// Rejected state change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: SessionState, to: SessionState },
}

/// Record of a state transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateTransition {
    pub from: SessionState,
    pub to: SessionState,
    pub at: Instant,
}

impl StateTransition {
    pub fn new(from: SessionState, to: SessionState) -> Self {
        Self {
            from,
            to,
            at: Instant::now(),
        }
    }
}

/// Validated state holder with bounded transition history.
#[derive(Debug)]
pub struct SessionStateMachine {
    current: SessionState,
    history: VecDeque<StateTransition>,
}

impl SessionStateMachine {
    pub fn new() -> Self {
        Self {
            current: SessionState::Uninitialized,
            history: VecDeque::with_capacity(MAX_HISTORY_SIZE),
        }
    }

    pub fn current(&self) -> SessionState {
        self.current
    }

    /// Transitions in order, oldest first
    pub fn history(&self) -> &VecDeque<StateTransition> {
        &self.history
    }

    /// Attempt to transition to a new state.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidTransition` if the move is not in the
    /// transition table. The state is left unchanged.
    pub fn transition_to(&mut self, new_state: SessionState) -> Result<StateTransition, SessionError> {
        if !self.current.can_transition_to(&new_state) {
            return Err(SessionError::InvalidTransition {
                from: self.current,
                to: new_state,
            });
        }

        let transition = StateTransition::new(self.current, new_state);
        self.current = new_state;
        self.add_to_history(transition);

        Ok(transition)
    }

    fn add_to_history(&mut self, transition: StateTransition) {
        self.history.push_back(transition);
        if self.history.len() > MAX_HISTORY_SIZE {
            self.history.pop_front();
        }
    }
}

impl Default for SessionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_new_machine_starts_uninitialized() {
        let machine = SessionStateMachine::new();
        assert_eq!(machine.current(), SessionState::Uninitialized);
        assert!(machine.history().is_empty());
    }

    #[rstest]
    #[case(SessionState::Uninitialized, SessionState::Initializing)]
    #[case(SessionState::Initializing, SessionState::Scanning)]
    #[case(SessionState::Initializing, SessionState::Disabled)]
    #[case(SessionState::Scanning, SessionState::ErrorBackoff)]
    #[case(SessionState::ErrorBackoff, SessionState::Initializing)]
    #[case(SessionState::ErrorBackoff, SessionState::Disabled)]
    #[case(SessionState::Disabled, SessionState::Initializing)]
    fn test_allowed_transitions(#[case] from: SessionState, #[case] to: SessionState) {
        assert!(from.can_transition_to(&to));
    }

    #[rstest]
    #[case(SessionState::Uninitialized, SessionState::Scanning)]
    #[case(SessionState::Scanning, SessionState::Disabled)]
    #[case(SessionState::Scanning, SessionState::Initializing)]
    #[case(SessionState::Disabled, SessionState::Scanning)]
    #[case(SessionState::ErrorBackoff, SessionState::Scanning)]
    #[case(SessionState::Scanning, SessionState::Scanning)]
    fn test_rejected_transitions(#[case] from: SessionState, #[case] to: SessionState) {
        assert!(!from.can_transition_to(&to));
    }

    #[test]
    fn test_invalid_transition_leaves_state() {
        let mut machine = SessionStateMachine::new();
        let err = machine.transition_to(SessionState::Scanning).unwrap_err();

        assert_eq!(
            err,
            SessionError::InvalidTransition {
                from: SessionState::Uninitialized,
                to: SessionState::Scanning
            }
        );
        assert_eq!(machine.current(), SessionState::Uninitialized);
        assert!(machine.history().is_empty());
    }

    #[test]
    fn test_full_recovery_cycle_recorded() {
        let mut machine = SessionStateMachine::new();
        for state in [
            SessionState::Initializing,
            SessionState::Scanning,
            SessionState::ErrorBackoff,
            SessionState::Initializing,
            SessionState::Disabled,
            SessionState::Initializing,
            SessionState::Scanning,
        ] {
            machine.transition_to(state).unwrap();
        }

        assert_eq!(machine.current(), SessionState::Scanning);
        assert_eq!(machine.history().len(), 7);
        assert_eq!(machine.history()[4].from, SessionState::Initializing);
        assert_eq!(machine.history()[4].to, SessionState::Disabled);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut machine = SessionStateMachine::new();
        machine.transition_to(SessionState::Initializing).unwrap();
        for _ in 0..100 {
            machine.transition_to(SessionState::Disabled).unwrap();
            machine.transition_to(SessionState::Initializing).unwrap();
        }

        assert_eq!(machine.history().len(), MAX_HISTORY_SIZE);
        assert_eq!(machine.history().back().unwrap().to, SessionState::Initializing);
    }

    #[test]
    fn test_display() {
        assert_eq!(SessionState::ErrorBackoff.to_string(), "ErrorBackoff");
        assert_eq!(
            SessionError::InvalidTransition {
                from: SessionState::Scanning,
                to: SessionState::Disabled
            }
            .to_string(),
            "Invalid state transition from Scanning to Disabled"
        );
    }
}
