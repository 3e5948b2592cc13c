//! The access decision seam.

use crate::client::HttpDecisionClient;
use crate::mock::MockDecisionService;
use labgate_core::{CardUid, Direction};
use std::fmt;
use thiserror::Error;

/// Verdict returned by the access decision service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Decision {
    Granted,
    Denied,
}

impl Decision {
    /// Map the service's `openDoor` flag to a verdict.
    #[must_use]
    pub fn from_open_door(open_door: bool) -> Self {
        if open_door {
            Decision::Granted
        } else {
            Decision::Denied
        }
    }

    #[inline]
    #[must_use]
    pub fn opens_door(self) -> bool {
        matches!(self, Decision::Granted)
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Granted => write!(f, "granted"),
            Decision::Denied => write!(f, "denied"),
        }
    }
}

/// Errors from the access decision service.
///
/// None of these are fatal. The caller treats every error as "door stays
/// closed" and records the scan as unsuccessful.
#[derive(Debug, Error)]
pub enum DecisionError {
    /// Request could not be sent or the connection broke
    #[error("Transport error: {0}")]
    Transport(String),

    /// No answer within the configured bound
    #[error("Decision timeout after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Service answered with a non-success status
    #[error("Decision service returned HTTP {status}")]
    Status { status: u16 },

    /// Body could not be understood
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl DecisionError {
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn timeout(duration: std::time::Duration) -> Self {
        Self::Timeout {
            duration_ms: duration.as_millis() as u64,
        }
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }
}

/// Something that decides whether a card may pass.
///
/// Takes `&self` so a single service can be shared by every reader session.
pub trait DecisionService: Send + Sync {
    async fn decide(&self, uid: &CardUid, direction: Direction) -> Result<Decision, DecisionError>;
}

/// Any supported decision service, chosen once at startup.
#[derive(Debug, Clone)]
pub enum AnyDecisionService {
    Http(HttpDecisionClient),
    Mock(MockDecisionService),
}

impl DecisionService for AnyDecisionService {
    async fn decide(&self, uid: &CardUid, direction: Direction) -> Result<Decision, DecisionError> {
        match self {
            Self::Http(service) => service.decide(uid, direction).await,
            Self::Mock(service) => service.decide(uid, direction).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_from_open_door() {
        assert_eq!(Decision::from_open_door(true), Decision::Granted);
        assert_eq!(Decision::from_open_door(false), Decision::Denied);
        assert!(Decision::Granted.opens_door());
        assert!(!Decision::Denied.opens_door());
    }

    #[test]
    fn test_error_messages() {
        let err = DecisionError::timeout(std::time::Duration::from_millis(3000));
        assert_eq!(err.to_string(), "Decision timeout after 3000ms");

        let err = DecisionError::Status { status: 503 };
        assert_eq!(err.to_string(), "Decision service returned HTTP 503");
    }
}
