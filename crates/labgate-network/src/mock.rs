//! Scripted decision service for tests and simulation.

use crate::decision::{Decision, DecisionError, DecisionService};
use labgate_core::{CardUid, Direction};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Debug)]
struct MockState {
    default: Decision,
    per_card: HashMap<CardUid, Decision>,
    scripted: VecDeque<Result<Decision, DecisionError>>,
    delay: Duration,
    requests: Vec<(CardUid, Direction)>,
}

/// Decision service answering from a script.
///
/// Resolution order: queued outcomes first, then the per-card table, then
/// the default verdict.
///
/// # Examples
///
/// ```
/// use labgate_core::{CardUid, Direction};
/// use labgate_network::{Decision, DecisionService, MockDecisionService};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let (service, handle) = MockDecisionService::new(Decision::Denied);
/// let uid = CardUid::from_hex("04a2b3c4").unwrap();
/// handle.allow(uid.clone());
///
/// assert_eq!(service.decide(&uid, Direction::Inside).await.unwrap(), Decision::Granted);
/// assert_eq!(handle.request_count(), 1);
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct MockDecisionService {
    state: Arc<Mutex<MockState>>,
}

impl MockDecisionService {
    pub fn new(default: Decision) -> (Self, MockDecisionHandle) {
        let state = Arc::new(Mutex::new(MockState {
            default,
            per_card: HashMap::new(),
            scripted: VecDeque::new(),
            delay: Duration::ZERO,
            requests: Vec::new(),
        }));
        (
            Self {
                state: Arc::clone(&state),
            },
            MockDecisionHandle { state },
        )
    }

    /// Service granting every card.
    pub fn granting() -> (Self, MockDecisionHandle) {
        Self::new(Decision::Granted)
    }
}

impl DecisionService for MockDecisionService {
    async fn decide(&self, uid: &CardUid, direction: Direction) -> Result<Decision, DecisionError> {
        let delay = {
            let mut state = self.state.lock();
            state.requests.push((uid.clone(), direction));
            state.delay
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let outcome = {
            let mut state = self.state.lock();
            match state.scripted.pop_front() {
                Some(outcome) => outcome,
                None => Ok(state.per_card.get(uid).copied().unwrap_or(state.default)),
            }
        };

        if let Ok(decision) = &outcome {
            info!(uid = %uid, direction = %direction, decision = %decision, "Decision (simulated)");
        }
        outcome
    }
}

/// Handle for scripting a [`MockDecisionService`].
#[derive(Debug, Clone)]
pub struct MockDecisionHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockDecisionHandle {
    pub fn allow(&self, uid: CardUid) {
        self.state.lock().per_card.insert(uid, Decision::Granted);
    }

    pub fn deny(&self, uid: CardUid) {
        self.state.lock().per_card.insert(uid, Decision::Denied);
    }

    pub fn set_default(&self, decision: Decision) {
        self.state.lock().default = decision;
    }

    /// Queue one outcome for the next request, ahead of the tables.
    pub fn push_outcome(&self, outcome: Result<Decision, DecisionError>) {
        self.state.lock().scripted.push_back(outcome);
    }

    /// Make every request take `delay` before answering.
    pub fn set_delay(&self, delay: Duration) {
        self.state.lock().delay = delay;
    }

    pub fn requests(&self) -> Vec<(CardUid, Direction)> {
        self.state.lock().requests.clone()
    }

    pub fn request_count(&self) -> usize {
        self.state.lock().requests.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uid(hex: &str) -> CardUid {
        CardUid::from_hex(hex).unwrap()
    }

    #[tokio::test]
    async fn test_default_and_per_card_verdicts() {
        let (service, handle) = MockDecisionService::new(Decision::Denied);
        handle.allow(uid("04a2b3c4"));

        let granted = service.decide(&uid("04a2b3c4"), Direction::Inside).await.unwrap();
        let denied = service.decide(&uid("04e68f2a"), Direction::Outside).await.unwrap();

        assert_eq!(granted, Decision::Granted);
        assert_eq!(denied, Decision::Denied);
        assert_eq!(
            handle.requests(),
            vec![
                (uid("04a2b3c4"), Direction::Inside),
                (uid("04e68f2a"), Direction::Outside)
            ]
        );
    }

    #[tokio::test]
    async fn test_scripted_outcomes_take_precedence() {
        let (service, handle) = MockDecisionService::granting();
        handle.push_outcome(Err(DecisionError::Status { status: 500 }));

        let first = service.decide(&uid("04a2b3c4"), Direction::Inside).await;
        let second = service.decide(&uid("04a2b3c4"), Direction::Inside).await;

        assert!(matches!(first, Err(DecisionError::Status { status: 500 })));
        assert_eq!(second.unwrap(), Decision::Granted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_is_applied() {
        let (service, handle) = MockDecisionService::granting();
        handle.set_delay(Duration::from_secs(5));

        let result = tokio::time::timeout(
            Duration::from_secs(3),
            service.decide(&uid("04a2b3c4"), Direction::Inside),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(handle.request_count(), 1);
    }
}
