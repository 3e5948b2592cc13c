use labgate_core::RetryPolicy;

/// Outcome of recording a failed poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escalation {
    /// Below the threshold, keep scanning
    Continue,
    /// Threshold reached, leave Scanning
    Backoff,
}

/// Outcome of asking for a restart
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Restart {
    /// Restart allowed; `attempt` counts from 1
    Retry { attempt: u32 },
    /// All restarts used up
    Exhausted,
}

/// Failure counters of one reader session.
///
/// Holds no timing and does no I/O; the session decides what to do with
/// each verdict.
#[derive(Debug, Clone)]
pub struct FailureEscalation {
    error_threshold: u32,
    max_restart_attempts: u32,
    stable_polls: u32,
    consecutive_errors: u32,
    restart_attempts: u32,
    stable_count: u32,
    supervisory_used: bool,
}

impl FailureEscalation {
    pub fn new(policy: &RetryPolicy) -> Self {
        Self {
            error_threshold: policy.error_threshold,
            max_restart_attempts: policy.max_restart_attempts,
            stable_polls: policy.stable_polls,
            consecutive_errors: 0,
            restart_attempts: 0,
            stable_count: 0,
            supervisory_used: false,
        }
    }

    pub fn record_failure(&mut self) -> Escalation {
        self.consecutive_errors = self.consecutive_errors.saturating_add(1);
        self.stable_count = 0;

        if self.consecutive_errors >= self.error_threshold {
            Escalation::Backoff
        } else {
            Escalation::Continue
        }
    }

    /// A poll answered. Clears the error run; after `stable_polls` clean polls
    /// in a row the restart budget is refilled.
    pub fn record_success(&mut self) {
        self.consecutive_errors = 0;

        if self.restart_attempts > 0 {
            self.stable_count += 1;
            if self.stable_count >= self.stable_polls {
                self.restart_attempts = 0;
                self.stable_count = 0;
            }
        }
    }

    pub fn begin_restart(&mut self) -> Restart {
        if self.restart_attempts >= self.max_restart_attempts {
            return Restart::Exhausted;
        }
        self.restart_attempts += 1;
        self.consecutive_errors = 0;
        self.stable_count = 0;
        Restart::Retry {
            attempt: self.restart_attempts,
        }
    }

    /// True the first time only.
    pub fn take_supervisory_reinit(&mut self) -> bool {
        !std::mem::replace(&mut self.supervisory_used, true)
    }

    /// Clear every counter. The supervisory reinit stays spent.
    pub fn reset(&mut self) {
        self.consecutive_errors = 0;
        self.restart_attempts = 0;
        self.stable_count = 0;
    }

    pub fn clear_errors(&mut self) {
        self.consecutive_errors = 0;
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }

    pub fn restart_attempts(&self) -> u32 {
        self.restart_attempts
    }

    pub fn supervisory_used(&self) -> bool {
        self.supervisory_used
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn escalation(threshold: u32, restarts: u32, stable: u32) -> FailureEscalation {
        FailureEscalation::new(
            &RetryPolicy::default()
                .with_error_threshold(threshold)
                .with_max_restart_attempts(restarts)
                .with_stable_polls(stable),
        )
    }

    #[rstest]
    #[case(1)]
    #[case(5)]
    #[case(10)]
    fn test_backoff_exactly_at_threshold(#[case] threshold: u32) {
        let mut esc = escalation(threshold, 3, 10);

        for _ in 1..threshold {
            assert_eq!(esc.record_failure(), Escalation::Continue);
        }
        assert_eq!(esc.record_failure(), Escalation::Backoff);
        assert_eq!(esc.consecutive_errors(), threshold);
    }

    #[test]
    fn test_success_resets_error_run() {
        let mut esc = escalation(3, 3, 10);
        esc.record_failure();
        esc.record_failure();
        esc.record_success();

        assert_eq!(esc.consecutive_errors(), 0);
        assert_eq!(esc.record_failure(), Escalation::Continue);
    }

    #[test]
    fn test_restarts_are_bounded() {
        let mut esc = escalation(1, 3, 10);

        assert_eq!(esc.begin_restart(), Restart::Retry { attempt: 1 });
        assert_eq!(esc.begin_restart(), Restart::Retry { attempt: 2 });
        assert_eq!(esc.begin_restart(), Restart::Retry { attempt: 3 });
        assert_eq!(esc.begin_restart(), Restart::Exhausted);
        assert_eq!(esc.restart_attempts(), 3);
    }

    #[test]
    fn test_stable_polls_refill_restart_budget() {
        let mut esc = escalation(1, 1, 3);
        assert_eq!(esc.begin_restart(), Restart::Retry { attempt: 1 });

        esc.record_success();
        esc.record_success();
        assert_eq!(esc.begin_restart(), Restart::Exhausted);

        esc.record_success();
        assert_eq!(esc.restart_attempts(), 0);
        assert_eq!(esc.begin_restart(), Restart::Retry { attempt: 1 });
    }

    #[test]
    fn test_failure_interrupts_stable_run() {
        let mut esc = escalation(5, 1, 3);
        esc.begin_restart();

        esc.record_success();
        esc.record_success();
        esc.record_failure();
        esc.record_success();
        esc.record_success();

        assert_eq!(esc.restart_attempts(), 1);
    }

    #[test]
    fn test_supervisory_reinit_once() {
        let mut esc = escalation(5, 3, 10);

        assert!(esc.take_supervisory_reinit());
        esc.reset();
        assert!(!esc.take_supervisory_reinit());
        assert!(esc.supervisory_used());
    }
}
