//! Retry and timing bounds for reader sessions.

use crate::{Result, constants::*, error::Error};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Process-wide retry policy, loaded once at startup and never mutated.
///
/// Every field is a bound: the number of attempts a session may make, or how
/// long it may wait. Sessions share one policy by value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total reader initialization attempts before the session is disabled.
    pub max_init_retries: u32,
    pub retry_delay: Duration,
    /// Consecutive failed polls that trigger error backoff.
    pub error_threshold: u32,
    /// Delay before the single supervisory reinit of a disabled session.
    pub hardware_reset_delay: Duration,
    /// Same-card suppression window.
    pub cooldown_window: Duration,
    pub max_restart_attempts: u32,
    pub backoff_delay: Duration,
    pub select_retries: u32,
    pub select_retry_delay: Duration,
    pub poll_timeout: Duration,
    pub poll_interval: Duration,
    /// Successful polls in a row after which restart attempts are forgotten.
    pub stable_polls: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_init_retries: DEFAULT_MAX_INIT_RETRIES,
            retry_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
            error_threshold: DEFAULT_ERROR_THRESHOLD,
            hardware_reset_delay: Duration::from_millis(DEFAULT_HARDWARE_RESET_DELAY_MS),
            cooldown_window: Duration::from_millis(DEFAULT_COOLDOWN_WINDOW_MS),
            max_restart_attempts: DEFAULT_MAX_RESTART_ATTEMPTS,
            backoff_delay: Duration::from_millis(DEFAULT_BACKOFF_DELAY_MS),
            select_retries: DEFAULT_SELECT_RETRIES,
            select_retry_delay: Duration::from_millis(DEFAULT_SELECT_RETRY_DELAY_MS),
            poll_timeout: Duration::from_millis(DEFAULT_POLL_TIMEOUT_MS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            stable_polls: DEFAULT_STABLE_POLLS,
        }
    }
}

impl RetryPolicy {
    /// Check that every attempt count and threshold is non-zero.
    ///
    /// # Errors
    /// Returns `Error::InvalidPolicy` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        let counts = [
            ("max_init_retries", self.max_init_retries),
            ("error_threshold", self.error_threshold),
            ("max_restart_attempts", self.max_restart_attempts),
            ("select_retries", self.select_retries),
            ("stable_polls", self.stable_polls),
        ];
        if let Some((name, _)) = counts.iter().find(|(_, value)| *value == 0) {
            return Err(Error::InvalidPolicy(format!("{name} must be greater than zero")));
        }

        if self.poll_timeout.is_zero() {
            return Err(Error::InvalidPolicy("poll_timeout must be greater than zero".to_string()));
        }

        Ok(())
    }

    /// Timeout applied to a reader initialization (firmware read).
    ///
    /// Initialization exchanges several frames, so it gets a multiple of the
    /// poll timeout with a floor of one second.
    #[must_use]
    pub fn init_timeout(&self) -> Duration {
        (self.poll_timeout * 10).max(Duration::from_secs(1))
    }

    /// Outer bound on one poll: command acknowledgement plus the wait for a card.
    #[must_use]
    pub fn poll_deadline(&self) -> Duration {
        self.poll_timeout * 3
    }

    #[must_use]
    pub fn with_max_init_retries(mut self, attempts: u32) -> Self {
        self.max_init_retries = attempts;
        self
    }

    #[must_use]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    #[must_use]
    pub fn with_error_threshold(mut self, threshold: u32) -> Self {
        self.error_threshold = threshold;
        self
    }

    #[must_use]
    pub fn with_hardware_reset_delay(mut self, delay: Duration) -> Self {
        self.hardware_reset_delay = delay;
        self
    }

    #[must_use]
    pub fn with_cooldown_window(mut self, window: Duration) -> Self {
        self.cooldown_window = window;
        self
    }

    #[must_use]
    pub fn with_max_restart_attempts(mut self, attempts: u32) -> Self {
        self.max_restart_attempts = attempts;
        self
    }

    #[must_use]
    pub fn with_backoff_delay(mut self, delay: Duration) -> Self {
        self.backoff_delay = delay;
        self
    }

    #[must_use]
    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    #[must_use]
    pub fn with_stable_polls(mut self, polls: u32) -> Self {
        self.stable_polls = polls;
        self
    }
}
