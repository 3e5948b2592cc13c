//! Idle screen refresher.
//!
//! The character display hangs off its own multiplexer branch, so every
//! refresh competes for the bus like a reader poll does. Once per interval
//! the refresher locks the display branch and renders either the message an
//! indicator posted to the [`DisplayBoard`] or the idle screen:
//!
//! ```text
//! ┌────────────────────┐
//! │  [Mon 2026-10-19]  │
//! │      14:30:05      │
//! │       AI LAB       │
//! │ Present your card  │
//! └────────────────────┘
//! ```

use crate::session::sleep_or_cancel;
use chrono::{DateTime, Local, TimeZone};
use labgate_core::Channel;
use labgate_core::constants::DEFAULT_DISPLAY_REFRESH_MS;
use labgate_hardware::{CharacterDisplay, ChannelMux, DisplayBoard, HardwareError, VirtualDisplay};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const DEFAULT_SITE_NAME: &str = "AI LAB";
const IDLE_PROMPT: &str = "Present your card";

/// Idle screen lines for `now`.
pub fn idle_screen<Tz: TimeZone>(site_name: &str, now: &DateTime<Tz>) -> Vec<String>
where
    Tz::Offset: std::fmt::Display,
{
    vec![
        format!("[{}]", now.format("%a %Y-%m-%d")),
        now.format("%H:%M:%S").to_string(),
        site_name.to_string(),
        IDLE_PROMPT.to_string(),
    ]
}

/// Periodic task keeping the character display current.
#[derive(Debug)]
pub struct IdleDisplayRefresher<D: CharacterDisplay = VirtualDisplay> {
    display: D,
    channel: Channel,
    mux: Arc<ChannelMux>,
    board: DisplayBoard,
    site_name: String,
    interval: Duration,
    renders: u64,
}

impl<D: CharacterDisplay> IdleDisplayRefresher<D> {
    pub fn new(display: D, channel: Channel, mux: Arc<ChannelMux>, board: DisplayBoard) -> Self {
        Self {
            display,
            channel,
            mux,
            board,
            site_name: DEFAULT_SITE_NAME.to_string(),
            interval: Duration::from_millis(DEFAULT_DISPLAY_REFRESH_MS),
            renders: 0,
        }
    }

    #[must_use]
    pub fn with_site_name(mut self, site_name: impl Into<String>) -> Self {
        self.site_name = site_name.into();
        self
    }

    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// Lines that the next refresh would render.
    pub fn frame(&self) -> Vec<String> {
        self.board
            .current()
            .unwrap_or_else(|| idle_screen(&self.site_name, &Local::now()))
    }

    /// Render one frame with the display branch routed.
    ///
    /// # Errors
    ///
    /// Returns the mux error if the branch cannot be selected, or the
    /// display's own error.
    pub async fn refresh(&mut self) -> Result<(), HardwareError> {
        let lines = self.frame();
        let mut guard = self.mux.lock(self.channel.as_u8()).await?;
        self.display.render(guard.bus(), &lines).await?;
        self.renders += 1;
        Ok(())
    }

    /// Refresh every interval until `cancel` fires. Returns the number of
    /// frames rendered.
    pub async fn run(mut self, cancel: CancellationToken) -> u64 {
        info!(
            channel = %self.channel,
            rows = self.display.rows(),
            cols = self.display.cols(),
            "Display refresher started"
        );

        let mut failures = 0u32;
        loop {
            if cancel.is_cancelled() {
                break;
            }
            match self.refresh().await {
                Ok(()) => failures = 0,
                Err(e) => {
                    failures += 1;
                    // Warn once per failure run.
                    if failures == 1 {
                        warn!(channel = %self.channel, error = %e, "Display refresh failed");
                    } else {
                        debug!(channel = %self.channel, failures, error = %e, "Display refresh failed");
                    }
                }
            }
            if !sleep_or_cancel(self.interval, &cancel).await {
                break;
            }
        }

        info!(renders = self.renders, "Display refresher stopped");
        self.renders
    }
}
