//! Exclusive channel arbitration over the shared bus.
//!
//! Every device behind the multiplexer answers on the bus only while its
//! branch is routed. Both NFC readers use the same device address, so a
//! transaction issued while the wrong branch is active silently talks to the
//! other door. [`ChannelMux`] prevents that: it owns the bus, and the only way
//! to reach it is through a [`MuxGuard`] that holds the lock for the whole
//! select-then-operate sequence.
//!
//! # Examples
//!
//! ```
//! use labgate_hardware::mock::MockBus;
//! use labgate_hardware::mux::{ChannelMux, MuxConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (bus, handle) = MockBus::new();
//!     let mux = ChannelMux::new(Box::new(bus), MuxConfig::default());
//!
//!     mux.select(0).await?;
//!     mux.select(0).await?; // memoized, no bus write
//!     assert_eq!(handle.mux_writes().len(), 1);
//!
//!     let mut guard = mux.lock(1).await?;
//!     guard.bus().write(0x24, &[0x00])?;
//!     drop(guard);
//!
//!     mux.reset().await?;
//!     assert_eq!(mux.current_channel().await, None);
//!     Ok(())
//! }
//! ```

use crate::bus::I2cBus;
use crate::error::{BusError, MuxError};
use labgate_core::Channel;
use labgate_core::constants::{DEFAULT_MUX_ADDRESS, DEFAULT_SETTLE_DELAY_MS, MUX_ALL_CHANNELS_OFF};
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, trace, warn};

/// Multiplexer addressing and timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MuxConfig {
    /// I2C address of the multiplexer itself.
    pub address: u8,

    /// Pause after a branch switch before the branch may be used.
    pub settle_delay: Duration,
}

impl Default for MuxConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_MUX_ADDRESS,
            settle_delay: Duration::from_millis(DEFAULT_SETTLE_DELAY_MS),
        }
    }
}

#[derive(Debug)]
struct MuxState {
    bus: Box<dyn I2cBus>,
    current: Option<Channel>,
}

/// Owner of the shared bus and its multiplexer.
///
/// One instance per process, shared by `Arc`. The internal lock is a fair
/// (FIFO) `tokio::sync::Mutex`, so no session can starve another.
#[derive(Debug)]
pub struct ChannelMux {
    state: Mutex<MuxState>,
    config: MuxConfig,
}

impl ChannelMux {
    pub fn new(bus: Box<dyn I2cBus>, config: MuxConfig) -> Self {
        Self {
            state: Mutex::new(MuxState { bus, current: None }),
            config,
        }
    }

    pub fn config(&self) -> &MuxConfig {
        &self.config
    }

    /// Route the bus to `channel`.
    ///
    /// Does nothing if the channel is already selected. On a failed write the
    /// remembered channel is cleared, so the next call writes again.
    ///
    /// # Errors
    ///
    /// - `MuxError::InvalidChannel` if `channel > 7`, before any bus I/O
    /// - `MuxError::BusIo` if the control byte could not be written
    pub async fn select(&self, channel: u8) -> Result<(), MuxError> {
        let channel = validate(channel)?;
        let mut state = self.state.lock().await;
        self.select_locked(&mut state, channel).await
    }

    /// Select `channel` and keep the bus locked until the guard drops.
    ///
    /// # Errors
    ///
    /// Same as [`select`](Self::select).
    pub async fn lock(&self, channel: u8) -> Result<MuxGuard<'_>, MuxError> {
        let channel = validate(channel)?;
        let mut state = self.state.lock().await;
        self.select_locked(&mut state, channel).await?;
        Ok(MuxGuard { state, channel })
    }

    /// Disconnect every branch.
    ///
    /// The remembered channel is cleared even when the write fails.
    ///
    /// # Errors
    ///
    /// Returns `MuxError::BusIo` if the control byte could not be written.
    pub async fn reset(&self) -> Result<(), MuxError> {
        let mut state = self.state.lock().await;
        state.current = None;
        state
            .bus
            .write(self.config.address, &[MUX_ALL_CHANNELS_OFF])
            .map_err(|e| {
                warn!(error = %e, "Failed to reset multiplexer");
                MuxError::BusIo(e)
            })?;
        debug!("Multiplexer reset, all channels off");
        Ok(())
    }

    /// Last channel for which a select succeeded.
    pub async fn current_channel(&self) -> Option<Channel> {
        self.state.lock().await.current
    }

    /// Read one byte from the multiplexer to check that it answers.
    ///
    /// # Errors
    ///
    /// Returns the bus error if the multiplexer does not acknowledge.
    pub async fn probe(&self) -> Result<u8, BusError> {
        let mut state = self.state.lock().await;
        let control = state.bus.read_byte(self.config.address)?;
        debug!(
            address = format_args!("0x{:02X}", self.config.address),
            control = format_args!("0x{control:02X}"),
            "Multiplexer answered probe"
        );
        Ok(control)
    }

    async fn select_locked(&self, state: &mut MuxState, channel: Channel) -> Result<(), MuxError> {
        if state.current == Some(channel) {
            trace!(channel = %channel, "Channel already selected");
            return Ok(());
        }

        if let Err(e) = state.bus.write(self.config.address, &[channel.mask()]) {
            state.current = None;
            warn!(channel = %channel, error = %e, "Channel select failed");
            return Err(MuxError::BusIo(e));
        }

        tokio::time::sleep(self.config.settle_delay).await;
        state.current = Some(channel);
        trace!(channel = %channel, "Channel selected");
        Ok(())
    }
}

fn validate(channel: u8) -> Result<Channel, MuxError> {
    Channel::new(channel).map_err(|_| MuxError::InvalidChannel { channel })
}

/// Exclusive access to the bus with one channel routed.
///
/// The multiplexer lock is held for the guard's lifetime.
#[derive(Debug)]
pub struct MuxGuard<'a> {
    state: MutexGuard<'a, MuxState>,
    channel: Channel,
}

impl MuxGuard<'_> {
    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// The bus, routed to [`channel`](Self::channel).
    pub fn bus(&mut self) -> &mut dyn I2cBus {
        self.state.bus.as_mut()
    }
}
