//! Device trait definitions.
//!
//! These traits are the seams between the reader sessions and the physical
//! world: the NFC reader behind a multiplexer branch, the door strike
//! actuator, the per-door indicator (LED, buzzer, display text) and the
//! character display.
//!
//! All traits use native `async fn` methods (Rust 1.90 + Edition 2024 RPITIT).
//! They are not object-safe; dynamic selection goes through the enum wrappers
//! in [`devices`](crate::devices).

#![allow(async_fn_in_trait)]

use crate::bus::I2cBus;
use crate::error::{IndicatorError, Result};
use crate::types::{FirmwareInfo, LedColor};
use labgate_core::{BusAddress, CardUid};
use std::time::Duration;

/// NFC card reader sitting behind one multiplexer branch.
///
/// The reader never owns the bus. Every operation borrows it from a
/// [`MuxGuard`](crate::mux::MuxGuard) whose channel is the reader's branch,
/// so the caller controls exclusivity.
///
/// # Examples
///
/// ```no_run
/// use labgate_hardware::mux::ChannelMux;
/// use labgate_hardware::traits::NfcReader;
/// use std::time::Duration;
///
/// async fn poll_once<R: NfcReader>(mux: &ChannelMux, reader: &mut R) -> labgate_hardware::Result<()> {
///     let mut guard = mux.lock(0).await?;
///     if let Some(uid) = reader.poll(guard.bus(), Duration::from_millis(100)).await? {
///         println!("card {uid}");
///     }
///     Ok(())
/// }
/// ```
pub trait NfcReader: Send {
    /// Device address of the reader on its branch.
    fn address(&self) -> BusAddress;

    /// Bring the reader into a known state and read its firmware version.
    ///
    /// Called on startup and again after every error backoff, so it must be
    /// safe to call on a reader that is already initialized.
    ///
    /// # Errors
    ///
    /// Returns an error if the reader does not answer or answers garbage.
    async fn initialize(&mut self, bus: &mut dyn I2cBus) -> Result<FirmwareInfo>;

    /// Look for a card in the field, waiting at most `timeout`.
    ///
    /// Returns `Ok(None)` when no card showed up in time.
    ///
    /// # Errors
    ///
    /// Returns an error on bus failures or malformed responses.
    async fn poll(&mut self, bus: &mut dyn I2cBus, timeout: Duration) -> Result<Option<CardUid>>;

    /// Drop any reader-side state. Called once at shutdown.
    async fn release(&mut self) -> Result<()>;
}

/// Door strike or any other actuator that is energized for a while.
pub trait Actuator: Send {
    /// Energize, hold for `duration`, de-energize.
    ///
    /// Blocks (asynchronously) for the whole duration.
    ///
    /// # Errors
    ///
    /// Returns an error if the actuator could not be switched.
    async fn trigger(&mut self, duration: Duration) -> Result<()>;
}

/// User feedback at one door.
///
/// Errors are reported but callers treat them as cosmetic: they are logged
/// and never change the outcome of a scan.
pub trait Indicator: Send {
    /// Set the LED to a steady color.
    async fn set_color(&mut self, color: LedColor) -> std::result::Result<(), IndicatorError>;

    /// Sound the buzzer once per entry of `pattern`, each for that long.
    async fn pulse(&mut self, pattern: &[Duration]) -> std::result::Result<(), IndicatorError>;

    /// Blink the LED `times` times with the given color.
    async fn flash(
        &mut self,
        color: LedColor,
        times: u32,
        period: Duration,
    ) -> std::result::Result<(), IndicatorError>;

    /// LED and buzzer off.
    async fn off(&mut self) -> std::result::Result<(), IndicatorError>;

    /// Show a short message on the display for this door.
    async fn show_text(&mut self, lines: &[String]) -> std::result::Result<(), IndicatorError>;
}

/// Character display reachable over the shared bus.
pub trait CharacterDisplay: Send {
    fn rows(&self) -> usize;

    fn cols(&self) -> usize;

    /// Replace the whole screen with `lines`.
    async fn render(&mut self, bus: &mut dyn I2cBus, lines: &[String]) -> Result<()>;
}
