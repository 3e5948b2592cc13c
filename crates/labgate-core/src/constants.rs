//! Core constants for the labgate access point.
//!
//! This module defines the bus addresses, timing defaults and size limits used
//! throughout the workspace. Hardware crates, the reader sessions and the CLI
//! configuration all take their defaults from here so the values stay in one
//! place.
//!
//! # Bus Topology
//!
//! All devices share one I2C bus behind a PCA9548A-style multiplexer:
//!
//! ```text
//!              ┌──────────────┐
//!  I2C bus ───►│ mux @ 0x70   │── ch0 ──► NFC reader (inside)  @ 0x24
//!              │              │── ch1 ──► NFC reader (outside) @ 0x24
//!              │              │── ch2 ──► character display
//!              └──────────────┘
//! ```
//!
//! Both readers answer on the same device address, which is why every
//! operation has to select its branch first.
//!
//! # Usage
//!
//! ```
//! use labgate_core::constants::*;
//! use std::time::Duration;
//!
//! assert_eq!(channel_mask(3), 0b0000_1000);
//! let settle = Duration::from_millis(DEFAULT_SETTLE_DELAY_MS);
//! assert_eq!(settle.as_millis(), 10);
//! ```

// ============================================================================
// Multiplexer
// ============================================================================

/// Default I2C address of the bus multiplexer.
pub const DEFAULT_MUX_ADDRESS: u8 = 0x70;

/// Highest channel number a multiplexer branch can have.
pub const MAX_CHANNEL: u8 = 7;

/// Number of branches on the multiplexer.
pub const CHANNEL_COUNT: usize = 8;

/// Control byte that disconnects every branch.
pub const MUX_ALL_CHANNELS_OFF: u8 = 0x00;

/// Pause after switching branches before the next transaction is valid (milliseconds).
///
/// # Value: 10ms
///
/// Matches the settle time the multiplexer needs on a Raspberry Pi bus at
/// 100kHz. Shorter values produced sporadic NACKs from the readers.
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 10;

/// Lowest valid 7-bit I2C device address.
pub const MIN_I2C_ADDRESS: u8 = 0x08;

/// Highest valid 7-bit I2C device address.
pub const MAX_I2C_ADDRESS: u8 = 0x77;

/// Control byte that routes the bus to `channel`.
///
/// # Examples
///
/// ```
/// use labgate_core::constants::channel_mask;
///
/// assert_eq!(channel_mask(0), 0x01);
/// assert_eq!(channel_mask(7), 0x80);
/// ```
#[must_use]
pub const fn channel_mask(channel: u8) -> u8 {
    1 << channel
}

// ============================================================================
// NFC Readers
// ============================================================================

/// Default I2C address of a PN532 reader.
pub const DEFAULT_READER_ADDRESS: u8 = 0x24;

/// Default channel of the inside door reader.
pub const DEFAULT_INSIDE_CHANNEL: u8 = 0;

/// Default channel of the outside door reader.
pub const DEFAULT_OUTSIDE_CHANNEL: u8 = 1;

/// Minimum UID length in bytes. Readers report whatever the card sends.
pub const MIN_UID_LENGTH: usize = 1;

/// Maximum UID length in bytes (ISO 14443 triple size).
pub const MAX_UID_LENGTH: usize = 10;

// ============================================================================
// Retry Policy Defaults
// ============================================================================

/// Reader initialization attempts before a session is disabled.
pub const DEFAULT_MAX_INIT_RETRIES: u32 = 3;

/// Delay between reader initialization attempts (milliseconds).
pub const DEFAULT_RETRY_DELAY_MS: u64 = 2_000;

/// Consecutive failed polls that push a session into error backoff.
pub const DEFAULT_ERROR_THRESHOLD: u32 = 5;

/// Delay before the single supervisory reinit of a disabled session (milliseconds).
pub const DEFAULT_HARDWARE_RESET_DELAY_MS: u64 = 60_000;

/// Window in which the same card is not accepted twice (milliseconds).
pub const DEFAULT_COOLDOWN_WINDOW_MS: u64 = 3_000;

/// Backoff/reinit cycles allowed before a session is disabled.
pub const DEFAULT_MAX_RESTART_ATTEMPTS: u32 = 3;

/// Pause in error backoff before reinitializing the reader (milliseconds).
pub const DEFAULT_BACKOFF_DELAY_MS: u64 = 1_000;

/// Channel select attempts per poll before the poll counts as failed.
pub const DEFAULT_SELECT_RETRIES: u32 = 3;

/// Pause between channel select attempts (milliseconds).
pub const DEFAULT_SELECT_RETRY_DELAY_MS: u64 = 20;

/// Bounded wait for a card in a single poll (milliseconds).
pub const DEFAULT_POLL_TIMEOUT_MS: u64 = 100;

/// Idle time between two polls of the same session (milliseconds).
///
/// Gives the other session and the display refresher a turn on the bus.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;

/// Successful polls in a row after which the restart counter is cleared.
///
/// An idle poll takes the poll timeout plus the poll interval (150 ms), so
/// this is one minute without errors.
pub const DEFAULT_STABLE_POLLS: u32 = 400;

// ============================================================================
// Collaborators
// ============================================================================

/// Timeout for the access-decision request (milliseconds).
pub const DEFAULT_DECISION_TIMEOUT_MS: u64 = 3_000;

/// How long the door strike stays energized (milliseconds).
pub const DEFAULT_RELAY_DURATION_MS: u64 = 3_000;

/// Default multiplexer channel of the character display.
pub const DEFAULT_DISPLAY_CHANNEL: u8 = 2;

/// Display rows.
pub const DEFAULT_DISPLAY_ROWS: usize = 4;

/// Display columns.
pub const DEFAULT_DISPLAY_COLS: usize = 20;

/// Idle screen refresh period (milliseconds).
pub const DEFAULT_DISPLAY_REFRESH_MS: u64 = 1_000;

/// How long a scan result stays on the display (milliseconds).
pub const DEFAULT_MESSAGE_HOLD_MS: u64 = 2_000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_mask_covers_all_channels() {
        let masks: Vec<u8> = (0..=MAX_CHANNEL).map(channel_mask).collect();
        assert_eq!(masks.len(), CHANNEL_COUNT);
        assert_eq!(masks.iter().fold(0u8, |acc, m| acc | m), 0xFF);
    }

    #[test]
    fn test_default_addresses_are_valid() {
        for address in [DEFAULT_MUX_ADDRESS, DEFAULT_READER_ADDRESS] {
            assert!((MIN_I2C_ADDRESS..=MAX_I2C_ADDRESS).contains(&address));
        }
    }
}
