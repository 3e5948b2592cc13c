//! Common types shared across device implementations.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Firmware identification returned by a reader's liveness check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirmwareInfo {
    /// Reader name (e.g., "PN532", "Mock NFC Reader").
    pub name: String,

    /// IC identifier byte.
    pub ic: u8,

    pub version: u8,
    pub revision: u8,

    /// Bit field of supported card families.
    pub support: u8,
}

impl FirmwareInfo {
    pub fn new(name: impl Into<String>, ic: u8, version: u8, revision: u8) -> Self {
        Self {
            name: name.into(),
            ic,
            version,
            revision,
            support: 0,
        }
    }

    /// Set the supported card family bits.
    pub fn with_support(mut self, support: u8) -> Self {
        self.support = support;
        self
    }
}

impl fmt::Display for FirmwareInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (IC 0x{:02X}) firmware {}.{}",
            self.name, self.ic, self.version, self.revision
        )
    }
}

/// LED colors for visual feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedColor {
    /// LED off.
    Off,

    /// Red LED.
    Red,

    /// Green LED.
    Green,

    /// Blue LED.
    Blue,

    /// Yellow LED.
    Yellow,

    /// White LED.
    White,

    /// Custom RGB color (red, green, blue).
    Custom(u8, u8, u8),
}

impl LedColor {
    /// Create a custom RGB LED color.
    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::Custom(r, g, b)
    }

    /// Get the RGB components of the LED color.
    pub fn as_rgb(&self) -> (u8, u8, u8) {
        match self {
            Self::Off => (0, 0, 0),
            Self::Red => (255, 0, 0),
            Self::Green => (0, 255, 0),
            Self::Blue => (0, 0, 255),
            Self::Yellow => (255, 255, 0),
            Self::White => (255, 255, 255),
            Self::Custom(r, g, b) => (*r, *g, *b),
        }
    }

    /// On/off state of the red, green and blue channels of a digital RGB LED.
    ///
    /// A channel is on when its component is at least half intensity.
    pub fn as_digital(&self) -> [bool; 3] {
        let (r, g, b) = self.as_rgb();
        [r >= 128, g >= 128, b >= 128]
    }
}
