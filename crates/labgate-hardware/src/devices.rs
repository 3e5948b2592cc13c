//! Enum wrappers for device dispatch.
//!
//! Native `async fn` in traits is not object-safe, so a `Box<dyn NfcReader>`
//! is not possible. The concrete device is picked once at startup from the
//! configuration and wrapped in one of these enums, which implement the same
//! trait by matching on the variant.
//!
//! # Examples
//!
//! ```
//! use labgate_core::Channel;
//! use labgate_hardware::devices::AnyNfcReader;
//! use labgate_hardware::mock::MockNfcReader;
//!
//! let (reader, _handle) = MockNfcReader::new(Channel::new(0).unwrap());
//! let reader = AnyNfcReader::Mock(reader);
//! assert_eq!(reader.kind(), "mock");
//! ```

use crate::bus::I2cBus;
use crate::error::{IndicatorError, Result};
use crate::gpio::{GpioIndicator, GpioRelay};
use crate::mock::{MockNfcReader, SimulatedIndicator, SimulatedRelay};
use crate::pn532::Pn532;
#[cfg(feature = "hardware-usb-relay")]
use crate::relay_usb::UsbHidRelay;
use crate::traits::{Actuator, Indicator, NfcReader};
use crate::types::{FirmwareInfo, LedColor};
use labgate_core::{BusAddress, CardUid};
use std::time::Duration;

/// Any supported NFC reader.
#[derive(Debug)]
pub enum AnyNfcReader {
    /// PN532 over I2C.
    Pn532(Pn532),
    /// Scripted reader for tests and simulation.
    Mock(MockNfcReader),
}

impl AnyNfcReader {
    /// Short name of the variant, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Pn532(_) => "pn532",
            Self::Mock(_) => "mock",
        }
    }
}

impl NfcReader for AnyNfcReader {
    fn address(&self) -> BusAddress {
        match self {
            Self::Pn532(device) => device.address(),
            Self::Mock(device) => device.address(),
        }
    }

    async fn initialize(&mut self, bus: &mut dyn I2cBus) -> Result<FirmwareInfo> {
        match self {
            Self::Pn532(device) => device.initialize(bus).await,
            Self::Mock(device) => device.initialize(bus).await,
        }
    }

    async fn poll(&mut self, bus: &mut dyn I2cBus, timeout: Duration) -> Result<Option<CardUid>> {
        match self {
            Self::Pn532(device) => device.poll(bus, timeout).await,
            Self::Mock(device) => device.poll(bus, timeout).await,
        }
    }

    async fn release(&mut self) -> Result<()> {
        match self {
            Self::Pn532(device) => device.release().await,
            Self::Mock(device) => device.release().await,
        }
    }
}

/// Any supported door strike actuator.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyActuator {
    /// Relay on a sysfs GPIO line.
    Gpio(GpioRelay),
    /// USB HID relay board.
    #[cfg(feature = "hardware-usb-relay")]
    UsbHid(UsbHidRelay),
    /// Logs only.
    Simulated(SimulatedRelay),
}

impl Actuator for AnyActuator {
    async fn trigger(&mut self, duration: Duration) -> Result<()> {
        match self {
            Self::Gpio(device) => device.trigger(duration).await,
            #[cfg(feature = "hardware-usb-relay")]
            Self::UsbHid(device) => device.trigger(duration).await,
            Self::Simulated(device) => device.trigger(duration).await,
        }
    }
}

/// Any supported indicator.
#[derive(Debug)]
pub enum AnyIndicator {
    /// LED and buzzer on sysfs GPIO lines.
    Gpio(GpioIndicator),
    /// Records and logs only.
    Simulated(SimulatedIndicator),
}

impl Indicator for AnyIndicator {
    async fn set_color(&mut self, color: LedColor) -> std::result::Result<(), IndicatorError> {
        match self {
            Self::Gpio(device) => device.set_color(color).await,
            Self::Simulated(device) => device.set_color(color).await,
        }
    }

    async fn pulse(&mut self, pattern: &[Duration]) -> std::result::Result<(), IndicatorError> {
        match self {
            Self::Gpio(device) => device.pulse(pattern).await,
            Self::Simulated(device) => device.pulse(pattern).await,
        }
    }

    async fn flash(
        &mut self,
        color: LedColor,
        times: u32,
        period: Duration,
    ) -> std::result::Result<(), IndicatorError> {
        match self {
            Self::Gpio(device) => device.flash(color, times, period).await,
            Self::Simulated(device) => device.flash(color, times, period).await,
        }
    }

    async fn off(&mut self) -> std::result::Result<(), IndicatorError> {
        match self {
            Self::Gpio(device) => device.off().await,
            Self::Simulated(device) => device.off().await,
        }
    }

    async fn show_text(&mut self, lines: &[String]) -> std::result::Result<(), IndicatorError> {
        match self {
            Self::Gpio(device) => device.show_text(lines).await,
            Self::Simulated(device) => device.show_text(lines).await,
        }
    }
}
