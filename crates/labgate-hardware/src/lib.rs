//! Hardware layer of the labgate access point.
//!
//! Everything that touches the physical world lives here:
//!
//! - [`bus`]: the raw I2C bus ([`I2cBus`]), with a Linux i2c-dev backend
//!   behind the `hardware-i2c` feature
//! - [`mux`]: [`ChannelMux`], the single owner of the bus, which hands out
//!   exclusive, channel-routed access through [`MuxGuard`]
//! - [`traits`]: device capabilities ([`NfcReader`], [`Actuator`],
//!   [`Indicator`], [`CharacterDisplay`])
//! - [`devices`]: enum wrappers selecting a concrete device at startup
//! - real adapters: [`pn532`], [`gpio`], and `relay_usb` (feature
//!   `hardware-usb-relay`)
//! - [`display`]: the virtual character display and the message board
//! - [`mock`]: scriptable devices for tests and simulation mode
//!
//! All async operations use native `async fn` in traits (Rust 1.90 + Edition
//! 2024 RPITIT).
//!
//! # Bus discipline
//!
//! Readers never own the bus. A session locks its channel, hands the guard's
//! bus to the reader, and releases the lock by dropping the guard:
//!
//! ```
//! use labgate_core::Channel;
//! use labgate_hardware::mock::{MockBus, MockNfcReader};
//! use labgate_hardware::{ChannelMux, MuxConfig, NfcReader};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> labgate_hardware::Result<()> {
//!     let (bus, _bus_handle) = MockBus::new();
//!     let mux = ChannelMux::new(Box::new(bus), MuxConfig::default());
//!     let (mut reader, _reader_handle) = MockNfcReader::new(Channel::new(0).unwrap());
//!
//!     let mut guard = mux.lock(0).await?;
//!     reader.initialize(guard.bus()).await?;
//!     let card = reader.poll(guard.bus(), Duration::from_millis(100)).await?;
//!     drop(guard);
//!
//!     assert!(card.is_none());
//!     Ok(())
//! }
//! ```

pub mod bus;
pub mod devices;
pub mod display;
pub mod error;
pub mod gpio;
pub mod mock;
pub mod mux;
pub mod pn532;
#[cfg(feature = "hardware-usb-relay")]
pub mod relay_usb;
pub mod traits;
pub mod types;

pub use bus::I2cBus;
#[cfg(all(feature = "hardware-i2c", target_os = "linux"))]
pub use bus::LinuxI2cBus;
pub use devices::{AnyActuator, AnyIndicator, AnyNfcReader};
pub use display::{DisplayBoard, VirtualDisplay};
pub use error::{BusError, HardwareError, IndicatorError, MuxError, Result};
pub use mux::{ChannelMux, MuxConfig, MuxGuard};
pub use traits::{Actuator, CharacterDisplay, Indicator, NfcReader};
pub use types::{FirmwareInfo, LedColor};
