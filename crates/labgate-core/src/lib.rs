//! Core domain types shared by every labgate crate.
//!
//! The access point has two doors, each with an NFC reader hanging off one
//! branch of a shared I2C multiplexer. This crate holds the vocabulary the
//! rest of the workspace speaks: bus [`Channel`]s, [`DoorRole`]s, card
//! [`CardUid`]s, the immutable [`RetryPolicy`] and the [`ScanEvent`] record
//! produced for every accepted card detection.

pub mod constants;
pub mod error;
pub mod event;
pub mod policy;
pub mod types;

pub use error::{Error, Result};
pub use event::ScanEvent;
pub use policy::RetryPolicy;
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
