//! Error types for hardware operations.
//!
//! Bus transactions fail with [`BusError`], multiplexer arbitration with
//! [`MuxError`], indicator output with [`IndicatorError`]. Reader and
//! actuator operations report [`HardwareError`], which wraps the other two
//! bus-level errors.

use std::path::PathBuf;

/// Result type alias for hardware operations.
pub type Result<T> = std::result::Result<T, HardwareError>;

/// Errors raised by a single transaction on the shared I2C bus.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    /// The OS driver reported an I/O failure.
    #[error("Bus I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No device acknowledged the address.
    #[error("No acknowledge from device at 0x{address:02X}")]
    Nack { address: u8 },

    /// The bus handle has been closed.
    #[error("Bus closed")]
    Closed,
}

impl BusError {
    /// Create a new NACK error.
    pub fn nack(address: u8) -> Self {
        Self::Nack { address }
    }
}

/// Errors raised by the channel multiplexer.
#[derive(Debug, thiserror::Error)]
pub enum MuxError {
    /// Requested channel is outside 0-7. Raised before any bus I/O.
    #[error("Invalid mux channel {channel}: must be 0-7")]
    InvalidChannel { channel: u8 },

    /// Writing the control byte failed.
    #[error("Mux bus I/O failed: {0}")]
    BusIo(#[from] BusError),
}

impl MuxError {
    /// Returns `true` if retrying the select could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::BusIo(_))
    }
}

/// Errors raised while driving an LED, buzzer or display text.
///
/// Never fatal: callers log these and carry on.
#[derive(Debug, thiserror::Error)]
pub enum IndicatorError {
    /// Writing a GPIO line failed.
    #[error("Failed to write GPIO line {path}: {source}")]
    Line {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The indicator device reported a failure.
    #[error("Indicator failed: {0}")]
    Device(String),
}

impl IndicatorError {
    /// Create a new GPIO line error.
    pub fn line(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Line {
            path: path.into(),
            source,
        }
    }
}

/// Errors that can occur during reader and actuator operations.
#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    /// Device is not connected or has been disconnected.
    #[error("Device disconnected: {device}")]
    Disconnected { device: String },

    /// Operation timed out after specified duration.
    #[error("Operation timeout after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Device communication error.
    #[error("Communication error: {message}")]
    CommunicationError { message: String },

    /// Invalid data received from device.
    #[error("Invalid data: {message}")]
    InvalidData { message: String },

    /// Device initialization failed.
    #[error("Initialization failed: {message}")]
    InitializationFailed { message: String },

    /// Card reading error.
    #[error("Card read error: {message}")]
    CardReadError { message: String },

    /// Bus transaction failed.
    #[error(transparent)]
    Bus(#[from] BusError),

    /// Channel selection failed.
    #[error(transparent)]
    Mux(#[from] MuxError),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HardwareError {
    /// Create a new disconnected error.
    pub fn disconnected(device: impl Into<String>) -> Self {
        Self::Disconnected {
            device: device.into(),
        }
    }

    /// Create a new timeout error.
    pub fn timeout(duration_ms: u64) -> Self {
        Self::Timeout { duration_ms }
    }

    /// Create a new communication error.
    pub fn communication(message: impl Into<String>) -> Self {
        Self::CommunicationError {
            message: message.into(),
        }
    }

    /// Create a new invalid data error.
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData {
            message: message.into(),
        }
    }

    /// Create a new initialization failed error.
    pub fn initialization_failed(message: impl Into<String>) -> Self {
        Self::InitializationFailed {
            message: message.into(),
        }
    }

    /// Create a new card read error.
    pub fn card_read(message: impl Into<String>) -> Self {
        Self::CardReadError {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_error() {
        let error = HardwareError::timeout(100);
        assert!(matches!(error, HardwareError::Timeout { .. }));
        assert_eq!(error.to_string(), "Operation timeout after 100ms");
    }

    #[test]
    fn test_initialization_failed_error() {
        let error = HardwareError::initialization_failed("no firmware response");
        assert_eq!(
            error.to_string(),
            "Initialization failed: no firmware response"
        );
    }

    #[test]
    fn test_bus_error_converts_transparently() {
        let error: HardwareError = BusError::nack(0x24).into();
        assert!(matches!(error, HardwareError::Bus(BusError::Nack { address: 0x24 })));
        assert_eq!(error.to_string(), "No acknowledge from device at 0x24");
    }

    #[test]
    fn test_mux_error_transient() {
        assert!(MuxError::BusIo(BusError::Closed).is_transient());
        assert!(!MuxError::InvalidChannel { channel: 9 }.is_transient());
    }

    #[test]
    fn test_indicator_line_error_names_path() {
        let error = IndicatorError::line(
            "/sys/class/gpio/gpio18/value",
            std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        );
        assert!(error.to_string().contains("gpio18"));
    }
}
