use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Bus addressing errors
    #[error("Invalid channel {channel}: must be 0-7")]
    InvalidChannel { channel: u8 },

    #[error("Invalid I2C address 0x{address:02X}: must be 0x08-0x77")]
    InvalidAddress { address: u8 },

    // Card errors
    #[error("Invalid card UID: {0}")]
    InvalidUid(String),

    #[error("Unknown door role: {0}")]
    UnknownRole(String),

    // Policy errors
    #[error("Invalid retry policy: {0}")]
    InvalidPolicy(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing configuration key: {0}")]
    MissingConfig(String),
}

pub type Result<T> = std::result::Result<T, Error>;
