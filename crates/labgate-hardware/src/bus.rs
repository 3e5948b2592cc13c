//! Raw access to the shared I2C bus.
//!
//! The bus is synchronous: every transaction is a short, bounded transfer on
//! the wire, and the async world only ever reaches it through
//! [`ChannelMux`](crate::mux::ChannelMux), which serializes callers.
//!
//! With the `hardware-i2c` feature, [`LinuxI2cBus`] talks to a Linux i2c-dev
//! character device (`/dev/i2c-N`). Tests and simulation use
//! [`MockBus`](crate::mock::MockBus).

use crate::error::BusError;

/// Byte-level transactions against 7-bit device addresses.
///
/// Object-safe so that the multiplexer can own a `Box<dyn I2cBus>` chosen at
/// startup.
pub trait I2cBus: Send {
    /// Write `data` to the device at `address`.
    fn write(&mut self, address: u8, data: &[u8]) -> Result<(), BusError>;

    /// Fill `buffer` with bytes read from the device at `address`.
    fn read(&mut self, address: u8, buffer: &mut [u8]) -> Result<(), BusError>;

    /// Read a single byte. Used to check that a device answers.
    fn read_byte(&mut self, address: u8) -> Result<u8, BusError> {
        let mut buffer = [0u8; 1];
        self.read(address, &mut buffer)?;
        Ok(buffer[0])
    }
}

impl std::fmt::Debug for dyn I2cBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn I2cBus")
    }
}

#[cfg(all(feature = "hardware-i2c", target_os = "linux"))]
pub use linux::LinuxI2cBus;

#[cfg(all(feature = "hardware-i2c", target_os = "linux"))]
mod linux {
    use super::I2cBus;
    use crate::error::BusError;
    use std::fs::{File, OpenOptions};
    use std::io::{Read, Write};
    use std::os::fd::AsRawFd;
    use std::path::{Path, PathBuf};
    use tracing::debug;

    /// `ioctl` request that sets the target address for subsequent transfers.
    const I2C_SLAVE: libc::c_ulong = 0x0703;

    /// I2C bus backed by the Linux i2c-dev driver.
    #[derive(Debug)]
    pub struct LinuxI2cBus {
        file: File,
        path: PathBuf,
        target: Option<u8>,
    }

    impl LinuxI2cBus {
        /// Open an i2c-dev character device such as `/dev/i2c-1`.
        ///
        /// # Errors
        ///
        /// Returns `BusError::Io` if the device node cannot be opened.
        pub fn open(path: impl AsRef<Path>) -> Result<Self, BusError> {
            let path = path.as_ref().to_path_buf();
            let file = OpenOptions::new().read(true).write(true).open(&path)?;
            debug!(path = %path.display(), "Opened I2C bus");
            Ok(Self {
                file,
                path,
                target: None,
            })
        }

        pub fn path(&self) -> &Path {
            &self.path
        }

        fn set_target(&mut self, address: u8) -> Result<(), BusError> {
            if self.target == Some(address) {
                return Ok(());
            }

            // SAFETY: the descriptor is owned by `self.file` and stays open for
            // the duration of the call; I2C_SLAVE takes the address by value.
            let rc = unsafe {
                libc::ioctl(
                    self.file.as_raw_fd(),
                    I2C_SLAVE as _,
                    libc::c_ulong::from(address),
                )
            };
            if rc < 0 {
                self.target = None;
                return Err(map_io_error(std::io::Error::last_os_error(), address));
            }

            self.target = Some(address);
            Ok(())
        }
    }

    impl I2cBus for LinuxI2cBus {
        fn write(&mut self, address: u8, data: &[u8]) -> Result<(), BusError> {
            self.set_target(address)?;
            self.file
                .write_all(data)
                .map_err(|e| map_io_error(e, address))
        }

        fn read(&mut self, address: u8, buffer: &mut [u8]) -> Result<(), BusError> {
            self.set_target(address)?;
            self.file
                .read_exact(buffer)
                .map_err(|e| map_io_error(e, address))
        }
    }

    /// The i2c-dev driver reports a missing ACK as `EREMOTEIO` or `ENXIO`.
    fn map_io_error(error: std::io::Error, address: u8) -> BusError {
        match error.raw_os_error() {
            Some(code) if code == libc::EREMOTEIO || code == libc::ENXIO => BusError::nack(address),
            _ => BusError::Io(error),
        }
    }
}
