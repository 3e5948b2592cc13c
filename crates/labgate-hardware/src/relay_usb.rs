//! USB HID relay boards (the common `USBRelay` family, VID 0x16C0 / PID 0x05DF).
//!
//! Boards are switched with 9-byte feature reports. All relays on the first
//! board found are driven together.

use crate::error::{HardwareError, Result};
use crate::traits::Actuator;
use hidapi::HidApi;
use std::time::Duration;
use tracing::{debug, warn};

const VENDOR_ID: u16 = 0x16C0;
const PRODUCT_ID: u16 = 0x05DF;

const CMD_ALL_ON: u8 = 0xFE;
const CMD_ALL_OFF: u8 = 0xFC;

/// HID relay board actuator.
#[derive(Debug, Clone, Copy)]
pub struct UsbHidRelay {
    vendor_id: u16,
    product_id: u16,
}

impl Default for UsbHidRelay {
    fn default() -> Self {
        Self {
            vendor_id: VENDOR_ID,
            product_id: PRODUCT_ID,
        }
    }
}

impl UsbHidRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check that a board is attached.
    ///
    /// # Errors
    ///
    /// Returns `HardwareError::Disconnected` if no board matches.
    pub fn probe(&self) -> Result<()> {
        let api = HidApi::new().map_err(|e| HardwareError::communication(e.to_string()))?;
        let found = api
            .device_list()
            .any(|d| d.vendor_id() == self.vendor_id && d.product_id() == self.product_id);
        if found {
            Ok(())
        } else {
            Err(HardwareError::disconnected("USB relay board"))
        }
    }

    async fn switch(&self, command: u8) -> Result<()> {
        let (vendor_id, product_id) = (self.vendor_id, self.product_id);
        tokio::task::spawn_blocking(move || {
            let api = HidApi::new().map_err(|e| HardwareError::communication(e.to_string()))?;
            let device = api
                .open(vendor_id, product_id)
                .map_err(|e| HardwareError::disconnected(format!("USB relay board: {e}")))?;
            let report = [0x00, command, 0, 0, 0, 0, 0, 0, 0];
            device
                .send_feature_report(&report)
                .map_err(|e| HardwareError::communication(e.to_string()))
        })
        .await
        .map_err(|e| HardwareError::communication(format!("relay task failed: {e}")))?
    }
}

impl Actuator for UsbHidRelay {
    async fn trigger(&mut self, duration: Duration) -> Result<()> {
        self.switch(CMD_ALL_ON).await?;
        debug!(duration_ms = duration.as_millis() as u64, "USB relays energized");

        tokio::time::sleep(duration).await;

        if let Err(e) = self.switch(CMD_ALL_OFF).await {
            warn!(error = %e, "Failed to release USB relays");
            return Err(e);
        }
        debug!("USB relays released");
        Ok(())
    }
}
