//! PN532 NFC controller over I2C.
//!
//! Implements the minimal frame exchange needed for a liveness read
//! (`GetFirmwareVersion`), SAM configuration and passive target polling
//! (`InListPassiveTarget`, ISO 14443A at 106 kbps).
//!
//! Frame layout (host to PN532):
//!
//! ```text
//! 00 00 FF LEN LCS D4 CMD DATA.. DCS 00
//! ```
//!
//! Every I2C read from the PN532 starts with a status byte; `0x01` means a
//! frame is ready.

use crate::bus::I2cBus;
use crate::error::{HardwareError, Result};
use crate::traits::NfcReader;
use crate::types::FirmwareInfo;
use labgate_core::{BusAddress, CardUid};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

const HOST_TO_PN532: u8 = 0xD4;
const PN532_TO_HOST: u8 = 0xD5;

const CMD_GET_FIRMWARE_VERSION: u8 = 0x02;
const CMD_SAM_CONFIGURATION: u8 = 0x14;
const CMD_IN_LIST_PASSIVE_TARGET: u8 = 0x4A;

/// ISO 14443A, 106 kbps.
const BAUD_106_TYPE_A: u8 = 0x00;

const ACK_FRAME: [u8; 6] = [0x00, 0x00, 0xFF, 0x00, 0xFF, 0x00];
const STATUS_READY: u8 = 0x01;

/// IC byte reported by a genuine PN532.
const PN532_IC: u8 = 0x32;

const READY_POLL_INTERVAL: Duration = Duration::from_millis(5);
const ACK_TIMEOUT: Duration = Duration::from_millis(50);
const RESPONSE_TIMEOUT: Duration = Duration::from_millis(500);
const RESPONSE_BUFFER_LEN: usize = 32;

/// PN532 reader on one multiplexer branch.
#[derive(Debug)]
pub struct Pn532 {
    address: BusAddress,
    firmware: Option<FirmwareInfo>,
}

impl Pn532 {
    pub fn new(address: BusAddress) -> Self {
        Self {
            address,
            firmware: None,
        }
    }

    /// Firmware read during the last successful initialization.
    pub fn firmware(&self) -> Option<&FirmwareInfo> {
        self.firmware.as_ref()
    }

    fn addr(&self) -> u8 {
        self.address.as_u8()
    }

    fn write_command(&self, bus: &mut dyn I2cBus, command: u8, params: &[u8]) -> Result<()> {
        let frame = build_frame(command, params);
        trace!(command = format_args!("0x{command:02X}"), frame = ?frame, "PN532 command");
        bus.write(self.addr(), &frame)?;
        Ok(())
    }

    /// Poll the status byte until the PN532 reports ready or `timeout` passes.
    async fn wait_ready(&self, bus: &mut dyn I2cBus, timeout: Duration) -> Result<bool> {
        let deadline = Instant::now() + timeout;
        loop {
            if bus.read_byte(self.addr())? == STATUS_READY {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(READY_POLL_INTERVAL).await;
        }
    }

    async fn read_ack(&self, bus: &mut dyn I2cBus) -> Result<()> {
        if !self.wait_ready(bus, ACK_TIMEOUT).await? {
            return Err(HardwareError::timeout(ACK_TIMEOUT.as_millis() as u64));
        }

        let mut buffer = [0u8; 1 + ACK_FRAME.len()];
        bus.read(self.addr(), &mut buffer)?;
        if buffer[1..] != ACK_FRAME {
            return Err(HardwareError::invalid_data(format!(
                "expected ACK frame, got {:02X?}",
                &buffer[1..]
            )));
        }
        Ok(())
    }

    async fn read_response(
        &self,
        bus: &mut dyn I2cBus,
        command: u8,
        timeout: Duration,
    ) -> Result<Option<Vec<u8>>> {
        if !self.wait_ready(bus, timeout).await? {
            return Ok(None);
        }

        let mut buffer = [0u8; 1 + RESPONSE_BUFFER_LEN];
        bus.read(self.addr(), &mut buffer)?;
        parse_response(&buffer[1..], command).map(Some)
    }

    async fn exchange(
        &self,
        bus: &mut dyn I2cBus,
        command: u8,
        params: &[u8],
        timeout: Duration,
    ) -> Result<Option<Vec<u8>>> {
        self.write_command(bus, command, params)?;
        self.read_ack(bus).await?;
        self.read_response(bus, command, timeout).await
    }
}

impl NfcReader for Pn532 {
    fn address(&self) -> BusAddress {
        self.address
    }

    async fn initialize(&mut self, bus: &mut dyn I2cBus) -> Result<FirmwareInfo> {
        self.firmware = None;

        let data = self
            .exchange(bus, CMD_GET_FIRMWARE_VERSION, &[], RESPONSE_TIMEOUT)
            .await?
            .ok_or_else(|| HardwareError::initialization_failed("no firmware response"))?;

        let [ic, version, revision, support] = data[..] else {
            return Err(HardwareError::initialization_failed(format!(
                "firmware response has {} bytes, expected 4",
                data.len()
            )));
        };
        if ic != PN532_IC {
            warn!(ic = format_args!("0x{ic:02X}"), "Unexpected IC in firmware response");
        }

        // Normal mode, 1 s virtual card timeout, IRQ enabled.
        self.exchange(bus, CMD_SAM_CONFIGURATION, &[0x01, 0x14, 0x01], RESPONSE_TIMEOUT)
            .await?
            .ok_or_else(|| HardwareError::initialization_failed("no SAM configuration response"))?;

        let info = FirmwareInfo::new("PN532", ic, version, revision).with_support(support);
        debug!(address = %self.address, firmware = %info, "PN532 initialized");
        self.firmware = Some(info.clone());
        Ok(info)
    }

    async fn poll(&mut self, bus: &mut dyn I2cBus, timeout: Duration) -> Result<Option<CardUid>> {
        if self.firmware.is_none() {
            return Err(HardwareError::disconnected(format!(
                "PN532 at {} not initialized",
                self.address
            )));
        }

        let response = self
            .exchange(bus, CMD_IN_LIST_PASSIVE_TARGET, &[0x01, BAUD_106_TYPE_A], timeout)
            .await?;

        let Some(data) = response else {
            // Abort the pending command so the next poll starts clean.
            bus.write(self.addr(), &ACK_FRAME)?;
            return Ok(None);
        };

        parse_target(&data)
    }

    async fn release(&mut self) -> Result<()> {
        self.firmware = None;
        Ok(())
    }
}

/// Build a normal information frame for `command`.
fn build_frame(command: u8, params: &[u8]) -> Vec<u8> {
    let len = (params.len() + 2) as u8;
    let sum = params
        .iter()
        .fold(HOST_TO_PN532.wrapping_add(command), |acc, b| acc.wrapping_add(*b));

    let mut frame = Vec::with_capacity(params.len() + 9);
    frame.extend_from_slice(&[0x00, 0x00, 0xFF, len, 0u8.wrapping_sub(len), HOST_TO_PN532, command]);
    frame.extend_from_slice(params);
    frame.push(0u8.wrapping_sub(sum));
    frame.push(0x00);
    frame
}

/// Extract the payload of a response to `command` (status byte already stripped).
fn parse_response(frame: &[u8], command: u8) -> Result<Vec<u8>> {
    let start = frame
        .windows(2)
        .position(|w| w == [0x00, 0xFF])
        .ok_or_else(|| HardwareError::invalid_data("response has no start code"))?;

    let header = &frame[start + 2..];
    let [len, lcs, ..] = *header else {
        return Err(HardwareError::invalid_data("response truncated before length"));
    };
    if len.wrapping_add(lcs) != 0 {
        return Err(HardwareError::invalid_data("response length checksum mismatch"));
    }

    let len = usize::from(len);
    let body = header
        .get(2..2 + len + 1)
        .ok_or_else(|| HardwareError::invalid_data("response truncated"))?;
    let (payload, dcs) = body.split_at(len);

    let sum = payload.iter().fold(dcs[0], |acc, b| acc.wrapping_add(*b));
    if sum != 0 {
        return Err(HardwareError::invalid_data("response data checksum mismatch"));
    }

    match payload {
        [PN532_TO_HOST, code, data @ ..] if *code == command.wrapping_add(1) => Ok(data.to_vec()),
        _ => Err(HardwareError::invalid_data(format!(
            "unexpected response header {:02X?} for command 0x{command:02X}",
            &payload[..payload.len().min(2)]
        ))),
    }
}

/// Decode an `InListPassiveTarget` payload into the first target's UID.
fn parse_target(data: &[u8]) -> Result<Option<CardUid>> {
    match data {
        [0, ..] | [] => Ok(None),
        // NbTg, Tg, SENS_RES (2), SEL_RES, NFCIDLength, NFCID..
        [_, _, _, _, _, uid_len, rest @ ..] => {
            let uid = rest
                .get(..usize::from(*uid_len))
                .ok_or_else(|| HardwareError::card_read("target UID truncated"))?;
            CardUid::new(uid.to_vec())
                .map(Some)
                .map_err(|e| HardwareError::card_read(e.to_string()))
        }
        _ => Err(HardwareError::card_read(format!(
            "target data too short: {data:02X?}"
        ))),
    }
}
