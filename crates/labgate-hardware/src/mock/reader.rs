//! Scriptable NFC reader.
//!
//! The mock is wired to one multiplexer branch, like a physical reader. Each
//! operation writes a tagged frame (`[command, wired channel]`) to the bus so
//! the [`MockBus`](super::MockBus) log shows which reader issued it and which
//! branch was routed at that moment.

use crate::bus::I2cBus;
use crate::error::{HardwareError, Result};
use crate::traits::NfcReader;
use crate::types::FirmwareInfo;
use labgate_core::{BusAddress, CardUid, Channel};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Tag of the frame written by [`MockNfcReader::initialize`].
pub const MOCK_CMD_FIRMWARE: u8 = 0xF1;

/// Tag of the frame written by [`MockNfcReader::poll`].
pub const MOCK_CMD_POLL: u8 = 0xF2;

#[derive(Debug, Default)]
struct ReaderState {
    card: Option<CardUid>,
    initialized: bool,
    fail_inits: u32,
    fail_polls: u32,
    failing: bool,
    poll_delay: Duration,
    init_count: u32,
    poll_count: u32,
    release_count: u32,
}

/// Mock NFC reader for testing and simulation.
///
/// # Examples
///
/// ```
/// use labgate_core::{CardUid, Channel};
/// use labgate_hardware::mock::{MockBus, MockNfcReader};
/// use labgate_hardware::traits::NfcReader;
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> labgate_hardware::Result<()> {
///     let (mut bus, _bus_handle) = MockBus::new();
///     let (mut reader, handle) = MockNfcReader::new(Channel::new(0).unwrap());
///
///     reader.initialize(&mut bus).await?;
///     handle.present(CardUid::from_hex("04a2b3c4").unwrap());
///
///     let uid = reader.poll(&mut bus, Duration::from_millis(100)).await?;
///     assert_eq!(uid.unwrap().to_hex(), "04a2b3c4");
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockNfcReader {
    address: BusAddress,
    wired: Channel,
    state: Arc<Mutex<ReaderState>>,
}

impl MockNfcReader {
    /// Create a reader wired to `channel` at the default reader address.
    pub fn new(channel: Channel) -> (Self, MockNfcReaderHandle) {
        Self::with_address(channel, BusAddress::DEFAULT_READER)
    }

    pub fn with_address(channel: Channel, address: BusAddress) -> (Self, MockNfcReaderHandle) {
        let state = Arc::new(Mutex::new(ReaderState::default()));
        (
            Self {
                address,
                wired: channel,
                state: Arc::clone(&state),
            },
            MockNfcReaderHandle { state },
        )
    }

    pub fn wired_channel(&self) -> Channel {
        self.wired
    }
}

impl NfcReader for MockNfcReader {
    fn address(&self) -> BusAddress {
        self.address
    }

    async fn initialize(&mut self, bus: &mut dyn I2cBus) -> Result<FirmwareInfo> {
        bus.write(self.address.as_u8(), &[MOCK_CMD_FIRMWARE, self.wired.as_u8()])?;

        let mut state = self.state.lock();
        state.init_count += 1;
        state.initialized = false;
        if state.fail_inits > 0 {
            state.fail_inits -= 1;
            return Err(HardwareError::initialization_failed("mock firmware read failed"));
        }
        state.initialized = true;
        Ok(FirmwareInfo::new("Mock NFC Reader", 0x32, 1, 6))
    }

    async fn poll(&mut self, bus: &mut dyn I2cBus, _timeout: Duration) -> Result<Option<CardUid>> {
        bus.write(self.address.as_u8(), &[MOCK_CMD_POLL, self.wired.as_u8()])?;

        let delay = {
            let mut state = self.state.lock();
            state.poll_count += 1;
            state.poll_delay
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock();
        if !state.initialized {
            return Err(HardwareError::disconnected("mock reader not initialized"));
        }
        if state.failing {
            return Err(HardwareError::card_read("mock reader failing"));
        }
        if state.fail_polls > 0 {
            state.fail_polls -= 1;
            return Err(HardwareError::card_read("mock poll failed"));
        }
        Ok(state.card.clone())
    }

    async fn release(&mut self) -> Result<()> {
        let mut state = self.state.lock();
        state.release_count += 1;
        state.initialized = false;
        Ok(())
    }
}

/// Handle for scripting a [`MockNfcReader`].
#[derive(Debug, Clone)]
pub struct MockNfcReaderHandle {
    state: Arc<Mutex<ReaderState>>,
}

impl MockNfcReaderHandle {
    /// Put a card in the field. Every poll reports it until [`remove`](Self::remove).
    pub fn present(&self, uid: CardUid) {
        self.state.lock().card = Some(uid);
    }

    pub fn remove(&self) {
        self.state.lock().card = None;
    }

    pub fn card(&self) -> Option<CardUid> {
        self.state.lock().card.clone()
    }

    /// Fail the next `count` initializations.
    pub fn fail_next_inits(&self, count: u32) {
        self.state.lock().fail_inits = count;
    }

    /// Fail the next `count` polls.
    pub fn fail_next_polls(&self, count: u32) {
        self.state.lock().fail_polls = count;
    }

    /// Fail every poll until switched off again.
    pub fn set_failing(&self, failing: bool) {
        self.state.lock().failing = failing;
    }

    /// Make every poll take `delay` before answering.
    pub fn set_poll_delay(&self, delay: Duration) {
        self.state.lock().poll_delay = delay;
    }

    pub fn is_initialized(&self) -> bool {
        self.state.lock().initialized
    }

    pub fn init_count(&self) -> u32 {
        self.state.lock().init_count
    }

    pub fn poll_count(&self) -> u32 {
        self.state.lock().poll_count
    }

    pub fn release_count(&self) -> u32 {
        self.state.lock().release_count
    }
}
