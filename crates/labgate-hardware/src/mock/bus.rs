//! In-memory I2C bus with a multiplexer model.
//!
//! The mock follows writes to the multiplexer address to know which branch is
//! routed, and tags every other transaction with that branch. Tests use the
//! log to prove that a reader only ever talks while its own branch is routed.

use crate::bus::I2cBus;
use crate::error::BusError;
use labgate_core::Channel;
use labgate_core::constants::DEFAULT_MUX_ADDRESS;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

/// Transactions kept in the log; older ones are dropped.
const MAX_LOG_SIZE: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionKind {
    Write,
    Read,
}

/// One successful transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub kind: TransactionKind,
    pub address: u8,
    /// Bytes written, or bytes returned by a read.
    pub data: Vec<u8>,
    /// Branch routed by the multiplexer when the transfer happened.
    pub routed: Option<Channel>,
}

#[derive(Debug)]
struct BusState {
    mux_address: u8,
    control: u8,
    log: VecDeque<Transaction>,
    fail_writes: u32,
    fail_reads: u32,
    nack: HashSet<u8>,
    responses: HashMap<u8, VecDeque<Vec<u8>>>,
    closed: bool,
}

impl BusState {
    fn routed(&self) -> Option<Channel> {
        if self.control.count_ones() == 1 {
            Channel::new(self.control.trailing_zeros() as u8).ok()
        } else {
            None
        }
    }

    fn record(&mut self, kind: TransactionKind, address: u8, data: Vec<u8>) {
        if self.log.len() == MAX_LOG_SIZE {
            self.log.pop_front();
        }
        let routed = self.routed();
        self.log.push_back(Transaction {
            kind,
            address,
            data,
            routed,
        });
    }

    fn check(&self, address: u8) -> Result<(), BusError> {
        if self.closed {
            return Err(BusError::Closed);
        }
        if self.nack.contains(&address) {
            return Err(BusError::nack(address));
        }
        Ok(())
    }
}

/// Mock I2C bus.
///
/// # Examples
///
/// ```
/// use labgate_hardware::bus::I2cBus;
/// use labgate_hardware::mock::MockBus;
///
/// let (mut bus, handle) = MockBus::new();
/// bus.write(0x70, &[0x02]).unwrap(); // route channel 1
/// bus.write(0x24, &[0xAA]).unwrap();
///
/// let tx = handle.transactions();
/// assert_eq!(tx[1].routed.map(|c| c.as_u8()), Some(1));
/// ```
#[derive(Debug)]
pub struct MockBus {
    state: Arc<Mutex<BusState>>,
}

impl MockBus {
    /// Create a mock bus whose multiplexer sits at the default address.
    pub fn new() -> (Self, MockBusHandle) {
        Self::with_mux_address(DEFAULT_MUX_ADDRESS)
    }

    pub fn with_mux_address(mux_address: u8) -> (Self, MockBusHandle) {
        let state = Arc::new(Mutex::new(BusState {
            mux_address,
            control: 0,
            log: VecDeque::new(),
            fail_writes: 0,
            fail_reads: 0,
            nack: HashSet::new(),
            responses: HashMap::new(),
            closed: false,
        }));

        (
            Self {
                state: Arc::clone(&state),
            },
            MockBusHandle { state },
        )
    }
}

impl I2cBus for MockBus {
    fn write(&mut self, address: u8, data: &[u8]) -> Result<(), BusError> {
        let mut state = self.state.lock();
        state.check(address)?;
        if state.fail_writes > 0 {
            state.fail_writes -= 1;
            return Err(BusError::Io(std::io::Error::other("injected write failure")));
        }

        if address == state.mux_address
            && let [control] = data
        {
            state.control = *control;
        }
        state.record(TransactionKind::Write, address, data.to_vec());
        Ok(())
    }

    fn read(&mut self, address: u8, buffer: &mut [u8]) -> Result<(), BusError> {
        let mut state = self.state.lock();
        state.check(address)?;
        if state.fail_reads > 0 {
            state.fail_reads -= 1;
            return Err(BusError::Io(std::io::Error::other("injected read failure")));
        }

        buffer.fill(0);
        let queued = state
            .responses
            .get_mut(&address)
            .and_then(VecDeque::pop_front);
        match queued {
            Some(bytes) => {
                let n = bytes.len().min(buffer.len());
                buffer[..n].copy_from_slice(&bytes[..n]);
            }
            None if address == state.mux_address => {
                if let Some(first) = buffer.first_mut() {
                    *first = state.control;
                }
            }
            None => {}
        }

        state.record(TransactionKind::Read, address, buffer.to_vec());
        Ok(())
    }
}

/// Handle for scripting and inspecting a [`MockBus`].
#[derive(Debug, Clone)]
pub struct MockBusHandle {
    state: Arc<Mutex<BusState>>,
}

impl MockBusHandle {
    /// All logged transactions, oldest first.
    pub fn transactions(&self) -> Vec<Transaction> {
        self.state.lock().log.iter().cloned().collect()
    }

    /// Control bytes successfully written to the multiplexer.
    pub fn mux_writes(&self) -> Vec<u8> {
        let state = self.state.lock();
        state
            .log
            .iter()
            .filter(|t| t.kind == TransactionKind::Write && t.address == state.mux_address)
            .filter_map(|t| t.data.first().copied())
            .collect()
    }

    /// Payloads written to `address`.
    pub fn writes_to(&self, address: u8) -> Vec<Vec<u8>> {
        self.state
            .lock()
            .log
            .iter()
            .filter(|t| t.kind == TransactionKind::Write && t.address == address)
            .map(|t| t.data.clone())
            .collect()
    }

    /// Number of successful reads from `address`.
    pub fn reads_from(&self, address: u8) -> usize {
        self.state
            .lock()
            .log
            .iter()
            .filter(|t| t.kind == TransactionKind::Read && t.address == address)
            .count()
    }

    /// Branch currently routed by the modeled multiplexer.
    pub fn routed(&self) -> Option<Channel> {
        self.state.lock().routed()
    }

    /// Make the next `count` writes fail with an I/O error.
    pub fn fail_next_writes(&self, count: u32) {
        self.state.lock().fail_writes = count;
    }

    /// Make the next `count` reads fail with an I/O error.
    pub fn fail_next_reads(&self, count: u32) {
        self.state.lock().fail_reads = count;
    }

    /// Make every transfer to `address` fail with a NACK until cleared.
    pub fn set_nack(&self, address: u8, nack: bool) {
        let mut state = self.state.lock();
        if nack {
            state.nack.insert(address);
        } else {
            state.nack.remove(&address);
        }
    }

    /// Queue bytes returned by the next read from `address`.
    pub fn queue_read(&self, address: u8, bytes: Vec<u8>) {
        self.state
            .lock()
            .responses
            .entry(address)
            .or_default()
            .push_back(bytes);
    }

    /// Fail every further transfer with `BusError::Closed`.
    pub fn close(&self) {
        self.state.lock().closed = true;
    }

    pub fn clear_log(&self) {
        self.state.lock().log.clear();
    }
}
