//! Mock and simulated devices for testing and development.
//!
//! Every mock comes as a `(device, handle)` pair: the device is handed to the
//! code under test, the handle stays with the test (or the simulation driver)
//! to script behavior and inspect what happened.

pub mod bus;
pub mod indicator;
pub mod reader;
pub mod relay;

pub use bus::{MockBus, MockBusHandle, Transaction, TransactionKind};
pub use indicator::{IndicatorCall, SimulatedIndicator, SimulatedIndicatorHandle};
pub use reader::{MOCK_CMD_FIRMWARE, MOCK_CMD_POLL, MockNfcReader, MockNfcReaderHandle};
pub use relay::{SimulatedRelay, SimulatedRelayHandle};
