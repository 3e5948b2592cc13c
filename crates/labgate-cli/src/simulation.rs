//! Card taps for simulated mode.
//!
//! Without hardware nobody puts cards on the readers, so a generator does it:
//! every `interval` the next door in turn gets the next card from a fixed
//! list, held in the field for `hold`, then removed.

use labgate_core::{CardUid, DoorRole};
use labgate_hardware::mock::MockNfcReaderHandle;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

const SIMULATED_CARDS: [[u8; 7]; 3] = [
    [0x04, 0xE6, 0x8F, 0x2A, 0x5C, 0x4D, 0x80],
    [0x04, 0xE8, 0x12, 0xDC, 0x1A, 0x8F, 0x02],
    [0x04, 0xEE, 0xA5, 0x37, 0xCB, 0x12, 0x45],
];

/// Presents cards to mock readers on a fixed schedule.
#[derive(Debug)]
pub struct CardGenerator {
    readers: Vec<(DoorRole, MockNfcReaderHandle)>,
    cards: Vec<CardUid>,
    interval: Duration,
    hold: Duration,
}

impl CardGenerator {
    pub fn new(readers: Vec<(DoorRole, MockNfcReaderHandle)>) -> Self {
        let cards = SIMULATED_CARDS
            .iter()
            .filter_map(|bytes| CardUid::new(bytes.to_vec()).ok())
            .collect();
        Self {
            readers,
            cards,
            interval: Duration::from_secs(10),
            hold: Duration::from_secs(1),
        }
    }

    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    #[must_use]
    pub fn with_hold(mut self, hold: Duration) -> Self {
        self.hold = hold;
        self
    }

    /// Tap cards until `cancel` fires. Returns the number of taps.
    pub async fn run(self, cancel: CancellationToken) -> u64 {
        if self.readers.is_empty() || self.cards.is_empty() {
            return 0;
        }

        let mut taps = 0u64;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }

            let (role, reader) = &self.readers[(taps as usize) % self.readers.len()];
            let card = &self.cards[(taps as usize) % self.cards.len()];
            info!(role = %role, uid = %card, "Simulated card tap");
            reader.present(card.clone());
            taps += 1;

            tokio::select! {
                _ = cancel.cancelled() => {
                    reader.remove();
                    break;
                }
                _ = tokio::time::sleep(self.hold) => reader.remove(),
            }
        }
        taps
    }
}
