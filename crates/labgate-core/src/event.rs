use crate::types::{CardUid, Direction, DoorRole};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Record of one accepted card detection.
///
/// Created when the debouncer accepts a UID, completed once the decision and
/// actuation steps have run, then handed to the event sink and dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanEvent {
    pub id: Uuid,
    pub uid: CardUid,
    pub role: DoorRole,
    pub direction: Direction,
    pub timestamp: DateTime<Utc>,
    pub processed: bool,
    /// The decision service returned a verdict (granted or denied).
    pub success: bool,
    pub door_opened: bool,
}

impl ScanEvent {
    /// New unprocessed event stamped with the current wall-clock time.
    #[must_use]
    pub fn new(uid: CardUid, role: DoorRole) -> Self {
        Self::at(uid, role, Utc::now())
    }

    #[must_use]
    pub fn at(uid: CardUid, role: DoorRole, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            uid,
            role,
            direction: role.direction(),
            timestamp,
            processed: false,
            success: false,
            door_opened: false,
        }
    }

    /// Mark the event processed with its outcome.
    pub fn complete(&mut self, success: bool, door_opened: bool) {
        self.processed = true;
        self.success = success;
        self.door_opened = door_opened;
    }
}
