use crate::{
    Result,
    constants::{DEFAULT_READER_ADDRESS, MAX_CHANNEL, MAX_I2C_ADDRESS, MAX_UID_LENGTH, MIN_I2C_ADDRESS, MIN_UID_LENGTH},
    error::Error,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Multiplexer branch (0-7)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Channel(u8);

impl Channel {
    /// Create a new channel with validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidChannel` if the channel is outside 0-7.
    pub fn new(channel: u8) -> Result<Self> {
        if channel > MAX_CHANNEL {
            return Err(Error::InvalidChannel { channel });
        }
        Ok(Channel(channel))
    }

    /// Get the raw channel number.
    #[must_use]
    pub fn as_u8(&self) -> u8 {
        self.0
    }

    /// Control byte that routes the multiplexer to this channel.
    #[must_use]
    pub fn mask(&self) -> u8 {
        crate::constants::channel_mask(self.0)
    }
}

impl TryFrom<u8> for Channel {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        Channel::new(value)
    }
}

impl From<Channel> for u8 {
    fn from(channel: Channel) -> Self {
        channel.0
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 7-bit I2C device address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct BusAddress(u8);

impl BusAddress {
    /// Default address of a PN532 reader.
    pub const DEFAULT_READER: Self = Self(DEFAULT_READER_ADDRESS);

    /// Create a new bus address with validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidAddress` for reserved addresses (below 0x08 or above 0x77).
    pub fn new(address: u8) -> Result<Self> {
        if !(MIN_I2C_ADDRESS..=MAX_I2C_ADDRESS).contains(&address) {
            return Err(Error::InvalidAddress { address });
        }
        Ok(BusAddress(address))
    }

    #[must_use]
    pub fn as_u8(&self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for BusAddress {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        BusAddress::new(value)
    }
}

impl From<BusAddress> for u8 {
    fn from(address: BusAddress) -> Self {
        address.0
    }
}

impl fmt::Display for BusAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "0x{:02X}", self.0)
    }
}

/// Which door a reader guards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DoorRole {
    Inside,
    Outside,
}

impl DoorRole {
    /// Walking direction of a person presenting a card at this door.
    ///
    /// The inside reader is mounted at the entrance, so a scan there means the
    /// person is going in.
    #[inline]
    #[must_use]
    pub fn direction(self) -> Direction {
        match self {
            DoorRole::Inside => Direction::Inside,
            DoorRole::Outside => Direction::Outside,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DoorRole::Inside => "inside",
            DoorRole::Outside => "outside",
        }
    }
}

impl fmt::Display for DoorRole {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DoorRole {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inside" => Ok(DoorRole::Inside),
            "outside" => Ok(DoorRole::Outside),
            other => Err(Error::UnknownRole(other.to_string())),
        }
    }
}

/// Direction of passage reported to the access decision service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Inside,
    Outside,
}

impl Direction {
    /// Returns `true` if the person is entering.
    #[inline]
    #[must_use]
    pub fn is_inside(self) -> bool {
        matches!(self, Direction::Inside)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Inside => "inside",
            Direction::Outside => "outside",
        }
    }

    /// Short text for the display.
    #[must_use]
    pub fn display_text(self) -> &'static str {
        match self {
            Direction::Inside => "Welcome in",
            Direction::Outside => "Goodbye",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Direction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inside" => Ok(Direction::Inside),
            "outside" => Ok(Direction::Outside),
            other => Err(Error::UnknownRole(other.to_string())),
        }
    }
}

/// Card unique identifier (1-10 bytes)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CardUid(Vec<u8>);

impl CardUid {
    /// Create a UID from raw bytes.
    ///
    /// # Errors
    /// Returns `Error::InvalidUid` for an empty UID or one longer than 10 bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let bytes = bytes.into();
        let len = bytes.len();
        if !(MIN_UID_LENGTH..=MAX_UID_LENGTH).contains(&len) {
            return Err(Error::InvalidUid(format!(
                "UID must be {MIN_UID_LENGTH}-{MAX_UID_LENGTH} bytes, got {len}"
            )));
        }
        Ok(CardUid(bytes))
    }

    /// Parse a UID from hex text (`"04a2b3c4"`, case-insensitive, `:` separators allowed).
    ///
    /// # Errors
    /// Returns `Error::InvalidUid` for odd-length or non-hex input.
    pub fn from_hex(text: &str) -> Result<Self> {
        let digits: String = text.chars().filter(|c| *c != ':').collect();
        if digits.len() % 2 != 0 {
            return Err(Error::InvalidUid(format!("odd number of hex digits: {text}")));
        }

        let bytes = (0..digits.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&digits[i..i + 2], 16))
            .collect::<std::result::Result<Vec<u8>, _>>()
            .map_err(|_| Error::InvalidUid(format!("not a hex string: {text}")))?;

        CardUid::new(bytes)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Lowercase hex without separators, the format the decision service expects.
    #[must_use]
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Display for CardUid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl std::str::FromStr for CardUid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        CardUid::from_hex(s)
    }
}

impl Serialize for CardUid {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for CardUid {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        CardUid::from_hex(&text).map_err(serde::de::Error::custom)
    }
}

/// One door of the access point: its role and where its reader sits on the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoorConfig {
    pub role: DoorRole,
    pub channel: Channel,
    pub reader_address: BusAddress,
}

impl DoorConfig {
    #[must_use]
    pub fn new(role: DoorRole, channel: Channel, reader_address: BusAddress) -> Self {
        Self {
            role,
            channel,
            reader_address,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0)]
    #[case(1)]
    #[case(7)]
    fn test_channel_valid(#[case] raw: u8) {
        let channel = Channel::new(raw).unwrap();
        assert_eq!(channel.as_u8(), raw);
        assert_eq!(channel.mask(), 1 << raw);
    }

    #[rstest]
    #[case(8)]
    #[case(42)]
    #[case(255)]
    fn test_channel_invalid(#[case] raw: u8) {
        assert!(matches!(
            Channel::new(raw),
            Err(Error::InvalidChannel { channel }) if channel == raw
        ));
    }

    #[test]
    fn test_channel_deserialize_rejects_out_of_range() {
        let ok: Channel = serde_json::from_str("2").unwrap();
        assert_eq!(ok.as_u8(), 2);
        assert!(serde_json::from_str::<Channel>("9").is_err());
    }

    #[rstest]
    #[case(0x24)]
    #[case(0x70)]
    fn test_bus_address_valid(#[case] raw: u8) {
        assert_eq!(BusAddress::new(raw).unwrap().as_u8(), raw);
    }

    #[rstest]
    #[case(0x00)]
    #[case(0x78)]
    fn test_bus_address_reserved(#[case] raw: u8) {
        assert!(BusAddress::new(raw).is_err());
    }

    #[test]
    fn test_door_role_direction() {
        assert_eq!(DoorRole::Inside.direction(), Direction::Inside);
        assert_eq!(DoorRole::Outside.direction(), Direction::Outside);
        assert!(Direction::Inside.is_inside());
        assert!(!Direction::Outside.is_inside());
    }

    #[rstest]
    #[case("inside", DoorRole::Inside)]
    #[case(" Outside ", DoorRole::Outside)]
    fn test_door_role_parse(#[case] input: &str, #[case] expected: DoorRole) {
        assert_eq!(input.parse::<DoorRole>().unwrap(), expected);
    }

    #[test]
    fn test_door_role_parse_unknown() {
        assert!("lobby".parse::<DoorRole>().is_err());
    }

    #[rstest]
    #[case("04a2b3c4", vec![0x04, 0xA2, 0xB3, 0xC4])]
    #[case("04A2", vec![0x04, 0xA2])]
    #[case("04:E6:8F:2A:5C:4D:80", vec![0x04, 0xE6, 0x8F, 0x2A, 0x5C, 0x4D, 0x80])]
    fn test_card_uid_from_hex(#[case] input: &str, #[case] expected: Vec<u8>) {
        let uid = CardUid::from_hex(input).unwrap();
        assert_eq!(uid.as_bytes(), expected.as_slice());
    }

    #[rstest]
    #[case("04a")]
    #[case("zz112233")]
    #[case("")] // empty
    #[case("0102030405060708090a0b")] // too long
    fn test_card_uid_invalid(#[case] input: &str) {
        assert!(CardUid::from_hex(input).is_err());
    }

    #[test]
    fn test_card_uid_hex_is_lowercase() {
        let uid = CardUid::new(vec![0x04, 0xAB, 0xCD, 0xEF]).unwrap();
        assert_eq!(uid.to_hex(), "04abcdef");
        assert_eq!(uid.to_string(), "04abcdef");
    }

    #[test]
    fn test_card_uid_serializes_as_hex_string() {
        let uid = CardUid::new(vec![0x04, 0xA2, 0x00, 0x01]).unwrap();
        let json = serde_json::to_string(&uid).unwrap();
        assert_eq!(json, "\"04a20001\"");
        let back: CardUid = serde_json::from_str(&json).unwrap();
        assert_eq!(back, uid);
    }
}
