//! ZigBee addressing.

use std::fmt;
use std::str::FromStr;

/// A 64-bit IEEE extended address of a radio.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address64(u64);

impl Address64 {
    /// The coordinator of the PAN.
    pub const COORDINATOR: Self = Self(0x0000_0000_0000_0000);

    /// Broadcast to every node on the PAN.
    pub const BROADCAST: Self = Self(0x0000_0000_0000_FFFF);

    /// Creates an address from its numeric value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the numeric value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Returns the address in wire (big-endian) order.
    #[must_use]
    pub const fn to_bytes(self) -> [u8; 8] {
        self.0.to_be_bytes()
    }

    /// Reads an address from wire (big-endian) order.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 8]) -> Self {
        Self(u64::from_be_bytes(bytes))
    }

    /// Returns true for the broadcast address.
    #[must_use]
    pub const fn is_broadcast(self) -> bool {
        self.0 == Self::BROADCAST.0
    }
}

impl From<u64> for Address64 {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Debug for Address64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address64({self})")
    }
}

impl fmt::Display for Address64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016X}", self.0)
    }
}

impl FromStr for Address64 {
    type Err = std::num::ParseIntError;

    /// Parses a hex address, with or without `0x` prefix and `:` separators.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim_start_matches("0x").trim_start_matches("0X");
        let digits: String = trimmed.chars().filter(|c| *c != ':').collect();
        u64::from_str_radix(&digits, 16).map(Self)
    }
}

/// A 16-bit network address assigned when a node joins.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address16(u16);

impl Address16 {
    /// The coordinator's network address.
    pub const COORDINATOR: Self = Self(0x0000);

    /// Network address not known; the radio performs discovery.
    pub const UNKNOWN: Self = Self(0xFFFE);

    /// Creates a network address from its numeric value.
    #[must_use]
    pub const fn new(value: u16) -> Self {
        Self(value)
    }

    /// Returns the numeric value.
    #[must_use]
    pub const fn value(self) -> u16 {
        self.0
    }

    /// Returns the address in wire (big-endian) order.
    #[must_use]
    pub const fn to_bytes(self) -> [u8; 2] {
        self.0.to_be_bytes()
    }

    /// Reads an address from wire (big-endian) order.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 2]) -> Self {
        Self(u16::from_be_bytes(bytes))
    }
}

impl From<u16> for Address16 {
    fn from(value: u16) -> Self {
        Self(value)
    }
}

impl fmt::Debug for Address16 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address16({self})")
    }
}

impl fmt::Display for Address16 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04X}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address64_wire_order() {
        let addr = Address64::new(0x0013_A200_4052_8A1B);
        assert_eq!(
            addr.to_bytes(),
            [0x00, 0x13, 0xA2, 0x00, 0x40, 0x52, 0x8A, 0x1B]
        );
        assert_eq!(Address64::from_bytes(addr.to_bytes()), addr);
    }

    #[test]
    fn test_address64_display_and_parse() {
        let addr = Address64::new(0x0013_A200_4052_8A1B);
        assert_eq!(addr.to_string(), "0013A20040528A1B");
        assert_eq!("0x0013A20040528A1B".parse::<Address64>().unwrap(), addr);
        assert_eq!("00:13:A2:00:40:52:8A:1B".parse::<Address64>().unwrap(), addr);
        assert!("not-hex".parse::<Address64>().is_err());
    }

    #[test]
    fn test_address16_wire_order() {
        assert_eq!(Address16::UNKNOWN.to_bytes(), [0xFF, 0xFE]);
        assert_eq!(Address16::from_bytes([0x12, 0x34]).value(), 0x1234);
        assert_eq!(Address16::new(0x1234).to_string(), "1234");
    }

    #[test]
    fn test_broadcast() {
        assert!(Address64::BROADCAST.is_broadcast());
        assert!(!Address64::COORDINATOR.is_broadcast());
    }
}
