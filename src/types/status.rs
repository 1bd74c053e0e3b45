//! Status codes reported by the radio.

use std::fmt;

/// Status of an AT command response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandStatus {
    /// Command executed.
    Ok,
    /// Generic failure.
    Error,
    /// Unknown command code.
    InvalidCommand,
    /// Parameter rejected.
    InvalidParameter,
    /// Remote command could not be delivered.
    TransmissionFailure,
    /// Status code not known to this library.
    Other(u8),
}

impl CommandStatus {
    /// Converts a raw status byte.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Self {
        match byte {
            0x00 => Self::Ok,
            0x01 => Self::Error,
            0x02 => Self::InvalidCommand,
            0x03 => Self::InvalidParameter,
            0x04 => Self::TransmissionFailure,
            other => Self::Other(other),
        }
    }

    /// Returns the raw status byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        match self {
            Self::Ok => 0x00,
            Self::Error => 0x01,
            Self::InvalidCommand => 0x02,
            Self::InvalidParameter => 0x03,
            Self::TransmissionFailure => 0x04,
            Self::Other(byte) => byte,
        }
    }

    /// Returns true if the command succeeded.
    #[must_use]
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => f.write_str("OK"),
            Self::Error => f.write_str("ERROR"),
            Self::InvalidCommand => f.write_str("invalid command"),
            Self::InvalidParameter => f.write_str("invalid parameter"),
            Self::TransmissionFailure => f.write_str("transmission failure"),
            Self::Other(byte) => write!(f, "status 0x{byte:02X}"),
        }
    }
}

/// Delivery outcome of a ZigBee transmit request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeliveryStatus {
    /// Delivered.
    Success,
    /// MAC layer ACK not received.
    MacAckFailure,
    /// Clear channel assessment failed.
    CcaFailure,
    /// Destination endpoint does not exist.
    InvalidDestinationEndpoint,
    /// Network layer ACK not received.
    NetworkAckFailure,
    /// Local radio has not joined a network.
    NotJoined,
    /// Destination is the local radio.
    SelfAddressed,
    /// Address lookup failed.
    AddressNotFound,
    /// No route to the destination.
    RouteNotFound,
    /// Payload exceeds the radio's limit.
    PayloadTooLarge,
    /// Status code not known to this library.
    Other(u8),
}

impl DeliveryStatus {
    /// Converts a raw status byte.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Self {
        match byte {
            0x00 => Self::Success,
            0x01 => Self::MacAckFailure,
            0x02 => Self::CcaFailure,
            0x15 => Self::InvalidDestinationEndpoint,
            0x21 => Self::NetworkAckFailure,
            0x22 => Self::NotJoined,
            0x23 => Self::SelfAddressed,
            0x24 => Self::AddressNotFound,
            0x25 => Self::RouteNotFound,
            0x74 => Self::PayloadTooLarge,
            other => Self::Other(other),
        }
    }

    /// Returns the raw status byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        match self {
            Self::Success => 0x00,
            Self::MacAckFailure => 0x01,
            Self::CcaFailure => 0x02,
            Self::InvalidDestinationEndpoint => 0x15,
            Self::NetworkAckFailure => 0x21,
            Self::NotJoined => 0x22,
            Self::SelfAddressed => 0x23,
            Self::AddressNotFound => 0x24,
            Self::RouteNotFound => 0x25,
            Self::PayloadTooLarge => 0x74,
            Self::Other(byte) => byte,
        }
    }

    /// Returns true if the payload was delivered.
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Route discovery overhead reported with a transmit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiscoveryStatus {
    /// No discovery was needed.
    NoOverhead,
    /// Address discovery was performed.
    Address,
    /// Route discovery was performed.
    Route,
    /// Address and route discovery were performed.
    AddressAndRoute,
    /// Extended timeout discovery.
    ExtendedTimeout,
    /// Status code not known to this library.
    Other(u8),
}

impl DiscoveryStatus {
    /// Converts a raw status byte.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Self {
        match byte {
            0x00 => Self::NoOverhead,
            0x01 => Self::Address,
            0x02 => Self::Route,
            0x03 => Self::AddressAndRoute,
            0x40 => Self::ExtendedTimeout,
            other => Self::Other(other),
        }
    }

    /// Returns the raw status byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        match self {
            Self::NoOverhead => 0x00,
            Self::Address => 0x01,
            Self::Route => 0x02,
            Self::AddressAndRoute => 0x03,
            Self::ExtendedTimeout => 0x40,
            Self::Other(byte) => byte,
        }
    }
}

/// Receive options bit field of a ZigBee receive packet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReceiveOptions(u8);

impl ReceiveOptions {
    /// Packet was acknowledged.
    pub const ACKNOWLEDGED: Self = Self(0x01);

    /// Packet was a broadcast.
    pub const BROADCAST: Self = Self(0x02);

    /// Creates options from a raw byte.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Self {
        Self(byte)
    }

    /// Returns the raw byte value.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self.0
    }

    /// Check if a flag is set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    /// Returns true if the packet was acknowledged.
    #[must_use]
    pub const fn is_acknowledged(self) -> bool {
        self.contains(Self::ACKNOWLEDGED)
    }

    /// Returns true if the packet was a broadcast.
    #[must_use]
    pub const fn is_broadcast(self) -> bool {
        self.contains(Self::BROADCAST)
    }
}
