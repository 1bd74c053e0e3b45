//! AT command codes.

use std::fmt;
use std::str::FromStr;

use crate::error::EncodingError;

/// A two-character AT command code, e.g. `ND` or `MY`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct AtCommand([u8; 2]);

impl AtCommand {
    /// Node discover.
    pub const NODE_DISCOVER: Self = Self(*b"ND");

    /// 16-bit network address of the local radio.
    pub const NETWORK_ADDRESS: Self = Self(*b"MY");

    /// Upper 32 bits of the local serial number.
    pub const SERIAL_HIGH: Self = Self(*b"SH");

    /// Lower 32 bits of the local serial number.
    pub const SERIAL_LOW: Self = Self(*b"SL");

    /// Node identifier string.
    pub const NODE_IDENTIFIER: Self = Self(*b"NI");

    /// Apply queued changes.
    pub const APPLY_CHANGES: Self = Self(*b"AC");

    /// Write settings to non-volatile memory.
    pub const WRITE: Self = Self(*b"WR");

    /// Creates a command from its two raw bytes.
    ///
    /// Returns `None` unless both bytes are printable ASCII.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 2]) -> Option<Self> {
        if bytes[0].is_ascii_graphic() && bytes[1].is_ascii_graphic() {
            Some(Self(bytes))
        } else {
            None
        }
    }

    /// Returns the two command bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 2] {
        &self.0
    }

    /// Returns the command as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        // Construction guarantees ASCII.
        std::str::from_utf8(&self.0).unwrap_or("??")
    }
}

impl FromStr for AtCommand {
    type Err = EncodingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes: [u8; 2] = s
            .as_bytes()
            .try_into()
            .map_err(|_| EncodingError::InvalidCommand(s.to_owned()))?;
        Self::from_bytes(bytes).ok_or_else(|| EncodingError::InvalidCommand(s.to_owned()))
    }
}

impl TryFrom<&str> for AtCommand {
    type Error = EncodingError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl fmt::Debug for AtCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AtCommand({})", self.as_str())
    }
}

impl fmt::Display for AtCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
