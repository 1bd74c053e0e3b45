//! Error types for the xbee-gateway library.

use thiserror::Error;

use crate::types::{AtCommand, CommandStatus};

/// The main error type for xbee-gateway operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Serial port error.
    #[error("serial port error: {0}")]
    Serial(#[from] tokio_serial::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An outbound frame could not be encoded.
    #[error("encoding error: {0}")]
    Encoding(#[from] EncodingError),

    /// No response arrived before the deadline.
    #[error("request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// The caller cancelled the request.
    #[error("request cancelled")]
    Cancelled,

    /// The stream ended or failed. Terminal for the transceiver.
    #[error("connection closed")]
    ConnectionClosed,

    /// All 255 frame IDs are held by pending requests.
    #[error("no free frame ID: all 255 are pending")]
    ExhaustedCorrelationSpace,

    /// A request with this frame ID is already waiting for its response.
    #[error("frame ID {0} is already pending")]
    DuplicateFrameId(u8),

    /// A correlated request was issued for a frame without a frame ID.
    #[error("frame carries no frame ID")]
    MissingFrameId,

    /// The radio answered an AT command with a non-OK status.
    #[error("AT command {command} failed: {status}")]
    CommandFailed {
        command: AtCommand,
        status: CommandStatus,
    },

    /// The correlated response had an unexpected frame type.
    #[error("unexpected response frame type 0x{frame_type:02X}")]
    UnexpectedResponse { frame_type: u8 },
}

/// Errors raised while encoding an outbound frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    /// Frame content exceeds what the length field can address.
    #[error("frame too large: {size} bytes exceeds maximum {max}")]
    TooLarge { size: usize, max: usize },

    /// AT command codes are exactly two ASCII characters.
    #[error("invalid AT command {0:?}: expected two ASCII characters")]
    InvalidCommand(String),
}

/// Reasons an inbound byte sequence was rejected as a frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Checksum byte does not match the frame content.
    #[error("checksum mismatch: computed 0x{computed:02X}, received 0x{received:02X}")]
    Checksum { computed: u8, received: u8 },

    /// Declared length is zero or above the accepted maximum.
    #[error("invalid frame length {0}")]
    InvalidLength(usize),

    /// A start delimiter appeared inside an escaped frame.
    #[error("unexpected start delimiter inside frame")]
    UnexpectedDelimiter,

    /// Frame body is shorter than the fixed fields of its type.
    #[error("frame type 0x{frame_type:02X} truncated: need {expected} bytes, got {got}")]
    Truncated {
        frame_type: u8,
        expected: usize,
        got: usize,
    },

    /// AT command code bytes are not printable ASCII.
    #[error("invalid AT command code {0:02X?}")]
    InvalidCommand([u8; 2]),

    /// Second signature byte did not match.
    #[error("bad frame signature")]
    BadSignature,

    /// Unsupported protocol version.
    #[error("unsupported protocol version {0}")]
    UnsupportedVersion(u8),
}

/// Result type alias for xbee-gateway operations.
pub type Result<T> = std::result::Result<T, Error>;
