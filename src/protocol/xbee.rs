//! XBee API-mode framing.
//!
//! The wire format wraps each API frame as follows:
//! ```text
//! ┌──────────┬──────────────┬────────┬──────────────┬──────────┐
//! │   0x7E   │ length (BE)  │  type  │  frame data  │ checksum │
//! │  1 byte  │   2 bytes    │ 1 byte │ length-1 b.  │  1 byte  │
//! └──────────┴──────────────┴────────┴──────────────┴──────────┘
//! ```
//! The length counts the type byte and frame data. The checksum is
//! `0xFF` minus the low byte of the sum of type and frame data, so a frame
//! is valid iff type, data and checksum sum to `0xFF` modulo 256.
//!
//! In escaped mode (API mode 2) every byte after the start delimiter that
//! equals `0x7E`, `0x7D`, `0x11` or `0x13` is sent as `0x7D` followed by the
//! byte XOR `0x20`. Length and checksum are computed over unescaped bytes.

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{DecodeError, EncodingError};
use crate::protocol::frame::{Decoded, FrameCodec, checksum};
use crate::protocol::payload::{
    AtCommandRequest, AtCommandResponse, ReceivePacket, RemoteAtCommandRequest,
    RemoteAtCommandResponse, TransmitRequest, TransmitStatus,
};
use crate::protocol::FrameType;

/// Start delimiter.
pub const START_DELIMITER: u8 = 0x7E;

/// Escape byte used in API mode 2.
pub const ESCAPE: u8 = 0x7D;

/// Software flow control on.
pub const XON: u8 = 0x11;

/// Software flow control off.
pub const XOFF: u8 = 0x13;

/// Value XORed into escaped bytes.
pub const ESCAPE_XOR: u8 = 0x20;

/// Largest value the length field can hold.
pub const MAX_FRAME_LEN: usize = 0xFFFF;

/// Delimiter plus length field.
const HEADER_LEN: usize = 3;

/// Length field only.
const LENGTH_LEN: usize = 2;

/// XBee API operating mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ApiMode {
    /// API mode 1: no escaping.
    #[default]
    Unescaped,
    /// API mode 2: control bytes are escaped.
    Escaped,
}

const fn needs_escape(byte: u8) -> bool {
    matches!(byte, START_DELIMITER | ESCAPE | XON | XOFF)
}

/// One XBee API frame with its typed payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XbeeFrame {
    /// Local AT command (0x08).
    AtCommandRequest(AtCommandRequest),
    /// Local AT command response (0x88).
    AtCommandResponse(AtCommandResponse),
    /// Remote AT command (0x17).
    RemoteAtCommandRequest(RemoteAtCommandRequest),
    /// Remote AT command response (0x97).
    RemoteAtCommandResponse(RemoteAtCommandResponse),
    /// ZigBee transmit request (0x10).
    TransmitRequest(TransmitRequest),
    /// ZigBee transmit status (0x8B).
    TransmitStatus(TransmitStatus),
    /// ZigBee receive packet (0x90).
    ReceivePacket(ReceivePacket),
    /// Any frame type this library does not interpret.
    Unknown {
        /// Raw frame type byte.
        frame_type: u8,
        /// Frame data after the type byte.
        data: Bytes,
    },
}

impl XbeeFrame {
    /// Returns the raw frame type byte.
    #[must_use]
    pub const fn frame_type(&self) -> u8 {
        match self {
            Self::AtCommandRequest(_) => FrameType::AtCommandRequest as u8,
            Self::AtCommandResponse(_) => FrameType::AtCommandResponse as u8,
            Self::RemoteAtCommandRequest(_) => FrameType::RemoteAtCommandRequest as u8,
            Self::RemoteAtCommandResponse(_) => FrameType::RemoteAtCommandResponse as u8,
            Self::TransmitRequest(_) => FrameType::TransmitRequest as u8,
            Self::TransmitStatus(_) => FrameType::TransmitStatus as u8,
            Self::ReceivePacket(_) => FrameType::ReceivePacket as u8,
            Self::Unknown { frame_type, .. } => *frame_type,
        }
    }

    /// Returns the frame type if it is one this library interprets.
    #[must_use]
    pub const fn kind(&self) -> Option<FrameType> {
        FrameType::from_byte(self.frame_type())
    }

    /// Returns the frame ID field, if the frame type has one.
    #[must_use]
    pub const fn frame_id(&self) -> Option<u8> {
        match self {
            Self::AtCommandRequest(p) => Some(p.frame_id),
            Self::AtCommandResponse(p) => Some(p.frame_id),
            Self::RemoteAtCommandRequest(p) => Some(p.frame_id),
            Self::RemoteAtCommandResponse(p) => Some(p.frame_id),
            Self::TransmitRequest(p) => Some(p.frame_id),
            Self::TransmitStatus(p) => Some(p.frame_id),
            Self::ReceivePacket(_) | Self::Unknown { .. } => None,
        }
    }

    /// Interprets frame data according to its type byte.
    ///
    /// Unrecognized types become [`XbeeFrame::Unknown`].
    pub fn from_data(frame_type: u8, data: &[u8]) -> Result<Self, DecodeError> {
        let frame = match FrameType::from_byte(frame_type) {
            Some(FrameType::AtCommandRequest) => {
                Self::AtCommandRequest(AtCommandRequest::parse(data)?)
            }
            Some(FrameType::AtCommandResponse) => {
                Self::AtCommandResponse(AtCommandResponse::parse(data)?)
            }
            Some(FrameType::RemoteAtCommandRequest) => {
                Self::RemoteAtCommandRequest(RemoteAtCommandRequest::parse(data)?)
            }
            Some(FrameType::RemoteAtCommandResponse) => {
                Self::RemoteAtCommandResponse(RemoteAtCommandResponse::parse(data)?)
            }
            Some(FrameType::TransmitRequest) => {
                Self::TransmitRequest(TransmitRequest::parse(data)?)
            }
            Some(FrameType::TransmitStatus) => Self::TransmitStatus(TransmitStatus::parse(data)?),
            Some(FrameType::ReceivePacket) => Self::ReceivePacket(ReceivePacket::parse(data)?),
            None => Self::Unknown {
                frame_type,
                data: Bytes::copy_from_slice(data),
            },
        };
        Ok(frame)
    }

    /// Length of the frame data after the type byte.
    fn data_len(&self) -> usize {
        match self {
            Self::AtCommandRequest(p) => p.encoded_len(),
            Self::AtCommandResponse(p) => p.encoded_len(),
            Self::RemoteAtCommandRequest(p) => p.encoded_len(),
            Self::RemoteAtCommandResponse(p) => p.encoded_len(),
            Self::TransmitRequest(p) => p.encoded_len(),
            Self::TransmitStatus(p) => p.encoded_len(),
            Self::ReceivePacket(p) => p.encoded_len(),
            Self::Unknown { data, .. } => data.len(),
        }
    }

    fn write_data(&self, buf: &mut BytesMut) {
        match self {
            Self::AtCommandRequest(p) => p.write_to(buf),
            Self::AtCommandResponse(p) => p.write_to(buf),
            Self::RemoteAtCommandRequest(p) => p.write_to(buf),
            Self::RemoteAtCommandResponse(p) => p.write_to(buf),
            Self::TransmitRequest(p) => p.write_to(buf),
            Self::TransmitStatus(p) => p.write_to(buf),
            Self::ReceivePacket(p) => p.write_to(buf),
            Self::Unknown { data, .. } => buf.put_slice(data),
        }
    }
}

impl fmt::Display for XbeeFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(kind) = self.kind() {
            write!(f, "{}: ", kind.name())?;
        }
        match self {
            Self::AtCommandRequest(p) => fmt::Display::fmt(p, f),
            Self::AtCommandResponse(p) => fmt::Display::fmt(p, f),
            Self::RemoteAtCommandRequest(p) => fmt::Display::fmt(p, f),
            Self::RemoteAtCommandResponse(p) => fmt::Display::fmt(p, f),
            Self::TransmitRequest(p) => fmt::Display::fmt(p, f),
            Self::TransmitStatus(p) => fmt::Display::fmt(p, f),
            Self::ReceivePacket(p) => fmt::Display::fmt(p, f),
            Self::Unknown { frame_type, data } => write!(
                f,
                "unknown frame type: 0x{frame_type:02X} data=[{}]",
                hex::encode(data)
            ),
        }
    }
}

macro_rules! impl_from_payload {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for XbeeFrame {
                fn from(payload: $variant) -> Self {
                    Self::$variant(payload)
                }
            }
        )*
    };
}

impl_from_payload!(
    AtCommandRequest,
    AtCommandResponse,
    RemoteAtCommandRequest,
    RemoteAtCommandResponse,
    TransmitRequest,
    TransmitStatus,
    ReceivePacket,
);

/// Codec for XBee API frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XbeeCodec {
    mode: ApiMode,
    max_length: usize,
}

impl Default for XbeeCodec {
    fn default() -> Self {
        Self::new(ApiMode::default())
    }
}

impl XbeeCodec {
    /// Creates a codec for the given API mode.
    #[must_use]
    pub const fn new(mode: ApiMode) -> Self {
        Self {
            mode,
            max_length: MAX_FRAME_LEN,
        }
    }

    /// Creates a codec for API mode 2.
    #[must_use]
    pub const fn escaped() -> Self {
        Self::new(ApiMode::Escaped)
    }

    /// Sets the largest accepted length field value.
    ///
    /// Inbound frames declaring more are treated as corruption.
    #[must_use]
    pub const fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = if max_length < MAX_FRAME_LEN {
            max_length
        } else {
            MAX_FRAME_LEN
        };
        self
    }

    /// Returns the API mode.
    #[must_use]
    pub const fn mode(&self) -> ApiMode {
        self.mode
    }

    /// Returns the largest accepted length field value.
    #[must_use]
    pub const fn max_length(&self) -> usize {
        self.max_length
    }

    fn escape(raw: &[u8]) -> Bytes {
        let mut out = BytesMut::with_capacity(raw.len() + raw.len() / 8 + 1);
        out.put_u8(raw[0]);
        for &b in &raw[1..] {
            if needs_escape(b) {
                out.put_u8(ESCAPE);
                out.put_u8(b ^ ESCAPE_XOR);
            } else {
                out.put_u8(b);
            }
        }
        out.freeze()
    }
}

impl FrameCodec for XbeeCodec {
    type Frame = XbeeFrame;

    fn encode(&self, frame: &XbeeFrame) -> Result<Bytes, EncodingError> {
        let len = 1 + frame.data_len();
        if len > self.max_length {
            return Err(EncodingError::TooLarge {
                size: len,
                max: self.max_length,
            });
        }

        let mut buf = BytesMut::with_capacity(HEADER_LEN + len + 1);
        buf.put_u8(START_DELIMITER);
        buf.put_u16(len as u16);
        buf.put_u8(frame.frame_type());
        frame.write_data(&mut buf);
        let cs = checksum(&buf[HEADER_LEN..]);
        buf.put_u8(cs);

        match self.mode {
            ApiMode::Unescaped => Ok(buf.freeze()),
            ApiMode::Escaped => Ok(Self::escape(&buf)),
        }
    }

    fn try_decode(&self, buf: &[u8]) -> Decoded<XbeeFrame> {
        let Some(start) = buf.iter().position(|&b| b == START_DELIMITER) else {
            return Decoded::NeedMoreData { discard: buf.len() };
        };
        let incomplete = Decoded::NeedMoreData { discard: start };
        let escaped = self.mode == ApiMode::Escaped;

        // Unescaped content after the delimiter: length, type, data, checksum.
        let mut content = Vec::new();
        let mut needed = LENGTH_LEN;
        let mut pos = start + 1;

        while content.len() < needed {
            let Some(&byte) = buf.get(pos) else {
                return incomplete;
            };
            if escaped && byte == START_DELIMITER {
                return Decoded::Malformed {
                    error: DecodeError::UnexpectedDelimiter,
                    consumed: pos,
                };
            }
            if escaped && byte == ESCAPE {
                let Some(&next) = buf.get(pos + 1) else {
                    return incomplete;
                };
                if next == START_DELIMITER {
                    return Decoded::Malformed {
                        error: DecodeError::UnexpectedDelimiter,
                        consumed: pos + 1,
                    };
                }
                content.push(next ^ ESCAPE_XOR);
                pos += 2;
            } else {
                content.push(byte);
                pos += 1;
            }

            if content.len() == LENGTH_LEN && needed == LENGTH_LEN {
                let len = usize::from(u16::from_be_bytes([content[0], content[1]]));
                if len == 0 || len > self.max_length {
                    return Decoded::Malformed {
                        error: DecodeError::InvalidLength(len),
                        consumed: start + 1,
                    };
                }
                needed = LENGTH_LEN + len + 1;
                content.reserve(len + 1);
            }
        }

        let body = &content[LENGTH_LEN..needed - 1];
        let received = content[needed - 1];
        let computed = checksum(body);
        if computed != received {
            return Decoded::Malformed {
                error: DecodeError::Checksum { computed, received },
                consumed: start + 1,
            };
        }

        match XbeeFrame::from_data(body[0], &body[1..]) {
            Ok(frame) => Decoded::Frame {
                frame,
                consumed: pos,
            },
            Err(error) => Decoded::Malformed {
                error,
                consumed: pos,
            },
        }
    }

    fn correlation_key(&self, frame: &XbeeFrame) -> Option<u8> {
        frame.frame_id().filter(|&id| id != 0)
    }
}
