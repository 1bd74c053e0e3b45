//! Gateway binary framing used by microcontroller devices behind the gateway.
//!
//! ```text
//! ┌───────────┬─────────┬───────┬─────────────┬─────────────┬─────────┬──────────┐
//! │ 0xC5 0xC3 │ version │ flags │ length (LE) │ intent (LE) │ payload │ checksum │
//! │  2 bytes  │ 1 byte  │ 1 b.  │   2 bytes   │   2 bytes   │ length  │  1 byte  │
//! └───────────┴─────────┴───────┴─────────────┴─────────────┴─────────┴──────────┘
//! ```
//! The checksum covers every preceding byte of the frame. Gateway frames
//! carry no frame ID, so every inbound frame reaches the inbound sink.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{DecodeError, EncodingError};
use crate::protocol::frame::{Decoded, FrameCodec, checksum};

/// First signature byte.
pub const SIGNATURE1: u8 = 0xC5;

/// Second signature byte.
pub const SIGNATURE2: u8 = 0xC3;

/// Supported protocol version.
pub const VERSION: u8 = 0x01;

/// Maximum payload size.
pub const MAX_PAYLOAD_LEN: usize = 0xFFFF;

/// Signature, version, flags, length and intent.
const HEADER_LEN: usize = 8;

/// Intents below this value are reserved for the system.
pub const INTENT_USER: u16 = 256;

/// System message intents.
pub mod intent {
    /// Device registration request.
    pub const REGISTRATION_REQUEST: u16 = 0;
    /// Device registration response.
    pub const REGISTRATION_RESPONSE: u16 = 1;
    /// Command result response.
    pub const COMMAND_RESULT_RESPONSE: u16 = 2;
    /// Device registration response (JSON).
    pub const REGISTRATION2_RESPONSE: u16 = 3;
}

/// A gateway frame: message intent plus opaque payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayFrame {
    /// Message intent.
    pub intent: u16,
    /// Payload bytes.
    pub payload: Bytes,
}

impl GatewayFrame {
    /// Creates a frame.
    #[must_use]
    pub fn new(intent: u16, payload: impl Into<Bytes>) -> Self {
        Self {
            intent,
            payload: payload.into(),
        }
    }

    /// Returns true for user-defined intents.
    #[must_use]
    pub const fn is_user_intent(&self) -> bool {
        self.intent >= INTENT_USER
    }
}

/// Codec for gateway frames.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GatewayCodec;

impl FrameCodec for GatewayCodec {
    type Frame = GatewayFrame;

    fn encode(&self, frame: &GatewayFrame) -> Result<Bytes, EncodingError> {
        let len = frame.payload.len();
        if len > MAX_PAYLOAD_LEN {
            return Err(EncodingError::TooLarge {
                size: len,
                max: MAX_PAYLOAD_LEN,
            });
        }

        let mut buf = BytesMut::with_capacity(HEADER_LEN + len + 1);
        buf.put_u8(SIGNATURE1);
        buf.put_u8(SIGNATURE2);
        buf.put_u8(VERSION);
        buf.put_u8(0); // flags
        buf.put_u16_le(len as u16);
        buf.put_u16_le(frame.intent);
        buf.put_slice(&frame.payload);
        let cs = checksum(&buf);
        buf.put_u8(cs);
        Ok(buf.freeze())
    }

    fn try_decode(&self, buf: &[u8]) -> Decoded<GatewayFrame> {
        let Some(start) = buf.iter().position(|&b| b == SIGNATURE1) else {
            return Decoded::NeedMoreData { discard: buf.len() };
        };
        let frame = &buf[start..];
        if frame.len() < HEADER_LEN + 1 {
            return Decoded::NeedMoreData { discard: start };
        }

        let skip_signature = |error| Decoded::Malformed {
            error,
            consumed: start + 1,
        };
        if frame[1] != SIGNATURE2 {
            return skip_signature(DecodeError::BadSignature);
        }
        if frame[2] != VERSION {
            return skip_signature(DecodeError::UnsupportedVersion(frame[2]));
        }

        let len = usize::from(u16::from_le_bytes([frame[4], frame[5]]));
        let total = HEADER_LEN + len + 1;
        if frame.len() < total {
            return Decoded::NeedMoreData { discard: start };
        }

        let computed = checksum(&frame[..total - 1]);
        let received = frame[total - 1];
        if computed != received {
            return skip_signature(DecodeError::Checksum { computed, received });
        }

        Decoded::Frame {
            frame: GatewayFrame {
                intent: u16::from_le_bytes([frame[6], frame[7]]),
                payload: Bytes::copy_from_slice(&frame[HEADER_LEN..total - 1]),
            },
            consumed: start + total,
        }
    }

    fn correlation_key(&self, _frame: &GatewayFrame) -> Option<u8> {
        None
    }
}
