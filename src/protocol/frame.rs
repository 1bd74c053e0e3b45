//! The frame codec contract shared by every wire protocol.
//!
//! A codec turns logical frames into bytes and carves complete frames out of
//! an unstructured byte stream. The [`Transceiver`](crate::transceiver::Transceiver)
//! is generic over it, so the same read loop and correlation logic drive the
//! XBee API and the gateway binary protocol.

use bytes::{Buf, Bytes, BytesMut};

use crate::error::{DecodeError, EncodingError};

/// Outcome of one decode attempt over the unconsumed input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded<F> {
    /// No complete frame yet.
    ///
    /// `discard` leading bytes are noise before any frame start and may be
    /// dropped; everything after them must be kept.
    NeedMoreData { discard: usize },

    /// A complete, verified frame occupying the first `consumed` bytes.
    Frame { frame: F, consumed: usize },

    /// The bytes at the frame start are invalid.
    ///
    /// `consumed` is always non-zero and points at the resynchronization
    /// point: the caller drops that many bytes and scans again.
    Malformed { error: DecodeError, consumed: usize },
}

/// A wire protocol: frame serialization plus incremental parsing.
///
/// Implementations are stateless; one codec value may be cloned into the
/// read loop and shared with senders.
pub trait FrameCodec: Clone + Send + Sync + 'static {
    /// The logical frame type.
    type Frame: Send + 'static;

    /// Serializes a frame to wire bytes.
    ///
    /// Fails only if a field is out of its protocol-defined range.
    fn encode(&self, frame: &Self::Frame) -> Result<Bytes, EncodingError>;

    /// Attempts to decode the first frame in `buf`.
    ///
    /// Must be resumable: calling again after appending bytes yields the
    /// same result as a single call over the complete input.
    fn try_decode(&self, buf: &[u8]) -> Decoded<Self::Frame>;

    /// Returns the correlation key (frame ID) of a frame, if it has one.
    ///
    /// Key `0` means "no response expected" and must map to `None`.
    fn correlation_key(&self, frame: &Self::Frame) -> Option<u8>;
}

/// Calculates the one-byte checksum used by XBee and gateway frames:
/// `0xFF` minus the low byte of the sum.
#[must_use]
pub fn checksum(data: &[u8]) -> u8 {
    0xFF - data.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

/// Buffering decoder that applies a codec to a growing input.
#[derive(Debug)]
pub struct FrameDecoder<C> {
    codec: C,
    buffer: BytesMut,
}

impl<C: FrameCodec> FrameDecoder<C> {
    /// Creates a new frame decoder.
    #[must_use]
    pub fn new(codec: C) -> Self {
        Self {
            codec,
            buffer: BytesMut::new(),
        }
    }

    /// Feeds data into the decoder.
    pub fn feed(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Attempts to decode the next complete frame.
    ///
    /// Returns `Ok(Some(frame))` if a complete frame was decoded,
    /// `Ok(None)` if more data is needed, or an error if the bytes at the
    /// frame start were malformed. After an error the decoder has already
    /// skipped to the resynchronization point, so decoding may continue.
    pub fn decode(&mut self) -> Result<Option<C::Frame>, DecodeError> {
        match self.codec.try_decode(&self.buffer) {
            Decoded::NeedMoreData { discard } => {
                if discard > 0 {
                    tracing::trace!(
                        "discarding {} noise bytes: [{}]",
                        discard,
                        hex::encode(&self.buffer[..discard])
                    );
                    self.buffer.advance(discard);
                }
                Ok(None)
            }
            Decoded::Frame { frame, consumed } => {
                tracing::trace!("frame: [{}]", hex::encode(&self.buffer[..consumed]));
                self.buffer.advance(consumed);
                Ok(Some(frame))
            }
            Decoded::Malformed { error, consumed } => {
                self.buffer.advance(consumed.max(1).min(self.buffer.len()));
                Err(error)
            }
        }
    }

    /// Returns the codec.
    #[must_use]
    pub const fn codec(&self) -> &C {
        &self.codec
    }

    /// Returns the number of bytes currently buffered.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Clears the internal buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}
