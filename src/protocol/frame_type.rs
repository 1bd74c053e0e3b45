//! XBee API frame type identifiers.
//!
//! The frame type is the first byte after the length field and selects
//! the layout of the rest of the frame data.

/// API frame types understood by this library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameType {
    // Host to radio (0x00-0x7F)
    /// Local AT command.
    AtCommandRequest = 0x08,
    /// ZigBee transmit request.
    TransmitRequest = 0x10,
    /// AT command for a remote radio.
    RemoteAtCommandRequest = 0x17,

    // Radio to host (0x80-0xFF)
    /// Response to a local AT command.
    AtCommandResponse = 0x88,
    /// Delivery report for a transmit request.
    TransmitStatus = 0x8B,
    /// Data received from the mesh.
    ReceivePacket = 0x90,
    /// Response from a remote radio.
    RemoteAtCommandResponse = 0x97,
}

impl FrameType {
    /// Attempts to parse a frame type from a byte.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x08 => Some(Self::AtCommandRequest),
            0x10 => Some(Self::TransmitRequest),
            0x17 => Some(Self::RemoteAtCommandRequest),
            0x88 => Some(Self::AtCommandResponse),
            0x8B => Some(Self::TransmitStatus),
            0x90 => Some(Self::ReceivePacket),
            0x97 => Some(Self::RemoteAtCommandResponse),
            _ => None,
        }
    }

    /// Returns true if the radio emits this frame type.
    #[must_use]
    pub const fn is_inbound(&self) -> bool {
        (*self as u8) >= 0x80
    }

    /// Returns true if this frame type carries a frame ID.
    #[must_use]
    pub const fn has_frame_id(&self) -> bool {
        !matches!(self, Self::ReceivePacket)
    }

    /// Returns the protocol name of the frame type.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::AtCommandRequest => "ATCOMMAND_REQUEST",
            Self::TransmitRequest => "ZB_TRANSMIT_REQUEST",
            Self::RemoteAtCommandRequest => "REMOTE_ATCOMMAND_REQUEST",
            Self::AtCommandResponse => "ATCOMMAND_RESPONSE",
            Self::TransmitStatus => "ZB_TRANSMIT_STATUS",
            Self::ReceivePacket => "ZB_RECEIVE_PACKET",
            Self::RemoteAtCommandResponse => "REMOTE_ATCOMMAND_RESPONSE",
        }
    }
}

impl From<FrameType> for u8 {
    fn from(frame_type: FrameType) -> Self {
        frame_type as Self
    }
}
