//! Wire protocol definitions.
//!
//! This module contains the low-level protocol types including:
//! - The frame codec contract and buffering decoder
//! - XBee API frame types and payloads
//! - The XBee API codec (unescaped and escaped modes)
//! - The gateway binary codec

pub mod frame;
pub mod frame_type;
pub mod gateway;
pub mod payload;
pub mod xbee;

pub use frame::{Decoded, FrameCodec, FrameDecoder, checksum};
pub use frame_type::FrameType;
pub use gateway::{GatewayCodec, GatewayFrame};
pub use payload::{
    AtCommandRequest, AtCommandResponse, ReceivePacket, RemoteAtCommandRequest,
    RemoteAtCommandResponse, TransmitRequest, TransmitStatus,
};
pub use xbee::{ApiMode, MAX_FRAME_LEN, XbeeCodec, XbeeFrame};
