//! # xbee-gateway
//!
//! An async Rust library for XBee radios in API mode, built for gateways
//! that bridge a ZigBee mesh to the rest of the world.
//!
//! ## Features
//!
//! - Async/await based API using Tokio
//! - A transceiver engine generic over the wire protocol
//! - Frame-ID correlation with timeouts and cancellation
//! - XBee API frames in unescaped and escaped (API mode 2) form
//! - Event-driven handling of unsolicited frames
//!
//! ## Quick Start
//!
//! ```no_run
//! use xbee_gateway::{Address64, AtCommand, SerialConfig, XBee, XBeeConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), xbee_gateway::Error> {
//!     let serial = SerialConfig::new("/dev/ttyUSB0").baud_rate(9600);
//!     let xbee = XBee::serial(&serial, XBeeConfig::new()).await?;
//!
//!     xbee.on_receive(|packet| println!("{packet}")).await;
//!
//!     let my = xbee.run_command(AtCommand::NETWORK_ADDRESS, Vec::new()).await?;
//!     println!("network address: {:02X?}", &my.data[..]);
//!
//!     let status = xbee.transmit(Address64::COORDINATOR, &b"hello"[..]).await?;
//!     println!("delivery: {:?}", status.delivery_status);
//!
//!     xbee.close().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`protocol`] - Frame codecs (XBee API, gateway binary) and payloads
//! - [`types`] - Addresses, AT command codes and status values
//! - [`transceiver`] - Read loop, serialized writes and request correlation
//! - [`transport`] - Byte-stream boundary and serial port helper
//! - [`event`] - Async event system for unsolicited frames
//! - [`commands`] - AT command and transmit operations
//! - [`client`] - High-level [`XBee`] client

pub mod client;
pub mod commands;
pub mod error;
pub mod event;
pub mod protocol;
pub mod transceiver;
pub mod transport;
pub mod types;

// Re-exports for convenience
pub use client::{XBee, XBeeConfig};
pub use commands::CommandHandler;
pub use error::{DecodeError, EncodingError, Error, Result};
pub use event::{Event, EventDispatcher, EventFilter, Subscription};
pub use protocol::{
    ApiMode, AtCommandRequest, AtCommandResponse, Decoded, FrameCodec, FrameDecoder, FrameType,
    GatewayCodec, GatewayFrame, ReceivePacket, RemoteAtCommandRequest, RemoteAtCommandResponse,
    TransmitRequest, TransmitStatus, XbeeCodec, XbeeFrame,
};
pub use transceiver::{CancelHandle, SendTask, Transceiver, TransceiverConfig};
pub use transport::{ByteStream, SerialConfig, serial::list_ports};
pub use types::{
    Address16, Address64, AtCommand, CommandStatus, DeliveryStatus, DiscoveryStatus,
    ReceiveOptions,
};
