//! Payload variants carried inside XBee API frames.
//!
//! Each payload owns its typed fields and knows its own byte layout. The
//! layouts below describe the frame data that follows the frame type byte;
//! all multi-byte integers are big-endian.

use std::fmt;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::DecodeError;
use crate::protocol::FrameType;
use crate::types::{
    Address16, Address64, AtCommand, CommandStatus, DeliveryStatus, DiscoveryStatus,
    ReceiveOptions,
};

/// Fails with `Truncated` unless `data` holds at least `expected` bytes.
fn require(frame_type: FrameType, data: &[u8], expected: usize) -> Result<(), DecodeError> {
    if data.len() < expected {
        return Err(DecodeError::Truncated {
            frame_type: frame_type.into(),
            expected,
            got: data.len(),
        });
    }
    Ok(())
}

fn get_address64(buf: &mut &[u8]) -> Address64 {
    Address64::new(buf.get_u64())
}

fn get_address16(buf: &mut &[u8]) -> Address16 {
    Address16::new(buf.get_u16())
}

fn get_command(buf: &mut &[u8]) -> Result<AtCommand, DecodeError> {
    let bytes = [buf.get_u8(), buf.get_u8()];
    AtCommand::from_bytes(bytes).ok_or(DecodeError::InvalidCommand(bytes))
}

/// Writes bytes as an ASCII rendering, replacing non-printables with `.`.
fn ascii(data: &[u8]) -> String {
    data.iter()
        .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' })
        .collect()
}

/// Local AT command.
///
/// ```text
/// [frame_id:1] [command:2] [parameter...]
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtCommandRequest {
    /// Frame ID; 0 suppresses the response.
    pub frame_id: u8,
    /// Command code.
    pub command: AtCommand,
    /// Optional parameter; empty queries the current value.
    pub parameter: Bytes,
}

impl AtCommandRequest {
    const FIXED_LEN: usize = 3;

    pub(crate) fn write_to(&self, buf: &mut BytesMut) {
        buf.put_u8(self.frame_id);
        buf.put_slice(self.command.as_bytes());
        buf.put_slice(&self.parameter);
    }

    pub(crate) fn parse(data: &[u8]) -> Result<Self, DecodeError> {
        require(FrameType::AtCommandRequest, data, Self::FIXED_LEN)?;
        let mut buf = data;
        let frame_id = buf.get_u8();
        let command = get_command(&mut buf)?;
        Ok(Self {
            frame_id,
            command,
            parameter: Bytes::copy_from_slice(buf),
        })
    }

    pub(crate) fn encoded_len(&self) -> usize {
        Self::FIXED_LEN + self.parameter.len()
    }
}

impl fmt::Display for AtCommandRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "frameId={} command=\"{}\"", self.frame_id, self.command)?;
        if !self.parameter.is_empty() {
            write!(f, " parameter=[{}]", hex::encode(&self.parameter))?;
        }
        Ok(())
    }
}

/// Response to a local AT command.
///
/// ```text
/// [frame_id:1] [command:2] [status:1] [data...]
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtCommandResponse {
    /// Frame ID of the request.
    pub frame_id: u8,
    /// Command code being answered.
    pub command: AtCommand,
    /// Command status.
    pub status: CommandStatus,
    /// Returned value, if any.
    pub data: Bytes,
}

impl AtCommandResponse {
    const FIXED_LEN: usize = 4;

    pub(crate) fn write_to(&self, buf: &mut BytesMut) {
        buf.put_u8(self.frame_id);
        buf.put_slice(self.command.as_bytes());
        buf.put_u8(self.status.as_byte());
        buf.put_slice(&self.data);
    }

    pub(crate) fn parse(data: &[u8]) -> Result<Self, DecodeError> {
        require(FrameType::AtCommandResponse, data, Self::FIXED_LEN)?;
        let mut buf = data;
        let frame_id = buf.get_u8();
        let command = get_command(&mut buf)?;
        let status = CommandStatus::from_byte(buf.get_u8());
        Ok(Self {
            frame_id,
            command,
            status,
            data: Bytes::copy_from_slice(buf),
        })
    }

    pub(crate) fn encoded_len(&self) -> usize {
        Self::FIXED_LEN + self.data.len()
    }
}

impl fmt::Display for AtCommandResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "frameId={} command=\"{}\" status={} result=[{}]",
            self.frame_id,
            self.command,
            self.status,
            hex::encode(&self.data)
        )
    }
}

/// AT command addressed to a remote radio.
///
/// ```text
/// [frame_id:1] [dest64:8] [dest16:2] [options:1] [command:2] [parameter...]
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteAtCommandRequest {
    /// Frame ID; 0 suppresses the response.
    pub frame_id: u8,
    /// Destination extended address.
    pub destination: Address64,
    /// Destination network address.
    pub network_address: Address16,
    /// Remote command options (0x02 applies changes immediately).
    pub options: u8,
    /// Command code.
    pub command: AtCommand,
    /// Optional parameter.
    pub parameter: Bytes,
}

impl RemoteAtCommandRequest {
    const FIXED_LEN: usize = 14;

    /// Option bit: apply changes on the remote radio.
    pub const APPLY_CHANGES: u8 = 0x02;

    pub(crate) fn write_to(&self, buf: &mut BytesMut) {
        buf.put_u8(self.frame_id);
        buf.put_u64(self.destination.value());
        buf.put_u16(self.network_address.value());
        buf.put_u8(self.options);
        buf.put_slice(self.command.as_bytes());
        buf.put_slice(&self.parameter);
    }

    pub(crate) fn parse(data: &[u8]) -> Result<Self, DecodeError> {
        require(FrameType::RemoteAtCommandRequest, data, Self::FIXED_LEN)?;
        let mut buf = data;
        let frame_id = buf.get_u8();
        let destination = get_address64(&mut buf);
        let network_address = get_address16(&mut buf);
        let options = buf.get_u8();
        let command = get_command(&mut buf)?;
        Ok(Self {
            frame_id,
            destination,
            network_address,
            options,
            command,
            parameter: Bytes::copy_from_slice(buf),
        })
    }

    pub(crate) fn encoded_len(&self) -> usize {
        Self::FIXED_LEN + self.parameter.len()
    }
}

impl fmt::Display for RemoteAtCommandRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "frameId={} DA64={} DA16={} options=0x{:02X} command=\"{}\" parameter=[{}]",
            self.frame_id,
            self.destination,
            self.network_address,
            self.options,
            self.command,
            hex::encode(&self.parameter)
        )
    }
}

/// Response from a remote radio.
///
/// ```text
/// [frame_id:1] [source64:8] [source16:2] [command:2] [status:1] [data...]
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteAtCommandResponse {
    /// Frame ID of the request.
    pub frame_id: u8,
    /// Responding radio's extended address.
    pub source: Address64,
    /// Responding radio's network address.
    pub network_address: Address16,
    /// Command code being answered.
    pub command: AtCommand,
    /// Command status.
    pub status: CommandStatus,
    /// Returned value, if any.
    pub data: Bytes,
}

impl RemoteAtCommandResponse {
    const FIXED_LEN: usize = 14;

    pub(crate) fn write_to(&self, buf: &mut BytesMut) {
        buf.put_u8(self.frame_id);
        buf.put_u64(self.source.value());
        buf.put_u16(self.network_address.value());
        buf.put_slice(self.command.as_bytes());
        buf.put_u8(self.status.as_byte());
        buf.put_slice(&self.data);
    }

    pub(crate) fn parse(data: &[u8]) -> Result<Self, DecodeError> {
        require(FrameType::RemoteAtCommandResponse, data, Self::FIXED_LEN)?;
        let mut buf = data;
        let frame_id = buf.get_u8();
        let source = get_address64(&mut buf);
        let network_address = get_address16(&mut buf);
        let command = get_command(&mut buf)?;
        let status = CommandStatus::from_byte(buf.get_u8());
        Ok(Self {
            frame_id,
            source,
            network_address,
            command,
            status,
            data: Bytes::copy_from_slice(buf),
        })
    }

    pub(crate) fn encoded_len(&self) -> usize {
        Self::FIXED_LEN + self.data.len()
    }
}

impl fmt::Display for RemoteAtCommandResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "frameId={} SA64={} SA16={} command=\"{}\" status={} result=[{}]",
            self.frame_id,
            self.source,
            self.network_address,
            self.command,
            self.status,
            hex::encode(&self.data)
        )
    }
}

/// ZigBee transmit request.
///
/// ```text
/// [frame_id:1] [dest64:8] [dest16:2] [radius:1] [options:1] [data...]
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransmitRequest {
    /// Frame ID; 0 suppresses the transmit status.
    pub frame_id: u8,
    /// Destination extended address.
    pub destination: Address64,
    /// Destination network address, [`Address16::UNKNOWN`] if not known.
    pub network_address: Address16,
    /// Maximum hops for broadcasts; 0 uses the network maximum.
    pub broadcast_radius: u8,
    /// Transmit options.
    pub options: u8,
    /// Application payload.
    pub data: Bytes,
}

impl TransmitRequest {
    const FIXED_LEN: usize = 13;

    /// Creates a request with default radius, options and unknown network address.
    #[must_use]
    pub fn new(frame_id: u8, destination: Address64, data: impl Into<Bytes>) -> Self {
        Self {
            frame_id,
            destination,
            network_address: Address16::UNKNOWN,
            broadcast_radius: 0,
            options: 0,
            data: data.into(),
        }
    }

    pub(crate) fn write_to(&self, buf: &mut BytesMut) {
        buf.put_u8(self.frame_id);
        buf.put_u64(self.destination.value());
        buf.put_u16(self.network_address.value());
        buf.put_u8(self.broadcast_radius);
        buf.put_u8(self.options);
        buf.put_slice(&self.data);
    }

    pub(crate) fn parse(data: &[u8]) -> Result<Self, DecodeError> {
        require(FrameType::TransmitRequest, data, Self::FIXED_LEN)?;
        let mut buf = data;
        Ok(Self {
            frame_id: buf.get_u8(),
            destination: get_address64(&mut buf),
            network_address: get_address16(&mut buf),
            broadcast_radius: buf.get_u8(),
            options: buf.get_u8(),
            data: Bytes::copy_from_slice(buf),
        })
    }

    pub(crate) fn encoded_len(&self) -> usize {
        Self::FIXED_LEN + self.data.len()
    }
}

impl fmt::Display for TransmitRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "frameId={} DA64={} DA16={} bcastRadius={} options=0x{:02X} data=[{}] (ascii:\"{}\")",
            self.frame_id,
            self.destination,
            self.network_address,
            self.broadcast_radius,
            self.options,
            hex::encode(&self.data),
            ascii(&self.data)
        )
    }
}

/// Delivery report for a transmit request.
///
/// ```text
/// [frame_id:1] [dest16:2] [retries:1] [delivery:1] [discovery:1]
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransmitStatus {
    /// Frame ID of the transmit request.
    pub frame_id: u8,
    /// Network address the packet was delivered to.
    pub network_address: Address16,
    /// Number of application retries.
    pub retry_count: u8,
    /// Delivery outcome.
    pub delivery_status: DeliveryStatus,
    /// Discovery overhead.
    pub discovery_status: DiscoveryStatus,
}

impl TransmitStatus {
    const FIXED_LEN: usize = 6;

    pub(crate) fn write_to(&self, buf: &mut BytesMut) {
        buf.put_u8(self.frame_id);
        buf.put_u16(self.network_address.value());
        buf.put_u8(self.retry_count);
        buf.put_u8(self.delivery_status.as_byte());
        buf.put_u8(self.discovery_status.as_byte());
    }

    pub(crate) fn parse(data: &[u8]) -> Result<Self, DecodeError> {
        require(FrameType::TransmitStatus, data, Self::FIXED_LEN)?;
        let mut buf = data;
        Ok(Self {
            frame_id: buf.get_u8(),
            network_address: get_address16(&mut buf),
            retry_count: buf.get_u8(),
            delivery_status: DeliveryStatus::from_byte(buf.get_u8()),
            discovery_status: DiscoveryStatus::from_byte(buf.get_u8()),
        })
    }

    pub(crate) const fn encoded_len(&self) -> usize {
        Self::FIXED_LEN
    }
}

impl fmt::Display for TransmitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "frameId={} DA16={} retryCount={} delivery=0x{:02X} discovery=0x{:02X}",
            self.frame_id,
            self.network_address,
            self.retry_count,
            self.delivery_status.as_byte(),
            self.discovery_status.as_byte()
        )
    }
}

/// Data received from the mesh.
///
/// ```text
/// [source64:8] [source16:2] [options:1] [data...]
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivePacket {
    /// Sender's extended address.
    pub source: Address64,
    /// Sender's network address.
    pub network_address: Address16,
    /// Receive options.
    pub options: ReceiveOptions,
    /// Application payload.
    pub data: Bytes,
}

impl ReceivePacket {
    const FIXED_LEN: usize = 11;

    pub(crate) fn write_to(&self, buf: &mut BytesMut) {
        buf.put_u64(self.source.value());
        buf.put_u16(self.network_address.value());
        buf.put_u8(self.options.as_byte());
        buf.put_slice(&self.data);
    }

    pub(crate) fn parse(data: &[u8]) -> Result<Self, DecodeError> {
        require(FrameType::ReceivePacket, data, Self::FIXED_LEN)?;
        let mut buf = data;
        Ok(Self {
            source: get_address64(&mut buf),
            network_address: get_address16(&mut buf),
            options: ReceiveOptions::from_byte(buf.get_u8()),
            data: Bytes::copy_from_slice(buf),
        })
    }

    pub(crate) fn encoded_len(&self) -> usize {
        Self::FIXED_LEN + self.data.len()
    }
}

impl fmt::Display for ReceivePacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SA64={} SA16={} options=0x{:02X} data=[{}] (ascii:\"{}\")",
            self.source,
            self.network_address,
            self.options.as_byte(),
            hex::encode(&self.data),
            ascii(&self.data)
        )
    }
}
