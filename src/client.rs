//! Main [`XBee`] client implementation.
//!
//! This module provides the high-level [`XBee`] client that combines the
//! transceiver, event handling, and commands into a unified interface.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinHandle;

use crate::commands::CommandHandler;
use crate::error::Result;
use crate::event::{Event, EventDispatcher, EventFilter, Subscription};
use crate::protocol::{
    ApiMode, AtCommandResponse, MAX_FRAME_LEN, ReceivePacket, RemoteAtCommandResponse, TransmitStatus,
    XbeeCodec, XbeeFrame,
};
use crate::transceiver::{Transceiver, TransceiverConfig};
use crate::transport::{ByteStream, SerialConfig, serial};
use crate::types::{Address16, Address64, AtCommand};

/// Default capacity of the event channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

type ReceiveHandler = Box<dyn Fn(ReceivePacket) + Send + Sync>;

/// Configuration for an [`XBee`] client.
#[derive(Debug, Clone)]
pub struct XBeeConfig {
    /// API mode the radio is configured for (`AP` parameter).
    pub api_mode: ApiMode,
    /// Largest frame body accepted from the radio. A length field above this
    /// is treated as noise and decoding resynchronizes at the next delimiter.
    pub max_frame_length: usize,
    /// Transceiver settings.
    pub transceiver: TransceiverConfig,
    /// Events buffered per subscriber before the oldest are dropped.
    pub event_capacity: usize,
}

impl Default for XBeeConfig {
    fn default() -> Self {
        Self {
            api_mode: ApiMode::default(),
            max_frame_length: MAX_FRAME_LEN,
            transceiver: TransceiverConfig::default(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl XBeeConfig {
    /// Creates a configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API mode.
    #[must_use]
    pub const fn api_mode(mut self, mode: ApiMode) -> Self {
        self.api_mode = mode;
        self
    }

    /// Sets the largest accepted frame body.
    #[must_use]
    pub const fn max_frame_length(mut self, len: usize) -> Self {
        self.max_frame_length = len;
        self
    }

    /// Sets the transceiver configuration.
    #[must_use]
    pub fn transceiver(mut self, config: TransceiverConfig) -> Self {
        self.transceiver = config;
        self
    }

    /// Sets the event channel capacity.
    #[must_use]
    pub const fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }
}

/// Client for an XBee radio in API mode.
pub struct XBee {
    transceiver: Arc<Transceiver<XbeeCodec>>,
    dispatcher: EventDispatcher,
    commands: CommandHandler,
    handler: Arc<RwLock<Option<ReceiveHandler>>>,
    process_task: JoinHandle<()>,
}

impl XBee {
    /// Opens a serial port and starts a client on it.
    pub async fn serial(serial_config: &SerialConfig, config: XBeeConfig) -> Result<Self> {
        let stream = serial::open(serial_config).await?;
        Ok(Self::new(stream, config))
    }

    /// Starts a client on an already open stream.
    ///
    /// Must be called within a Tokio runtime.
    pub fn new<S: ByteStream>(stream: S, config: XBeeConfig) -> Self {
        let codec = XbeeCodec::new(config.api_mode).with_max_length(config.max_frame_length);
        let (transceiver, inbound) = Transceiver::new(stream, codec, config.transceiver);
        let transceiver = Arc::new(transceiver);

        let dispatcher = EventDispatcher::new(config.event_capacity);
        let commands = CommandHandler::new(Arc::clone(&transceiver));
        let handler: Arc<RwLock<Option<ReceiveHandler>>> = Arc::new(RwLock::new(None));

        let process_task = tokio::spawn(process_frames(
            inbound,
            dispatcher.clone(),
            Arc::clone(&handler),
        ));

        Self {
            transceiver,
            dispatcher,
            commands,
            handler,
            process_task,
        }
    }

    /// Runs an AT command on the local radio.
    ///
    /// A non-OK status is returned as
    /// [`Error::CommandFailed`](crate::Error::CommandFailed).
    pub async fn run_command(
        &self,
        command: AtCommand,
        parameter: impl Into<Bytes>,
    ) -> Result<AtCommandResponse> {
        self.commands.at_command(command, parameter).await
    }

    /// Runs an AT command on a remote radio.
    pub async fn remote_command(
        &self,
        destination: Address64,
        network_address: Address16,
        command: AtCommand,
        parameter: impl Into<Bytes>,
    ) -> Result<RemoteAtCommandResponse> {
        self.commands
            .remote_at_command(destination, network_address, command, parameter)
            .await
    }

    /// Sends data to a device on the mesh and waits for the delivery report.
    pub async fn transmit(
        &self,
        destination: Address64,
        data: impl Into<Bytes>,
    ) -> Result<TransmitStatus> {
        self.commands.transmit(destination, data).await
    }

    /// Registers the consumer of ZigBee receive packets, replacing any
    /// previous one.
    ///
    /// The handler runs on the client's processing task and must not block.
    pub async fn on_receive<F>(&self, handler: F)
    where
        F: Fn(ReceivePacket) + Send + Sync + 'static,
    {
        *self.handler.write().await = Some(Box::new(handler));
    }

    /// Subscribes to events.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        self.dispatcher.subscribe()
    }

    /// Waits for an event matching the filter with timeout.
    pub async fn wait_for(&self, filter: EventFilter, timeout: Duration) -> Option<Event> {
        self.dispatcher.wait_for(filter, timeout).await
    }

    /// Returns the command handler for direct command access.
    #[must_use]
    pub const fn commands(&self) -> &CommandHandler {
        &self.commands
    }

    /// Returns the number of requests waiting for a response.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.transceiver.pending_count()
    }

    /// Returns true once the connection is closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.transceiver.is_closed()
    }

    /// Closes the connection. Pending and later operations fail with
    /// [`Error::ConnectionClosed`](crate::Error::ConnectionClosed).
    pub async fn close(&self) {
        tracing::info!("closing {}", self.transceiver.name());
        self.transceiver.close().await;
    }
}

impl Drop for XBee {
    fn drop(&mut self) {
        self.process_task.abort();
    }
}

/// Routes unsolicited frames to the receive handler and subscribers.
async fn process_frames(
    mut inbound: mpsc::Receiver<XbeeFrame>,
    dispatcher: EventDispatcher,
    handler: Arc<RwLock<Option<ReceiveHandler>>>,
) {
    while let Some(frame) = inbound.recv().await {
        match frame {
            XbeeFrame::ReceivePacket(packet) => {
                tracing::debug!("received {}", packet);
                if let Some(handler) = handler.read().await.as_ref() {
                    handler(packet.clone());
                }
                dispatcher.dispatch(Event::Received(packet));
            }
            other => {
                tracing::debug!("unsolicited {}", other);
                dispatcher.dispatch(Event::Unsolicited(other));
            }
        }
    }

    tracing::debug!("inbound frames ended");
    dispatcher.dispatch(Event::Disconnected);
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

    use super::*;
    use crate::error::Error;
    use crate::protocol::{FrameCodec, FrameDecoder, FrameType, TransmitRequest};
    use crate::types::{CommandStatus, DeliveryStatus, DiscoveryStatus, ReceiveOptions};

    fn client(config: XBeeConfig) -> (XBee, DuplexStream) {
        let (host, device) = tokio::io::duplex(4096);
        (XBee::new(host, config), device)
    }

    /// Reads one request from the simulated radio.
    async fn read_request(device: &mut DuplexStream, codec: XbeeCodec) -> XbeeFrame {
        let mut decoder = FrameDecoder::new(codec);
        let mut buf = [0u8; 256];
        loop {
            if let Some(frame) = decoder.decode().unwrap() {
                return frame;
            }
            let n = device.read(&mut buf).await.unwrap();
            decoder.feed(&buf[..n]);
        }
    }

    /// Bounds a wait so a missing frame fails the test instead of hanging it.
    async fn within<T>(fut: impl std::future::Future<Output = T>) -> T {
        tokio::time::timeout(Duration::from_secs(1), fut)
            .await
            .expect("nothing arrived within 1s")
    }

    fn receive_packet(data: &'static [u8]) -> ReceivePacket {
        ReceivePacket {
            source: Address64::new(0x0013_A200_4152_A1B0),
            network_address: Address16::new(0x7E11),
            options: ReceiveOptions::ACKNOWLEDGED,
            data: Bytes::from_static(data),
        }
    }

    #[tokio::test]
    async fn test_transmit_resolves_with_status() {
        let (xbee, mut device) = client(XBeeConfig::new());
        let destination = Address64::new(0x0013_A200_4000_0001);

        let radio = async {
            let XbeeFrame::TransmitRequest(request) =
                read_request(&mut device, XbeeCodec::default()).await
            else {
                panic!("expected transmit request");
            };
            assert_eq!(request.destination, destination);
            assert_eq!(request.network_address, Address16::UNKNOWN);
            assert_eq!(&request.data[..], b"temp=21.5");

            let status = TransmitStatus {
                frame_id: request.frame_id,
                network_address: Address16::new(0x1A2B),
                retry_count: 0,
                delivery_status: DeliveryStatus::Success,
                discovery_status: DiscoveryStatus::NoOverhead,
            };
            let bytes = XbeeCodec::default().encode(&status.into()).unwrap();
            device.write_all(&bytes).await.unwrap();
        };

        let (result, ()) = tokio::join!(xbee.transmit(destination, &b"temp=21.5"[..]), radio);

        let status = result.unwrap();
        assert!(status.delivery_status.is_success());
        assert_eq!(status.network_address, Address16::new(0x1A2B));
        assert_eq!(xbee.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_run_command_in_escaped_mode() {
        let codec = XbeeCodec::escaped();
        let (xbee, mut device) = client(XBeeConfig::new().api_mode(ApiMode::Escaped));

        let radio = async {
            let XbeeFrame::AtCommandRequest(request) = read_request(&mut device, codec).await
            else {
                panic!("expected AT command request");
            };
            // 0x7E and 0x11 in the response must survive escaping.
            let response = AtCommandResponse {
                frame_id: request.frame_id,
                command: request.command,
                status: CommandStatus::Ok,
                data: Bytes::from_static(&[0x7E, 0x11]),
            };
            let bytes = codec.encode(&response.into()).unwrap();
            device.write_all(&bytes).await.unwrap();
        };

        let (result, ()) = tokio::join!(
            xbee.run_command(AtCommand::NETWORK_ADDRESS, Bytes::new()),
            radio
        );

        assert_eq!(&result.unwrap().data[..], &[0x7E, 0x11]);
    }

    #[tokio::test]
    async fn test_on_receive_handler() {
        let (xbee, mut device) = client(XBeeConfig::new());
        let (tx, mut rx) = mpsc::unbounded_channel();
        xbee.on_receive(move |packet| {
            let _ = tx.send(packet);
        })
        .await;

        let packet = receive_packet(b"hello");
        let bytes = XbeeCodec::default()
            .encode(&packet.clone().into())
            .unwrap();
        device.write_all(&bytes).await.unwrap();

        assert_eq!(within(rx.recv()).await, Some(packet));
    }

    #[tokio::test]
    async fn test_oversized_length_resyncs_quickly() {
        let (xbee, mut device) = client(XBeeConfig::new().max_frame_length(256));
        let (tx, mut rx) = mpsc::unbounded_channel();
        xbee.on_receive(move |packet| {
            let _ = tx.send(packet);
        })
        .await;

        // A stray delimiter with a bogus length, then a real frame.
        let packet = receive_packet(b"after noise");
        let mut wire = vec![0x7E, 0xFF, 0xF0];
        wire.extend_from_slice(
            &XbeeCodec::default()
                .encode(&packet.clone().into())
                .unwrap(),
        );
        device.write_all(&wire).await.unwrap();

        assert_eq!(within(rx.recv()).await, Some(packet));
    }

    #[tokio::test]
    async fn test_wait_for_received_packet() {
        let (xbee, mut device) = client(XBeeConfig::new());
        let packet = receive_packet(b"ping");

        let deliver = async {
            let bytes = XbeeCodec::default()
                .encode(&packet.clone().into())
                .unwrap();
            device.write_all(&bytes).await.unwrap();
        };
        let (event, ()) = tokio::join!(
            xbee.wait_for(
                EventFilter::from_source(packet.source),
                Duration::from_secs(1)
            ),
            deliver
        );

        assert_eq!(event, Some(Event::Received(packet)));
    }

    #[tokio::test]
    async fn test_unsolicited_and_disconnected_events() {
        let (xbee, mut device) = client(XBeeConfig::new());
        let mut events = xbee.subscribe();

        let stray = XbeeFrame::TransmitRequest(TransmitRequest::new(
            0,
            Address64::BROADCAST,
            &b"echo"[..],
        ));
        let bytes = XbeeCodec::default().encode(&stray).unwrap();
        device.write_all(&bytes).await.unwrap();

        let event = within(events.recv()).await.unwrap();
        assert_eq!(event.frame_type(), Some(FrameType::TransmitRequest));
        assert_eq!(event, Event::Unsolicited(stray));

        drop(device);
        assert_eq!(within(events.recv()).await, Some(Event::Disconnected));
        assert!(xbee.is_closed());
    }

    #[tokio::test]
    async fn test_close() {
        let (xbee, _device) = client(XBeeConfig::new());
        let mut events = xbee.subscribe();

        xbee.close().await;

        assert!(xbee.is_closed());
        assert_eq!(within(events.recv()).await, Some(Event::Disconnected));
        assert!(matches!(
            xbee.run_command(AtCommand::NODE_DISCOVER, Bytes::new()).await,
            Err(Error::ConnectionClosed)
        ));
        assert!(matches!(
            xbee.transmit(Address64::COORDINATOR, Bytes::new()).await,
            Err(Error::ConnectionClosed)
        ));
    }

    #[test]
    fn test_config_defaults() {
        let config = XBeeConfig::new();
        assert_eq!(config.api_mode, ApiMode::Unescaped);
        assert_eq!(config.event_capacity, DEFAULT_EVENT_CAPACITY);
        assert_eq!(config.max_frame_length, MAX_FRAME_LEN);
        assert_eq!(config.transceiver.name, "xbee/API");
        assert_eq!(config.transceiver.default_timeout, Duration::from_secs(5));
    }
}
