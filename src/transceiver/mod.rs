//! Framed-transport engine.
//!
//! A [`Transceiver`] owns one byte stream and one [`FrameCodec`]. A background
//! read loop decodes inbound frames and either resolves the pending request
//! whose frame ID matches or forwards the frame to the inbound sink. Senders
//! share a serialized write path, so frames from concurrent callers never
//! interleave on the wire.

mod pending;
mod task;

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

use crate::error::{Error, Result};
use crate::protocol::{FrameCodec, FrameDecoder};
use crate::transport::ByteStream;

use pending::{PendingTable, SharedTable, lock};
pub use task::{CancelHandle, SendTask};

/// Default transceiver name used in log lines.
pub const DEFAULT_NAME: &str = "xbee/API";

/// Default read chunk size.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 1024;

/// Default capacity of the inbound frame channel.
pub const DEFAULT_INBOUND_CAPACITY: usize = 256;

/// Default response timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for a [`Transceiver`].
#[derive(Debug, Clone)]
pub struct TransceiverConfig {
    /// Name shown in log lines.
    pub name: String,
    /// Bytes requested from the stream per read.
    pub read_buffer_size: usize,
    /// Unsolicited frames buffered before the read loop waits for the consumer.
    pub inbound_capacity: usize,
    /// Timeout used when a request does not specify one.
    pub default_timeout: Duration,
}

impl Default for TransceiverConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            inbound_capacity: DEFAULT_INBOUND_CAPACITY,
            default_timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl TransceiverConfig {
    /// Creates a configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the read chunk size.
    #[must_use]
    pub const fn read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    /// Sets the inbound channel capacity.
    #[must_use]
    pub const fn inbound_capacity(mut self, capacity: usize) -> Self {
        self.inbound_capacity = capacity;
        self
    }

    /// Sets the default response timeout.
    #[must_use]
    pub const fn default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }
}

type Writer = Box<dyn AsyncWrite + Send + Unpin>;

/// Read loop and send path for one (stream, codec) pair.
///
/// Closed is terminal: once the stream ends or fails, or [`close`] is called,
/// every pending and every later request fails with
/// [`Error::ConnectionClosed`].
///
/// [`close`]: Transceiver::close
pub struct Transceiver<C: FrameCodec> {
    name: Arc<str>,
    codec: C,
    default_timeout: Duration,
    writer: Mutex<Writer>,
    pending: SharedTable<C::Frame>,
    read_task: JoinHandle<()>,
}

impl<C: FrameCodec> Transceiver<C> {
    /// Takes ownership of `stream` and starts the read loop.
    ///
    /// Returns the transceiver and the inbound sink: the receiver of every
    /// decoded frame that did not resolve a pending request. The read loop
    /// waits when the sink is full, so the receiver must be drained or dropped.
    ///
    /// Must be called within a Tokio runtime.
    pub fn new<S: ByteStream>(
        stream: S,
        codec: C,
        config: TransceiverConfig,
    ) -> (Self, mpsc::Receiver<C::Frame>) {
        let name: Arc<str> = Arc::from(config.name);
        let (reader, writer) = tokio::io::split(stream);
        let (inbound_tx, inbound_rx) = mpsc::channel(config.inbound_capacity.max(1));
        let pending: SharedTable<C::Frame> = Arc::new(std::sync::Mutex::new(PendingTable::new()));

        let read_task = tokio::spawn(read_loop(
            Arc::clone(&name),
            reader,
            FrameDecoder::new(codec.clone()),
            Arc::clone(&pending),
            inbound_tx,
            config.read_buffer_size.max(1),
        ));

        tracing::debug!("{}: transceiver started", name);

        let transceiver = Self {
            name,
            codec,
            default_timeout: config.default_timeout,
            writer: Mutex::new(Box::new(writer)),
            pending,
            read_task,
        };
        (transceiver, inbound_rx)
    }

    /// Returns the name used in log lines.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the codec.
    #[must_use]
    pub const fn codec(&self) -> &C {
        &self.codec
    }

    /// Returns the timeout applied when a request passes `None`.
    #[must_use]
    pub const fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Writes a frame without waiting for any response.
    pub async fn send(&self, frame: &C::Frame) -> Result<()> {
        if self.is_closed() {
            return Err(Error::ConnectionClosed);
        }
        let bytes = self.codec.encode(frame)?;
        self.write(&bytes).await
    }

    /// Writes a frame and registers for the response with the same frame ID.
    ///
    /// Fails with [`Error::MissingFrameId`] if the frame has none, and with
    /// [`Error::DuplicateFrameId`] without writing anything if a request
    /// with that ID is still pending.
    pub async fn request(
        &self,
        frame: &C::Frame,
        timeout: Option<Duration>,
    ) -> Result<SendTask<C::Frame>> {
        let frame_id = self
            .codec
            .correlation_key(frame)
            .ok_or(Error::MissingFrameId)?;
        let bytes = self.codec.encode(frame)?;
        let task = {
            let mut table = lock(&self.pending);
            self.register(&mut table, frame_id, timeout)?
        };
        self.write(&bytes).await?;
        Ok(task)
    }

    /// Allocates a free frame ID, builds the frame for it and sends it as
    /// a request.
    ///
    /// Allocation and registration happen atomically, so concurrent callers
    /// never race for the same ID. Fails with
    /// [`Error::ExhaustedCorrelationSpace`] when all 255 IDs are pending.
    ///
    /// `build` runs while the pending table is locked and must not call
    /// back into this transceiver.
    pub async fn request_with<B>(
        &self,
        build: B,
        timeout: Option<Duration>,
    ) -> Result<SendTask<C::Frame>>
    where
        B: FnOnce(u8) -> C::Frame,
    {
        let (task, bytes) = {
            let mut table = lock(&self.pending);
            let frame_id = table.allocate()?;
            let bytes = self.codec.encode(&build(frame_id))?;
            (self.register(&mut table, frame_id, timeout)?, bytes)
        };
        self.write(&bytes).await?;
        Ok(task)
    }

    /// Returns the number of requests waiting for a response.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        lock(&self.pending).len()
    }

    /// Returns true once the transceiver is closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        lock(&self.pending).is_closed()
    }

    /// Closes the transceiver: fails all pending requests, stops the read
    /// loop and shuts down the write side of the stream.
    pub async fn close(&self) {
        self.shutdown();
        let mut writer = self.writer.lock().await;
        if let Err(e) = writer.shutdown().await {
            tracing::debug!("{}: shutdown: {}", self.name, e);
        }
    }

    fn register(
        &self,
        table: &mut PendingTable<C::Frame>,
        frame_id: u8,
        timeout: Option<Duration>,
    ) -> Result<SendTask<C::Frame>> {
        let (seq, rx) = table.insert(frame_id)?;
        let timeout = timeout.unwrap_or(self.default_timeout);
        let timer = tokio::spawn(expire(
            Arc::clone(&self.name),
            Arc::clone(&self.pending),
            frame_id,
            seq,
            timeout,
        ));
        table.arm(frame_id, seq, timer.abort_handle());
        Ok(SendTask::new(frame_id, seq, rx, Arc::clone(&self.pending)))
    }

    async fn write(&self, bytes: &[u8]) -> Result<()> {
        let mut writer = self.writer.lock().await;
        if self.is_closed() {
            return Err(Error::ConnectionClosed);
        }

        tracing::trace!("{}: sending [{}]", self.name, hex::encode(bytes));
        let result = match writer.write_all(bytes).await {
            Ok(()) => writer.flush().await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            tracing::error!("{}: write error: {}", self.name, e);
            self.shutdown();
            return Err(Error::ConnectionClosed);
        }
        Ok(())
    }

    fn shutdown(&self) {
        let failed = lock(&self.pending).close();
        self.read_task.abort();
        if failed > 0 {
            tracing::debug!("{}: closed with {} pending requests", self.name, failed);
        }
    }
}

impl<C: FrameCodec> Drop for Transceiver<C> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn expire<F>(
    name: Arc<str>,
    pending: SharedTable<F>,
    frame_id: u8,
    seq: u64,
    timeout: Duration,
) {
    tokio::time::sleep(timeout).await;
    let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
    if lock(&pending).fail(frame_id, seq, Error::Timeout { timeout_ms }) {
        tracing::debug!("{}: frame ID {} timed out after {}ms", name, frame_id, timeout_ms);
    }
}

/// Hands a response to its waiter. Returns the frame if it is unsolicited.
fn route<C: FrameCodec>(
    name: &str,
    codec: &C,
    pending: &SharedTable<C::Frame>,
    frame: C::Frame,
) -> Option<C::Frame> {
    let Some(frame_id) = codec.correlation_key(&frame) else {
        return Some(frame);
    };
    match lock(pending).resolve(frame_id, frame) {
        Ok(()) => {
            tracing::debug!("{}: frame ID {} resolved", name, frame_id);
            None
        }
        Err(frame) => {
            tracing::debug!("{}: no request pending for frame ID {}", name, frame_id);
            Some(frame)
        }
    }
}

async fn read_loop<S, C>(
    name: Arc<str>,
    mut reader: ReadHalf<S>,
    mut decoder: FrameDecoder<C>,
    pending: SharedTable<C::Frame>,
    inbound: mpsc::Sender<C::Frame>,
    buffer_size: usize,
) where
    S: AsyncRead,
    C: FrameCodec,
{
    let mut buf = vec![0u8; buffer_size];

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => {
                tracing::debug!("{}: stream closed", name);
                break;
            }
            Ok(n) => n,
            Err(e) => {
                tracing::error!("{}: read error: {}", name, e);
                break;
            }
        };

        tracing::trace!("{}: received [{}]", name, hex::encode(&buf[..n]));
        decoder.feed(&buf[..n]);

        loop {
            match decoder.decode() {
                Ok(Some(frame)) => {
                    let Some(frame) = route(&name, decoder.codec(), &pending, frame) else {
                        continue;
                    };
                    if inbound.send(frame).await.is_err() {
                        tracing::trace!("{}: inbound receiver dropped", name);
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    // Decoder has already skipped to the next frame start.
                    tracing::warn!("{}: malformed frame: {}", name, e);
                }
            }
        }
    }

    let failed = lock(&pending).close();
    if failed > 0 {
        tracing::debug!("{}: failed {} pending requests", name, failed);
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::pin::Pin;
    use std::sync::Once;
    use std::task::{Context, Poll};

    use bytes::Bytes;
    use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream, ReadBuf};

    use super::*;
    use crate::protocol::{
        AtCommandRequest, GatewayCodec, GatewayFrame, ReceivePacket, TransmitRequest,
        TransmitStatus, XbeeCodec, XbeeFrame,
    };
    use crate::types::{
        Address16, Address64, AtCommand, DeliveryStatus, DiscoveryStatus, ReceiveOptions,
    };

    fn init_tracing() {
        static INIT: Once = Once::new();
        INIT.call_once(|| {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
                .with_test_writer()
                .try_init();
        });
    }

    fn xbee_pair(
        buffer: usize,
    ) -> (
        Transceiver<XbeeCodec>,
        mpsc::Receiver<XbeeFrame>,
        DuplexStream,
    ) {
        init_tracing();
        let (host, device) = tokio::io::duplex(buffer);
        let (transceiver, inbound) =
            Transceiver::new(host, XbeeCodec::default(), TransceiverConfig::default());
        (transceiver, inbound, device)
    }

    /// Reads from the simulated radio until one frame decodes.
    async fn next_frame<C: FrameCodec>(
        device: &mut DuplexStream,
        decoder: &mut FrameDecoder<C>,
    ) -> C::Frame {
        let mut buf = [0u8; 256];
        loop {
            if let Some(frame) = decoder.decode().unwrap() {
                return frame;
            }
            let n = device.read(&mut buf).await.unwrap();
            assert!(n > 0, "stream ended before a full frame");
            decoder.feed(&buf[..n]);
        }
    }

    /// Waits for the next inbound frame, failing the test instead of hanging.
    async fn recv_within<F>(inbound: &mut mpsc::Receiver<F>) -> Option<F> {
        tokio::time::timeout(Duration::from_secs(1), inbound.recv())
            .await
            .expect("no inbound frame within 1s")
    }

    /// A stream whose reads never complete and whose writes always fail.
    struct BrokenPipe;

    impl AsyncRead for BrokenPipe {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            Poll::Pending
        }
    }

    impl AsyncWrite for BrokenPipe {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            Poll::Ready(Err(io::ErrorKind::BrokenPipe.into()))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    fn at_command(frame_id: u8, command: AtCommand) -> XbeeFrame {
        XbeeFrame::AtCommandRequest(AtCommandRequest {
            frame_id,
            command,
            parameter: Bytes::new(),
        })
    }

    fn transmit_status(frame_id: u8) -> XbeeFrame {
        XbeeFrame::TransmitStatus(TransmitStatus {
            frame_id,
            network_address: Address16::new(0x1234),
            retry_count: 0,
            delivery_status: DeliveryStatus::Success,
            discovery_status: DiscoveryStatus::NoOverhead,
        })
    }

    fn encode(frame: &XbeeFrame) -> Bytes {
        XbeeCodec::default().encode(frame).unwrap()
    }

    #[tokio::test]
    async fn test_unsolicited_frames_skip_garbage() {
        let (_transceiver, mut inbound, mut device) = xbee_pair(4096);

        let packet = XbeeFrame::ReceivePacket(ReceivePacket {
            source: Address64::new(0x0013_A200_4000_0001),
            network_address: Address16::new(0x7D84),
            options: ReceiveOptions::ACKNOWLEDGED,
            data: Bytes::from_static(b"hello"),
        });
        let modem_status = XbeeFrame::Unknown {
            frame_type: 0x8A,
            data: Bytes::from_static(&[0x06]),
        };

        let mut wire = encode(&packet).to_vec();
        wire.extend_from_slice(&[0x00, 0x55, 0xAA]);
        wire.extend_from_slice(&encode(&modem_status));
        device.write_all(&wire).await.unwrap();

        assert_eq!(recv_within(&mut inbound).await, Some(packet));
        assert_eq!(recv_within(&mut inbound).await, Some(modem_status));

        // Closing the radio side ends the read loop and the inbound sink.
        drop(device);
        assert_eq!(recv_within(&mut inbound).await, None);
    }

    #[tokio::test]
    async fn test_malformed_frame_does_not_stop_reading() {
        let (_transceiver, mut inbound, mut device) = xbee_pair(4096);

        let mut corrupted = encode(&transmit_status(0)).to_vec();
        let last = corrupted.len() - 1;
        corrupted[last] ^= 0x01;
        let good = XbeeFrame::Unknown {
            frame_type: 0x8A,
            data: Bytes::from_static(&[0x00]),
        };
        corrupted.extend_from_slice(&encode(&good));
        device.write_all(&corrupted).await.unwrap();

        assert_eq!(recv_within(&mut inbound).await, Some(good));
    }

    #[tokio::test]
    async fn test_frames_without_frame_id_reach_inbound() {
        let (transceiver, mut inbound, mut device) = xbee_pair(4096);

        let task = transceiver
            .request(&at_command(1, AtCommand::NODE_DISCOVER), None)
            .await
            .unwrap();

        let packet = XbeeFrame::ReceivePacket(ReceivePacket {
            source: Address64::new(0x0013_A200_4000_0005),
            network_address: Address16::new(0x0001),
            options: ReceiveOptions::default(),
            data: Bytes::from_static(b"t=21"),
        });
        let mut wire = encode(&packet).to_vec();
        wire.extend_from_slice(&encode(&transmit_status(0)));
        device.write_all(&wire).await.unwrap();

        assert_eq!(recv_within(&mut inbound).await, Some(packet));
        assert_eq!(recv_within(&mut inbound).await, Some(transmit_status(0)));
        assert_eq!(transceiver.pending_count(), 1);
        assert!(task.cancel());
    }

    #[tokio::test]
    async fn test_write_failure_closes_transceiver() {
        init_tracing();
        let (transceiver, _inbound) =
            Transceiver::new(BrokenPipe, XbeeCodec::default(), TransceiverConfig::default());

        assert!(matches!(
            transceiver
                .request(&at_command(1, AtCommand::NODE_DISCOVER), None)
                .await,
            Err(Error::ConnectionClosed)
        ));
        assert!(transceiver.is_closed());
        assert_eq!(transceiver.pending_count(), 0);
        assert!(matches!(
            transceiver.send(&at_command(0, AtCommand::WRITE)).await,
            Err(Error::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_response_resolves_request() {
        let (transceiver, _inbound, mut device) = xbee_pair(4096);
        let mut decoder = FrameDecoder::new(XbeeCodec::default());

        let request = XbeeFrame::TransmitRequest(TransmitRequest::new(
            1,
            Address64::new(0x0013_A200_4000_0002),
            &b"ping"[..],
        ));
        let task = transceiver.request(&request, None).await.unwrap();
        assert_eq!(task.frame_id(), 1);
        assert_eq!(transceiver.pending_count(), 1);

        assert_eq!(next_frame(&mut device, &mut decoder).await, request);
        device.write_all(&encode(&transmit_status(1))).await.unwrap();

        assert_eq!(task.response().await.unwrap(), transmit_status(1));
        assert_eq!(transceiver.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_responses_match_by_frame_id() {
        let (transceiver, _inbound, mut device) = xbee_pair(4096);

        let first = transceiver
            .request(&at_command(1, AtCommand::SERIAL_HIGH), None)
            .await
            .unwrap();
        let second = transceiver
            .request(&at_command(2, AtCommand::SERIAL_LOW), None)
            .await
            .unwrap();

        let mut wire = encode(&transmit_status(2)).to_vec();
        wire.extend_from_slice(&encode(&transmit_status(1)));
        device.write_all(&wire).await.unwrap();

        assert_eq!(second.response().await.unwrap(), transmit_status(2));
        assert_eq!(first.response().await.unwrap(), transmit_status(1));
    }

    #[tokio::test]
    async fn test_unmatched_response_is_unsolicited() {
        let (_transceiver, mut inbound, mut device) = xbee_pair(4096);
        device.write_all(&encode(&transmit_status(9))).await.unwrap();
        assert_eq!(recv_within(&mut inbound).await, Some(transmit_status(9)));
    }

    #[tokio::test]
    async fn test_duplicate_frame_id_not_written() {
        let (transceiver, _inbound, mut device) = xbee_pair(4096);
        let mut decoder = FrameDecoder::new(XbeeCodec::default());

        let _task = transceiver
            .request(&at_command(5, AtCommand::NODE_DISCOVER), None)
            .await
            .unwrap();
        let err = transceiver
            .request(&at_command(5, AtCommand::NETWORK_ADDRESS), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateFrameId(5)));

        transceiver
            .send(&at_command(0, AtCommand::WRITE))
            .await
            .unwrap();

        assert_eq!(
            next_frame(&mut device, &mut decoder).await,
            at_command(5, AtCommand::NODE_DISCOVER)
        );
        assert_eq!(
            next_frame(&mut device, &mut decoder).await,
            at_command(0, AtCommand::WRITE)
        );
    }

    #[tokio::test]
    async fn test_request_requires_frame_id() {
        let (transceiver, _inbound, _device) = xbee_pair(4096);
        let err = transceiver
            .request(&at_command(0, AtCommand::APPLY_CHANGES), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MissingFrameId));
        assert_eq!(transceiver.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_frees_frame_id() {
        let (transceiver, _inbound, _device) = xbee_pair(4096);
        let timeout = Duration::from_millis(250);

        let started = tokio::time::Instant::now();
        let task = transceiver
            .request(&at_command(3, AtCommand::NODE_IDENTIFIER), Some(timeout))
            .await
            .unwrap();
        let err = task.response().await.unwrap_err();

        assert!(matches!(err, Error::Timeout { timeout_ms: 250 }));
        assert!(started.elapsed() >= timeout);
        assert_eq!(transceiver.pending_count(), 0);

        let again = transceiver
            .request(&at_command(3, AtCommand::NODE_IDENTIFIER), Some(timeout))
            .await
            .unwrap();
        assert_eq!(again.frame_id(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_timeout_applies() {
        let (host, _device) = tokio::io::duplex(4096);
        let config = TransceiverConfig::new().default_timeout(Duration::from_secs(2));
        let (transceiver, _inbound) = Transceiver::new(host, XbeeCodec::default(), config);

        let task = transceiver
            .request(&at_command(1, AtCommand::NETWORK_ADDRESS), None)
            .await
            .unwrap();
        assert!(matches!(
            task.response().await,
            Err(Error::Timeout { timeout_ms: 2000 })
        ));
    }

    #[tokio::test]
    async fn test_cancel() {
        let (transceiver, _inbound, mut device) = xbee_pair(4096);

        let task = transceiver
            .request(&at_command(4, AtCommand::NODE_DISCOVER), None)
            .await
            .unwrap();
        let handle = task.cancel_handle();

        assert!(handle.cancel());
        assert!(!handle.clone().cancel());
        assert!(!task.cancel());
        assert_eq!(transceiver.pending_count(), 0);
        assert!(matches!(task.response().await, Err(Error::Cancelled)));

        // A late response for a cancelled request is just unsolicited.
        device.write_all(&encode(&transmit_status(4))).await.unwrap();
    }

    #[tokio::test]
    async fn test_dropping_task_frees_frame_id() {
        let (transceiver, _inbound, _device) = xbee_pair(4096);

        let task = transceiver
            .request(&at_command(7, AtCommand::NODE_DISCOVER), None)
            .await
            .unwrap();
        assert_eq!(transceiver.pending_count(), 1);
        drop(task);
        assert_eq!(transceiver.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_connection_closed_fails_pending_and_later_calls() {
        let (transceiver, _inbound, device) = xbee_pair(4096);

        let task = transceiver
            .request(&at_command(1, AtCommand::NODE_DISCOVER), None)
            .await
            .unwrap();
        drop(device);

        assert!(matches!(task.response().await, Err(Error::ConnectionClosed)));
        assert!(transceiver.is_closed());
        assert!(matches!(
            transceiver
                .request(&at_command(2, AtCommand::NODE_DISCOVER), None)
                .await,
            Err(Error::ConnectionClosed)
        ));
        assert!(matches!(
            transceiver
                .request_with(|id| at_command(id, AtCommand::NODE_DISCOVER), None)
                .await,
            Err(Error::ConnectionClosed)
        ));
        assert!(matches!(
            transceiver.send(&at_command(0, AtCommand::WRITE)).await,
            Err(Error::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_close() {
        let (transceiver, mut inbound, _device) = xbee_pair(4096);
        let task = transceiver
            .request(&at_command(1, AtCommand::NODE_DISCOVER), None)
            .await
            .unwrap();

        transceiver.close().await;

        assert!(transceiver.is_closed());
        assert!(matches!(task.response().await, Err(Error::ConnectionClosed)));
        assert_eq!(recv_within(&mut inbound).await, None);
    }

    #[tokio::test]
    async fn test_exhausted_correlation_space() {
        let (transceiver, _inbound, _device) = xbee_pair(64 * 1024);

        let mut tasks = Vec::new();
        for _ in 0..255 {
            tasks.push(
                transceiver
                    .request_with(|id| at_command(id, AtCommand::NETWORK_ADDRESS), None)
                    .await
                    .unwrap(),
            );
        }
        let mut ids: Vec<u8> = tasks.iter().map(SendTask::frame_id).collect();
        ids.sort_unstable();
        assert_eq!(ids, (1..=255).collect::<Vec<u8>>());

        let err = transceiver
            .request_with(|id| at_command(id, AtCommand::NETWORK_ADDRESS), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ExhaustedCorrelationSpace));

        let released = tasks.remove(41);
        assert_eq!(released.frame_id(), 42);
        drop(released);

        let task = transceiver
            .request_with(|id| at_command(id, AtCommand::NETWORK_ADDRESS), None)
            .await
            .unwrap();
        assert_eq!(task.frame_id(), 42);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_sends_do_not_interleave() {
        // A small pipe forces every frame to be written in several pieces.
        let (transceiver, _inbound, mut device) = xbee_pair(64);
        let transceiver = Arc::new(transceiver);

        let senders: Vec<_> = (0..16u8)
            .map(|i| {
                let transceiver = Arc::clone(&transceiver);
                tokio::spawn(async move {
                    let frame = XbeeFrame::TransmitRequest(TransmitRequest::new(
                        0,
                        Address64::new(u64::from(i)),
                        vec![i; 300],
                    ));
                    transceiver.send(&frame).await
                })
            })
            .collect();

        let reader = tokio::spawn(async move {
            let mut decoder = FrameDecoder::new(XbeeCodec::default());
            let mut seen = Vec::new();
            while seen.len() < 16 {
                match next_frame(&mut device, &mut decoder).await {
                    XbeeFrame::TransmitRequest(tx) => {
                        let i = tx.destination.value() as u8;
                        assert!(tx.data.iter().all(|&b| b == i));
                        seen.push(i);
                    }
                    other => panic!("unexpected frame {other:?}"),
                }
            }
            seen
        });

        for sender in senders {
            sender.await.unwrap().unwrap();
        }
        let mut seen = reader.await.unwrap();
        seen.sort_unstable();
        assert_eq!(seen, (0..16).collect::<Vec<u8>>());
    }

    #[tokio::test]
    async fn test_generic_over_gateway_codec() {
        init_tracing();
        let (host, mut device) = tokio::io::duplex(4096);
        let (transceiver, mut inbound) =
            Transceiver::new(host, GatewayCodec, TransceiverConfig::new().name("gateway"));
        assert_eq!(transceiver.name(), "gateway");

        let notification = GatewayFrame::new(300, &b"{\"t\":21}"[..]);
        device
            .write_all(&GatewayCodec.encode(&notification).unwrap())
            .await
            .unwrap();
        assert_eq!(recv_within(&mut inbound).await, Some(notification));

        let command = GatewayFrame::new(301, &b"on"[..]);
        transceiver.send(&command).await.unwrap();
        let mut decoder = FrameDecoder::new(GatewayCodec);
        assert_eq!(next_frame(&mut device, &mut decoder).await, command);

        assert!(matches!(
            transceiver.request(&command, None).await,
            Err(Error::MissingFrameId)
        ));
    }
}
