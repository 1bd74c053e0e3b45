//! Serial port helper for radios attached over UART or USB.

use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio_serial::{SerialPortBuilderExt, SerialStream};

use crate::error::{Error, Result};

/// Default baud rate of XBee modules.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Default connection delay.
pub const DEFAULT_CONNECTION_DELAY: Duration = Duration::from_millis(100);

/// How long stale bytes are drained after opening the port.
const DRAIN_WINDOW: Duration = Duration::from_millis(200);

/// Configuration for a serial port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialConfig {
    /// Serial port path (e.g., "/dev/ttyUSB0" or "COM3").
    pub port: String,
    /// Baud rate.
    pub baud_rate: u32,
    /// Delay after opening before the port is handed out.
    pub connection_delay: Duration,
}

impl SerialConfig {
    /// Creates a new serial configuration with default settings.
    #[must_use]
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            connection_delay: DEFAULT_CONNECTION_DELAY,
        }
    }

    /// Sets the baud rate.
    #[must_use]
    pub const fn baud_rate(mut self, rate: u32) -> Self {
        self.baud_rate = rate;
        self
    }

    /// Sets the connection delay.
    #[must_use]
    pub const fn connection_delay(mut self, delay: Duration) -> Self {
        self.connection_delay = delay;
        self
    }
}

/// Opens the port, waits for the radio to settle and drops any bytes it
/// emitted before the caller was listening.
pub async fn open(config: &SerialConfig) -> Result<SerialStream> {
    tracing::info!("opening serial port: {} @ {}", config.port, config.baud_rate);

    let mut stream = tokio_serial::new(&config.port, config.baud_rate)
        .open_native_async()
        .map_err(Error::Serial)?;

    if let Err(e) = tokio_serial::SerialPort::write_request_to_send(&mut stream, false) {
        tracing::warn!("failed to set RTS: {}", e);
    }

    tokio::time::sleep(config.connection_delay).await;

    let mut buf = [0u8; 256];
    let mut drained = 0usize;
    let deadline = tokio::time::Instant::now() + DRAIN_WINDOW;
    while tokio::time::Instant::now() < deadline {
        match tokio::time::timeout(Duration::from_millis(20), stream.read(&mut buf)).await {
            Ok(Ok(n)) if n > 0 => drained += n,
            _ => tokio::time::sleep(Duration::from_millis(10)).await,
        }
    }
    if drained > 0 {
        tracing::debug!("drained {} stale bytes", drained);
    }

    tracing::info!("serial port open: {}", config.port);
    Ok(stream)
}

/// Lists available serial ports.
pub fn list_ports() -> Result<Vec<String>> {
    let ports = tokio_serial::available_ports().map_err(Error::Serial)?;
    Ok(ports.into_iter().map(|p| p.port_name).collect())
}
