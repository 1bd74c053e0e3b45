//! Byte-stream boundary.
//!
//! The engine needs nothing from a transport beyond asynchronous reads and
//! writes, so any Tokio stream qualifies: a serial port, a TCP socket or an
//! in-memory pipe in tests.

pub mod serial;

use tokio::io::{AsyncRead, AsyncWrite};

/// A byte stream a [`Transceiver`](crate::transceiver::Transceiver) can own.
pub trait ByteStream: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T> ByteStream for T where T: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

pub use serial::SerialConfig;
