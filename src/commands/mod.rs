//! Request/response operations against the local radio and the mesh.
//!
//! Each operation allocates a free frame ID, sends the request and waits for
//! the response carrying the same ID.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::protocol::{
    AtCommandRequest, AtCommandResponse, RemoteAtCommandRequest, RemoteAtCommandResponse,
    TransmitRequest, TransmitStatus, XbeeCodec, XbeeFrame,
};
use crate::transceiver::Transceiver;
use crate::types::{Address16, Address64, AtCommand};

/// Command handler for XBee operations.
pub struct CommandHandler {
    transceiver: Arc<Transceiver<XbeeCodec>>,
    timeout: Duration,
}

impl CommandHandler {
    /// Creates a new command handler using the transceiver's default timeout.
    #[must_use]
    pub fn new(transceiver: Arc<Transceiver<XbeeCodec>>) -> Self {
        let timeout = transceiver.default_timeout();
        Self {
            transceiver,
            timeout,
        }
    }

    /// Sets the command timeout.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Returns the command timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Sends a request under a fresh frame ID and waits for its response.
    async fn send_and_wait<B>(&self, build: B) -> Result<XbeeFrame>
    where
        B: FnOnce(u8) -> XbeeFrame,
    {
        let task = self
            .transceiver
            .request_with(build, Some(self.timeout))
            .await?;
        let frame_id = task.frame_id();
        let response = task.response().await?;
        tracing::debug!("frame ID {} answered: {}", frame_id, response);
        Ok(response)
    }

    /// Runs an AT command on the local radio.
    ///
    /// A response with a non-OK status is returned as
    /// [`Error::CommandFailed`].
    pub async fn at_command(
        &self,
        command: AtCommand,
        parameter: impl Into<Bytes>,
    ) -> Result<AtCommandResponse> {
        let parameter = parameter.into();
        let response = self
            .send_and_wait(|frame_id| {
                AtCommandRequest {
                    frame_id,
                    command,
                    parameter,
                }
                .into()
            })
            .await?;

        match response {
            XbeeFrame::AtCommandResponse(r) if r.status.is_ok() => Ok(r),
            XbeeFrame::AtCommandResponse(r) => Err(Error::CommandFailed {
                command: r.command,
                status: r.status,
            }),
            other => Err(Error::UnexpectedResponse {
                frame_type: other.frame_type(),
            }),
        }
    }

    /// Sends an AT command with frame ID 0: the radio sends no response.
    pub async fn at_command_no_reply(
        &self,
        command: AtCommand,
        parameter: impl Into<Bytes>,
    ) -> Result<()> {
        let frame = AtCommandRequest {
            frame_id: 0,
            command,
            parameter: parameter.into(),
        };
        self.transceiver.send(&frame.into()).await
    }

    /// Runs an AT command on a remote radio and applies it immediately.
    pub async fn remote_at_command(
        &self,
        destination: Address64,
        network_address: Address16,
        command: AtCommand,
        parameter: impl Into<Bytes>,
    ) -> Result<RemoteAtCommandResponse> {
        let parameter = parameter.into();
        let response = self
            .send_and_wait(|frame_id| {
                RemoteAtCommandRequest {
                    frame_id,
                    destination,
                    network_address,
                    options: RemoteAtCommandRequest::APPLY_CHANGES,
                    command,
                    parameter,
                }
                .into()
            })
            .await?;

        match response {
            XbeeFrame::RemoteAtCommandResponse(r) if r.status.is_ok() => Ok(r),
            XbeeFrame::RemoteAtCommandResponse(r) => Err(Error::CommandFailed {
                command: r.command,
                status: r.status,
            }),
            other => Err(Error::UnexpectedResponse {
                frame_type: other.frame_type(),
            }),
        }
    }

    /// Sends data to a device on the mesh and returns the delivery report.
    ///
    /// A failed delivery is not an error: inspect
    /// [`TransmitStatus::delivery_status`].
    pub async fn transmit(
        &self,
        destination: Address64,
        data: impl Into<Bytes>,
    ) -> Result<TransmitStatus> {
        let data = data.into();
        let response = self
            .send_and_wait(|frame_id| TransmitRequest::new(frame_id, destination, data).into())
            .await?;

        match response {
            XbeeFrame::TransmitStatus(status) => Ok(status),
            other => Err(Error::UnexpectedResponse {
                frame_type: other.frame_type(),
            }),
        }
    }
}
