//! Handles for in-flight correlated requests.

use std::fmt;
use std::sync::Arc;

use tokio::sync::oneshot;

use super::pending::{SharedTable, lock};
use crate::error::{Error, Result};

/// One in-flight exchange: a request whose response is matched by frame ID.
///
/// The task resolves exactly once, with the response frame, a timeout,
/// a cancellation or [`Error::ConnectionClosed`]. Dropping an unresolved
/// task releases its frame ID.
#[must_use = "dropping a SendTask abandons the response and frees its frame ID"]
pub struct SendTask<F> {
    frame_id: u8,
    seq: u64,
    rx: oneshot::Receiver<Result<F>>,
    table: SharedTable<F>,
    finished: bool,
}

impl<F> SendTask<F> {
    pub(crate) const fn new(
        frame_id: u8,
        seq: u64,
        rx: oneshot::Receiver<Result<F>>,
        table: SharedTable<F>,
    ) -> Self {
        Self {
            frame_id,
            seq,
            rx,
            table,
            finished: false,
        }
    }

    /// Returns the frame ID this task is waiting on.
    #[must_use]
    pub const fn frame_id(&self) -> u8 {
        self.frame_id
    }

    /// Waits for the outcome.
    pub async fn response(mut self) -> Result<F> {
        let outcome = (&mut self.rx).await;
        self.finished = true;
        // The sender only disappears without a value if the table was torn down.
        outcome.unwrap_or(Err(Error::ConnectionClosed))
    }

    /// Stops waiting. The task resolves with [`Error::Cancelled`].
    ///
    /// Bytes already written stay written. Returns false if the task had
    /// already resolved.
    pub fn cancel(&self) -> bool {
        lock(&self.table).fail(self.frame_id, self.seq, Error::Cancelled)
    }

    /// Returns a handle that can cancel this task from elsewhere.
    pub fn cancel_handle(&self) -> CancelHandle<F> {
        CancelHandle {
            frame_id: self.frame_id,
            seq: self.seq,
            table: Arc::clone(&self.table),
        }
    }
}

impl<F> Drop for SendTask<F> {
    fn drop(&mut self) {
        if !self.finished {
            lock(&self.table).remove(self.frame_id, self.seq);
        }
    }
}

impl<F> fmt::Debug for SendTask<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SendTask")
            .field("frame_id", &self.frame_id)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

/// Cancels a [`SendTask`] without owning it.
pub struct CancelHandle<F> {
    frame_id: u8,
    seq: u64,
    table: SharedTable<F>,
}

impl<F> CancelHandle<F> {
    /// Cancels the task. Returns false if it had already resolved.
    pub fn cancel(&self) -> bool {
        lock(&self.table).fail(self.frame_id, self.seq, Error::Cancelled)
    }
}

impl<F> Clone for CancelHandle<F> {
    fn clone(&self) -> Self {
        Self {
            frame_id: self.frame_id,
            seq: self.seq,
            table: Arc::clone(&self.table),
        }
    }
}

impl<F> fmt::Debug for CancelHandle<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelHandle")
            .field("frame_id", &self.frame_id)
            .finish_non_exhaustive()
    }
}
