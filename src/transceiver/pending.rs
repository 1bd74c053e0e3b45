//! Pending-request table: frame ID to the waiter expecting that ID's response.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;
use tokio::task::AbortHandle;

use crate::error::{Error, Result};

/// Table shared by the read loop, senders, timers and task handles.
pub(crate) type SharedTable<F> = Arc<Mutex<PendingTable<F>>>;

/// Locks the table. A panic while holding the lock leaves the table
/// consistent, so poisoning is ignored.
pub(crate) fn lock<F>(table: &SharedTable<F>) -> MutexGuard<'_, PendingTable<F>> {
    table.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Entry<F> {
    tx: oneshot::Sender<Result<F>>,
    /// Distinguishes successive users of the same frame ID.
    seq: u64,
    timer: Option<AbortHandle>,
}

impl<F> Entry<F> {
    fn finish(self, result: Result<F>) {
        if let Some(timer) = self.timer {
            timer.abort();
        }
        // The waiter may have gone away in the meantime.
        let _ = self.tx.send(result);
    }
}

/// At most one entry per frame ID. Frame ID 0 is never stored.
pub(crate) struct PendingTable<F> {
    entries: HashMap<u8, Entry<F>>,
    next_key: u8,
    next_seq: u64,
    closed: bool,
}

impl<F> PendingTable<F> {
    pub(crate) fn new() -> Self {
        Self {
            entries: HashMap::new(),
            next_key: 1,
            next_seq: 0,
            closed: false,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) const fn is_closed(&self) -> bool {
        self.closed
    }

    /// Picks the next free frame ID, advancing round-robin over 1..=255.
    pub(crate) fn allocate(&mut self) -> Result<u8> {
        if self.closed {
            return Err(Error::ConnectionClosed);
        }
        for _ in 0..u8::MAX {
            let key = self.next_key;
            self.next_key = if key == u8::MAX { 1 } else { key + 1 };
            if !self.entries.contains_key(&key) {
                return Ok(key);
            }
        }
        Err(Error::ExhaustedCorrelationSpace)
    }

    /// Registers a waiter for `key`.
    ///
    /// Returns the entry's sequence number and the receiving end of its
    /// completion slot.
    pub(crate) fn insert(&mut self, key: u8) -> Result<(u64, oneshot::Receiver<Result<F>>)> {
        if self.closed {
            return Err(Error::ConnectionClosed);
        }
        if key == 0 {
            return Err(Error::MissingFrameId);
        }
        if self.entries.contains_key(&key) {
            return Err(Error::DuplicateFrameId(key));
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        let (tx, rx) = oneshot::channel();
        self.entries.insert(
            key,
            Entry {
                tx,
                seq,
                timer: None,
            },
        );
        Ok((seq, rx))
    }

    /// Attaches the deadline timer to the entry it was spawned for.
    pub(crate) fn arm(&mut self, key: u8, seq: u64, timer: AbortHandle) {
        match self.entries.get_mut(&key) {
            Some(entry) if entry.seq == seq => entry.timer = Some(timer),
            _ => timer.abort(),
        }
    }

    /// Delivers a response frame to the waiter for `key`.
    ///
    /// Hands the frame back if nobody is waiting for it.
    pub(crate) fn resolve(&mut self, key: u8, frame: F) -> std::result::Result<(), F> {
        match self.entries.remove(&key) {
            Some(entry) => {
                entry.finish(Ok(frame));
                Ok(())
            }
            None => Err(frame),
        }
    }

    /// Fails the entry `(key, seq)` with `error`.
    ///
    /// Returns false if that entry was already resolved.
    pub(crate) fn fail(&mut self, key: u8, seq: u64, error: Error) -> bool {
        match self.take(key, seq) {
            Some(entry) => {
                entry.finish(Err(error));
                true
            }
            None => false,
        }
    }

    /// Drops the entry `(key, seq)` without notifying anyone.
    pub(crate) fn remove(&mut self, key: u8, seq: u64) {
        if let Some(timer) = self.take(key, seq).and_then(|entry| entry.timer) {
            timer.abort();
        }
    }

    /// Marks the table closed and fails every waiter with
    /// [`Error::ConnectionClosed`].
    ///
    /// Returns the number of waiters that were failed.
    pub(crate) fn close(&mut self) -> usize {
        self.closed = true;
        let count = self.entries.len();
        for (_, entry) in self.entries.drain() {
            entry.finish(Err(Error::ConnectionClosed));
        }
        count
    }

    fn take(&mut self, key: u8, seq: u64) -> Option<Entry<F>> {
        if self.entries.get(&key)?.seq != seq {
            return None;
        }
        self.entries.remove(&key)
    }
}
