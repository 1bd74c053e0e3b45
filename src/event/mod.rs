//! Event system for unsolicited traffic.
//!
//! Frames that do not answer a pending request are published to every
//! subscriber: ZigBee receive packets as [`Event::Received`], anything else
//! as [`Event::Unsolicited`].

use std::sync::Arc;
use std::time::Duration;

use futures::Stream;
use tokio::sync::broadcast;

use crate::protocol::{FrameType, ReceivePacket, XbeeFrame};
use crate::types::Address64;

/// Event types that can be dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A ZigBee receive packet arrived.
    Received(ReceivePacket),
    /// Any other frame that no request was waiting for.
    Unsolicited(XbeeFrame),
    /// The connection to the radio is gone.
    Disconnected,
}

impl Event {
    /// Returns the frame type behind the event, if it is a known one.
    #[must_use]
    pub const fn frame_type(&self) -> Option<FrameType> {
        match self {
            Self::Received(_) => Some(FrameType::ReceivePacket),
            Self::Unsolicited(frame) => frame.kind(),
            Self::Disconnected => None,
        }
    }
}

/// A subscription to events.
pub struct Subscription {
    receiver: broadcast::Receiver<Event>,
}

impl Subscription {
    /// Receives the next event.
    ///
    /// Returns `None` once the dispatcher is gone. Events missed because the
    /// subscriber lagged are skipped.
    pub async fn recv(&mut self) -> Option<Event> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("subscriber lagged, {} events dropped", n);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Converts the subscription into a stream of events.
    pub fn into_stream(self) -> impl Stream<Item = Event> {
        futures::stream::unfold(self, |mut sub| async move {
            sub.recv().await.map(|event| (event, sub))
        })
    }
}

/// Subscription filter for specific events.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Filter by frame types.
    pub frame_types: Option<Vec<FrameType>>,
    /// Filter receive packets by sender.
    pub source: Option<Address64>,
}

impl EventFilter {
    /// Creates a filter for specific frame types.
    #[must_use]
    pub const fn frame_types(types: Vec<FrameType>) -> Self {
        Self {
            frame_types: Some(types),
            source: None,
        }
    }

    /// Creates a filter for receive packets from one sender.
    #[must_use]
    pub fn from_source(source: Address64) -> Self {
        Self {
            frame_types: Some(vec![FrameType::ReceivePacket]),
            source: Some(source),
        }
    }

    /// Checks if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &Event) -> bool {
        if let Some(ref types) = self.frame_types {
            match event.frame_type() {
                Some(frame_type) if types.contains(&frame_type) => {}
                _ => return false,
            }
        }

        if let Some(expected) = self.source {
            match event {
                Event::Received(packet) if packet.source == expected => {}
                _ => return false,
            }
        }

        true
    }
}

struct EventDispatcherInner {
    sender: broadcast::Sender<Event>,
}

/// Dispatches events to subscribers.
#[derive(Clone)]
pub struct EventDispatcher {
    inner: Arc<EventDispatcherInner>,
}

impl EventDispatcher {
    /// Creates a new event dispatcher.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            inner: Arc::new(EventDispatcherInner { sender }),
        }
    }

    /// Dispatches an event to all subscribers.
    pub fn dispatch(&self, event: Event) {
        // No subscribers is fine.
        let _ = self.inner.sender.send(event);
    }

    /// Subscribes to all events.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            receiver: self.inner.sender.subscribe(),
        }
    }

    /// Waits for an event matching the filter with timeout.
    ///
    /// Returns `None` if the timeout expires or the dispatcher is gone.
    pub async fn wait_for(&self, filter: EventFilter, timeout: Duration) -> Option<Event> {
        let mut subscription = self.subscribe();

        tokio::select! {
            biased;
            result = async {
                while let Some(event) = subscription.recv().await {
                    if filter.matches(&event) {
                        return Some(event);
                    }
                }
                None
            } => result,
            () = tokio::time::sleep(timeout) => None,
        }
    }
}
