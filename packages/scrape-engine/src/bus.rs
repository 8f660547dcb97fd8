//! In-process pub/sub for session progress.
//!
//! One broadcast channel per session, opened when the session is created and
//! closed right after its `complete` message.
//!
//! # Guarantees
//!
//! - **Per-session FIFO**: each subscriber sees messages in publish order,
//!   which implies per-site order
//! - **No replay**: a late subscriber only sees messages published after it
//!   subscribed and must snapshot through `SessionManager::status`
//! - **Producers never wait**: publishing is a non-blocking send; a
//!   subscriber that falls more than `capacity` messages behind is dropped
//!   (its stream ends) instead of slowing anyone down

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, PoisonError, RwLock};
use std::task::{Context, Poll};

use futures::{Stream, StreamExt};
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::types::{message::StreamMessage, progress::ProgressRecord};

/// Default per-session buffer before subscribers start lagging.
const DEFAULT_CAPACITY: usize = 256;

/// Session-keyed progress bus.
///
/// Thread-safe and cheap to clone; clones share the same channels.
#[derive(Clone)]
pub struct ProgressBus {
    channels: Arc<RwLock<HashMap<Uuid, broadcast::Sender<StreamMessage>>>>,
    capacity: usize,
}

impl ProgressBus {
    /// Create a bus with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a bus buffering `capacity` messages per session.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    /// Open the channel for a session. No-op if already open.
    pub fn open(&self, session_id: Uuid) {
        let mut channels = self.channels.write().unwrap_or_else(PoisonError::into_inner);
        channels
            .entry(session_id)
            .or_insert_with(|| broadcast::channel(self.capacity).0);
    }

    /// Whether the session's channel is still open.
    pub fn is_open(&self, session_id: Uuid) -> bool {
        self.channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&session_id)
    }

    /// Publish one progress record. Returns the number of subscribers reached.
    pub fn publish(&self, session_id: Uuid, record: ProgressRecord) -> usize {
        self.publish_message(session_id, StreamMessage::progress(record))
    }

    /// Publish any message. No-op once the channel is closed.
    pub fn publish_message(&self, session_id: Uuid, message: StreamMessage) -> usize {
        let channels = self.channels.read().unwrap_or_else(PoisonError::into_inner);
        match channels.get(&session_id) {
            // Err only means nobody is listening right now
            Some(tx) => tx.send(message).unwrap_or(0),
            None => 0,
        }
    }

    /// Send the final `complete` message and close the channel.
    ///
    /// Later publishes for this session are dropped.
    pub fn complete(&self, session_id: Uuid) -> usize {
        let sender = self
            .channels
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&session_id);

        match sender {
            Some(tx) => {
                let reached = tx.send(StreamMessage::Complete).unwrap_or(0);
                debug!(session_id = %session_id, subscribers = reached, "progress channel closed");
                reached
            }
            None => 0,
        }
    }

    /// Close the channel without a `complete` message (session evicted).
    pub fn close(&self, session_id: Uuid) {
        self.channels
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&session_id);
    }

    /// Subscribe to a session's messages from now on.
    ///
    /// For an unknown or already closed session the subscription ends
    /// immediately.
    pub fn subscribe(&self, session_id: Uuid) -> ProgressSubscription {
        let channels = self.channels.read().unwrap_or_else(PoisonError::into_inner);
        let inner = channels
            .get(&session_id)
            .map(|tx| BroadcastStream::new(tx.subscribe()));

        ProgressSubscription {
            session_id,
            inner,
            finished: false,
        }
    }

    /// Drop a subscription. Equivalent to dropping the handle.
    pub fn unsubscribe(&self, subscription: ProgressSubscription) {
        debug!(session_id = %subscription.session_id, "subscriber left");
        drop(subscription);
    }

    /// Number of live subscribers for a session.
    pub fn subscriber_count(&self, session_id: Uuid) -> usize {
        self.channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&session_id)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }
}

impl Default for ProgressBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ProgressBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let open = self
            .channels
            .read()
            .map(|c| c.len())
            .unwrap_or_default();
        f.debug_struct("ProgressBus")
            .field("open_sessions", &open)
            .field("capacity", &self.capacity)
            .finish()
    }
}

/// Handle yielding a session's messages until `complete`, channel close,
/// or lag.
pub struct ProgressSubscription {
    session_id: Uuid,
    inner: Option<BroadcastStream<StreamMessage>>,
    finished: bool,
}

impl ProgressSubscription {
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Next message, or `None` once the subscription has ended.
    pub async fn recv(&mut self) -> Option<StreamMessage> {
        self.next().await
    }
}

impl Stream for ProgressSubscription {
    type Item = StreamMessage;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }
        let Some(inner) = this.inner.as_mut() else {
            this.finished = true;
            return Poll::Ready(None);
        };

        match inner.poll_next_unpin(cx) {
            Poll::Ready(Some(Ok(message))) => {
                if message == StreamMessage::Complete {
                    this.finished = true;
                    this.inner = None;
                }
                Poll::Ready(Some(message))
            }
            Poll::Ready(Some(Err(BroadcastStreamRecvError::Lagged(missed)))) => {
                warn!(
                    session_id = %this.session_id,
                    missed,
                    "progress subscriber lagged, dropping it"
                );
                this.finished = true;
                this.inner = None;
                Poll::Ready(None)
            }
            Poll::Ready(None) => {
                this.finished = true;
                this.inner = None;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
