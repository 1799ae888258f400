//! Connection state and close lifecycle.
//!
//! A [`Connection`] is the shared handle for one WebSocket session. The
//! transport itself lives inside the two pump tasks (see
//! [`pump`](super::pump)); the handle carries everything other tasks may
//! touch: identity, the outbound queue, group membership and close state.
//!
//! # States
//!
//! ```text
//! Open ──close()──► Closing ──teardown done──► Closed
//! ```
//!
//! Teardown runs exactly once no matter how many triggers race (read
//! error, write error, handler error, removal by the hub).

// ============================================================================
// Imports
// ============================================================================

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Weak};

use bytes::Bytes;
use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, trace, warn};

use crate::error::{Error, Result};
use crate::hub::Hub;
use crate::identifiers::ConnectionId;
use crate::protocol::SharedHandler;

use super::queue::OutboundQueue;

// ============================================================================
// ConnectionState
// ============================================================================

/// Close state of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Registered and pumping.
    Open,
    /// Teardown in progress.
    Closing,
    /// Queue closed, transport close signalled to both workers, removed
    /// from every group.
    Closed,
}

impl ConnectionState {
    const OPEN: u8 = 0;
    const CLOSING: u8 = 1;
    const CLOSED: u8 = 2;

    #[inline]
    fn from_u8(raw: u8) -> Self {
        match raw {
            Self::OPEN => Self::Open,
            Self::CLOSING => Self::Closing,
            _ => Self::Closed,
        }
    }
}

// ============================================================================
// Connection
// ============================================================================

/// Shared handle to one live WebSocket session.
///
/// Obtained from [`Hub::connect`]. All methods are non-blocking and safe
/// to call from any task.
pub struct Connection {
    /// Process-wide identity.
    id: ConnectionId,
    /// Bounded outbound FIFO drained by the write worker.
    queue: OutboundQueue,
    /// Raw [`ConnectionState`].
    state: AtomicU8,
    /// Groups this connection belongs to. Mirrors hub state; only edited
    /// while the hub lock is held.
    groups: Mutex<FxHashSet<String>>,
    /// One-shot close event observed by the read worker.
    close_signal: watch::Sender<bool>,
    /// Application handler for inbound payloads.
    handler: Option<SharedHandler>,
    /// Owning hub.
    hub: Weak<Hub>,
}

impl Connection {
    /// Creates a connection and the receiver for its write worker.
    pub(crate) fn new(
        id: ConnectionId,
        hub: &Arc<Hub>,
        handler: Option<SharedHandler>,
        queue_capacity: usize,
    ) -> (Arc<Self>, mpsc::Receiver<Bytes>) {
        let (queue, outbound) = OutboundQueue::bounded(queue_capacity);
        let (close_signal, _) = watch::channel(false);

        let connection = Arc::new(Self {
            id,
            queue,
            state: AtomicU8::new(ConnectionState::OPEN),
            groups: Mutex::new(FxHashSet::default()),
            close_signal,
            handler,
            hub: Arc::downgrade(hub),
        });

        (connection, outbound)
    }

    /// Creates a connection with no transport or pumps attached.
    #[cfg(test)]
    pub(crate) fn detached(hub: &Arc<Hub>) -> (Arc<Self>, mpsc::Receiver<Bytes>) {
        Self::new(hub.next_id(), hub, None, hub.options().queue_capacity)
    }
}

// ============================================================================
// Connection - Public API
// ============================================================================

impl Connection {
    /// Returns the connection identity.
    #[inline]
    #[must_use]
    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    /// Returns the current close state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Returns `true` while the connection is open.
    #[inline]
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Returns the groups this connection currently belongs to.
    #[must_use]
    pub fn groups(&self) -> Vec<String> {
        let mut groups: Vec<String> = self.groups.lock().iter().cloned().collect();
        groups.sort_unstable();
        groups
    }

    /// Returns `true` if the connection belongs to `group`.
    #[must_use]
    pub fn in_group(&self, group: &str) -> bool {
        self.groups.lock().contains(group)
    }

    /// Returns the number of payloads waiting to be written.
    #[inline]
    #[must_use]
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Returns the outbound queue capacity.
    #[inline]
    #[must_use]
    pub fn queue_capacity(&self) -> usize {
        self.queue.capacity()
    }

    /// Queues a payload for this connection without waiting.
    ///
    /// Delivery is best-effort: a full queue drops the payload.
    ///
    /// # Errors
    ///
    /// - [`Error::QueueFull`] if the outbound queue is full
    /// - [`Error::QueueClosed`] if the connection is closing or closed
    pub fn send(&self, payload: impl Into<Bytes>) -> Result<()> {
        self.queue.try_enqueue(payload.into())
    }

    /// Closes the connection.
    ///
    /// Idempotent. The first call closes the outbound queue, fires the
    /// close event and removes the connection from every group and from
    /// the hub. On the close event the write worker sends a Close frame and
    /// shuts its half of the socket without flushing payloads still queued;
    /// the read worker drops its half. Later calls return immediately.
    pub fn close(&self) {
        if self
            .state
            .compare_exchange(
                ConnectionState::OPEN,
                ConnectionState::CLOSING,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            trace!(conn_id = %self.id, "close already in progress");
            return;
        }

        self.queue.close();
        self.close_signal.send_replace(true);

        match self.hub.upgrade() {
            Some(hub) => hub.detach(self),
            None => self.groups.lock().clear(),
        }

        self.state.store(ConnectionState::CLOSED, Ordering::Release);
        info!(conn_id = %self.id, "Connection closed");
    }

    /// Waits until [`close`](Self::close) has been called.
    pub async fn closed(&self) {
        let mut signal = self.close_signal.subscribe();
        // The sender lives as long as `self`, so this only ends on `true`.
        let _ = signal.wait_for(|closed| *closed).await;
    }
}

// ============================================================================
// Connection - Crate API
// ============================================================================

impl Connection {
    /// Subscribes to the close event.
    pub(crate) fn close_events(&self) -> watch::Receiver<bool> {
        self.close_signal.subscribe()
    }

    /// Returns `true` if `hub` is the hub this connection was created for.
    pub(crate) fn belongs_to(&self, hub: &Hub) -> bool {
        std::ptr::eq(self.hub.as_ptr(), hub)
    }

    /// Group membership set, locked by the hub under its own lock.
    pub(crate) fn membership(&self) -> &Mutex<FxHashSet<String>> {
        &self.groups
    }

    /// Runs the handler on one inbound payload.
    ///
    /// Returns `false` if the handler failed and the connection must close.
    pub(crate) fn dispatch(self: &Arc<Self>, payload: Bytes) -> bool {
        let Some(handler) = self.handler.as_ref() else {
            debug!(
                conn_id = %self.id,
                len = payload.len(),
                "No handler installed, discarding message"
            );
            return true;
        };

        match handler.handle_message(self, payload) {
            Ok(Some(response)) if !response.is_empty() => {
                if let Err(e) = self.queue.try_enqueue(response) {
                    warn!(conn_id = %self.id, error = %e, "Dropping handler response");
                }
                true
            }
            Ok(_) => true,
            Err(e) => {
                warn!(conn_id = %self.id, error = %e, "Handler failed, closing connection");
                false
            }
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("queued", &self.queued())
            .field("has_handler", &self.handler.is_some())
            .finish()
    }
}

// ============================================================================
// CloseGuard
// ============================================================================

/// Closes the connection when a pump task ends, including by panic.
pub(crate) struct CloseGuard(pub(crate) Arc<Connection>);

impl Drop for CloseGuard {
    fn drop(&mut self) {
        self.0.close();
    }
}

// ============================================================================
// Tests
// ============================================================================
