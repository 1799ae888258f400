//! Bounded outbound queue.
//!
//! Each connection owns one queue. Any number of producers (its own read
//! worker, broadcasts, direct sends) enqueue without blocking; only the
//! connection's write worker dequeues.
//!
//! # Drop Policy
//!
//! When the queue is full the payload is rejected with
//! [`Error::QueueFull`] and the caller logs and moves on. A slow peer never
//! stalls the read path or a broadcast.

// ============================================================================
// Imports
// ============================================================================

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default number of payloads buffered per connection.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

// ============================================================================
// OutboundQueue
// ============================================================================

/// Producer side of a connection's bounded FIFO.
///
/// Closing drops the only sender, so the write worker drains what is
/// already buffered and then observes the end of the queue.
#[derive(Debug)]
pub struct OutboundQueue {
    /// `None` once closed.
    sender: Mutex<Option<mpsc::Sender<Bytes>>>,
    /// Fixed capacity.
    capacity: usize,
}

impl OutboundQueue {
    /// Creates a queue and the receiver its write worker drains.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero. [`ConnectionOptions::validate`](crate::ConnectionOptions::validate)
    /// rejects that before any queue is built.
    #[must_use]
    pub fn bounded(capacity: usize) -> (Self, mpsc::Receiver<Bytes>) {
        let (sender, receiver) = mpsc::channel(capacity);
        let queue = Self {
            sender: Mutex::new(Some(sender)),
            capacity,
        };
        (queue, receiver)
    }

    /// Enqueues a payload without waiting.
    ///
    /// # Errors
    ///
    /// - [`Error::QueueFull`] if `capacity` payloads are already buffered
    /// - [`Error::QueueClosed`] if the queue was closed
    pub fn try_enqueue(&self, payload: Bytes) -> Result<()> {
        let guard = self.sender.lock();
        let Some(sender) = guard.as_ref() else {
            return Err(Error::QueueClosed);
        };

        match sender.try_send(payload) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(Error::queue_full(self.capacity)),
            Err(TrySendError::Closed(_)) => Err(Error::QueueClosed),
        }
    }

    /// Closes the queue.
    ///
    /// Returns `true` only for the call that actually closed it.
    pub fn close(&self) -> bool {
        self.sender.lock().take().is_some()
    }

    /// Returns `true` once the queue is closed.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.lock().is_none()
    }

    /// Returns the number of buffered payloads (0 once closed).
    #[must_use]
    pub fn len(&self) -> usize {
        self.sender
            .lock()
            .as_ref()
            .map_or(0, |sender| self.capacity - sender.capacity())
    }

    /// Returns `true` if nothing is buffered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the fixed capacity.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}

// ============================================================================
// Tests
// ============================================================================
