//! Per-connection options.
//!
//! Controls the outbound queue size and the heartbeat timing every
//! connection attached to a hub uses.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use rtc_hub::ConnectionOptions;
//!
//! let options = ConnectionOptions::new()
//!     .with_queue_capacity(1024)
//!     .with_ping_period(Duration::from_secs(15))
//!     .with_pong_wait(Duration::from_secs(30));
//!
//! options.validate()?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use crate::error::{Error, Result};
use crate::transport::queue::DEFAULT_QUEUE_CAPACITY;

// ============================================================================
// Constants
// ============================================================================

/// Read deadline window, renewed on every pong.
pub const DEFAULT_PONG_WAIT: Duration = Duration::from_secs(60);

/// Interval between heartbeat pings. Must be shorter than the pong wait.
pub const DEFAULT_PING_PERIOD: Duration = Duration::from_secs(30);

/// Deadline for a single frame write.
pub const DEFAULT_WRITE_WAIT: Duration = Duration::from_secs(10);

// ============================================================================
// ConnectionOptions
// ============================================================================

/// Queue and heartbeat configuration shared by a hub's connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionOptions {
    /// Outbound queue capacity in payloads.
    pub queue_capacity: usize,

    /// Read deadline window. Only a pong from the peer renews it; data
    /// frames do not.
    pub pong_wait: Duration,

    /// Interval between pings sent by the write worker.
    pub ping_period: Duration,

    /// Deadline for each frame write.
    pub write_wait: Duration,
}

// ============================================================================
// Constructors
// ============================================================================

impl ConnectionOptions {
    /// Creates options with the default timings.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            pong_wait: DEFAULT_PONG_WAIT,
            ping_period: DEFAULT_PING_PERIOD,
            write_wait: DEFAULT_WRITE_WAIT,
        }
    }
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl ConnectionOptions {
    /// Sets the outbound queue capacity.
    #[inline]
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Sets the read deadline window.
    #[inline]
    #[must_use]
    pub fn with_pong_wait(mut self, pong_wait: Duration) -> Self {
        self.pong_wait = pong_wait;
        self
    }

    /// Sets the heartbeat interval.
    #[inline]
    #[must_use]
    pub fn with_ping_period(mut self, ping_period: Duration) -> Self {
        self.ping_period = ping_period;
        self
    }

    /// Sets the per-write deadline.
    #[inline]
    #[must_use]
    pub fn with_write_wait(mut self, write_wait: Duration) -> Self {
        self.write_wait = write_wait;
        self
    }
}

// ============================================================================
// Validation
// ============================================================================

impl ConnectionOptions {
    /// Checks the options for consistency.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the queue capacity or any duration is
    /// zero, or if the ping period is not shorter than the pong wait (a
    /// healthy peer would then time out between pings).
    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(Error::config(
                "queue capacity must be greater than zero",
            ));
        }

        if self.pong_wait.is_zero() || self.ping_period.is_zero() || self.write_wait.is_zero() {
            return Err(Error::config(
                "pong wait, ping period and write wait must be non-zero",
            ));
        }

        if self.ping_period >= self.pong_wait {
            return Err(Error::config(format!(
                "ping period ({:?}) must be shorter than pong wait ({:?})",
                self.ping_period, self.pong_wait
            )));
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
