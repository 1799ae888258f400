//! Error types for rtc-hub.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use rtc_hub::{Hub, Result};
//!
//! fn build() -> Result<()> {
//!     let hub = Hub::builder().queue_capacity(512).build()?;
//!     hub.create_group("lobby");
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`] |
//! | Application | [`Error::Handler`], [`Error::Codec`] |
//! | Backpressure | [`Error::QueueFull`], [`Error::QueueClosed`] |
//! | Transport | [`Error::Io`], [`Error::WebSocket`] |
//! | Serialization | [`Error::Json`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when hub or connection options are invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Application Errors
    // ========================================================================
    /// Message handler failure.
    ///
    /// Fatal for the connection whose frame was being handled.
    #[error("Handler error: {message}")]
    Handler {
        /// Description of the handler failure.
        message: String,
    },

    /// Codec failure while encoding or decoding a payload.
    #[error("Codec error ({codec}): {message}")]
    Codec {
        /// Type tag of the codec that failed.
        codec: &'static str,
        /// Description of the codec failure.
        message: String,
    },

    // ========================================================================
    // Backpressure Errors
    // ========================================================================
    /// Outbound queue is full; the payload was dropped.
    #[error("Outbound queue full (capacity {capacity})")]
    QueueFull {
        /// Fixed capacity of the queue.
        capacity: usize,
    },

    /// Outbound queue is closed; the payload was dropped.
    #[error("Outbound queue closed")]
    QueueClosed,

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error, including a failed upgrade handshake.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a handler error.
    #[inline]
    pub fn handler(message: impl Into<String>) -> Self {
        Self::Handler {
            message: message.into(),
        }
    }

    /// Creates a codec error.
    #[inline]
    pub fn codec(codec: &'static str, message: impl Into<String>) -> Self {
        Self::Codec {
            codec,
            message: message.into(),
        }
    }

    /// Creates a queue full error.
    #[inline]
    pub fn queue_full(capacity: usize) -> Self {
        Self::QueueFull { capacity }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a transport error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Self::Io(_) | Self::WebSocket(_))
    }

    /// Returns `true` if the payload was dropped by an outbound queue.
    #[inline]
    #[must_use]
    pub fn is_backpressure(&self) -> bool {
        matches!(self, Self::QueueFull { .. } | Self::QueueClosed)
    }
}

// ============================================================================
// Tests
// ============================================================================
