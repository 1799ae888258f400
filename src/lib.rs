//! rtc-hub - WebSocket connection hub with group broadcast.
//!
//! This library keeps a registry of live WebSocket connections, organizes
//! them into named groups and fans messages out to a group or to everyone
//! without letting one slow client hold up the rest.
//!
//! # Architecture
//!
//! Each attached connection runs two workers over its split stream:
//!
//! - **Read worker**: hands inbound payloads to a [`MessageHandler`] and
//!   enforces the read deadline (renewed by pongs)
//! - **Write worker**: drains the bounded outbound queue and sends
//!   heartbeat pings
//!
//! Key design principles:
//!
//! - The [`Hub`] guards connections and groups with one mutex
//! - Broadcast never blocks: a full queue drops that one delivery
//! - [`Connection::close`] is idempotent and leaves every group
//! - Payloads are opaque bytes; [`Codec`] implementations give them types
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use bytes::Bytes;
//! use rtc_hub::{Connection, Hub, Result, Server, SharedHandler};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let hub = Hub::new();
//!
//!     // Echo every message back to its sender
//!     let echo: SharedHandler = Arc::new(
//!         |_: &Arc<Connection>, payload: Bytes| -> Result<Option<Bytes>> { Ok(Some(payload)) },
//!     );
//!
//!     let server = Server::start(hub.clone(), Some(echo)).await?;
//!     println!("listening on {}", server.ws_url());
//!
//!     // Clients joining with ?group=news receive this
//!     hub.broadcast("hello", "news");
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`error`] | Error types and [`Result`] alias |
//! | [`hub`] | [`Hub`] registry, groups and broadcast |
//! | [`identifiers`] | Connection ids |
//! | [`protocol`] | [`Codec`] and [`MessageHandler`] contracts |
//! | [`transport`] | Connections, workers and the TCP [`Server`] |

// ============================================================================
// Modules
// ============================================================================

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Connection registry and group fan-out.
///
/// Use [`Hub::new()`] or [`Hub::builder()`] to create a hub.
pub mod hub;

/// Connection identifiers.
pub mod identifiers;

/// Payload codecs and message handlers.
pub mod protocol;

/// WebSocket transport layer.
///
/// Connection handles, read/write workers and the accepting server.
pub mod transport;

#[cfg(test)]
mod test_support;

// ============================================================================
// Re-exports
// ============================================================================

// Error types
pub use error::{Error, Result};

// Hub types
pub use hub::{ConnectionOptions, Hub, HubBuilder};

// Identifier types
pub use identifiers::{ConnectionId, IdGenerator};

// Protocol types
pub use protocol::{ByteCodec, Codec, JsonCodec, MessageHandler, SharedHandler};

// Transport types
pub use transport::{Connection, ConnectionState, OutboundQueue, Pumps, Server};
