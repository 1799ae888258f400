//! WebSocket transport layer.
//!
//! Everything between a raw `WebSocketStream` and the hub: the per-connection
//! outbound queue, the connection handle itself, the two workers that move
//! frames, and an optional TCP front end.
//!
//! # Architecture
//!
//! ```text
//!                    ┌──────────────── Connection ────────────────┐
//!  Hub::broadcast ──►│ OutboundQueue ──► write worker ──► sink    │──► client
//!  Connection::send ►│                    (pings, deadlines)      │
//!                    │ handler ◄──────── read worker ◄── stream   │◄── client
//!                    └────────────────────────────────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `Hub::connect` - Register, join groups, spawn both workers
//! 2. Workers run until the peer leaves, a deadline passes, a handler
//!    fails or `Connection::close` is called
//! 3. `Connection::close` - Close the queue, signal the workers, leave
//!    every group and the hub
//! 4. `Pumps::join` - Wait for both workers to finish
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | Connection handle and close state |
//! | `pump` | Read and write workers |
//! | `queue` | Bounded outbound queue |
//! | `server` | TCP listener and WebSocket upgrade |

// ============================================================================
// Submodules
// ============================================================================

/// Connection handle and close state.
pub mod connection;

/// Read and write workers.
pub mod pump;

/// Bounded outbound queue.
pub mod queue;

/// TCP listener and WebSocket upgrade.
pub mod server;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::{Connection, ConnectionState};
pub use pump::Pumps;
pub use queue::{DEFAULT_QUEUE_CAPACITY, OutboundQueue};
pub use server::Server;
