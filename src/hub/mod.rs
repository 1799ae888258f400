//! Connection registry and group fan-out.
//!
//! A [`Hub`] tracks every live connection and a set of named groups.
//! Broadcasts enqueue onto each member's outbound queue without waiting;
//! a member whose queue is full misses that payload instead of slowing
//! the sender.
//!
//! # Example
//!
//! ```no_run
//! use rtc_hub::{Hub, Server};
//!
//! # async fn example() -> rtc_hub::Result<()> {
//! let hub = Hub::new();
//! let server = Server::start(hub.clone(), None).await?;
//!
//! hub.create_group("lobby");
//! hub.broadcast("welcome", "lobby");
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Hub builder.
pub mod builder;

/// Hub registry and broadcast.
pub mod core;

/// Per-connection tuning.
pub mod options;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::HubBuilder;
pub use core::Hub;
pub use options::{ConnectionOptions, DEFAULT_PING_PERIOD, DEFAULT_PONG_WAIT, DEFAULT_WRITE_WAIT};
