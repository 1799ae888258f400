//! Payload contracts consumed by the hub.
//!
//! The core never imposes a schema on payloads. Applications plug in a
//! [`MessageHandler`] for inbound frames and use a [`Codec`] to turn values
//! into outbound payloads.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `codec` | [`Codec`] trait with byte and JSON implementations |
//! | `handler` | [`MessageHandler`] trait for inbound frames |

// ============================================================================
// Submodules
// ============================================================================

/// Value ⇄ payload codecs.
pub mod codec;

/// Inbound message handler contract.
pub mod handler;

// ============================================================================
// Re-exports
// ============================================================================

pub use codec::{ByteCodec, Codec, JsonCodec};
pub use handler::{MessageHandler, SharedHandler};
