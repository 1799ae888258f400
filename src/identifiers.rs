//! Type-safe identifiers.
//!
//! Newtype wrappers keep connection identities from being confused with
//! group names or arbitrary strings.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Types
// ============================================================================

/// Generator for connection identifiers.
///
/// Installed on the hub with [`HubBuilder::id_generator`](crate::HubBuilder::id_generator).
/// Must return a process-wide unique string on every call.
pub type IdGenerator = Arc<dyn Fn() -> String + Send + Sync>;

// ============================================================================
// ConnectionId
// ============================================================================

/// Unique, process-wide identifier of a connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Generates a new random identifier (UUID v4).
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wraps an identifier produced elsewhere.
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ConnectionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for ConnectionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_is_unique() {
        let a = ConnectionId::generate();
        let b = ConnectionId::generate();
        assert_ne!(a, b);
        assert!(Uuid::parse_str(a.as_str()).is_ok());
    }

    #[test]
    fn test_display_matches_inner() {
        let id = ConnectionId::new("client-7");
        assert_eq!(id.to_string(), "client-7");
        assert_eq!(id.as_ref(), "client-7");
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let id = ConnectionId::new("abc");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc\"");
    }
}
