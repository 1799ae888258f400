//! Message handler contract.
//!
//! A handler is the application logic plugged into a connection. The read
//! worker calls it synchronously for every inbound text or binary frame.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use bytes::Bytes;

use crate::error::Result;
use crate::transport::Connection;

// ============================================================================
// MessageHandler
// ============================================================================

/// Processes inbound payloads for a connection.
///
/// Return `Ok(Some(payload))` to queue a response on the same connection,
/// `Ok(None)` to send nothing. Any `Err` is fatal for the connection: the
/// read worker stops and the connection closes. Other connections are not
/// affected.
///
/// Handlers must not block for long; the connection reads nothing else
/// while one is running.
///
/// Closures with the matching signature implement this trait:
///
/// ```ignore
/// let echo = Arc::new(|_conn: &Arc<Connection>, payload: Bytes| Ok(Some(payload)));
/// hub.serve(ws, Some(echo), &[]).await;
/// ```
pub trait MessageHandler: Send + Sync {
    /// Handles one inbound payload.
    ///
    /// # Errors
    ///
    /// Any error closes `connection`.
    fn handle_message(&self, connection: &Arc<Connection>, payload: Bytes)
    -> Result<Option<Bytes>>;
}

impl<F> MessageHandler for F
where
    F: Fn(&Arc<Connection>, Bytes) -> Result<Option<Bytes>> + Send + Sync,
{
    #[inline]
    fn handle_message(
        &self,
        connection: &Arc<Connection>,
        payload: Bytes,
    ) -> Result<Option<Bytes>> {
        self(connection, payload)
    }
}

/// Shared handler reference stored by each connection.
pub type SharedHandler = Arc<dyn MessageHandler>;

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::error::Error;
    use crate::hub::Hub;

    #[test]
    fn test_closure_handler() {
        let hub = Hub::new();
        let (connection, _rx) = Connection::detached(&hub);

        let upper: SharedHandler =
            Arc::new(|_: &Arc<Connection>, payload: Bytes| -> Result<Option<Bytes>> {
                Ok(Some(Bytes::from(payload.to_ascii_uppercase())))
            });

        let reply = upper
            .handle_message(&connection, Bytes::from_static(b"ping"))
            .unwrap();
        assert_eq!(reply, Some(Bytes::from_static(b"PING")));
    }

    #[test]
    fn test_handler_sees_connection_identity() {
        let hub = Hub::new();
        let (connection, _rx) = Connection::detached(&hub);

        let whoami = |conn: &Arc<Connection>, _: Bytes| -> Result<Option<Bytes>> {
            Ok(Some(Bytes::from(conn.id().to_string())))
        };

        let reply = whoami
            .handle_message(&connection, Bytes::new())
            .unwrap()
            .unwrap();
        assert_eq!(&reply[..], connection.id().as_str().as_bytes());
    }

    #[test]
    fn test_handler_error_propagates() {
        let hub = Hub::new();
        let (connection, _rx) = Connection::detached(&hub);

        let strict = |_: &Arc<Connection>, payload: Bytes| -> Result<Option<Bytes>> {
            if payload.as_ref() == b"boom" {
                return Err(Error::handler("refused"));
            }
            Ok(None)
        };

        assert!(strict.handle_message(&connection, Bytes::from_static(b"ok")).is_ok());
        let err = strict
            .handle_message(&connection, Bytes::from_static(b"boom"))
            .unwrap_err();
        assert!(matches!(err, Error::Handler { .. }));
    }
}
