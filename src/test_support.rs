//! Shared helpers for in-crate tests.
//!
//! Server sides are driven over `tokio::io::duplex` so most tests run
//! without sockets; the end-to-end server tests reuse the frame helpers
//! over real TCP clients.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{Stream, StreamExt};
use tokio::io::{DuplexStream, duplex};
use tokio::time::{sleep, timeout};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::protocol::Role;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

use crate::hub::Hub;
use crate::protocol::SharedHandler;
use crate::transport::Pumps;

/// In-memory pipe size per direction.
const DUPLEX_BUFFER: usize = 64 * 1024;

/// Upper bound for a single expected frame. Longer than one heartbeat
/// period so paused-clock tests can reach the first ping.
const FRAME_TIMEOUT: Duration = Duration::from_secs(45);

/// Window in which no text frame may arrive.
const SILENCE_WINDOW: Duration = Duration::from_millis(200);

/// Upper bound for hub state to settle.
const SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

/// Attaches a server-side connection to `hub` and returns the client end.
pub(crate) async fn pair(
    hub: &Arc<Hub>,
    handler: Option<SharedHandler>,
    groups: &[&str],
) -> (Pumps, WebSocketStream<DuplexStream>) {
    let (server_io, client_io) = duplex(DUPLEX_BUFFER);
    let server = WebSocketStream::from_raw_socket(server_io, Role::Server, None).await;
    let client = WebSocketStream::from_raw_socket(client_io, Role::Client, None).await;
    (hub.connect(server, handler, groups), client)
}

/// Next frame of any kind, or `None` once the stream ends or errors.
pub(crate) async fn next_frame<S>(stream: &mut S) -> Option<Message>
where
    S: Stream<Item = Result<Message, WsError>> + Unpin,
{
    match timeout(FRAME_TIMEOUT, stream.next()).await {
        Ok(Some(Ok(frame))) => Some(frame),
        Ok(_) => None,
        Err(_) => panic!("no frame within {FRAME_TIMEOUT:?}"),
    }
}

/// Next text frame, skipping heartbeats. `None` on close or end.
pub(crate) async fn recv_text<S>(stream: &mut S) -> Option<String>
where
    S: Stream<Item = Result<Message, WsError>> + Unpin,
{
    loop {
        match next_frame(stream).await? {
            Message::Text(text) => return Some(text.as_str().to_owned()),
            Message::Ping(_) | Message::Pong(_) => continue,
            _ => return None,
        }
    }
}

/// Asserts that no text frame arrives within a short window.
pub(crate) async fn expect_silence<S>(stream: &mut S)
where
    S: Stream<Item = Result<Message, WsError>> + Unpin,
{
    let result = timeout(SILENCE_WINDOW, async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
                other => return other,
            }
        }
    })
    .await;

    if let Ok(Some(Ok(frame))) = result {
        panic!("expected silence, got {frame:?}");
    }
}

/// Polls `condition` until it holds.
pub(crate) async fn wait_until(condition: impl Fn() -> bool) {
    timeout(SETTLE_TIMEOUT, async {
        while !condition() {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

/// Waits until the hub holds exactly `expected` connections.
pub(crate) async fn wait_for_connections(hub: &Arc<Hub>, expected: usize) {
    wait_until(|| hub.connection_count() == expected).await;
}
