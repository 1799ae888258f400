//! Read and write workers.
//!
//! Every connection runs exactly two tokio tasks over the split WebSocket
//! stream:
//!
//! - **Read worker**: receives frames under a read deadline, renews the
//!   deadline on every pong and hands text/binary payloads to the
//!   connection's handler.
//! - **Write worker**: drains the outbound queue to the socket and sends a
//!   ping every heartbeat period, each write bounded by a write deadline.
//!   On close it sends a Close frame and drops whatever is still queued.
//!
//! Either worker ending closes the connection. [`Pumps::join`] waits for
//! both before the hub forgets the connection.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at, timeout, timeout_at};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::{Message, Utf8Bytes};
use tracing::{debug, error, trace, warn};

use crate::hub::{ConnectionOptions, Hub};

use super::connection::{CloseGuard, Connection};

// ============================================================================
// Pumps
// ============================================================================

/// Join handles for a connection's two workers.
///
/// Dropping `Pumps` detaches the workers; they still close the connection
/// when they end, but the hub only forgets it on [`join`](Self::join) or
/// on close.
#[must_use = "call join() to wait for teardown"]
pub struct Pumps {
    connection: Arc<Connection>,
    hub: Arc<Hub>,
    read: JoinHandle<()>,
    write: JoinHandle<()>,
}

impl Pumps {
    /// Returns the connection these workers drive.
    #[inline]
    #[must_use]
    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    /// Waits for both workers to exit, then unregisters the connection.
    pub async fn join(self) {
        let (read, write) = tokio::join!(self.read, self.write);

        if let Err(e) = read {
            error!(conn_id = %self.connection.id(), error = %e, "Read worker failed");
        }
        if let Err(e) = write {
            error!(conn_id = %self.connection.id(), error = %e, "Write worker failed");
        }

        self.hub.unregister(&self.connection);
        debug!(conn_id = %self.connection.id(), "Connection reclaimed");
    }
}

// ============================================================================
// Spawn
// ============================================================================

/// Splits the stream and starts both workers.
pub(crate) fn spawn<S>(
    hub: Arc<Hub>,
    connection: Arc<Connection>,
    outbound: mpsc::Receiver<Bytes>,
    ws_stream: WebSocketStream<S>,
    options: ConnectionOptions,
) -> Pumps
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (ws_write, ws_read) = ws_stream.split();

    let write = tokio::spawn(run_write_worker(
        Arc::clone(&connection),
        ws_write,
        outbound,
        options,
    ));
    let read = tokio::spawn(run_read_worker(
        Arc::clone(&connection),
        ws_read,
        options,
    ));

    Pumps {
        connection,
        hub,
        read,
        write,
    }
}

// ============================================================================
// Read Worker
// ============================================================================

/// Receives frames until the peer goes away, the deadline passes, the
/// handler fails, or the connection is closed elsewhere.
async fn run_read_worker<S>(
    connection: Arc<Connection>,
    mut ws_read: SplitStream<WebSocketStream<S>>,
    options: ConnectionOptions,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let _guard = CloseGuard(Arc::clone(&connection));
    let mut close_events = connection.close_events();
    let mut deadline = Instant::now() + options.pong_wait;

    loop {
        let frame = tokio::select! {
            _ = close_events.wait_for(|closed| *closed) => {
                trace!(conn_id = %connection.id(), "Read worker saw close event");
                break;
            }
            frame = timeout_at(deadline, ws_read.next()) => frame,
        };

        let payload = match frame {
            Ok(Some(Ok(Message::Text(text)))) => Bytes::from(text),

            Ok(Some(Ok(Message::Binary(data)))) => data,

            Ok(Some(Ok(Message::Pong(_)))) => {
                deadline = Instant::now() + options.pong_wait;
                trace!(conn_id = %connection.id(), "Pong received, read deadline renewed");
                continue;
            }

            Ok(Some(Ok(Message::Close(frame)))) => {
                debug!(conn_id = %connection.id(), ?frame, "WebSocket closed by remote");
                break;
            }

            // Ping is answered by the transport; raw frames never surface on read
            Ok(Some(Ok(Message::Ping(_) | Message::Frame(_)))) => continue,

            Ok(Some(Err(e))) => {
                warn!(conn_id = %connection.id(), error = %e, "Read error");
                break;
            }

            Ok(None) => {
                debug!(conn_id = %connection.id(), "WebSocket stream ended");
                break;
            }

            Err(_) => {
                warn!(
                    conn_id = %connection.id(),
                    timeout_ms = options.pong_wait.as_millis() as u64,
                    "Read deadline exceeded, peer unresponsive"
                );
                break;
            }
        };

        if !connection.dispatch(payload) {
            break;
        }
    }

    debug!(conn_id = %connection.id(), "Read worker terminated");
}

// ============================================================================
// Write Worker
// ============================================================================

/// Drains the outbound queue and sends heartbeats until a write fails or
/// the connection is closed.
///
/// The close event wins over queued payloads: once it fires, anything
/// still buffered is discarded and only a Close frame goes out.
async fn run_write_worker<S>(
    connection: Arc<Connection>,
    mut ws_write: SplitSink<WebSocketStream<S>, Message>,
    mut outbound: mpsc::Receiver<Bytes>,
    options: ConnectionOptions,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let _guard = CloseGuard(Arc::clone(&connection));
    let mut close_events = connection.close_events();
    let mut heartbeat = interval_at(Instant::now() + options.ping_period, options.ping_period);

    loop {
        tokio::select! {
            biased;

            _ = async { let _ = close_events.wait_for(|closed| *closed).await; } => {
                let discarded = outbound.len();
                if discarded > 0 {
                    debug!(conn_id = %connection.id(), discarded, "Discarding queued payloads on close");
                }
                send_close_frame(&connection, &mut ws_write, options).await;
                break;
            }

            payload = outbound.recv() => {
                // The queue only ends inside close(), just before the event fires
                let Some(payload) = payload else {
                    send_close_frame(&connection, &mut ws_write, options).await;
                    break;
                };

                match timeout(options.write_wait, ws_write.send(into_frame(payload))).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        warn!(conn_id = %connection.id(), error = %e, "Write error");
                        break;
                    }
                    Err(_) => {
                        warn!(
                            conn_id = %connection.id(),
                            timeout_ms = options.write_wait.as_millis() as u64,
                            "Write deadline exceeded"
                        );
                        break;
                    }
                }
            }

            _ = heartbeat.tick() => {
                match timeout(options.write_wait, ws_write.send(Message::Ping(Bytes::new()))).await {
                    Ok(Ok(())) => trace!(conn_id = %connection.id(), "Ping sent"),
                    Ok(Err(e)) => {
                        warn!(conn_id = %connection.id(), error = %e, "Ping error");
                        break;
                    }
                    Err(_) => {
                        warn!(conn_id = %connection.id(), "Ping deadline exceeded");
                        break;
                    }
                }
            }
        }
    }

    let _ = timeout(options.write_wait, ws_write.close()).await;
    debug!(conn_id = %connection.id(), "Write worker terminated");
}

/// Sends a Close frame, bounded by the write deadline.
async fn send_close_frame<S>(
    connection: &Connection,
    ws_write: &mut SplitSink<WebSocketStream<S>, Message>,
    options: ConnectionOptions,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    if let Ok(Err(e)) = timeout(options.write_wait, ws_write.send(Message::Close(None))).await {
        trace!(conn_id = %connection.id(), error = %e, "Close frame not sent");
    }
}

/// Text frame for UTF-8 payloads, binary otherwise.
fn into_frame(payload: Bytes) -> Message {
    match Utf8Bytes::try_from(payload.clone()) {
        Ok(text) => Message::Text(text),
        Err(_) => Message::Binary(payload),
    }
}

// ============================================================================
// Tests
// ============================================================================
