//! WebSocket server front end.
//!
//! Binds a TCP listener, upgrades each accepted socket with
//! `tokio-tungstenite`, and hands the stream to a [`Hub`]. The upgrade
//! handshake itself belongs to `tokio-tungstenite`; failures there are
//! logged and the socket is dropped without touching the hub.
//!
//! # Connection Flow
//!
//! 1. `Server::bind` - Bind to the given address and start the accept loop
//! 2. Client connects to `ws://host:port/path?group=a&group=b`
//! 3. Upgrade completes, every `group` query parameter is collected
//! 4. `Hub::serve` registers the connection, joins the groups and runs
//!    the pumps until teardown

// ============================================================================
// Imports
// ============================================================================

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::result::Result as StdResult;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::hub::Hub;
use crate::protocol::SharedHandler;

// ============================================================================
// Constants
// ============================================================================

/// Default bind address (localhost).
const DEFAULT_BIND_IP: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

/// How often the accept loop re-checks the shutdown flag.
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Query parameter naming a group to join on connect.
const GROUP_QUERY_PARAM: &str = "group";

// ============================================================================
// Server
// ============================================================================

/// Accepts WebSocket clients and attaches them to a hub.
///
/// # Example
///
/// ```ignore
/// let hub = Hub::new();
/// let server = Server::bind(hub.clone(), Some(handler), IpAddr::V4(Ipv4Addr::UNSPECIFIED), 8080).await?;
/// println!("listening on {}", server.ws_url());
/// ```
pub struct Server {
    /// Port the listener is bound to.
    port: u16,
    /// Bound address.
    ip: IpAddr,
    /// Hub receiving accepted connections.
    hub: Arc<Hub>,
    /// Handler installed on every accepted connection.
    handler: Option<SharedHandler>,
    /// Shutdown flag.
    shutdown: AtomicBool,
    /// Accept loop task, taken on shutdown.
    accept_task: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

// ============================================================================
// Server - Constructor
// ============================================================================

impl Server {
    /// Binds to `localhost` on a random port and starts accepting.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::Error::Io) if binding fails.
    pub async fn start(hub: Arc<Hub>, handler: Option<SharedHandler>) -> Result<Arc<Self>> {
        Self::bind(hub, handler, DEFAULT_BIND_IP, 0).await
    }

    /// Binds to a specific IP and port and starts accepting.
    ///
    /// # Arguments
    ///
    /// * `hub` - Hub that owns accepted connections
    /// * `handler` - Handler for every accepted connection
    /// * `ip` - IP address to bind to
    /// * `port` - Port to bind to (0 for random)
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::Error::Io) if binding fails.
    pub async fn bind(
        hub: Arc<Hub>,
        handler: Option<SharedHandler>,
        ip: IpAddr,
        port: u16,
    ) -> Result<Arc<Self>> {
        let listener = TcpListener::bind(SocketAddr::new(ip, port)).await?;
        let actual_port = listener.local_addr()?.port();

        let server = Arc::new(Self {
            port: actual_port,
            ip,
            hub,
            handler,
            shutdown: AtomicBool::new(false),
            accept_task: Mutex::new(None),
        });

        let accept = tokio::spawn(Arc::clone(&server).accept_loop(listener));
        *server.accept_task.lock() = Some(accept);

        info!(%ip, port = actual_port, "WebSocket server started");

        Ok(server)
    }
}

// ============================================================================
// Server - Public API
// ============================================================================

impl Server {
    /// Returns the port the server is bound to.
    #[inline]
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Returns the bound socket address.
    #[inline]
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.port)
    }

    /// Returns the WebSocket URL for this server.
    ///
    /// Unspecified bind addresses are reported as loopback.
    #[must_use]
    pub fn ws_url(&self) -> String {
        let host = if self.ip.is_unspecified() {
            DEFAULT_BIND_IP
        } else {
            self.ip
        };
        format!("ws://{}", SocketAddr::new(host, self.port))
    }

    /// Returns the hub accepted connections are attached to.
    #[inline]
    #[must_use]
    pub fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }

    /// Stops accepting new connections.
    ///
    /// Connections already attached keep running.
    pub async fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);

        let task = self.accept_task.lock().take();
        if let Some(task) = task
            && let Err(e) = task.await
        {
            error!(error = %e, "Accept loop failed");
        }

        info!(port = self.port, "WebSocket server stopped");
    }
}

// ============================================================================
// Server - Accept Loop
// ============================================================================

impl Server {
    /// Background task that accepts new connections.
    async fn accept_loop(self: Arc<Self>, listener: TcpListener) {
        debug!("Accept loop started");

        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                debug!("Accept loop shutting down");
                break;
            }

            // Accept with timeout to allow checking shutdown flag
            match timeout(ACCEPT_POLL_INTERVAL, listener.accept()).await {
                Ok(Ok((stream, addr))) => {
                    let server = Arc::clone(&self);
                    tokio::spawn(async move {
                        if let Err(e) = server.handle_connection(stream, addr).await {
                            warn!(error = %e, ?addr, "Connection handling failed");
                        }
                    });
                }
                Ok(Err(e)) => {
                    error!(error = %e, "Accept failed");
                }
                Err(_) => continue,
            }
        }

        debug!("Accept loop terminated");
    }

    /// Upgrades one socket and serves it until teardown.
    async fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) -> Result<()> {
        debug!(?addr, "New TCP connection");

        let mut groups = Vec::new();
        let ws_stream = accept_hdr_async(
            stream,
            |request: &Request, response: Response| -> StdResult<Response, ErrorResponse> {
                groups = groups_from_query(request.uri().query());
                Ok(response)
            },
        )
        .await
        .inspect_err(|e| debug!(?addr, error = %e, "WebSocket upgrade failed"))?;

        debug!(?addr, ?groups, "WebSocket upgrade complete");

        let id = self
            .hub
            .serve(ws_stream, self.handler.clone(), groups.as_slice())
            .await;

        debug!(conn_id = %id, ?addr, "Connection finished");
        Ok(())
    }
}

/// Collects every `group` parameter from a request query string.
fn groups_from_query(query: Option<&str>) -> Vec<String> {
    let Some(query) = query else {
        return Vec::new();
    };

    url::form_urlencoded::parse(query.as_bytes())
        .filter(|(key, value)| key == GROUP_QUERY_PARAM && !value.is_empty())
        .map(|(_, value)| value.into_owned())
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
