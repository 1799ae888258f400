//! Broadcast server.
//!
//! Demonstrates:
//! - A handler that fans every message out to all clients
//! - Serializing structured payloads with `JsonCodec`
//!
//! Usage:
//!   cargo run --example broadcast_server
//!   cargo run --example broadcast_server -- --port 9000 --debug

mod common;

// ============================================================================
// Imports
// ============================================================================

use std::sync::{Arc, Weak};

use bytes::Bytes;
use common::{Args, BIND_IP};
use rtc_hub::{Codec, Connection, Hub, JsonCodec, MessageHandler, Result, Server, SharedHandler};
use serde::{Deserialize, Serialize};
use tracing::info;

// ============================================================================
// Types
// ============================================================================

/// Message relayed to every client.
#[derive(Debug, Serialize, Deserialize)]
struct Relayed {
    id: String,
    message: String,
}

/// Relays each inbound message to all connections.
struct BroadcastHandler {
    hub: Weak<Hub>,
    codec: JsonCodec<Relayed>,
}

impl MessageHandler for BroadcastHandler {
    fn handle_message(&self, connection: &Arc<Connection>, payload: Bytes) -> Result<Option<Bytes>> {
        let relayed = Relayed {
            id: connection.id().to_string(),
            message: String::from_utf8_lossy(&payload).into_owned(),
        };
        let data = self.codec.serialize(&relayed)?;

        if let Some(hub) = self.hub.upgrade() {
            let delivered = hub.broadcast_all(data);
            info!(from = %connection.id(), delivered, "Relayed message");
        }

        Ok(None)
    }
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let args = Args::parse();
    common::init_logging(args.debug);

    if let Err(e) = run(args).await {
        eprintln!("\n[ERROR] {e}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    println!("=== Broadcast Server ===\n");

    let hub = Hub::new();
    let handler: SharedHandler = Arc::new(BroadcastHandler {
        hub: Arc::downgrade(&hub),
        codec: JsonCodec::new(),
    });

    let server = Server::bind(Arc::clone(&hub), Some(handler), BIND_IP, args.port).await?;
    println!("    ✓ Listening on {}\n", server.ws_url());

    common::wait_for_exit().await;

    server.shutdown().await;
    hub.clear_connections();
    Ok(())
}
