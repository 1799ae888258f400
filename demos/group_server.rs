//! Group chat server.
//!
//! Demonstrates:
//! - Joining and leaving groups at runtime
//! - Broadcasting typed values to one group
//!
//! Clients send JSON actions:
//!
//! ```text
//! {"action":"join","group":"room1"}
//! {"action":"message","group":"room1","message":"hi"}
//! {"action":"leave","group":"room1"}
//! ```
//!
//! Usage:
//!   cargo run --example group_server
//!   cargo run --example group_server -- --port 9000 --debug

mod common;

// ============================================================================
// Imports
// ============================================================================

use std::sync::{Arc, Weak};

use bytes::Bytes;
use common::{Args, BIND_IP};
use rtc_hub::{Codec, Connection, Hub, JsonCodec, MessageHandler, Result, Server, SharedHandler};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

// ============================================================================
// Types
// ============================================================================

/// Client request.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
enum Action {
    Join { group: String },
    Leave { group: String },
    Message { group: String, message: String },
}

/// Message delivered to group members.
#[derive(Debug, Serialize, Deserialize)]
struct Chat {
    from: String,
    message: String,
}

/// Handles join/leave/message actions against the hub.
struct GroupHandler {
    hub: Weak<Hub>,
    actions: JsonCodec<Action>,
    chats: JsonCodec<Chat>,
}

impl MessageHandler for GroupHandler {
    fn handle_message(&self, connection: &Arc<Connection>, payload: Bytes) -> Result<Option<Bytes>> {
        let Some(hub) = self.hub.upgrade() else {
            return Ok(None);
        };

        // Malformed input closes the sender
        match self.actions.deserialize(&payload)? {
            Action::Join { group } => {
                hub.add_to_group(&group, connection);
                info!(conn_id = %connection.id(), %group, "Joined group");
            }
            Action::Leave { group } => {
                hub.remove_from_group(&group, connection);
                info!(conn_id = %connection.id(), %group, "Left group");
            }
            Action::Message { group, message } => {
                let chat = Chat {
                    from: connection.id().to_string(),
                    message,
                };
                let delivered = hub.broadcast_value(&self.chats, &chat, &group)?;
                if delivered == 0 {
                    warn!(%group, "Message reached nobody");
                }
            }
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
    println!("=== Group Server ===\n");

    let hub = Hub::new();
    let handler: SharedHandler = Arc::new(GroupHandler {
        hub: Arc::downgrade(&hub),
        actions: JsonCodec::new(),
        chats: JsonCodec::new(),
    });

    let server = Server::bind(Arc::clone(&hub), Some(handler), BIND_IP, args.port).await?;
    println!("    ✓ Listening on {}\n", server.ws_url());

    common::wait_for_exit().await;

    server.shutdown().await;
    hub.clear_connections();
    Ok(())
}
