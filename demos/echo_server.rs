//! Echo server.
//!
//! Demonstrates:
//! - Starting a server with a closure handler
//! - Replying to the sender by returning a payload
//!
//! Usage:
//!   cargo run --example echo_server
//!   cargo run --example echo_server -- --port 9000 --debug

mod common;

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use bytes::Bytes;
use common::{Args, BIND_IP};
use rtc_hub::{Connection, Hub, Result, Server, SharedHandler};

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
    println!("=== Echo Server ===\n");

    let hub = Hub::new();
    let echo: SharedHandler = Arc::new(
        |_: &Arc<Connection>, payload: Bytes| -> Result<Option<Bytes>> { Ok(Some(payload)) },
    );

    let server = Server::bind(Arc::clone(&hub), Some(echo), BIND_IP, args.port).await?;
    println!("    ✓ Listening on {}\n", server.ws_url());

    common::wait_for_exit().await;

    server.shutdown().await;
    hub.clear_connections();
    Ok(())
}
