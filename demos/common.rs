//! Shared utilities for the demo servers.
//!
//! Provides common functionality used across all demos:
//! - Command-line argument parsing
//! - Logging initialization
//! - Graceful exit handling

#![allow(dead_code)]

// ============================================================================
// Imports
// ============================================================================

use std::net::{IpAddr, Ipv4Addr};

use tracing_subscriber::EnvFilter;

// ============================================================================
// Constants
// ============================================================================

/// Port used when `--port` is not given.
pub const DEFAULT_PORT: u16 = 8080;

/// Demos listen on every interface.
pub const BIND_IP: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);

// ============================================================================
// Types
// ============================================================================

/// Command-line arguments for demos.
#[derive(Debug, Clone)]
pub struct Args {
    pub debug: bool,
    pub port: u16,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse() -> Self {
        let args: Vec<String> = std::env::args().collect();
        let port = args
            .iter()
            .position(|a| a == "--port")
            .and_then(|i| args.get(i + 1))
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        Self {
            debug: args.iter().any(|a| a == "--debug"),
            port,
        }
    }
}

// ============================================================================
// Functions
// ============================================================================

/// Initialize tracing/logging.
pub fn init_logging(debug: bool) {
    let filter = if debug { "rtc_hub=debug" } else { "rtc_hub=info" };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();
}

/// Wait for Ctrl+C.
pub async fn wait_for_exit() {
    println!("Press Ctrl+C to exit...");
    tokio::signal::ctrl_c().await.ok();
}
