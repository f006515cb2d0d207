//! CarbonDB Server Binary
//!
//! Starts a CarbonDB node listening on all interfaces.

use std::sync::Arc;

use carbondb::protocol::DEFAULT_PORT;
use carbondb::{Config, LogStore, Server};
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

/// CarbonDB Server
#[derive(Parser, Debug)]
#[command(name = "carbon-server")]
#[command(about = "Minimal distributed key-value store node")]
#[command(version)]
struct Args {
    /// Port to listen on (all interfaces)
    #[arg(short, long, env = "PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Data directory
    #[arg(short, long, env = "CARBON_DATA_DIR", default_value = "./carbon_data")]
    data_dir: String,

    /// Maximum concurrent connections
    #[arg(short, long, default_value = "1024")]
    max_connections: usize,

    /// Peer connect/handshake timeout in milliseconds
    #[arg(long, default_value = "3000")]
    peer_timeout_ms: u64,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,carbondb=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(true)
        .init();

    let args = Args::parse();

    tracing::info!("CarbonDB v{} is starting", carbondb::VERSION);
    tracing::info!("Data directory: {}", args.data_dir);

    let config = Config::builder()
        .data_dir(&args.data_dir)
        .port(args.port)
        .max_connections(args.max_connections)
        .peer_timeout_ms(args.peer_timeout_ms)
        .build();

    let storage = match LogStore::open(&config) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            tracing::error!("Failed to open storage: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!("Storage ready with {} keys", storage.len());

    let server = match Server::bind(config, storage) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("Failed to bind: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = server.run() {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }

    tracing::info!("Server stopped");
}
