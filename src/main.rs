//! keyreg - A Public-Key Registration Service
//!
//! This is the main entry point for the keyreg server.
//! It parses configuration, opens the store, and accepts WebSocket clients.

use anyhow::Context;
use clap::{Parser, ValueEnum};
use keyreg::commands::CommandHandler;
use keyreg::connection::{serve, ConnectionStats, WEBSOCKET_PATH};
use keyreg::storage::{
    KeyStore, MemoryStore, SledStore, StoreAdapter, DEFAULT_CONNECT_TIMEOUT, DEFAULT_OP_TIMEOUT,
};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Which backend holds the key records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StoreKind {
    /// Process memory; records are lost on exit
    Memory,
    /// sled database on disk
    Sled,
}

/// Server configuration
#[derive(Debug, Parser)]
#[command(name = "keyreg", version, about = "Public-key registration over WebSocket")]
struct Config {
    /// Host to bind to
    #[arg(long, env = "ADDR", default_value = keyreg::DEFAULT_HOST)]
    addr: String,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = keyreg::DEFAULT_PORT)]
    port: u16,

    /// Record store backend
    #[arg(long, value_enum, default_value_t = StoreKind::Sled)]
    store: StoreKind,

    /// Directory of the sled database
    #[arg(long, env = "KEYREG_DB_PATH", default_value = "keyreg-db")]
    db_path: PathBuf,

    /// Seconds allowed for opening the store
    #[arg(long, default_value_t = DEFAULT_CONNECT_TIMEOUT.as_secs())]
    connect_timeout_secs: u64,

    /// Seconds allowed for each store read or write
    #[arg(long, default_value_t = DEFAULT_OP_TIMEOUT.as_secs())]
    op_timeout_secs: u64,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Config {
    /// Returns the bind address as a string
    fn bind_address(&self) -> String {
        format!("{}:{}", self.addr, self.port)
    }
}

/// Opens the configured store, giving up after the connect timeout.
async fn open_store(config: &Config) -> anyhow::Result<Arc<dyn KeyStore>> {
    match config.store {
        StoreKind::Memory => Ok(Arc::new(MemoryStore::new())),
        StoreKind::Sled => {
            let path = config.db_path.clone();
            let timeout = Duration::from_secs(config.connect_timeout_secs);

            let opened = tokio::time::timeout(
                timeout,
                tokio::task::spawn_blocking(move || SledStore::open(path)),
            )
            .await
            .with_context(|| format!("timed out opening store after {:?}", timeout))?
            .context("store open task failed")?
            .with_context(|| format!("failed to open store at {}", config.db_path.display()))?;

            Ok(Arc::new(opened))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Set up logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .context("invalid log filter")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(version = keyreg::VERSION, store = ?config.store, "Starting keyreg");

    // Open the store once; every connection shares it
    let store = open_store(&config).await?;
    let adapter =
        StoreAdapter::with_timeout(store, Duration::from_secs(config.op_timeout_secs));
    let handler = CommandHandler::new(adapter);

    let stats = Arc::new(ConnectionStats::new());

    let listener = TcpListener::bind(config.bind_address())
        .await
        .with_context(|| format!("failed to bind {}", config.bind_address()))?;
    info!(
        "Listening on ws://{}{}",
        config.bind_address(),
        WEBSOCKET_PATH
    );

    // Set up graceful shutdown
    let shutdown = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
        info!("Shutdown signal received, stopping server...");
    };

    tokio::select! {
        _ = serve(listener, handler, Arc::clone(&stats)) => {}
        _ = shutdown => {}
    }

    info!(
        connections = stats.connections_accepted.load(Ordering::Relaxed),
        frames = stats.frames_received.load(Ordering::Relaxed),
        decode_failures = stats.decode_failures.load(Ordering::Relaxed),
        "Server shutdown complete"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_defaults_follow_store_constants() {
        let config = Config::try_parse_from(["keyreg"]).unwrap();

        assert_eq!(
            Duration::from_secs(config.connect_timeout_secs),
            DEFAULT_CONNECT_TIMEOUT
        );
        assert_eq!(Duration::from_secs(config.op_timeout_secs), DEFAULT_OP_TIMEOUT);
    }

    #[test]
    fn test_timeouts_override() {
        let config = Config::try_parse_from([
            "keyreg",
            "--connect-timeout-secs",
            "3",
            "--op-timeout-secs",
            "5",
        ])
        .unwrap();

        assert_eq!(config.connect_timeout_secs, 3);
        assert_eq!(config.op_timeout_secs, 5);
    }
}
