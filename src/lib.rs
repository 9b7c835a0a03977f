//! # keyreg - A Public-Key Registration Service
//!
//! keyreg registers (public key, identifier) pairs and answers lookups over a
//! long-lived WebSocket. Clients send JSON commands and receive one JSON
//! response per command, in order.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              keyreg                                     │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐                  │
//! │  │ TCP + WS    │───>│ Connection  │───>│  Command    │                  │
//! │  │ (Listener)  │    │  Handler    │    │  Handler    │                  │
//! │  └─────────────┘    └─────────────┘    └──────┬──────┘                  │
//! │                                               │                         │
//! │                                               ▼                         │
//! │  ┌─────────────┐    ┌──────────────────────────────────────────────┐   │
//! │  │   JSON      │    │              StoreAdapter                    │   │
//! │  │   Codec     │    │   per-call timeout, blocking pool            │   │
//! │  └─────────────┘    │  ┌────────────────┐   ┌────────────────┐     │   │
//! │                     │  │  MemoryStore   │   │   SledStore    │     │   │
//! │                     │  └────────────────┘   └────────────────┘     │   │
//! │                     └──────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use keyreg::commands::CommandHandler;
//! use keyreg::connection::{serve, ConnectionStats};
//! use keyreg::storage::{MemoryStore, StoreAdapter};
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() {
//!     // One store, shared by every connection
//!     let store = StoreAdapter::new(Arc::new(MemoryStore::new()));
//!     let handler = CommandHandler::new(store);
//!     let stats = Arc::new(ConnectionStats::new());
//!
//!     let listener = TcpListener::bind("127.0.0.1:8080").await.unwrap();
//!     serve(listener, handler, stats).await;
//! }
//! ```
//!
//! ## Supported Commands
//!
//! - `echo`
//! - `count`
//! - `read_identifier` (`key`)
//! - `is_identifier_exist` (`identifier`)
//! - `insert` (`key`, `identifier`)
//!
//! ## Module Overview
//!
//! - [`protocol`]: JSON command/response frames
//! - [`storage`]: Store contract, timeout adapter and backends
//! - [`commands`]: Command dispatcher
//! - [`connection`]: WebSocket connection loop
//!
//! ## Identifier Uniqueness
//!
//! `insert` checks for the identifier before writing, and the store checks
//! again atomically as part of the write. Two clients racing to register the
//! same identifier get exactly one `inserted` between them.

pub mod commands;
pub mod connection;
pub mod protocol;
pub mod storage;

// Re-export commonly used types for convenience
pub use commands::CommandHandler;
pub use connection::{handle_connection, serve, ConnectionStats};
pub use protocol::{Command, ProtocolError, Request, Response};
pub use storage::{KeyStore, MemoryStore, SledStore, StoreAdapter, StoreError};

/// The default port keyreg listens on
pub const DEFAULT_PORT: u16 = 8080;

/// The default host keyreg binds to
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Version of keyreg
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
