//! Connection Handler Module
//!
//! This module manages individual client connections to keyreg.
//! Each client connection is handled by its own async task, so clients
//! only ever coordinate through the shared store.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     TCP Listener                            │
//! │                    (serve)                                  │
//! └──────────────────────┬──────────────────────────────────────┘
//!                        │
//!                        │ accept() + WebSocket upgrade
//!                        ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 ConnectionHandler                           │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐     │
//! │  │ Read frame  │───>│ Decode JSON │───>│ Dispatch    │     │
//! │  └─────────────┘    └─────────────┘    └─────────────┘     │
//! │                                               │             │
//! │                                               ▼             │
//! │                                      ┌─────────────┐        │
//! │                                      │ Send frame  │        │
//! │                                      └─────────────┘        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use keyreg::connection::{serve, ConnectionStats};
//! use keyreg::commands::CommandHandler;
//! use keyreg::storage::{MemoryStore, StoreAdapter};
//! use std::sync::Arc;
//!
//! let handler = CommandHandler::new(StoreAdapter::new(Arc::new(MemoryStore::new())));
//! let stats = Arc::new(ConnectionStats::new());
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
//! serve(listener, handler, stats).await;
//! ```

pub mod handler;

// Re-export commonly used types
pub use handler::{
    handle_connection, serve, ConnectionError, ConnectionHandler, ConnectionStats,
    WEBSOCKET_PATH,
};
