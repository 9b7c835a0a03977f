//! Command Handler Module
//!
//! This module implements the command processing layer for keyreg.
//! It receives decoded commands, executes them against the store adapter,
//! and returns the matching response.
//!
//! ## Architecture
//!
//! ```text
//! Client Frame
//!       │
//!       ▼
//! ┌─────────────────┐
//! │  JSON Codec     │  (protocol module)
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ CommandHandler  │  (this module)
//! │                 │
//! │  - Resolve      │
//! │  - Dispatch     │
//! │  - Render       │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ StoreAdapter    │  (storage module)
//! └─────────────────┘
//! ```
//!
//! ## Supported Commands
//!
//! - `echo`, `count`
//! - `read_identifier`, `is_identifier_exist`
//! - `insert`

pub mod handler;

// Re-export the main command handler
pub use handler::CommandHandler;
