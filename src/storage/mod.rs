//! Storage Module
//!
//! This module holds the store boundary used by the command dispatcher and
//! the two backends that implement it.
//!
//! ## Architecture
//!
//! ```text
//!              ┌───────────────────────────┐
//!              │     CommandHandler        │
//!              └─────────────┬─────────────┘
//!                            │ async, timeout-bounded
//!                            ▼
//!              ┌───────────────────────────┐
//!              │      StoreAdapter         │
//!              │  (spawn_blocking + timer) │
//!              └─────────────┬─────────────┘
//!                            │ dyn KeyStore
//!               ┌────────────┴────────────┐
//!               ▼                         ▼
//!        ┌─────────────┐          ┌─────────────┐
//!        │ MemoryStore │          │ SledStore   │
//!        │ 64 shards   │          │ on disk     │
//!        └─────────────┘          └─────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use keyreg::storage::{KeyRecord, KeyStore, MemoryStore};
//!
//! let store = MemoryStore::new();
//! store.insert(KeyRecord::new("pk1", "alice")).unwrap();
//! assert!(store.exists_identifier("alice").unwrap());
//! assert_eq!(store.count().unwrap(), 1);
//! ```

pub mod engine;
pub mod sled;
pub mod store;

// Re-export commonly used types
pub use self::sled::SledStore;
pub use engine::MemoryStore;
pub use store::{
    InsertOutcome, KeyRecord, KeyStore, StoreAdapter, StoreError, StoreResult,
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_OP_TIMEOUT,
};
