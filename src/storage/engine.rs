//! Sharded In-Memory Record Store
//!
//! `MemoryStore` keeps every key record in process memory. It is the backend
//! used by tests and benchmarks, and by the server when started with
//! `--store memory`.
//!
//! ## Design Decisions
//!
//! 1. **Sharded Locks**: Records are spread over 64 shards to reduce contention.
//! 2. **Identifier-Owned Records**: A record lives in the shard of its identifier,
//!    so the uniqueness check and the write happen under one write lock.
//! 3. **First Writer Wins**: The public-key index keeps the first identifier
//!    registered for a key, matching a find-one lookup over insertion order.
//!
//! ## Concurrency Model
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      MemoryStore                            │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │ Shard N │           │
//! │  │ records │ │ records │ │ records │ │ records │  by ident │
//! │  │ keys    │ │ keys    │ │ keys    │ │ keys    │  by pk    │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use crate::storage::store::{InsertOutcome, KeyRecord, KeyStore, StoreError, StoreResult};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

/// Number of shards for the store.
const NUM_SHARDS: usize = 64;

/// A single shard containing a portion of the records and of the key index.
#[derive(Debug, Default)]
struct Shard {
    /// identifier -> public key
    records: RwLock<HashMap<String, String>>,
    /// public key -> first identifier registered for it
    keys: RwLock<HashMap<String, String>>,
}

/// Thread-safe in-memory implementation of [`KeyStore`].
///
/// # Example
///
/// ```
/// use keyreg::storage::{InsertOutcome, KeyRecord, KeyStore, MemoryStore};
///
/// let store = MemoryStore::new();
/// let outcome = store.insert(KeyRecord::new("pk1", "alice")).unwrap();
/// assert_eq!(outcome, InsertOutcome::Inserted);
/// assert_eq!(store.find_by_key("pk1").unwrap(), Some("alice".to_string()));
/// ```
pub struct MemoryStore {
    shards: Vec<Shard>,

    /// Number of records currently stored
    record_count: AtomicU64,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("shards", &self.shards.len())
            .field("record_count", &self.record_count.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: PoisonError<T>) -> StoreError {
    StoreError::Unavailable("memory store lock poisoned".into())
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            shards: (0..NUM_SHARDS).map(|_| Shard::default()).collect(),
            record_count: AtomicU64::new(0),
        }
    }

    #[inline]
    fn shard_index(&self, value: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        (hasher.finish() as usize) % NUM_SHARDS
    }

    #[inline]
    fn get_shard(&self, value: &str) -> &Shard {
        &self.shards[self.shard_index(value)]
    }

    pub fn len(&self) -> u64 {
        self.record_count.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyStore for MemoryStore {
    fn count(&self) -> StoreResult<u64> {
        Ok(self.len())
    }

    fn find_by_key(&self, key: &str) -> StoreResult<Option<String>> {
        let keys = self.get_shard(key).keys.read().map_err(poisoned)?;
        Ok(keys.get(key).cloned())
    }

    fn exists_identifier(&self, identifier: &str) -> StoreResult<bool> {
        let records = self.get_shard(identifier).records.read().map_err(poisoned)?;
        Ok(records.contains_key(identifier))
    }

    fn insert(&self, record: KeyRecord) -> StoreResult<InsertOutcome> {
        let KeyRecord {
            public_key,
            identifier,
        } = record;

        // Lock order is always records then keys. Both guards are held before
        // anything is written, so a failure leaves no partial record behind.
        let mut records = self
            .get_shard(&identifier)
            .records
            .write()
            .map_err(poisoned)?;

        let slot = match records.entry(identifier.clone()) {
            Entry::Occupied(_) => return Ok(InsertOutcome::AlreadyExists),
            Entry::Vacant(slot) => slot,
        };

        let mut keys = self.get_shard(&public_key).keys.write().map_err(poisoned)?;

        slot.insert(public_key.clone());
        keys.entry(public_key).or_insert(identifier);
        self.record_count.fetch_add(1, Ordering::Relaxed);

        Ok(InsertOutcome::Inserted)
    }
}
