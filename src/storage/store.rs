//! Store Contract and Timeout-Bounded Adapter
//!
//! This module defines the boundary between the command dispatcher and the
//! concrete record store. Backends implement the synchronous [`KeyStore`]
//! trait; the dispatcher only ever talks to a [`StoreAdapter`], which runs
//! each call on Tokio's blocking pool under its own deadline.
//!
//! ## Outcomes
//!
//! Every operation returns a tagged result so callers can tell the three
//! cases apart:
//!
//! ```text
//! find_by_key(key)
//!     Ok(Some(identifier))  -> found
//!     Ok(None)              -> not found
//!     Err(StoreError)       -> store unavailable / timed out
//! ```
//!
//! How each case is rendered on the wire is the dispatcher's decision.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// Default deadline for a single read or write against the store.
pub const DEFAULT_OP_TIMEOUT: Duration = Duration::from_secs(30);

/// Default deadline for opening the store at startup.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// A stored (public key, identifier) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRecord {
    pub public_key: String,
    pub identifier: String,
}

impl KeyRecord {
    pub fn new(public_key: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            public_key: public_key.into(),
            identifier: identifier.into(),
        }
    }
}

/// Result of an insert attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// A new record was written.
    Inserted,
    /// Another record already owns the identifier; nothing was written.
    AlreadyExists,
}

/// Errors surfaced by a store backend or by the adapter around it.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    /// The backend could not serve the request
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The call did not finish before its deadline
    #[error("store call timed out after {0:?}")]
    Timeout(Duration),

    /// The blocking task running the call panicked or was cancelled
    #[error("store task failed: {0}")]
    Task(String),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// The operations the dispatcher needs from a persistent record store.
///
/// Implementations must be safe to share between connections. `insert`
/// must enforce identifier uniqueness atomically: two concurrent inserts
/// for the same identifier may not both report [`InsertOutcome::Inserted`].
pub trait KeyStore: Send + Sync {
    /// Total number of records.
    fn count(&self) -> StoreResult<u64>;

    /// Exact match on the public key.
    fn find_by_key(&self, key: &str) -> StoreResult<Option<String>>;

    /// True if any record carries this identifier.
    fn exists_identifier(&self, identifier: &str) -> StoreResult<bool>;

    /// Appends a record unless the identifier is already taken.
    fn insert(&self, record: KeyRecord) -> StoreResult<InsertOutcome>;
}

/// Shared, timeout-bounded handle to a [`KeyStore`].
///
/// Cloning is cheap; every connection holds its own clone of the same
/// underlying store.
#[derive(Clone)]
pub struct StoreAdapter {
    store: Arc<dyn KeyStore>,
    op_timeout: Duration,
}

impl std::fmt::Debug for StoreAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreAdapter")
            .field("op_timeout", &self.op_timeout)
            .finish()
    }
}

impl StoreAdapter {
    /// Wraps a store using [`DEFAULT_OP_TIMEOUT`].
    pub fn new(store: Arc<dyn KeyStore>) -> Self {
        Self::with_timeout(store, DEFAULT_OP_TIMEOUT)
    }

    /// Wraps a store with a custom per-operation deadline.
    pub fn with_timeout(store: Arc<dyn KeyStore>, op_timeout: Duration) -> Self {
        Self { store, op_timeout }
    }

    pub async fn count(&self) -> StoreResult<u64> {
        self.run("count", |store| store.count()).await
    }

    pub async fn find_by_key(&self, key: &str) -> StoreResult<Option<String>> {
        let key = key.to_owned();
        self.run("find_by_key", move |store| store.find_by_key(&key))
            .await
    }

    pub async fn exists_identifier(&self, identifier: &str) -> StoreResult<bool> {
        let identifier = identifier.to_owned();
        self.run("exists_identifier", move |store| {
            store.exists_identifier(&identifier)
        })
        .await
    }

    /// Inserts a record.
    ///
    /// Unlike reads, a write is never abandoned at its deadline: the blocking
    /// call keeps running and would land anyway, so the adapter waits for it
    /// and reports what the store actually did.
    pub async fn insert(&self, record: KeyRecord) -> StoreResult<InsertOutcome> {
        let store = Arc::clone(&self.store);
        let mut task = tokio::task::spawn_blocking(move || store.insert(record));

        let joined = match tokio::time::timeout(self.op_timeout, &mut task).await {
            Ok(joined) => joined,
            Err(_) => {
                warn!(
                    op = "insert",
                    timeout = ?self.op_timeout,
                    "Store write overran its deadline, waiting for it to settle"
                );
                task.await
            }
        };

        let result = joined
            .unwrap_or_else(|join_err| Err(StoreError::Task(join_err.to_string())));
        if let Err(e) = &result {
            warn!(op = "insert", error = %e, "Store call failed");
        }
        result
    }

    /// Runs one read-only store call on the blocking pool under the operation
    /// deadline.
    ///
    /// A call that overruns is abandoned (the blocking thread finishes on its
    /// own) and reported as [`StoreError::Timeout`].
    async fn run<T, F>(&self, op: &'static str, call: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn KeyStore) -> StoreResult<T> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let task = tokio::task::spawn_blocking(move || call(store.as_ref()));

        let result = match tokio::time::timeout(self.op_timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(StoreError::Task(join_err.to_string())),
            Err(_) => Err(StoreError::Timeout(self.op_timeout)),
        };

        if let Err(e) = &result {
            warn!(op, error = %e, "Store call failed");
        }
        result
    }
}
