//! Persistent Record Store backed by sled
//!
//! Records are kept in two trees of one sled database:
//!
//! ```text
//! identifiers : identifier -> public key   (one entry per record)
//! keys        : public key -> identifier   (first identifier per key)
//! ```
//!
//! An insert checks and writes both trees in one multi-tree transaction, so
//! two racing inserts for the same identifier cannot both succeed and a failed
//! insert leaves neither tree changed.

use crate::storage::store::{InsertOutcome, KeyRecord, KeyStore, StoreError, StoreResult};
use sled::transaction::{ConflictableTransactionResult, TransactionError};
use sled::{Db, IVec, Transactional, Tree};
use std::path::PathBuf;
use tracing::{debug, info, warn};

const IDENTIFIERS_TREE: &str = "identifiers";
const KEYS_TREE: &str = "keys";

impl From<sled::Error> for StoreError {
    fn from(err: sled::Error) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

#[derive(Clone)]
pub struct SledStore {
    db: Db,
    identifiers: Tree,
    keys: Tree,
}

impl std::fmt::Debug for SledStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SledStore")
            .field("records", &self.identifiers.len())
            .finish()
    }
}

impl SledStore {
    /// Opens (or creates) the store at `path`.
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<SledStore> {
        let path = path.into();
        let db = sled::open(&path)?;
        let identifiers = db.open_tree(IDENTIFIERS_TREE)?;
        let keys = db.open_tree(KEYS_TREE)?;

        info!(path = %path.display(), records = identifiers.len(), "Opened sled store");
        Ok(SledStore {
            db,
            identifiers,
            keys,
        })
    }
}

fn decode(value: IVec) -> StoreResult<String> {
    String::from_utf8(value.to_vec())
        .map_err(|e| StoreError::Unavailable(format!("corrupt record: {}", e)))
}

impl KeyStore for SledStore {
    fn count(&self) -> StoreResult<u64> {
        Ok(self.identifiers.len() as u64)
    }

    fn find_by_key(&self, key: &str) -> StoreResult<Option<String>> {
        self.keys.get(key)?.map(decode).transpose()
    }

    fn exists_identifier(&self, identifier: &str) -> StoreResult<bool> {
        Ok(self.identifiers.contains_key(identifier)?)
    }

    fn insert(&self, record: KeyRecord) -> StoreResult<InsertOutcome> {
        let identifier = record.identifier.as_bytes();
        let public_key = record.public_key.as_bytes();

        // Both trees commit together or not at all.
        let outcome = (&self.identifiers, &self.keys)
            .transaction(
                |(identifiers, keys)| -> ConflictableTransactionResult<InsertOutcome> {
                    if identifiers.get(identifier)?.is_some() {
                        return Ok(InsertOutcome::AlreadyExists);
                    }
                    identifiers.insert(identifier, public_key)?;

                    // An existing key entry is left alone: lookups return the
                    // first identifier.
                    if keys.get(public_key)?.is_none() {
                        keys.insert(public_key, identifier)?;
                    }
                    Ok(InsertOutcome::Inserted)
                },
            )
            .map_err(|e| match e {
                TransactionError::Abort(()) => {
                    StoreError::Unavailable("insert transaction aborted".into())
                }
                TransactionError::Storage(err) => StoreError::from(err),
            })?;

        match outcome {
            InsertOutcome::Inserted => {
                // The record is committed; a failed flush only delays durability.
                if let Err(e) = self.db.flush() {
                    warn!(identifier = %record.identifier, error = %e, "Flush after insert failed");
                }
            }
            InsertOutcome::AlreadyExists => {
                debug!(identifier = %record.identifier, "Identifier already registered");
            }
        }
        Ok(outcome)
    }
}
