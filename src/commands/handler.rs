//! Command Dispatcher
//!
//! This module maps each decoded command onto store calls and renders the
//! outcome as a response.
//!
//! ## Supported Commands
//!
//! | action                | parameters          | message                       |
//! |-----------------------|---------------------|-------------------------------|
//! | `echo`                |                     | empty                         |
//! | `count`               |                     | record count, `-1` on failure |
//! | `read_identifier`     | `key`               | identifier or empty           |
//! | `is_identifier_exist` | `identifier`        | `yes` / `no`                  |
//! | `insert`              | `key`, `identifier` | `inserted` / `already_exist`  |
//! | anything else         |                     | `unrecognized command` (`*`)  |
//!
//! ## Failure Rendering
//!
//! Store failures never become error frames. They degrade to an in-band
//! value of the normal response: `-1`, empty string, or `no`. An insert whose
//! write fails reports `failed`.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     CommandHandler                          │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐     │
//! │  │  Request::  │───>│  dispatch() │───>│   cmd_*()   │     │
//! │  │   from()    │    └─────────────┘    └──────┬──────┘     │
//! │  └─────────────┘                              │             │
//! │                                               ▼             │
//! │                                         StoreAdapter        │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use crate::protocol::{Action, Command, Request, Response};
use crate::storage::{InsertOutcome, KeyRecord, StoreAdapter};
use tracing::{debug, info};

/// Message for a successful insert.
pub const INSERTED: &str = "inserted";
/// Message when the identifier is already registered.
pub const ALREADY_EXIST: &str = "already_exist";
/// Message when the insert could not be written.
pub const INSERT_FAILED: &str = "failed";
/// Message for `count` when the store cannot be reached.
pub const COUNT_UNAVAILABLE: &str = "-1";

/// Dispatches commands against a shared store.
///
/// Holds no per-connection state; clones share the same store.
#[derive(Clone, Debug)]
pub struct CommandHandler {
    store: StoreAdapter,
}

impl CommandHandler {
    pub fn new(store: StoreAdapter) -> Self {
        Self { store }
    }

    /// Executes a command and returns the response.
    pub async fn dispatch(&self, command: &Command) -> Response {
        let response = match Request::from(command) {
            Request::Echo => Response::empty(Action::Echo),
            Request::Count => self.cmd_count().await,
            Request::ReadIdentifier { key } => self.cmd_read_identifier(&key).await,
            Request::IsIdentifierExist { identifier } => {
                self.cmd_is_identifier_exist(&identifier).await
            }
            Request::Insert { key, identifier } => self.cmd_insert(key, identifier).await,
            Request::Unrecognized => Response::unrecognized(),
        };

        debug!(
            action = %command.action,
            message = %response.message,
            "Command result"
        );
        response
    }

    /// count
    async fn cmd_count(&self) -> Response {
        let message = match self.store.count().await {
            Ok(count) => count.to_string(),
            Err(_) => COUNT_UNAVAILABLE.to_string(),
        };
        Response::new(Action::Count, message)
    }

    /// read_identifier key
    async fn cmd_read_identifier(&self, key: &str) -> Response {
        let identifier = self
            .store
            .find_by_key(key)
            .await
            .ok()
            .flatten()
            .unwrap_or_default();
        Response::new(Action::ReadIdentifier, identifier)
    }

    /// is_identifier_exist identifier
    async fn cmd_is_identifier_exist(&self, identifier: &str) -> Response {
        let message = if self.identifier_taken(identifier).await {
            "yes"
        } else {
            "no"
        };
        Response::new(Action::IsIdentifierExist, message)
    }

    /// insert key identifier
    async fn cmd_insert(&self, key: String, identifier: String) -> Response {
        if self.identifier_taken(&identifier).await {
            return Response::new(Action::Insert, ALREADY_EXIST);
        }

        // The store re-checks uniqueness atomically; a racing insert that
        // passed the check above still ends up here as AlreadyExists.
        let record = KeyRecord::new(key, identifier);
        let identifier = record.identifier.clone();
        let message = match self.store.insert(record).await {
            Ok(InsertOutcome::Inserted) => {
                info!(identifier = %identifier, "Inserted key record");
                INSERTED
            }
            Ok(InsertOutcome::AlreadyExists) => ALREADY_EXIST,
            Err(_) => INSERT_FAILED,
        };
        Response::new(Action::Insert, message)
    }

    /// Existence check where a store failure reads as "not taken".
    async fn identifier_taken(&self, identifier: &str) -> bool {
        self.store
            .exists_identifier(identifier)
            .await
            .unwrap_or(false)
    }
}
