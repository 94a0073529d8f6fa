//! Persistent storage for clipkeep.
//!
//! The store is a key-value contract (`get`, `set`, `update`, `on_change`).
//! Read-modify-write cycles go through `update`, which the SQLite store runs
//! inside one immediate transaction so writers on other connections cannot
//! commit in between. Within a process the single writer in `clipkeep-writer`
//! still orders every mutation. Every successful write is announced to all
//! observers of the key, including writes made by other connections once
//! `Database::watch_external_changes` is running.

mod database;
mod history;
mod memory;
mod notify;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

pub use database::Database;
pub use history::{decode_history, encode_history, load_history, save_history, HISTORY_KEY};
pub use memory::MemoryStore;
pub use notify::{ChangeNotifier, ChangeSignal, ChangeStream, StoreChange};

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("stored value for {key} is not valid JSON: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Computes the next value of a key from its current one.
///
/// Receives `None` when the key is absent or its stored value is unreadable.
/// Returning `None` leaves the stored value untouched.
pub type UpdateFn = Box<dyn FnOnce(Option<Value>) -> Option<Value> + Send + 'static>;

/// Result of `KeyValueStore::update`.
#[derive(Debug, Clone, PartialEq)]
pub struct Updated {
    /// The value stored under the key afterwards.
    pub value: Option<Value>,
    /// False when the update function declined to write.
    pub written: bool,
}

/// Durable key-value storage with change notification.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`, `None` when absent.
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Replace the value stored under `key`.
    ///
    /// On success every `ChangeStream` watching `key` receives the new value.
    async fn set(&self, key: &str, value: Value) -> Result<()>;

    /// Replace the value under `key` with what `f` computes from it.
    ///
    /// The default reads then writes, which is only atomic when nothing else
    /// writes to the store concurrently. A written value is announced like
    /// `set`.
    async fn update(&self, key: &str, f: UpdateFn) -> Result<Updated> {
        let current = match self.get(key).await {
            Ok(value) => value,
            Err(StorageError::Corrupt { key, source }) => {
                tracing::warn!(%key, error = %source, "replacing unreadable value");
                None
            }
            Err(e) => return Err(e),
        };

        match f(current.clone()) {
            None => Ok(Updated {
                value: current,
                written: false,
            }),
            Some(next) => {
                self.set(key, next.clone()).await?;
                Ok(Updated {
                    value: Some(next),
                    written: true,
                })
            }
        }
    }

    /// Subscribe to successful writes of `key`.
    fn on_change(&self, key: &str) -> ChangeStream;
}

/// Type alias for a shared store reference.
pub type StoreRef = Arc<dyn KeyValueStore>;
