//! # Key/Value Storage Port
//!
//! Records are JSON objects grouped in named collections. Components keep
//! in-memory caches on top of this port and write through on every mutation,
//! so the store stays the single source of truth.
//!
//! | Backend | Use |
//! |---------|-----|
//! | [`InMemoryStore`] | tests, ephemeral nodes |
//! | [`JsonFileStore`] | one JSON file per record, owner-only permissions |

mod file;
mod memory;

pub use file::JsonFileStore;
pub use memory::InMemoryStore;

use crate::errors::StorageError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Driven port for durable JSON records.
pub trait KeyValueStore: Send + Sync {
    /// Fetch a record.
    fn get(&self, collection: &str, key: &str) -> Result<Option<Value>, StorageError>;

    /// Insert or replace a record.
    fn put(&self, collection: &str, key: &str, value: Value) -> Result<(), StorageError>;

    /// All records of a collection, ordered by key.
    fn list(&self, collection: &str) -> Result<Vec<(String, Value)>, StorageError>;

    /// Remove a record. Returns `true` if it existed.
    fn delete(&self, collection: &str, key: &str) -> Result<bool, StorageError>;
}

/// Serialize `record` and store it.
pub fn save_record<T: Serialize>(
    store: &dyn KeyValueStore,
    collection: &str,
    key: &str,
    record: &T,
) -> Result<(), StorageError> {
    let value = serde_json::to_value(record).map_err(|e| StorageError::Serialization {
        collection: collection.to_string(),
        key: key.to_string(),
        message: e.to_string(),
    })?;
    store.put(collection, key, value)
}

/// Load and deserialize one record.
pub fn load_record<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    collection: &str,
    key: &str,
) -> Result<Option<T>, StorageError> {
    match store.get(collection, key)? {
        Some(value) => decode(collection, key, value).map(Some),
        None => Ok(None),
    }
}

/// Load and deserialize a whole collection.
pub fn load_all<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    collection: &str,
) -> Result<Vec<T>, StorageError> {
    store
        .list(collection)?
        .into_iter()
        .map(|(key, value)| decode(collection, &key, value))
        .collect()
}

fn decode<T: DeserializeOwned>(
    collection: &str,
    key: &str,
    value: Value,
) -> Result<T, StorageError> {
    serde_json::from_value(value).map_err(|e| StorageError::Serialization {
        collection: collection.to_string(),
        key: key.to_string(),
        message: e.to_string(),
    })
}

/// Collection and key names become path components in the file backend.
pub(crate) fn validate_name(name: &str) -> Result<(), StorageError> {
    let ok = !name.is_empty()
        && name.len() <= 200
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if ok {
        Ok(())
    } else {
        Err(StorageError::InvalidName(name.to_string()))
    }
}
