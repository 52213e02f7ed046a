use super::{validate_name, KeyValueStore};
use crate::errors::StorageError;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// In-memory store for tests and ephemeral deployments.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    collections: RwLock<HashMap<String, BTreeMap<String, Value>>>,
}

impl InMemoryStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records in a collection.
    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .get(collection)
            .map_or(0, BTreeMap::len)
    }

    /// True if the collection holds no records.
    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }
}

impl KeyValueStore for InMemoryStore {
    fn get(&self, collection: &str, key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self
            .collections
            .read()
            .get(collection)
            .and_then(|c| c.get(key).cloned()))
    }

    fn put(&self, collection: &str, key: &str, value: Value) -> Result<(), StorageError> {
        validate_name(collection)?;
        validate_name(key)?;
        self.collections
            .write()
            .entry(collection.to_string())
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    fn list(&self, collection: &str) -> Result<Vec<(String, Value)>, StorageError> {
        Ok(self
            .collections
            .read()
            .get(collection)
            .map(|c| c.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default())
    }

    fn delete(&self, collection: &str, key: &str) -> Result<bool, StorageError> {
        Ok(self
            .collections
            .write()
            .get_mut(collection)
            .map(|c| c.remove(key).is_some())
            .unwrap_or(false))
    }
}
