//! In-memory key-value store for tests/dev.

use std::collections::BTreeMap;
use std::sync::RwLock;

use serde_json::Value;

use super::{KeyValueStore, Mutation, StoreError};

/// In-memory store backed by an ordered map.
///
/// Intended for tests/dev. Contents are lost on drop.
#[derive(Debug, Default)]
pub struct InMemoryKeyValueStore {
    inner: RwLock<BTreeMap<String, Value>>,
}

impl InMemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned<E>(_: E) -> StoreError {
    StoreError::Storage("in-memory store lock poisoned".to_string())
}

#[async_trait::async_trait]
impl KeyValueStore for InMemoryKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let map = self.inner.read().map_err(poisoned)?;
        Ok(map.get(key).cloned())
    }

    async fn put(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let mut map = self.inner.write().map_err(poisoned)?;
        map.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let mut map = self.inner.write().map_err(poisoned)?;
        Ok(map.remove(key).is_some())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let map = self.inner.read().map_err(poisoned)?;
        Ok(map
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }

    async fn update(&self, key: &str, mutate: Mutation<'_>) -> Result<(), StoreError> {
        let mut map = self.inner.write().map_err(poisoned)?;
        let next = mutate(map.get(key).cloned())?;
        map.insert(key.to_string(), next);
        Ok(())
    }
}
