//! Key-value persistence contract consumed by the tracker and the cache.
//!
//! The store is single-writer consistent per key. Nothing here spans keys:
//! a record write and its index update are two separate operations.
//!
//! Shared index keys (`job_history`, `batch_history`, `cache_index`) are only
//! changed through [`update`], which every backend runs as one atomic
//! read-modify-write so concurrent writers cannot drop each other's entries.

pub mod in_memory;
pub mod sqlite;

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

pub use in_memory::InMemoryKeyValueStore;
pub use sqlite::SqliteKeyValueStore;

/// In-place edit of a stored value: receives the current value (if any) and
/// returns the value to write back.
pub type Mutation<'a> = Box<dyn FnOnce(Option<Value>) -> Result<Value, StoreError> + Send + 'a>;

/// Store error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("storage error: {0}")]
    Storage(String),
}

/// Durable string-keyed store of structured values.
#[async_trait::async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value. Absence is `Ok(None)`.
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    /// Insert or overwrite a value.
    async fn put(&self, key: &str, value: Value) -> Result<(), StoreError>;

    /// Remove a value. Returns whether the key existed.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// Keys starting with `prefix`, sorted.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError>;

    /// Apply `mutate` to the value at `key` and write the result back.
    ///
    /// No other `update` or `put` on the same store interleaves between the
    /// read and the write. An error from `mutate` leaves the value untouched.
    async fn update(&self, key: &str, mutate: Mutation<'_>) -> Result<(), StoreError>;
}

#[async_trait::async_trait]
impl<S> KeyValueStore for Arc<S>
where
    S: KeyValueStore + ?Sized,
{
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        (**self).get(key).await
    }

    async fn put(&self, key: &str, value: Value) -> Result<(), StoreError> {
        (**self).put(key, value).await
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        (**self).delete(key).await
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        (**self).list(prefix).await
    }

    async fn update(&self, key: &str, mutate: Mutation<'_>) -> Result<(), StoreError> {
        (**self).update(key, mutate).await
    }
}

/// Read and decode a typed record.
pub async fn load<T, S>(store: &S, key: &str) -> Result<Option<T>, StoreError>
where
    T: DeserializeOwned,
    S: KeyValueStore + ?Sized,
{
    match store.get(key).await? {
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|e| StoreError::Serialization(format!("{key}: {e}"))),
        None => Ok(None),
    }
}

/// Encode and write a typed record.
pub async fn save<T, S>(store: &S, key: &str, value: &T) -> Result<(), StoreError>
where
    T: Serialize + ?Sized,
    S: KeyValueStore + ?Sized,
{
    let value =
        serde_json::to_value(value).map_err(|e| StoreError::Serialization(format!("{key}: {e}")))?;
    store.put(key, value).await
}

/// Atomically edit a typed record, starting from `T::default()` when absent.
///
/// Returns whatever `edit` returns.
pub async fn update<T, R, S, F>(store: &S, key: &str, edit: F) -> Result<R, StoreError>
where
    T: Serialize + DeserializeOwned + Default,
    R: Send,
    S: KeyValueStore + ?Sized,
    F: FnOnce(&mut T) -> R + Send,
{
    let mut outcome = None;
    let slot = &mut outcome;
    store
        .update(
            key,
            Box::new(move |current| {
                let mut record: T = match current {
                    Some(value) => serde_json::from_value(value)
                        .map_err(|e| StoreError::Serialization(format!("{key}: {e}")))?,
                    None => T::default(),
                };
                *slot = Some(edit(&mut record));
                serde_json::to_value(&record)
                    .map_err(|e| StoreError::Serialization(format!("{key}: {e}")))
            }),
        )
        .await?;

    outcome.ok_or_else(|| StoreError::Storage(format!("{key}: update was not applied")))
}

/// Key layout shared by every backend.
pub mod keys {
    use sitelens_core::{BatchId, JobId};

    pub const JOB_HISTORY: &str = "job_history";
    pub const BATCH_HISTORY: &str = "batch_history";
    pub const CACHE_INDEX: &str = "cache_index";
    pub const WEBHOOK_URL: &str = "webhook_url";
    pub const CACHE_PREFIX: &str = "cache:";

    pub fn job(id: &JobId) -> String {
        format!("job:{id}")
    }

    pub fn batch(id: &BatchId) -> String {
        format!("batch:{id}")
    }

    pub fn cache(url: &str) -> String {
        format!("{CACHE_PREFIX}{url}")
    }
}
