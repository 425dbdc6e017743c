//! SQLite-backed key-value store.
//!
//! One row per key; values are stored as JSON text. Single-key reads and writes
//! are one statement each; `update` runs inside a write transaction.

use chrono::Utc;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;

use super::{KeyValueStore, Mutation, StoreError};

/// Durable store for the tracker and cache namespaces.
#[derive(Debug, Clone)]
pub struct SqliteKeyValueStore {
    pool: SqlitePool,
}

fn storage_err(context: &str) -> impl FnOnce(sqlx::Error) -> StoreError + '_ {
    move |e| StoreError::Storage(format!("{context}: {e}"))
}

impl SqliteKeyValueStore {
    /// Connect to `url` (e.g. `sqlite://sitelens.db` or `sqlite::memory:`) and
    /// create the table if needed.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(storage_err("invalid sqlite url"))?
            .create_if_missing(true);

        // In-memory databases are per-connection, so pin those to one connection.
        let max_connections = if url.contains(":memory:") { 1 } else { 4 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(storage_err("failed to open sqlite database"))?;

        Self::from_pool(pool).await
    }

    /// Wrap an existing pool, creating the table if needed.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS kv_entries (
                key        TEXT PRIMARY KEY NOT NULL,
                value      TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await
        .map_err(storage_err("failed to create kv_entries table"))?;

        tracing::debug!("sqlite key-value store ready");
        Ok(Self { pool })
    }
}

#[async_trait::async_trait]
impl KeyValueStore for SqliteKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let row = sqlx::query("SELECT value FROM kv_entries WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err("failed to read key"))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let raw: String = row.try_get("value").map_err(storage_err("failed to read value column"))?;
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| StoreError::Serialization(format!("{key}: {e}")))
    }

    async fn put(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let raw = encode(key, &value)?;
        upsert(key, raw)
            .execute(&self.pool)
            .await
            .map_err(storage_err("failed to write key"))?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM kv_entries WHERE key = ?1")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(storage_err("failed to delete key"))?;

        Ok(result.rows_affected() > 0)
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        // substr() instead of LIKE so '%' and '_' inside urls are not wildcards.
        let rows = sqlx::query(
            "SELECT key FROM kv_entries WHERE substr(key, 1, length(?1)) = ?1 ORDER BY key",
        )
        .bind(prefix)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err("failed to list keys"))?;

        rows.into_iter()
            .map(|row| row.try_get::<String, _>("key").map_err(storage_err("failed to read key column")))
            .collect()
    }

    async fn update(&self, key: &str, mutate: Mutation<'_>) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(storage_err("failed to begin update"))?;

        // A write first, so the transaction holds the write lock before it reads.
        // Competing updates then wait on the busy timeout instead of interleaving.
        sqlx::query("UPDATE kv_entries SET updated_at = updated_at WHERE key = ?1")
            .bind(key)
            .execute(&mut *tx)
            .await
            .map_err(storage_err("failed to lock key"))?;

        let current: Option<String> = sqlx::query_scalar("SELECT value FROM kv_entries WHERE key = ?1")
            .bind(key)
            .fetch_optional(&mut *tx)
            .await
            .map_err(storage_err("failed to read key"))?;
        let current = current
            .map(|raw| serde_json::from_str(&raw))
            .transpose()
            .map_err(|e| StoreError::Serialization(format!("{key}: {e}")))?;

        // Dropping `tx` on an error rolls back.
        let next = mutate(current)?;
        upsert(key, encode(key, &next)?)
            .execute(&mut *tx)
            .await
            .map_err(storage_err("failed to write key"))?;

        tx.commit().await.map_err(storage_err("failed to commit update"))
    }
}

fn encode(key: &str, value: &Value) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|e| StoreError::Serialization(format!("{key}: {e}")))
}

fn upsert(key: &str, raw: String) -> sqlx::query::Query<'_, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'_>> {
    sqlx::query(
        r#"
        INSERT INTO kv_entries (key, value, updated_at)
        VALUES (?1, ?2, ?3)
        ON CONFLICT (key)
        DO UPDATE SET
            value = excluded.value,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(key)
    .bind(raw)
    .bind(Utc::now().to_rfc3339())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn memory_store() -> SqliteKeyValueStore {
        SqliteKeyValueStore::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn upsert_overwrites_previous_value() {
        let store = memory_store().await;
        store.put("job:1", json!({"status": "processing"})).await.unwrap();
        store.put("job:1", json!({"status": "completed"})).await.unwrap();

        assert_eq!(
            store.get("job:1").await.unwrap(),
            Some(json!({"status": "completed"}))
        );
    }

    #[tokio::test]
    async fn delete_reports_existence() {
        let store = memory_store().await;
        store.put("webhook_url", json!("https://hooks.test")).await.unwrap();

        assert!(store.delete("webhook_url").await.unwrap());
        assert!(!store.delete("webhook_url").await.unwrap());
        assert_eq!(store.get("webhook_url").await.unwrap(), None);
    }

    #[tokio::test]
    async fn update_edits_in_place_and_keeps_value_on_error() {
        let store = memory_store().await;
        store
            .update("counter", Box::new(|current| Ok(json!(current.is_none()))))
            .await
            .unwrap();
        assert_eq!(store.get("counter").await.unwrap(), Some(json!(true)));

        let err = store
            .update(
                "counter",
                Box::new(|_| Err(StoreError::Storage("refused".into()))),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Storage(msg) if msg == "refused"));
        assert_eq!(store.get("counter").await.unwrap(), Some(json!(true)));
    }

    #[tokio::test]
    async fn list_treats_prefix_literally() {
        let store = memory_store().await;
        store.put("cache:https://a.test/100%", json!(1)).await.unwrap();
        store.put("cache:https://b.test", json!(2)).await.unwrap();
        store.put("cache_index", json!([])).await.unwrap();

        let keys = store.list("cache:").await.unwrap();
        assert_eq!(keys, vec!["cache:https://a.test/100%", "cache:https://b.test"]);
    }
}
