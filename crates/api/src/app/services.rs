use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use sitelens_infra::cache::ResultsCache;
use sitelens_infra::config::Settings;
use sitelens_infra::oracle::AnalysisOracle;
use sitelens_infra::store::{InMemoryKeyValueStore, KeyValueStore, SqliteKeyValueStore, StoreError};
use sitelens_infra::tracker::JobTracker;
use sitelens_infra::workflows::ToolService;

pub type SharedStore = Arc<dyn KeyValueStore>;
pub type SharedOracle = Arc<dyn AnalysisOracle>;
pub type Tools = ToolService<SharedStore, SharedOracle>;

/// Everything the handlers need, shared behind an `Arc`.
pub struct AppServices {
    pub tools: Tools,
    pub started_at: DateTime<Utc>,
}

impl AppServices {
    pub fn new(
        store: SharedStore,
        oracle: SharedOracle,
        cache_ttl_secs: u64,
        shutdown: CancellationToken,
    ) -> Self {
        let cache = ResultsCache::new(store.clone()).with_default_ttl(cache_ttl_secs);
        let tools = ToolService::new(JobTracker::new(store), Arc::new(cache), oracle)
            .with_shutdown(shutdown);
        Self {
            tools,
            started_at: Utc::now(),
        }
    }

    /// Services over a fresh in-memory store with default settings.
    pub fn in_memory(oracle: SharedOracle) -> Self {
        Self::new(
            Arc::new(InMemoryKeyValueStore::new()),
            oracle,
            sitelens_infra::cache::DEFAULT_TTL_SECS,
            CancellationToken::new(),
        )
    }
}

/// sqlite when a database URL is configured, in-memory otherwise.
pub async fn open_store(settings: &Settings) -> Result<SharedStore, StoreError> {
    match &settings.database_url {
        Some(url) => {
            tracing::info!(database_url = %url, "using sqlite store");
            Ok(Arc::new(SqliteKeyValueStore::connect(url).await?))
        }
        None => {
            tracing::warn!("no database configured; tracked jobs and cache are lost on restart");
            Ok(Arc::new(InMemoryKeyValueStore::new()))
        }
    }
}
