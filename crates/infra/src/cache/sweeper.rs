//! Optional background reclamation of expired cache entries.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::ResultsCache;
use crate::store::KeyValueStore;

/// Periodically runs `ResultsCache::sweep_expired`.
///
/// Reads keep their own expiry check; this only reclaims storage for entries
/// that are never read again.
pub struct CacheSweeper<S: KeyValueStore> {
    cache: Arc<ResultsCache<S>>,
    interval: Duration,
}

impl<S: KeyValueStore + 'static> CacheSweeper<S> {
    pub fn new(cache: Arc<ResultsCache<S>>, interval: Duration) -> Self {
        Self { cache, interval }
    }

    /// Spawn the sweep loop. It stops when `shutdown` is cancelled.
    pub fn start(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(interval_secs = self.interval.as_secs(), "cache sweeper started");

            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => match self.cache.sweep_expired().await {
                        Ok(0) => debug!("cache sweep found nothing to remove"),
                        Ok(removed) => info!(removed, "cache sweep removed expired entries"),
                        Err(e) => warn!(error = %e, "cache sweep failed"),
                    },
                }
            }

            info!("cache sweeper stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::tests::{report, seed_stale};
    use crate::store::InMemoryKeyValueStore;
    use sitelens_core::JobId;

    #[tokio::test(start_paused = true)]
    async fn sweeps_until_cancelled() {
        let cache = Arc::new(ResultsCache::new(Arc::new(InMemoryKeyValueStore::new())));
        cache
            .cache_result("https://fresh.test", &JobId::new("j1"), &report("Fresh"))
            .await
            .unwrap();
        seed_stale(&*cache, "https://stale.test").await;

        let shutdown = CancellationToken::new();
        let handle = CacheSweeper::new(cache.clone(), Duration::from_secs(60)).start(shutdown.clone());

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(cache.cache_stats().await.unwrap().urls, vec!["https://fresh.test"]);

        shutdown.cancel();
        handle.await.unwrap();
    }
}
