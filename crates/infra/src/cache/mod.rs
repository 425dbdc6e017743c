//! Results cache keyed by source URL, with lazy TTL expiry.
//!
//! ## Design
//!
//! - One slot per URL (`cache:<url>`); last writer wins
//! - `cache_index` lists every URL believed to have a slot, without duplicates
//! - Expiry is evaluated on read: an expired entry is deleted by the read that
//!   finds it. There is no timer on the read path; `CacheSweeper` is an optional
//!   extra that reclaims entries nobody reads again
//! - `clear_all_cache` only reaches indexed URLs; a slot missing from the index
//!   is orphaned and stays until overwritten or cleared by URL
//! - Every index change is one atomic store update, so concurrent writers keep
//!   each other's URLs

pub mod sweeper;

use chrono::Utc;
use serde::Serialize;
use tracing::debug;

use sitelens_core::{AnalysisReport, CachedResult, JobId};

use crate::store::{KeyValueStore, StoreError, keys, load, save, update};

pub use sweeper::CacheSweeper;

/// 24 hours.
pub const DEFAULT_TTL_SECS: u64 = 86_400;

/// Index size and indexed URLs. Expiry is not evaluated per entry here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub total_cached: usize,
    pub urls: Vec<String>,
}

/// Cache over a key-value store.
#[derive(Debug, Clone)]
pub struct ResultsCache<S: KeyValueStore> {
    store: S,
    default_ttl_secs: u64,
}

impl<S: KeyValueStore> ResultsCache<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            default_ttl_secs: DEFAULT_TTL_SECS,
        }
    }

    pub fn with_default_ttl(mut self, ttl_secs: u64) -> Self {
        self.default_ttl_secs = ttl_secs;
        self
    }

    pub fn default_ttl_secs(&self) -> u64 {
        self.default_ttl_secs
    }

    /// Cache `result` for `url` with the default TTL.
    pub async fn cache_result(
        &self,
        url: &str,
        job_id: &JobId,
        result: &AnalysisReport,
    ) -> Result<CachedResult, StoreError> {
        self.cache_result_with_ttl(url, job_id, result, self.default_ttl_secs)
            .await
    }

    /// Overwrite the slot for `url`, stamped now, and index the URL if new.
    pub async fn cache_result_with_ttl(
        &self,
        url: &str,
        job_id: &JobId,
        result: &AnalysisReport,
        ttl_secs: u64,
    ) -> Result<CachedResult, StoreError> {
        let entry = CachedResult::new(url, job_id.clone(), result.clone(), ttl_secs);
        save(&self.store, &keys::cache(url), &entry).await?;

        update(&self.store, keys::CACHE_INDEX, |index: &mut Vec<String>| {
            if !index.iter().any(|u| u == url) {
                index.push(url.to_string());
            }
        })
        .await?;

        debug!(url, job_id = %job_id, ttl_secs, "result cached");
        Ok(entry)
    }

    /// The live entry for `url`, if any.
    ///
    /// An expired entry is deleted (and unindexed) by this read and reported as a miss.
    pub async fn get_cached_result(&self, url: &str) -> Result<Option<CachedResult>, StoreError> {
        let key = keys::cache(url);
        let Some(entry) = load::<CachedResult, _>(&self.store, &key).await? else {
            return Ok(None);
        };

        if entry.is_expired_at(Utc::now()) {
            self.store.delete(&key).await?;
            self.unindex(&[url.to_string()]).await?;
            debug!(url, cached_at = %entry.cached_at, ttl_secs = entry.ttl_secs, "expired cache entry removed on read");
            return Ok(None);
        }

        Ok(Some(entry))
    }

    /// Drop the slot for `url`. Returns whether an entry existed.
    ///
    /// The URL is removed from the index either way.
    pub async fn clear_cache(&self, url: &str) -> Result<bool, StoreError> {
        let existed = self.store.delete(&keys::cache(url)).await?;
        self.unindex(&[url.to_string()]).await?;

        debug!(url, existed, "cache cleared for url");
        Ok(existed)
    }

    /// Drop every indexed slot and unindex it. Returns the index size at call time.
    ///
    /// URLs indexed by a concurrent writer after the snapshot are left alone.
    pub async fn clear_all_cache(&self) -> Result<usize, StoreError> {
        let index = self.index().await?;
        for url in &index {
            self.store.delete(&keys::cache(url)).await?;
        }
        self.unindex(&index).await?;

        debug!(cleared = index.len(), "cache cleared");
        Ok(index.len())
    }

    pub async fn cache_stats(&self) -> Result<CacheStats, StoreError> {
        let urls = self.index().await?;
        Ok(CacheStats {
            total_cached: urls.len(),
            urls,
        })
    }

    /// Remove every indexed entry that has expired or whose slot is gone.
    /// Returns how many URLs left the index.
    pub async fn sweep_expired(&self) -> Result<usize, StoreError> {
        let index = self.index().await?;
        let now = Utc::now();
        let mut gone = Vec::new();

        for url in &index {
            let key = keys::cache(url);
            match load::<CachedResult, _>(&self.store, &key).await? {
                Some(entry) if entry.is_expired_at(now) => {
                    self.store.delete(&key).await?;
                    gone.push(url.clone());
                }
                Some(_) => {}
                None => gone.push(url.clone()),
            }
        }

        if !gone.is_empty() {
            self.unindex(&gone).await?;
        }
        Ok(gone.len())
    }

    async fn index(&self) -> Result<Vec<String>, StoreError> {
        Ok(load(&self.store, keys::CACHE_INDEX).await?.unwrap_or_default())
    }

    async fn unindex(&self, urls: &[String]) -> Result<(), StoreError> {
        update(&self.store, keys::CACHE_INDEX, |index: &mut Vec<String>| {
            index.retain(|u| !urls.contains(u));
        })
        .await
    }
}
