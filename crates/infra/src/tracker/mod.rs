//! Job/batch tracker: canonical records plus bounded recent-history indexes.
//!
//! ## Design
//!
//! - One record per id (`job:<id>`, `batch:<id>`); writes are last-write-wins
//! - History lists (`job_history`, `batch_history`) are most-recent-first and capped
//! - Status updates are monotone: `processing -> completed | failed`, then frozen
//! - Absence is a normal return value, never an error
//!
//! A record write and its history update are separate store operations. If the
//! second one fails, listing may miss the record, but lookup by id stays correct.
//! History updates are atomic read-modify-writes, so concurrent recorders never
//! drop each other's entries.

pub mod history;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use sitelens_core::{
    BatchId, BatchRecord, JobId, JobRecord, JobStatus, JobStatusReport, StatusChange, WebhookConfig,
};

use crate::store::{KeyValueStore, StoreError, keys, load, save, update};

pub use history::{HISTORY_CAP, HistoryIndex};

/// Default number of records returned by the list operations.
pub const DEFAULT_LIST_LIMIT: usize = 20;

/// Tracker over a key-value store.
#[derive(Debug, Clone)]
pub struct JobTracker<S: KeyValueStore> {
    store: S,
}

impl<S: KeyValueStore> JobTracker<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Insert or overwrite a job and prepend it to the job history.
    pub async fn record_job(&self, job: &JobRecord) -> Result<(), StoreError> {
        save(&self.store, &keys::job(&job.job_id), job).await?;
        self.push_history(keys::JOB_HISTORY, job.job_id.as_str()).await?;
        debug!(job_id = %job.job_id, url = %job.url, status = %job.status, "job recorded");
        Ok(())
    }

    /// Insert or overwrite a batch and prepend it to the batch history.
    pub async fn record_batch(&self, batch: &BatchRecord) -> Result<(), StoreError> {
        save(&self.store, &keys::batch(&batch.batch_id), batch).await?;
        self.push_history(keys::BATCH_HISTORY, batch.batch_id.as_str()).await?;
        debug!(
            batch_id = %batch.batch_id,
            jobs = batch.job_ids.len(),
            status = %batch.status,
            "batch recorded"
        );
        Ok(())
    }

    /// Change a job's status (and completion time when given).
    ///
    /// Returns `None` when the job is unknown; that is not an error.
    pub async fn update_job_status(
        &self,
        job_id: &JobId,
        status: JobStatus,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<Option<StatusChange>, StoreError> {
        let key = keys::job(job_id);
        let Some(mut job) = load::<JobRecord, _>(&self.store, &key).await? else {
            debug!(job_id = %job_id, "status update for unknown job ignored");
            return Ok(None);
        };

        let from = job.status;
        let change = job.apply_status(status, completed_at);
        self.persist_change(&key, &job, change, job_id.as_str(), from, status).await?;
        Ok(Some(change))
    }

    /// Apply a terminal report from the analysis service to a stored job.
    ///
    /// Sets status, completion time, and result or error in one record write.
    /// Non-terminal reports and unknown ids are no-ops.
    pub async fn settle_job(
        &self,
        report: &JobStatusReport,
    ) -> Result<Option<StatusChange>, StoreError> {
        let job_id = report.job_id();
        let key = keys::job(job_id);
        let Some(mut job) = load::<JobRecord, _>(&self.store, &key).await? else {
            debug!(job_id = %job_id, "settle for unknown job ignored");
            return Ok(None);
        };

        let from = job.status;
        let change = job.apply_report(report, Utc::now());
        self.persist_change(&key, &job, change, job_id.as_str(), from, report.status())
            .await?;
        Ok(Some(change))
    }

    /// Change a batch's status (and completion time when given).
    ///
    /// Returns `None` when the batch is unknown; that is not an error.
    pub async fn update_batch_status(
        &self,
        batch_id: &BatchId,
        status: JobStatus,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<Option<StatusChange>, StoreError> {
        let key = keys::batch(batch_id);
        let Some(mut batch) = load::<BatchRecord, _>(&self.store, &key).await? else {
            debug!(batch_id = %batch_id, "status update for unknown batch ignored");
            return Ok(None);
        };

        let from = batch.status;
        let change = batch.apply_status(status, completed_at);
        self.persist_change(&key, &batch, change, batch_id.as_str(), from, status)
            .await?;
        Ok(Some(change))
    }

    pub async fn get_job(&self, job_id: &JobId) -> Result<Option<JobRecord>, StoreError> {
        load(&self.store, &keys::job(job_id)).await
    }

    pub async fn get_batch(&self, batch_id: &BatchId) -> Result<Option<BatchRecord>, StoreError> {
        load(&self.store, &keys::batch(batch_id)).await
    }

    /// Up to `limit` most recently recorded jobs.
    ///
    /// History ids whose record has vanished are skipped.
    pub async fn list_jobs(&self, limit: usize) -> Result<Vec<JobRecord>, StoreError> {
        let history = self.history(keys::JOB_HISTORY).await?;
        let mut jobs = Vec::new();
        for id in history.recent(limit) {
            if let Some(job) = self.get_job(&JobId::new(id.as_str())).await? {
                jobs.push(job);
            }
        }
        Ok(jobs)
    }

    /// Up to `limit` most recently recorded batches.
    pub async fn list_batches(&self, limit: usize) -> Result<Vec<BatchRecord>, StoreError> {
        let history = self.history(keys::BATCH_HISTORY).await?;
        let mut batches = Vec::new();
        for id in history.recent(limit) {
            if let Some(batch) = self.get_batch(&BatchId::new(id.as_str())).await? {
                batches.push(batch);
            }
        }
        Ok(batches)
    }

    /// Replace the webhook registration. No history is kept.
    pub async fn set_webhook_url(&self, url: &str) -> Result<WebhookConfig, StoreError> {
        let config = WebhookConfig::new(url);
        save(&self.store, keys::WEBHOOK_URL, &config).await?;
        debug!(webhook_url = %url, "webhook configured");
        Ok(config)
    }

    pub async fn webhook(&self) -> Result<Option<WebhookConfig>, StoreError> {
        load(&self.store, keys::WEBHOOK_URL).await
    }

    pub async fn webhook_url(&self) -> Result<Option<String>, StoreError> {
        Ok(self.webhook().await?.map(|w| w.url))
    }

    async fn history(&self, key: &str) -> Result<HistoryIndex, StoreError> {
        Ok(load(&self.store, key).await?.unwrap_or_default())
    }

    async fn push_history(&self, key: &str, id: &str) -> Result<(), StoreError> {
        let evicted = update(&self.store, key, |history: &mut HistoryIndex| {
            history.record(id, HISTORY_CAP)
        })
        .await?;
        for evicted in evicted {
            debug!(history = key, evicted = %evicted, "history entry evicted");
        }
        Ok(())
    }

    async fn persist_change<T: serde::Serialize>(
        &self,
        key: &str,
        record: &T,
        change: StatusChange,
        id: &str,
        from: JobStatus,
        to: JobStatus,
    ) -> Result<(), StoreError> {
        match change {
            StatusChange::Rejected => {
                warn!(id, %from, %to, "status update rejected: record is already terminal");
                Ok(())
            }
            StatusChange::Applied | StatusChange::Unchanged => save(&self.store, key, record).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::store::InMemoryKeyValueStore;
    use sitelens_core::AnalysisReport;

    fn tracker() -> (JobTracker<Arc<InMemoryKeyValueStore>>, Arc<InMemoryKeyValueStore>) {
        let store = Arc::new(InMemoryKeyValueStore::new());
        (JobTracker::new(store.clone()), store)
    }

    fn job(id: &str) -> JobRecord {
        JobRecord::processing(JobId::new(id), format!("https://{id}.test"))
    }

    #[tokio::test]
    async fn get_returns_last_write() {
        let (tracker, _) = tracker();
        tracker.record_job(&job("j1")).await.unwrap();

        let mut second = job("j1");
        second.url = "https://renamed.test".into();
        tracker.record_job(&second).await.unwrap();

        assert_eq!(tracker.get_job(&JobId::new("j1")).await.unwrap(), Some(second));
        assert_eq!(tracker.get_job(&JobId::new("missing")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn listing_is_newest_first_and_limited() {
        let (tracker, _) = tracker();
        for id in ["j1", "j2", "j3"] {
            tracker.record_job(&job(id)).await.unwrap();
        }

        let ids: Vec<_> = tracker
            .list_jobs(2)
            .await
            .unwrap()
            .into_iter()
            .map(|j| j.job_id.into_inner())
            .collect();
        assert_eq!(ids, vec!["j3", "j2"]);
    }

    #[tokio::test]
    async fn history_caps_at_one_hundred() {
        let (tracker, _) = tracker();
        for i in 0..=HISTORY_CAP {
            tracker.record_job(&job(&format!("j{i}"))).await.unwrap();
        }

        let jobs = tracker.list_jobs(500).await.unwrap();
        assert_eq!(jobs.len(), HISTORY_CAP);
        assert_eq!(jobs[0].job_id.as_str(), "j100");
        assert!(jobs.iter().all(|j| j.job_id.as_str() != "j0"));

        // Evicted from history, not from storage.
        assert!(tracker.get_job(&JobId::new("j0")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn rerecording_an_id_duplicates_its_history_slot() {
        let (tracker, _) = tracker();
        tracker.record_job(&job("j1")).await.unwrap();
        tracker.record_job(&job("j2")).await.unwrap();
        tracker.record_job(&job("j1")).await.unwrap();

        let ids: Vec<_> = tracker
            .list_jobs(10)
            .await
            .unwrap()
            .into_iter()
            .map(|j| j.job_id.into_inner())
            .collect();
        assert_eq!(ids, vec!["j1", "j2", "j1"]);
    }

    #[tokio::test]
    async fn listing_skips_vanished_records() {
        let (tracker, store) = tracker();
        tracker.record_job(&job("j1")).await.unwrap();
        tracker.record_job(&job("j2")).await.unwrap();
        store.delete("job:j1").await.unwrap();

        let jobs = tracker.list_jobs(10).await.unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].job_id.as_str(), "j2");
    }

    #[tokio::test]
    async fn update_unknown_job_is_silent() {
        let (tracker, store) = tracker();
        let change = tracker
            .update_job_status(&JobId::new("ghost"), JobStatus::Completed, Some(Utc::now()))
            .await
            .unwrap();

        assert_eq!(change, None);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn update_changes_status_and_completion_only() {
        let (tracker, _) = tracker();
        let original = job("j1").in_batch(BatchId::new("b1"));
        tracker.record_job(&original).await.unwrap();

        let at = Utc::now();
        let change = tracker
            .update_job_status(&JobId::new("j1"), JobStatus::Completed, Some(at))
            .await
            .unwrap();
        assert_eq!(change, Some(StatusChange::Applied));

        let stored = tracker.get_job(&JobId::new("j1")).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Completed);
        assert_eq!(stored.completed_at, Some(at));
        assert_eq!(stored.url, original.url);
        assert_eq!(stored.batch_id, original.batch_id);
        assert_eq!(stored.created_at, original.created_at);
    }

    #[tokio::test]
    async fn terminal_jobs_are_frozen() {
        let (tracker, _) = tracker();
        tracker.record_job(&job("j1")).await.unwrap();
        tracker
            .update_job_status(&JobId::new("j1"), JobStatus::Failed, None)
            .await
            .unwrap();

        let change = tracker
            .update_job_status(&JobId::new("j1"), JobStatus::Processing, None)
            .await
            .unwrap();
        assert_eq!(change, Some(StatusChange::Rejected));

        let stored = tracker.get_job(&JobId::new("j1")).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn settle_job_stores_result() {
        let (tracker, _) = tracker();
        tracker.record_job(&job("j1")).await.unwrap();

        let report = JobStatusReport::Completed {
            job_id: JobId::new("j1"),
            result: AnalysisReport {
                company_name: Some("Acme".into()),
                ..Default::default()
            },
        };
        assert_eq!(
            tracker.settle_job(&report).await.unwrap(),
            Some(StatusChange::Applied)
        );

        let stored = tracker.get_job(&JobId::new("j1")).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Completed);
        assert!(stored.completed_at.is_some());
        assert_eq!(
            stored.result.and_then(|r| r.company_name).as_deref(),
            Some("Acme")
        );
    }

    #[tokio::test]
    async fn batch_records_and_updates() {
        let (tracker, _) = tracker();
        let batch = BatchRecord::processing(
            BatchId::new("b1"),
            vec![JobId::new("j1"), JobId::new("j2"), JobId::new("j3")],
            vec![
                "https://one.test".into(),
                "https://two.test".into(),
                "https://three.test".into(),
            ],
        )
        .unwrap();
        tracker.record_batch(&batch).await.unwrap();

        let at = Utc::now();
        tracker
            .update_batch_status(&BatchId::new("b1"), JobStatus::Completed, Some(at))
            .await
            .unwrap();

        let listed = tracker.list_batches(DEFAULT_LIST_LIMIT).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].status, JobStatus::Completed);
        assert_eq!(listed[0].completed_at, Some(at));
        assert_eq!(listed[0].job_ids.len(), listed[0].urls.len());

        // Job history is independent of batch history.
        assert!(tracker.list_jobs(DEFAULT_LIST_LIMIT).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn webhook_is_a_single_overwritten_slot() {
        let (tracker, _) = tracker();
        assert_eq!(tracker.webhook_url().await.unwrap(), None);

        tracker.set_webhook_url("https://hooks.test/a").await.unwrap();
        tracker.set_webhook_url("https://hooks.test/b").await.unwrap();

        assert_eq!(
            tracker.webhook_url().await.unwrap().as_deref(),
            Some("https://hooks.test/b")
        );
    }
}
