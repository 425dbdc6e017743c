//! Records kept for every tracked job, batch, and cached result.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::id::{BatchId, JobId};
use crate::report::{AnalysisReport, JobStatusReport};

/// Lifecycle status of a job or batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Submitted, remote work still running
    Processing,
    /// Finished with a result
    Completed,
    /// Finished without a result
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Only `processing -> completed | failed` is a legal move.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(self, JobStatus::Processing) && next.is_terminal()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of applying a status update to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusChange {
    /// The record moved to the new status.
    Applied,
    /// The record already had this status (a missing completion time may have been filled).
    Unchanged,
    /// The move would leave a terminal status; nothing was written.
    Rejected,
}

fn transition(
    status: &mut JobStatus,
    completed: &mut Option<DateTime<Utc>>,
    next: JobStatus,
    completed_at: Option<DateTime<Utc>>,
) -> StatusChange {
    if *status == next {
        if completed.is_none() && next.is_terminal() {
            *completed = completed_at;
        }
        return StatusChange::Unchanged;
    }
    if !status.can_transition_to(next) {
        return StatusChange::Rejected;
    }
    *status = next;
    if completed_at.is_some() {
        *completed = completed_at;
    }
    StatusChange::Applied
}

/// A tracked single-URL job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: JobId,
    pub url: String,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<BatchId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Present only once the job completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<AnalysisReport>,
}

impl JobRecord {
    /// A freshly submitted job.
    pub fn processing(job_id: JobId, url: impl Into<String>) -> Self {
        Self {
            job_id,
            url: url.into(),
            status: JobStatus::Processing,
            created_at: Utc::now(),
            completed_at: None,
            batch_id: None,
            error: None,
            result: None,
        }
    }

    /// Mark the job as a member of a batch.
    pub fn in_batch(mut self, batch_id: BatchId) -> Self {
        self.batch_id = Some(batch_id);
        self
    }

    /// Change status only, leaving every other field untouched.
    pub fn apply_status(
        &mut self,
        next: JobStatus,
        completed_at: Option<DateTime<Utc>>,
    ) -> StatusChange {
        transition(&mut self.status, &mut self.completed_at, next, completed_at)
    }

    /// Apply a terminal report: status, completion time, and result or error.
    ///
    /// Non-terminal reports leave the record as it is.
    pub fn apply_report(
        &mut self,
        report: &JobStatusReport,
        completed_at: DateTime<Utc>,
    ) -> StatusChange {
        if !report.is_terminal() {
            return StatusChange::Unchanged;
        }
        let change = self.apply_status(report.status(), Some(completed_at));
        if change == StatusChange::Applied {
            match report {
                JobStatusReport::Completed { result, .. } => {
                    self.result = Some(result.clone());
                    self.error = None;
                }
                JobStatusReport::Failed { error, .. } => {
                    self.error = Some(error.clone().unwrap_or_else(|| "unknown error".to_string()));
                    self.result = None;
                }
                JobStatusReport::Processing { .. } => {}
            }
        }
        change
    }
}

/// A tracked batch of jobs submitted together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRecord {
    pub batch_id: BatchId,
    /// Aligned by position with `urls`.
    pub job_ids: Vec<JobId>,
    pub urls: Vec<String>,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl BatchRecord {
    /// A freshly submitted batch. `job_ids` and `urls` must have the same length.
    pub fn processing(batch_id: BatchId, job_ids: Vec<JobId>, urls: Vec<String>) -> DomainResult<Self> {
        if job_ids.len() != urls.len() {
            return Err(DomainError::invariant(format!(
                "batch {batch_id}: {} job ids for {} urls",
                job_ids.len(),
                urls.len()
            )));
        }
        Ok(Self {
            batch_id,
            job_ids,
            urls,
            status: JobStatus::Processing,
            created_at: Utc::now(),
            completed_at: None,
        })
    }

    /// `(job_id, url)` pairs in submission order.
    pub fn members(&self) -> impl Iterator<Item = (&JobId, &str)> {
        self.job_ids.iter().zip(self.urls.iter().map(String::as_str))
    }

    pub fn apply_status(
        &mut self,
        next: JobStatus,
        completed_at: Option<DateTime<Utc>>,
    ) -> StatusChange {
        transition(&mut self.status, &mut self.completed_at, next, completed_at)
    }
}

/// Cached analysis output for one URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedResult {
    pub job_id: JobId,
    pub url: String,
    pub result: AnalysisReport,
    pub cached_at: DateTime<Utc>,
    /// Time to live in seconds
    #[serde(rename = "ttl")]
    pub ttl_secs: u64,
}

impl CachedResult {
    pub fn new(url: impl Into<String>, job_id: JobId, result: AnalysisReport, ttl_secs: u64) -> Self {
        Self {
            job_id,
            url: url.into(),
            result,
            cached_at: Utc::now(),
            ttl_secs,
        }
    }

    /// `None` when the TTL is too large to represent (never expires).
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let ttl = i64::try_from(self.ttl_secs).ok()?;
        let ttl = Duration::try_seconds(ttl)?;
        self.cached_at.checked_add_signed(ttl)
    }

    /// Valid iff `now - cached_at <= ttl`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at() {
            Some(expires_at) => now > expires_at,
            None => false,
        }
    }
}

/// The single active webhook registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub url: String,
    pub configured_at: DateTime<Utc>,
}

impl WebhookConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            configured_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completed_report(id: &str) -> JobStatusReport {
        JobStatusReport::Completed {
            job_id: JobId::new(id),
            result: AnalysisReport {
                company_name: Some("Acme".into()),
                ..Default::default()
            },
        }
    }

    #[test]
    fn status_moves_only_from_processing_to_terminal() {
        assert!(JobStatus::Processing.can_transition_to(JobStatus::Completed));
        assert!(JobStatus::Processing.can_transition_to(JobStatus::Failed));
        assert!(!JobStatus::Processing.can_transition_to(JobStatus::Processing));
        assert!(!JobStatus::Completed.can_transition_to(JobStatus::Failed));
        assert!(!JobStatus::Failed.can_transition_to(JobStatus::Processing));
    }

    #[test]
    fn job_lifecycle() {
        let mut job = JobRecord::processing(JobId::new("job-1"), "https://acme.test");
        assert_eq!(job.status, JobStatus::Processing);

        let done_at = Utc::now();
        assert_eq!(job.apply_report(&completed_report("job-1"), done_at), StatusChange::Applied);
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.completed_at, Some(done_at));
        assert!(job.result.is_some());

        // Terminal is final.
        assert_eq!(job.apply_status(JobStatus::Processing, None), StatusChange::Rejected);
        assert_eq!(job.apply_status(JobStatus::Failed, None), StatusChange::Rejected);
        assert_eq!(job.status, JobStatus::Completed);
    }

    #[test]
    fn apply_status_leaves_other_fields_alone() {
        let mut job = JobRecord::processing(JobId::new("job-1"), "https://acme.test")
            .in_batch(BatchId::new("batch-1"));
        let before = job.clone();

        assert_eq!(job.apply_status(JobStatus::Failed, None), StatusChange::Applied);
        assert_eq!(job.completed_at, None);
        assert_eq!(job.url, before.url);
        assert_eq!(job.batch_id, before.batch_id);
        assert_eq!(job.created_at, before.created_at);
        assert_eq!(job.error, None);
    }

    #[test]
    fn repeated_terminal_status_fills_missing_completion_time() {
        let mut job = JobRecord::processing(JobId::new("job-1"), "https://acme.test");
        job.apply_status(JobStatus::Failed, None);

        let at = Utc::now();
        assert_eq!(job.apply_status(JobStatus::Failed, Some(at)), StatusChange::Unchanged);
        assert_eq!(job.completed_at, Some(at));
    }

    #[test]
    fn failed_report_records_error() {
        let mut job = JobRecord::processing(JobId::new("job-9"), "https://acme.test");
        let report = JobStatusReport::Failed {
            job_id: JobId::new("job-9"),
            error: None,
        };
        job.apply_report(&report, Utc::now());
        assert_eq!(job.error.as_deref(), Some("unknown error"));
        assert!(job.result.is_none());
    }

    #[test]
    fn batch_requires_aligned_ids_and_urls() {
        let err = BatchRecord::processing(
            BatchId::new("batch-1"),
            vec![JobId::new("a"), JobId::new("b")],
            vec!["https://one.test".into()],
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));

        let batch = BatchRecord::processing(
            BatchId::new("batch-1"),
            vec![JobId::new("a"), JobId::new("b")],
            vec!["https://one.test".into(), "https://two.test".into()],
        )
        .unwrap();
        let members: Vec<_> = batch.members().collect();
        assert_eq!(members[1], (&JobId::new("b"), "https://two.test"));
    }

    #[test]
    fn cached_result_expires_strictly_after_ttl() {
        let entry = CachedResult::new("https://acme.test", JobId::new("job-1"), AnalysisReport::default(), 60);
        let edge = entry.cached_at + Duration::seconds(60);

        assert!(!entry.is_expired_at(entry.cached_at));
        assert!(!entry.is_expired_at(edge));
        assert!(entry.is_expired_at(edge + Duration::milliseconds(1)));
    }

    #[test]
    fn huge_ttl_never_expires() {
        let entry = CachedResult::new("https://acme.test", JobId::new("job-1"), AnalysisReport::default(), u64::MAX);
        assert!(!entry.is_expired_at(Utc::now() + Duration::days(365 * 100)));
    }

    mod props {
        use proptest::prelude::*;

        use super::*;

        fn any_status() -> impl Strategy<Value = JobStatus> {
            prop_oneof![
                Just(JobStatus::Processing),
                Just(JobStatus::Completed),
                Just(JobStatus::Failed),
            ]
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 256,
                .. ProptestConfig::default()
            })]

            #[test]
            fn first_terminal_status_is_final(updates in prop::collection::vec(any_status(), 0..20)) {
                let mut job = JobRecord::processing(JobId::new("j"), "https://a.test");
                let mut settled: Option<JobStatus> = None;

                for next in updates {
                    let change = job.apply_status(next, Some(Utc::now()));
                    match settled {
                        Some(done) => {
                            prop_assert_eq!(job.status, done);
                            prop_assert_ne!(change, StatusChange::Applied);
                        }
                        None if next.is_terminal() => settled = Some(next),
                        None => prop_assert_eq!(job.status, JobStatus::Processing),
                    }
                }
                prop_assert_eq!(job.completed_at.is_some(), settled.is_some());
            }
        }
    }
}
