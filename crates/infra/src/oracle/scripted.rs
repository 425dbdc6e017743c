//! In-process stand-in for the analysis service.
//!
//! Ids are handed out as `job-1`, `job-2`, ... and `batch-1`, ... in submission
//! order. Status queries replay a scripted sequence; the last entry repeats once
//! the script runs out. Unscripted jobs stay `processing` forever.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use sitelens_core::{
    AnalysisReport, BatchId, BatchJobReport, BatchProgress, BatchStatusReport, JobId, JobStatus,
    JobStatusReport, ResultFormat, ResultPayload, SubmitBatchRequest, SubmitBatchResponse,
    SubmitJobRequest, SubmitJobResponse,
};

use super::{AnalysisOracle, OracleError};

#[derive(Debug, Default)]
struct ScriptState {
    next_job: u64,
    next_batch: u64,
    jobs: HashSet<JobId>,
    batches: HashMap<BatchId, Vec<(JobId, String)>>,
    job_scripts: HashMap<JobId, VecDeque<JobStatusReport>>,
    batch_scripts: HashMap<BatchId, VecDeque<BatchStatusReport>>,
    csv: HashMap<String, String>,
    job_status_calls: HashMap<JobId, u32>,
    batch_status_calls: HashMap<BatchId, u32>,
    submissions: Vec<SubmitJobRequest>,
    batch_submissions: Vec<SubmitBatchRequest>,
    fail_next: Option<OracleError>,
}

impl ScriptState {
    fn take_failure(&mut self) -> Result<(), OracleError> {
        match self.fail_next.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn allocate_job(&mut self) -> JobId {
        self.next_job += 1;
        let id = JobId::new(format!("job-{}", self.next_job));
        self.jobs.insert(id.clone());
        id
    }

    /// Current report for a job. `advance` moves the script forward one step.
    fn job_report(&mut self, job_id: &JobId, advance: bool) -> Result<JobStatusReport, OracleError> {
        if let Some(script) = self.job_scripts.get_mut(job_id) {
            let report = if advance && script.len() > 1 {
                script.pop_front()
            } else {
                script.front().cloned()
            };
            if let Some(report) = report {
                return Ok(report);
            }
        }
        if self.jobs.contains(job_id) {
            return Ok(JobStatusReport::Processing {
                job_id: job_id.clone(),
                current_stage: None,
            });
        }
        Err(OracleError::transport(404, format!("job {job_id} not found")))
    }

    fn batch_report(
        &mut self,
        batch_id: &BatchId,
        advance: bool,
    ) -> Result<BatchStatusReport, OracleError> {
        if let Some(script) = self.batch_scripts.get_mut(batch_id) {
            let report = if advance && script.len() > 1 {
                script.pop_front()
            } else {
                script.front().cloned()
            };
            if let Some(report) = report {
                return Ok(report);
            }
        }
        let members = self
            .batches
            .get(batch_id)
            .cloned()
            .ok_or_else(|| OracleError::transport(404, format!("batch {batch_id} not found")))?;

        let mut jobs = Vec::with_capacity(members.len());
        for (job_id, url) in members {
            // Members of an unscripted batch advance together with it.
            let report = self.job_report(&job_id, advance)?;
            let (result, error) = match &report {
                JobStatusReport::Completed { result, .. } => (Some(result.clone()), None),
                JobStatusReport::Failed { error, .. } => (None, error.clone()),
                JobStatusReport::Processing { .. } => (None, None),
            };
            jobs.push(BatchJobReport {
                job_id,
                url,
                status: report.status(),
                result,
                error,
            });
        }
        Ok(summarize_batch(batch_id.clone(), jobs))
    }
}

/// Build a batch report whose status and progress follow its members.
pub fn summarize_batch(batch_id: BatchId, jobs: Vec<BatchJobReport>) -> BatchStatusReport {
    let total = jobs.len() as u32;
    let count = |status: JobStatus| jobs.iter().filter(|j| j.status == status).count() as u32;
    let completed = count(JobStatus::Completed);
    let failed = count(JobStatus::Failed);
    let processing = total - completed - failed;
    let percentage = if total == 0 {
        100.0
    } else {
        f64::from(completed + failed) * 100.0 / f64::from(total)
    };
    let status = if processing > 0 {
        JobStatus::Processing
    } else if total > 0 && failed == total {
        JobStatus::Failed
    } else {
        JobStatus::Completed
    };

    BatchStatusReport {
        batch_id,
        status,
        progress: BatchProgress {
            total,
            completed,
            failed,
            processing,
            percentage,
        },
        jobs,
    }
}

#[derive(Debug, Default)]
pub struct ScriptedOracle {
    state: Mutex<ScriptState>,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, ScriptState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the status sequence returned for `job_id`.
    pub fn script_job(&self, job_id: impl Into<JobId>, reports: Vec<JobStatusReport>) {
        let job_id = job_id.into();
        let mut state = self.state();
        state.jobs.insert(job_id.clone());
        state.job_scripts.insert(job_id, reports.into());
    }

    /// Shorthand: `polls_before` processing answers, then completed with `result`.
    pub fn complete_after(&self, job_id: impl Into<JobId>, polls_before: usize, result: AnalysisReport) {
        let job_id = job_id.into();
        let mut reports: Vec<_> = (0..polls_before)
            .map(|_| JobStatusReport::Processing {
                job_id: job_id.clone(),
                current_stage: Some("analyzing".to_string()),
            })
            .collect();
        reports.push(JobStatusReport::Completed {
            job_id: job_id.clone(),
            result,
        });
        self.script_job(job_id, reports);
    }

    /// Shorthand: the job fails on its first status query.
    pub fn fail_job(&self, job_id: impl Into<JobId>, error: impl Into<String>) {
        let job_id = job_id.into();
        let report = JobStatusReport::Failed {
            job_id: job_id.clone(),
            error: Some(error.into()),
        };
        self.script_job(job_id, vec![report]);
    }

    /// Replace the status sequence returned for `batch_id`.
    pub fn script_batch(&self, batch_id: impl Into<BatchId>, reports: Vec<BatchStatusReport>) {
        self.state()
            .batch_scripts
            .insert(batch_id.into(), reports.into());
    }

    /// CSV body returned for a job or batch id.
    pub fn set_csv(&self, id: impl Into<String>, csv: impl Into<String>) {
        self.state().csv.insert(id.into(), csv.into());
    }

    /// The next call of any kind fails with `error`.
    pub fn fail_next(&self, error: OracleError) {
        self.state().fail_next = Some(error);
    }

    pub fn job_status_calls(&self, job_id: &JobId) -> u32 {
        self.state().job_status_calls.get(job_id).copied().unwrap_or(0)
    }

    pub fn batch_status_calls(&self, batch_id: &BatchId) -> u32 {
        self.state()
            .batch_status_calls
            .get(batch_id)
            .copied()
            .unwrap_or(0)
    }

    pub fn submissions(&self) -> Vec<SubmitJobRequest> {
        self.state().submissions.clone()
    }

    pub fn batch_submissions(&self) -> Vec<SubmitBatchRequest> {
        self.state().batch_submissions.clone()
    }
}

#[async_trait::async_trait]
impl AnalysisOracle for ScriptedOracle {
    async fn submit_job(&self, request: &SubmitJobRequest) -> Result<SubmitJobResponse, OracleError> {
        let mut state = self.state();
        state.take_failure()?;
        state.submissions.push(request.clone());
        let job_id = state.allocate_job();
        Ok(SubmitJobResponse {
            job_id,
            status: JobStatus::Processing,
            message: Some("Job submitted".to_string()),
        })
    }

    async fn submit_batch(
        &self,
        request: &SubmitBatchRequest,
    ) -> Result<SubmitBatchResponse, OracleError> {
        let mut state = self.state();
        state.take_failure()?;
        state.batch_submissions.push(request.clone());

        state.next_batch += 1;
        let batch_id = BatchId::new(format!("batch-{}", state.next_batch));
        let members: Vec<(JobId, String)> = request
            .urls
            .iter()
            .map(|url| (state.allocate_job(), url.clone()))
            .collect();
        let job_ids = members.iter().map(|(id, _)| id.clone()).collect();
        state.batches.insert(batch_id.clone(), members);

        Ok(SubmitBatchResponse {
            batch_id,
            job_ids,
            status: JobStatus::Processing,
            total_urls: request.urls.len(),
        })
    }

    async fn job_status(&self, job_id: &JobId) -> Result<JobStatusReport, OracleError> {
        let mut state = self.state();
        *state.job_status_calls.entry(job_id.clone()).or_default() += 1;
        state.take_failure()?;
        state.job_report(job_id, true)
    }

    async fn batch_status(&self, batch_id: &BatchId) -> Result<BatchStatusReport, OracleError> {
        let mut state = self.state();
        *state.batch_status_calls.entry(batch_id.clone()).or_default() += 1;
        state.take_failure()?;

        state.batch_report(batch_id, true)
    }

    async fn job_results(
        &self,
        job_id: &JobId,
        format: ResultFormat,
    ) -> Result<ResultPayload<JobStatusReport>, OracleError> {
        let mut state = self.state();
        state.take_failure()?;
        let report = state.job_report(job_id, false)?;
        match format {
            ResultFormat::Json => Ok(ResultPayload::Json(report)),
            ResultFormat::Csv => Ok(ResultPayload::Csv(
                state
                    .csv
                    .get(job_id.as_str())
                    .cloned()
                    .unwrap_or_else(|| format!("job_id,status\n{job_id},{}\n", report.status())),
            )),
        }
    }

    async fn batch_results(
        &self,
        batch_id: &BatchId,
        format: ResultFormat,
    ) -> Result<ResultPayload<BatchStatusReport>, OracleError> {
        let mut state = self.state();
        state.take_failure()?;
        let report = state.batch_report(batch_id, false)?;
        match format {
            ResultFormat::Json => Ok(ResultPayload::Json(report)),
            ResultFormat::Csv => {
                if let Some(csv) = state.csv.get(batch_id.as_str()) {
                    return Ok(ResultPayload::Csv(csv.clone()));
                }
                let mut csv = String::from("job_id,url,status\n");
                for job in &report.jobs {
                    csv.push_str(&format!("{},{},{}\n", job.job_id, job.url, job.status));
                }
                Ok(ResultPayload::Csv(csv))
            }
        }
    }
}
