use sitelens_core::{BatchId, DomainError, JobId, ResultFormat, ResultPayload};

use super::args::{BatchResultsArgs, DownloadArgs, JobResultsArgs, JobStatusArgs, ListArgs};
use super::{ToolError, ToolOutput, ToolService, parse_id, render};
use crate::oracle::AnalysisOracle;
use crate::store::KeyValueStore;

impl<S: KeyValueStore, O: AnalysisOracle> ToolService<S, O> {
    /// Job results, served from the cache when the tracked URL has a live entry.
    ///
    /// A completed JSON answer from the service is cached and settles the tracker.
    /// CSV is passed through as-is and never cached.
    pub async fn get_job_results(&self, args: JobResultsArgs) -> Result<ToolOutput, ToolError> {
        let job_id: JobId = parse_id(&args.job_id)?;
        let tracked = self.tracker().get_job(&job_id).await?;

        if args.format == ResultFormat::Json {
            if let Some(job) = &tracked {
                if let Some(cached) = self.cache().get_cached_result(&job.url).await? {
                    tracing::debug!(job_id = %job_id, url = %job.url, "serving cached results");
                    return Ok(ToolOutput::text(render::cached_job_results(
                        job_id.as_str(),
                        &cached,
                    )));
                }
            }
        }

        match self.oracle().job_results(&job_id, args.format).await? {
            ResultPayload::Csv(text) => Ok(ToolOutput::text(text)),
            ResultPayload::Json(report) => {
                if let Some(job) = &tracked {
                    if report.is_terminal() {
                        self.absorb_job(&job.url, &report).await?;
                    }
                }
                Ok(ToolOutput::text(render::job_results(&report)))
            }
        }
    }

    pub async fn get_batch_results(&self, args: BatchResultsArgs) -> Result<ToolOutput, ToolError> {
        let batch_id: BatchId = parse_id(&args.batch_id)?;
        match self.oracle().batch_results(&batch_id, args.format).await? {
            ResultPayload::Csv(text) => Ok(ToolOutput::text(text)),
            ResultPayload::Json(report) => {
                self.absorb_batch(&report).await?;
                Ok(ToolOutput::text(render::batch_results(&report)))
            }
        }
    }

    /// Live status from the service. A terminal answer also settles the tracker.
    pub async fn check_job_status(&self, args: JobStatusArgs) -> Result<ToolOutput, ToolError> {
        let job_id: JobId = parse_id(&args.job_id)?;
        let report = self.oracle().job_status(&job_id).await?;
        if report.is_terminal() {
            self.tracker().settle_job(&report).await?;
        }
        Ok(ToolOutput::text(render::job_status(&report)))
    }

    /// Raw results for a job or a batch, untouched by the tracker and the cache.
    pub async fn download_results(&self, args: DownloadArgs) -> Result<ToolOutput, ToolError> {
        let text = match (args.job_id, args.batch_id) {
            (Some(job_id), _) => {
                let job_id: JobId = parse_id(&job_id)?;
                match self.oracle().job_results(&job_id, args.format).await? {
                    ResultPayload::Csv(text) => text,
                    ResultPayload::Json(report) => render::pretty(&report),
                }
            }
            (None, Some(batch_id)) => {
                let batch_id: BatchId = parse_id(&batch_id)?;
                match self.oracle().batch_results(&batch_id, args.format).await? {
                    ResultPayload::Csv(text) => text,
                    ResultPayload::Json(report) => render::pretty(&report),
                }
            }
            (None, None) => {
                return Err(DomainError::validation("either job_id or batch_id is required").into());
            }
        };
        Ok(ToolOutput::text(text))
    }

    pub async fn list_jobs(&self, args: ListArgs) -> Result<ToolOutput, ToolError> {
        let jobs = self.tracker().list_jobs(args.limit).await?;
        Ok(ToolOutput::text(render::job_list(&jobs)))
    }

    pub async fn list_batches(&self, args: ListArgs) -> Result<ToolOutput, ToolError> {
        let batches = self.tracker().list_batches(args.limit).await?;
        Ok(ToolOutput::text(render::batch_list(&batches)))
    }
}
