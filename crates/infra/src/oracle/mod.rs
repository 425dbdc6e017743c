//! Client contract for the remote analysis service.
//!
//! The service owns job execution and batch aggregation; this side only submits
//! work and reads status. `HttpOracle` talks to the real service, `ScriptedOracle`
//! replays canned status sequences for tests and local runs.

pub mod http;
pub mod scripted;

use std::sync::Arc;

use sitelens_core::{
    BatchId, BatchStatusReport, JobId, JobStatusReport, ResultFormat, ResultPayload,
    SubmitBatchRequest, SubmitBatchResponse, SubmitJobRequest, SubmitJobResponse,
};

pub use http::{DEFAULT_BASE_URL, HttpOracle};
pub use scripted::ScriptedOracle;

/// Failure talking to the analysis service.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OracleError {
    /// Non-2xx response.
    #[error("analysis service error ({status}): {message}")]
    Transport { status: u16, message: String },
    /// The request never produced a response (connect, timeout, TLS).
    #[error("request to analysis service failed: {0}")]
    Request(String),
    /// A 2xx response whose body did not have the expected shape.
    #[error("unexpected response from analysis service: {0}")]
    Decode(String),
}

impl OracleError {
    pub fn transport(status: u16, message: impl Into<String>) -> Self {
        Self::Transport {
            status,
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for OracleError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            OracleError::Decode(e.to_string())
        } else {
            OracleError::Request(e.to_string())
        }
    }
}

/// The remote analysis service.
#[async_trait::async_trait]
pub trait AnalysisOracle: Send + Sync {
    /// Submit one URL. The response carries the new job id in `processing`.
    async fn submit_job(&self, request: &SubmitJobRequest) -> Result<SubmitJobResponse, OracleError>;

    /// Submit several URLs as one batch. Job ids are aligned with `request.urls`.
    async fn submit_batch(
        &self,
        request: &SubmitBatchRequest,
    ) -> Result<SubmitBatchResponse, OracleError>;

    async fn job_status(&self, job_id: &JobId) -> Result<JobStatusReport, OracleError>;

    async fn batch_status(&self, batch_id: &BatchId) -> Result<BatchStatusReport, OracleError>;

    async fn job_results(
        &self,
        job_id: &JobId,
        format: ResultFormat,
    ) -> Result<ResultPayload<JobStatusReport>, OracleError>;

    async fn batch_results(
        &self,
        batch_id: &BatchId,
        format: ResultFormat,
    ) -> Result<ResultPayload<BatchStatusReport>, OracleError>;
}

#[async_trait::async_trait]
impl<O> AnalysisOracle for Arc<O>
where
    O: AnalysisOracle + ?Sized,
{
    async fn submit_job(&self, request: &SubmitJobRequest) -> Result<SubmitJobResponse, OracleError> {
        (**self).submit_job(request).await
    }

    async fn submit_batch(
        &self,
        request: &SubmitBatchRequest,
    ) -> Result<SubmitBatchResponse, OracleError> {
        (**self).submit_batch(request).await
    }

    async fn job_status(&self, job_id: &JobId) -> Result<JobStatusReport, OracleError> {
        (**self).job_status(job_id).await
    }

    async fn batch_status(&self, batch_id: &BatchId) -> Result<BatchStatusReport, OracleError> {
        (**self).batch_status(batch_id).await
    }

    async fn job_results(
        &self,
        job_id: &JobId,
        format: ResultFormat,
    ) -> Result<ResultPayload<JobStatusReport>, OracleError> {
        (**self).job_results(job_id, format).await
    }

    async fn batch_results(
        &self,
        batch_id: &BatchId,
        format: ResultFormat,
    ) -> Result<ResultPayload<BatchStatusReport>, OracleError> {
        (**self).batch_results(batch_id, format).await
    }
}
