//! HTTP client for the analysis service REST API.

use std::time::Duration;

use reqwest::{RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use url::Url;

use sitelens_core::{
    BatchId, BatchStatusReport, JobId, JobStatusReport, ResultFormat, ResultPayload,
    SubmitBatchRequest, SubmitBatchResponse, SubmitJobRequest, SubmitJobResponse,
};

use super::{AnalysisOracle, OracleError};

pub const DEFAULT_BASE_URL: &str = "https://whitecontext.com/api";

const API_KEY_HEADER: &str = "x-api-key";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Error body shape used by the service. Either field may be missing.
#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

/// Pick the most useful message out of a failed response body.
///
/// JSON `{ "message" }` wins over `{ "error" }`; anything else falls back to the
/// raw text, then to the status reason.
fn error_message(body: &str, reason: Option<&str>, status: u16) -> String {
    if let Ok(parsed) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = parsed.message.or(parsed.error).filter(|m| !m.is_empty()) {
            return message;
        }
    }
    let body = body.trim();
    if !body.is_empty() {
        return body.to_string();
    }
    reason.map(str::to_string).unwrap_or_else(|| format!("HTTP {status}"))
}

pub struct HttpOracle {
    client: reqwest::Client,
    base_url: Url,
    api_key: String,
}

impl HttpOracle {
    /// Client for the public service endpoint.
    pub fn new(api_key: impl Into<String>) -> Result<Self, OracleError> {
        Self::with_options(api_key, DEFAULT_BASE_URL, DEFAULT_TIMEOUT)
    }

    pub fn with_options(
        api_key: impl Into<String>,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self, OracleError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| OracleError::Request(format!("invalid base url {base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(OracleError::Request(format!("invalid base url {base_url}")));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OracleError::Request(format!("failed to build http client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            api_key: api_key.into(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Base URL plus percent-encoded path segments.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, OracleError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| OracleError::Request(format!("invalid base url {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn results_endpoint(&self, segments: &[&str], format: ResultFormat) -> Result<Url, OracleError> {
        let mut url = self.endpoint(segments)?;
        url.query_pairs_mut().append_pair("format", format.as_str());
        Ok(url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.header(API_KEY_HEADER, &self.api_key)
    }

    async fn ensure_success(response: Response) -> Result<Response, OracleError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = error_message(&body, status.canonical_reason(), status.as_u16());
        tracing::warn!(status = status.as_u16(), message = %message, "analysis service returned an error");
        Err(OracleError::transport(status.as_u16(), message))
    }

    async fn fetch_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, OracleError> {
        let response = self.authorized(request).send().await?;
        let response = Self::ensure_success(response).await?;
        Ok(response.json().await?)
    }

    async fn fetch_text(&self, request: RequestBuilder) -> Result<String, OracleError> {
        let response = self.authorized(request).send().await?;
        let response = Self::ensure_success(response).await?;
        Ok(response.text().await?)
    }

    async fn fetch_results<T: DeserializeOwned>(
        &self,
        url: Url,
        format: ResultFormat,
    ) -> Result<ResultPayload<T>, OracleError> {
        let request = self.client.get(url);
        match format {
            ResultFormat::Json => Ok(ResultPayload::Json(self.fetch_json(request).await?)),
            ResultFormat::Csv => Ok(ResultPayload::Csv(self.fetch_text(request).await?)),
        }
    }
}

#[async_trait::async_trait]
impl AnalysisOracle for HttpOracle {
    async fn submit_job(&self, request: &SubmitJobRequest) -> Result<SubmitJobResponse, OracleError> {
        let url = self.endpoint(&["analyze"])?;
        tracing::debug!(url = %request.url, "submitting job");
        self.fetch_json(self.client.post(url).json(request)).await
    }

    async fn submit_batch(
        &self,
        request: &SubmitBatchRequest,
    ) -> Result<SubmitBatchResponse, OracleError> {
        let url = self.endpoint(&["analyze", "bulk"])?;
        tracing::debug!(urls = request.urls.len(), "submitting batch");
        self.fetch_json(self.client.post(url).json(request)).await
    }

    async fn job_status(&self, job_id: &JobId) -> Result<JobStatusReport, OracleError> {
        let url = self.endpoint(&["analyze", job_id.as_str()])?;
        self.fetch_json(self.client.get(url)).await
    }

    async fn batch_status(&self, batch_id: &BatchId) -> Result<BatchStatusReport, OracleError> {
        let url = self.endpoint(&["analyze", "bulk", batch_id.as_str()])?;
        self.fetch_json(self.client.get(url)).await
    }

    async fn job_results(
        &self,
        job_id: &JobId,
        format: ResultFormat,
    ) -> Result<ResultPayload<JobStatusReport>, OracleError> {
        let url = self.results_endpoint(&["analyze", job_id.as_str(), "results"], format)?;
        self.fetch_results(url, format).await
    }

    async fn batch_results(
        &self,
        batch_id: &BatchId,
        format: ResultFormat,
    ) -> Result<ResultPayload<BatchStatusReport>, OracleError> {
        let url =
            self.results_endpoint(&["analyze", "bulk", batch_id.as_str(), "results"], format)?;
        self.fetch_results(url, format).await
    }
}
