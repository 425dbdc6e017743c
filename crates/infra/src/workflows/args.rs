//! Tool arguments as they arrive from callers (JSON objects).

use serde::Deserialize;

use sitelens_core::ResultFormat;

use crate::tracker::DEFAULT_LIST_LIMIT;

pub const DEFAULT_WAIT_SECS: u64 = 300;
pub const DEFAULT_BULK_WAIT_SECS: u64 = 600;

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitJobArgs {
    pub url: String,
    #[serde(default)]
    pub webhook_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitBulkJobArgs {
    pub urls: Vec<String>,
    #[serde(default)]
    pub webhook_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobResultsArgs {
    pub job_id: String,
    #[serde(default)]
    pub format: ResultFormat,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchResultsArgs {
    pub batch_id: String,
    #[serde(default)]
    pub format: ResultFormat,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobStatusArgs {
    pub job_id: String,
}

fn csv() -> ResultFormat {
    ResultFormat::Csv
}

/// Exactly one of `job_id` / `batch_id` is expected; `job_id` wins if both are set.
#[derive(Debug, Clone, Deserialize)]
pub struct DownloadArgs {
    #[serde(default)]
    pub job_id: Option<String>,
    #[serde(default)]
    pub batch_id: Option<String>,
    #[serde(default = "csv")]
    pub format: ResultFormat,
}

fn default_limit() -> usize {
    DEFAULT_LIST_LIMIT
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListArgs {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

impl Default for ListArgs {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIST_LIMIT,
        }
    }
}

fn default_wait() -> u64 {
    DEFAULT_WAIT_SECS
}

fn default_bulk_wait() -> u64 {
    DEFAULT_BULK_WAIT_SECS
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalyzeUrlWaitArgs {
    pub url: String,
    #[serde(default = "default_wait")]
    pub timeout_seconds: u64,
    #[serde(default)]
    pub webhook_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalyzeBulkWaitArgs {
    pub urls: Vec<String>,
    #[serde(default = "default_bulk_wait")]
    pub timeout_seconds: u64,
    #[serde(default)]
    pub webhook_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConfigureWebhookArgs {
    pub webhook_url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClearCacheArgs {
    #[serde(default)]
    pub url: Option<String>,
}
