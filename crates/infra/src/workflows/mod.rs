//! Tool-level workflows: submission, retrieval, waiting and administration.
//!
//! Each tool combines the tracker, the cache and the analysis service and
//! returns text for a human or an agent to read. Failures are rendered as text
//! too (`is_error = true`); only an unknown tool name escapes [`ToolService::call`]
//! as an error.

pub mod args;
mod admin;
mod auto_polling;
mod render;
mod retrieval;
mod submission;

use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use url::Url;

use sitelens_core::{BatchStatusReport, DomainError, JobStatusReport};

use crate::cache::ResultsCache;
use crate::oracle::{AnalysisOracle, OracleError};
use crate::polling::{PollPolicy, StatusWaiter, WaitError};
use crate::store::{KeyValueStore, StoreError};
use crate::tracker::JobTracker;

pub use args::*;

/// Largest number of URLs accepted in one batch.
pub const MAX_BULK_URLS: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error(transparent)]
    Invalid(#[from] DomainError),
    #[error(transparent)]
    Oracle(#[from] OracleError),
    #[error(transparent)]
    Wait(#[from] WaitError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("invalid arguments for {tool}: {message}")]
    InvalidArguments { tool: String, message: String },
    #[error("unknown tool: {0}")]
    UnknownTool(String),
}

/// Text result of a tool invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolOutput {
    pub text: String,
    pub is_error: bool,
}

impl ToolOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: true,
        }
    }
}

/// A tool as advertised to callers.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    #[serde(skip)]
    action: &'static str,
}

const TOOLS: &[ToolSpec] = &[
    ToolSpec {
        name: "submit_job",
        description: "Submit a single URL for analysis. Returns a job id immediately.",
        action: "submitting job",
    },
    ToolSpec {
        name: "submit_bulk_job",
        description: "Submit up to 100 URLs as one batch. Returns a batch id and one job id per URL.",
        action: "submitting bulk job",
    },
    ToolSpec {
        name: "get_job_results",
        description: "Get the results of a job (json or csv). Serves cached results when available.",
        action: "fetching job results",
    },
    ToolSpec {
        name: "get_batch_results",
        description: "Get the results of a batch (json or csv), or its progress while it is running.",
        action: "fetching batch results",
    },
    ToolSpec {
        name: "check_job_status",
        description: "Check the current status of a job.",
        action: "checking job status",
    },
    ToolSpec {
        name: "download_results",
        description: "Download raw results for a job or a batch. CSV by default.",
        action: "downloading results",
    },
    ToolSpec {
        name: "list_jobs",
        description: "List recently submitted jobs, newest first.",
        action: "listing jobs",
    },
    ToolSpec {
        name: "list_batches",
        description: "List recently submitted batches, newest first.",
        action: "listing batches",
    },
    ToolSpec {
        name: "analyze_url_wait",
        description: "Analyze a URL and wait for the result. Uses the cache when possible.",
        action: "during analysis",
    },
    ToolSpec {
        name: "analyze_bulk_wait",
        description: "Analyze several URLs as a batch and wait for all of them to finish.",
        action: "during batch analysis",
    },
    ToolSpec {
        name: "configure_webhook",
        description: "Set the webhook URL notified when jobs and batches finish.",
        action: "configuring webhook",
    },
    ToolSpec {
        name: "clear_cache",
        description: "Clear cached results for one URL, or everything when no URL is given.",
        action: "clearing cache",
    },
    ToolSpec {
        name: "cache_stats",
        description: "Show how many results are cached and for which URLs.",
        action: "reading cache statistics",
    },
];

pub fn catalog() -> &'static [ToolSpec] {
    TOOLS
}

pub fn find_tool(name: &str) -> Option<&'static ToolSpec> {
    TOOLS.iter().find(|tool| tool.name == name)
}

fn decode<T: DeserializeOwned>(tool: &str, args: Value) -> Result<T, ToolError> {
    let args = if args.is_null() {
        Value::Object(Default::default())
    } else {
        args
    };
    serde_json::from_value(args).map_err(|e| ToolError::InvalidArguments {
        tool: tool.to_string(),
        message: e.to_string(),
    })
}

/// Accept absolute http(s) URLs; the caller's (trimmed) spelling is kept as the cache key.
pub(crate) fn validate_url(raw: &str) -> Result<String, DomainError> {
    let trimmed = raw.trim();
    let parsed = Url::parse(trimmed)
        .map_err(|e| DomainError::validation(format!("invalid url '{trimmed}': {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(DomainError::validation(format!(
            "url must use http or https: '{trimmed}'"
        )));
    }
    Ok(trimmed.to_string())
}

pub(crate) fn validate_urls(raw: &[String]) -> Result<Vec<String>, DomainError> {
    if raw.is_empty() || raw.len() > MAX_BULK_URLS {
        return Err(DomainError::validation(format!(
            "expected between 1 and {MAX_BULK_URLS} urls, got {}",
            raw.len()
        )));
    }
    raw.iter().map(|url| validate_url(url)).collect()
}

pub(crate) fn parse_id<T>(raw: &str) -> Result<T, DomainError>
where
    T: FromStr<Err = DomainError>,
{
    raw.parse()
}

/// Tool front end over a tracker, a results cache and the analysis service.
pub struct ToolService<S: KeyValueStore, O: AnalysisOracle> {
    tracker: JobTracker<S>,
    cache: Arc<ResultsCache<S>>,
    waiter: StatusWaiter<O>,
    job_policy: PollPolicy,
    batch_policy: PollPolicy,
    shutdown: CancellationToken,
}

impl<S: KeyValueStore, O: AnalysisOracle> ToolService<S, O> {
    pub fn new(tracker: JobTracker<S>, cache: Arc<ResultsCache<S>>, oracle: O) -> Self {
        Self {
            tracker,
            cache,
            waiter: StatusWaiter::new(oracle),
            job_policy: PollPolicy::for_jobs(),
            batch_policy: PollPolicy::for_batches(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Override the poll intervals. Timeouts still come from each call's arguments.
    pub fn with_poll_policies(mut self, job: PollPolicy, batch: PollPolicy) -> Self {
        self.job_policy = job;
        self.batch_policy = batch;
        self
    }

    /// Waits in progress end with `Cancelled` once `token` fires.
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    pub fn tracker(&self) -> &JobTracker<S> {
        &self.tracker
    }

    pub fn cache(&self) -> &Arc<ResultsCache<S>> {
        &self.cache
    }

    pub fn oracle(&self) -> &O {
        self.waiter.oracle()
    }

    /// Run a tool by name with JSON arguments.
    ///
    /// Tool failures come back as `Ok` output with `is_error` set; `Err` means
    /// the name is not a known tool.
    pub async fn call(&self, name: &str, args: Value) -> Result<ToolOutput, ToolError> {
        let tool = find_tool(name).ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        tracing::debug!(tool = tool.name, "running tool");

        match self.dispatch(tool.name, args).await {
            Ok(output) => Ok(output),
            Err(e) => {
                tracing::warn!(tool = tool.name, error = %e, "tool failed");
                Ok(ToolOutput::error(format!("Error {}: {e}", tool.action)))
            }
        }
    }

    async fn dispatch(&self, name: &str, args: Value) -> Result<ToolOutput, ToolError> {
        match name {
            "submit_job" => self.submit_job(decode(name, args)?).await,
            "submit_bulk_job" => self.submit_bulk_job(decode(name, args)?).await,
            "get_job_results" => self.get_job_results(decode(name, args)?).await,
            "get_batch_results" => self.get_batch_results(decode(name, args)?).await,
            "check_job_status" => self.check_job_status(decode(name, args)?).await,
            "download_results" => self.download_results(decode(name, args)?).await,
            "list_jobs" => self.list_jobs(decode(name, args)?).await,
            "list_batches" => self.list_batches(decode(name, args)?).await,
            "analyze_url_wait" => self.analyze_url_wait(decode(name, args)?).await,
            "analyze_bulk_wait" => self.analyze_bulk_wait(decode(name, args)?).await,
            "configure_webhook" => self.configure_webhook(decode(name, args)?).await,
            "clear_cache" => self.clear_cache(decode(name, args)?).await,
            "cache_stats" => self.cache_stats().await,
            other => Err(ToolError::UnknownTool(other.to_string())),
        }
    }

    /// Webhook for a submission: the caller's, else the configured one.
    async fn resolve_webhook(&self, requested: Option<String>) -> Result<Option<String>, ToolError> {
        match requested {
            Some(url) => Ok(Some(validate_url(&url)?)),
            None => Ok(self.tracker.webhook_url().await?),
        }
    }

    /// Write a terminal job report through: cache first, then the tracker.
    async fn absorb_job(&self, url: &str, report: &JobStatusReport) -> Result<(), ToolError> {
        if let JobStatusReport::Completed { job_id, result } = report {
            self.cache.cache_result(url, job_id, result).await?;
        }
        self.tracker.settle_job(report).await?;
        Ok(())
    }

    /// Write a batch report through: every finished member, then the batch itself.
    async fn absorb_batch(&self, report: &BatchStatusReport) -> Result<(), ToolError> {
        for job in &report.jobs {
            let member = job.as_job_report();
            if member.is_terminal() {
                self.absorb_job(&job.url, &member).await?;
            }
        }
        if report.is_terminal() {
            let completed_at = chrono::Utc::now();
            self.tracker
                .update_batch_status(&report.batch_id, report.status, Some(completed_at))
                .await?;
        }
        Ok(())
    }
}
