//! Shapes exchanged with the remote analysis service.

use core::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::DomainError;
use crate::id::{BatchId, JobId};
use crate::record::JobStatus;

/// Analysis output for one URL.
///
/// Only the fields the tool surface renders are typed; everything else the
/// service returns is kept verbatim in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tldr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_model: Option<BusinessModel>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BusinessModel {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_market: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Status of a single job as reported by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobStatusReport {
    Processing {
        job_id: JobId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        current_stage: Option<String>,
    },
    Completed {
        job_id: JobId,
        result: AnalysisReport,
    },
    Failed {
        job_id: JobId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

impl JobStatusReport {
    pub fn job_id(&self) -> &JobId {
        match self {
            JobStatusReport::Processing { job_id, .. }
            | JobStatusReport::Completed { job_id, .. }
            | JobStatusReport::Failed { job_id, .. } => job_id,
        }
    }

    pub fn status(&self) -> JobStatus {
        match self {
            JobStatusReport::Processing { .. } => JobStatus::Processing,
            JobStatusReport::Completed { .. } => JobStatus::Completed,
            JobStatusReport::Failed { .. } => JobStatus::Failed,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }
}

/// Aggregate counters for a batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchProgress {
    pub total: u32,
    pub completed: u32,
    pub failed: u32,
    pub processing: u32,
    pub percentage: f64,
}

/// One member job inside a batch status report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchJobReport {
    pub job_id: JobId,
    pub url: String,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<AnalysisReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchJobReport {
    /// View this member as a standalone job report.
    ///
    /// A completed member without a result payload is treated as still processing.
    pub fn as_job_report(&self) -> JobStatusReport {
        match (self.status, &self.result) {
            (JobStatus::Completed, Some(result)) => JobStatusReport::Completed {
                job_id: self.job_id.clone(),
                result: result.clone(),
            },
            (JobStatus::Failed, _) => JobStatusReport::Failed {
                job_id: self.job_id.clone(),
                error: self.error.clone(),
            },
            _ => JobStatusReport::Processing {
                job_id: self.job_id.clone(),
                current_stage: None,
            },
        }
    }
}

/// Status of a batch as reported by the service.
///
/// The batch status is derived remotely; it is never computed from `jobs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchStatusReport {
    pub batch_id: BatchId,
    pub status: JobStatus,
    #[serde(default)]
    pub progress: BatchProgress,
    #[serde(default)]
    pub jobs: Vec<BatchJobReport>,
}

impl BatchStatusReport {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitJobRequest {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitJobResponse {
    pub job_id: JobId,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitBatchRequest {
    pub urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitBatchResponse {
    pub batch_id: BatchId,
    pub job_ids: Vec<JobId>,
    pub status: JobStatus,
    pub total_urls: usize,
}

/// Output format for result downloads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultFormat {
    #[default]
    Json,
    Csv,
}

impl ResultFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultFormat::Json => "json",
            ResultFormat::Csv => "csv",
        }
    }
}

impl FromStr for ResultFormat {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(ResultFormat::Json),
            "csv" => Ok(ResultFormat::Csv),
            other => Err(DomainError::validation(format!(
                "format must be one of: json, csv (got {other})"
            ))),
        }
    }
}

/// Result download: structured status, or the service's raw CSV text.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultPayload<T> {
    Json(T),
    Csv(String),
}
