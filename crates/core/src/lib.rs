//! `sitelens-core`: domain building blocks for tracking remote analysis jobs.
//!
//! This crate contains **pure domain** types (no storage, no network).

pub mod error;
pub mod id;
pub mod record;
pub mod report;

pub use error::{DomainError, DomainResult};
pub use id::{BatchId, JobId};
pub use record::{BatchRecord, CachedResult, JobRecord, JobStatus, StatusChange, WebhookConfig};
pub use report::{
    AnalysisReport, BatchJobReport, BatchProgress, BatchStatusReport, BusinessModel,
    JobStatusReport, ResultFormat, ResultPayload, SubmitBatchRequest, SubmitBatchResponse,
    SubmitJobRequest, SubmitJobResponse,
};
