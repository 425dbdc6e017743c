//! Human-readable text for tool output.

use std::fmt::Write;

use serde::Serialize;

use sitelens_core::{
    AnalysisReport, BatchJobReport, BatchRecord, BatchStatusReport, CachedResult, JobRecord,
    JobStatus, JobStatusReport, SubmitBatchResponse, SubmitJobResponse, WebhookConfig,
};

use crate::cache::CacheStats;

const UNKNOWN: &str = "unknown";

pub(crate) fn pretty<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("<unrenderable: {e}>"))
}

fn or_unknown(value: Option<&str>) -> &str {
    value.unwrap_or(UNKNOWN)
}

pub(crate) fn job_submitted(response: &SubmitJobResponse, url: &str) -> String {
    format!(
        "Job submitted.\n\nJob ID: {}\nURL: {url}\nStatus: {}\n\nUse check_job_status or get_job_results once it has finished.",
        response.job_id, response.status
    )
}

pub(crate) fn batch_submitted(response: &SubmitBatchResponse) -> String {
    let ids: Vec<&str> = response.job_ids.iter().map(|id| id.as_str()).collect();
    format!(
        "Batch submitted.\n\nBatch ID: {}\nTotal URLs: {}\nJob IDs: {}\nStatus: {}\n\nUse get_batch_results once processing has finished.",
        response.batch_id,
        response.total_urls,
        ids.join(", "),
        response.status
    )
}

/// Headline, summary and business model, followed by the full JSON.
pub(crate) fn analysis(title: &str, url: &str, job_id: Option<&str>, report: &AnalysisReport) -> String {
    let mut out = format!("# {title}\n\n**URL:** {url}\n");
    if let Some(job_id) = job_id {
        let _ = writeln!(out, "**Job ID:** {job_id}");
    }
    let _ = writeln!(out, "**Company:** {}", or_unknown(report.company_name.as_deref()));
    let _ = write!(out, "\n## Summary\n{}\n", or_unknown(report.tldr.as_deref()));

    let model = report.business_model.as_ref();
    let _ = write!(
        out,
        "\n## Business Model\nType: {}\nTarget Market: {}\n",
        or_unknown(model.and_then(|m| m.kind.as_deref())),
        or_unknown(model.and_then(|m| m.target_market.as_deref())),
    );
    let _ = write!(out, "\n## Full Results\n{}", pretty(report));
    out
}

pub(crate) fn cached_job_results(job_id: &str, cached: &CachedResult) -> String {
    format!(
        "# Cached Results for Job {job_id}\n\nCached at: {}\n\n{}",
        cached.cached_at.to_rfc3339(),
        pretty(&cached.result)
    )
}

pub(crate) fn job_results(report: &JobStatusReport) -> String {
    match report {
        JobStatusReport::Processing {
            job_id,
            current_stage,
        } => format!(
            "Job {job_id} is still processing. Current stage: {}",
            or_unknown(current_stage.as_deref())
        ),
        JobStatusReport::Failed { job_id, error } => {
            format!("Job {job_id} failed. Error: {}", or_unknown(error.as_deref()))
        }
        JobStatusReport::Completed { job_id, result } => {
            format!("# Results for Job {job_id}\n\n{}", pretty(result))
        }
    }
}

pub(crate) fn job_status(report: &JobStatusReport) -> String {
    match report {
        JobStatusReport::Completed { job_id, result } => format!(
            "Job {job_id} is COMPLETED.\nCompany: {}\nUse get_job_results to fetch the full results.",
            or_unknown(result.company_name.as_deref())
        ),
        JobStatusReport::Processing {
            job_id,
            current_stage,
        } => format!(
            "Job {job_id} is PROCESSING.\nCurrent stage: {}",
            or_unknown(current_stage.as_deref())
        ),
        JobStatusReport::Failed { job_id, error } => {
            format!("Job {job_id} FAILED.\nError: {}", or_unknown(error.as_deref()))
        }
    }
}

pub(crate) fn batch_results(report: &BatchStatusReport) -> String {
    let progress = &report.progress;
    if !report.is_terminal() {
        return format!(
            "Batch {} is still processing.\nProgress: {}/{} completed ({}%)\nFailed: {}, Processing: {}",
            report.batch_id,
            progress.completed,
            progress.total,
            progress.percentage,
            progress.failed,
            progress.processing
        );
    }
    format!(
        "# Batch Results for {}\n\nStatus: {}\nTotal Jobs: {}\nCompleted: {}\nFailed: {}\n\n{}",
        report.batch_id,
        report.status,
        progress.total,
        progress.completed,
        progress.failed,
        pretty(&report.jobs)
    )
}

fn batch_member(position: usize, job: &BatchJobReport) -> String {
    match (job.status, &job.result) {
        (JobStatus::Completed, Some(result)) => format!(
            "### {position}. {}\n**Status:** completed\n**Company:** {}\n**Summary:** {}\n",
            job.url,
            or_unknown(result.company_name.as_deref()),
            or_unknown(result.tldr.as_deref()),
        ),
        (JobStatus::Failed, _) => format!(
            "### {position}. {}\n**Status:** failed\n**Error:** {}\n",
            job.url,
            or_unknown(job.error.as_deref()),
        ),
        (status, _) => format!("### {position}. {}\n**Status:** {status}\n", job.url),
    }
}

/// Batch totals followed by one section per member job, in submission order.
pub(crate) fn batch_summary(report: &BatchStatusReport) -> String {
    let progress = &report.progress;
    let mut out = format!(
        "# Batch Analysis Results\n\n**Batch ID:** {}\n**Status:** {}\n**Total URLs:** {}\n**Completed:** {}\n**Failed:** {}\n**Processing:** {}\n**Progress:** {}%\n\n",
        report.batch_id,
        report.status,
        progress.total,
        progress.completed,
        progress.failed,
        progress.processing,
        progress.percentage
    );
    let members: Vec<String> = report
        .jobs
        .iter()
        .enumerate()
        .map(|(idx, job)| batch_member(idx + 1, job))
        .collect();
    out.push_str(&members.join("\n"));
    out
}

pub(crate) fn job_list(jobs: &[JobRecord]) -> String {
    if jobs.is_empty() {
        return "No jobs found in history. Submit one with submit_job or analyze_url_wait.".to_string();
    }
    let mut out = format!("# Recent Jobs ({})\n\n", jobs.len());
    for job in jobs {
        let _ = writeln!(
            out,
            "- {}: {} ({}) - Created: {}",
            job.job_id,
            job.url,
            job.status,
            job.created_at.to_rfc3339()
        );
    }
    out
}

pub(crate) fn batch_list(batches: &[BatchRecord]) -> String {
    if batches.is_empty() {
        return "No batches found in history. Submit one with submit_bulk_job or analyze_bulk_wait."
            .to_string();
    }
    let mut out = format!("# Recent Batches ({})\n\n", batches.len());
    for batch in batches {
        let _ = writeln!(
            out,
            "- {}: {} URLs ({}) - Created: {}",
            batch.batch_id,
            batch.urls.len(),
            batch.status,
            batch.created_at.to_rfc3339()
        );
    }
    out
}

pub(crate) fn webhook_configured(config: &WebhookConfig) -> String {
    format!(
        "Webhook configured.\n\nWebhook URL: {}\n\nNotifications are sent for:\n- job.completed\n- job.failed\n- batch.completed\n- batch.failed",
        config.url
    )
}

pub(crate) fn cache_stats(stats: &CacheStats) -> String {
    if stats.urls.is_empty() {
        return "Cache is empty.".to_string();
    }
    let mut out = format!("# Cache Statistics\n\nTotal cached: {}\n\n", stats.total_cached);
    for url in &stats.urls {
        let _ = writeln!(out, "- {url}");
    }
    out
}

#[cfg(test)]
mod tests {
    use sitelens_core::{BatchId, BatchProgress, BusinessModel, JobId};

    use super::*;

    #[test]
    fn analysis_fills_missing_fields_with_unknown() {
        let text = analysis("Analysis Results", "https://a.test", Some("job-1"), &AnalysisReport::default());
        assert!(text.contains("**Job ID:** job-1"));
        assert!(text.contains("**Company:** unknown"));
        assert!(text.contains("Type: unknown"));
    }

    #[test]
    fn analysis_shows_business_model() {
        let report = AnalysisReport {
            company_name: Some("Acme".to_string()),
            tldr: Some("Makes anvils".to_string()),
            business_model: Some(BusinessModel {
                kind: Some("B2B".to_string()),
                target_market: Some("Coyotes".to_string()),
                ..BusinessModel::default()
            }),
            ..AnalysisReport::default()
        };
        let text = analysis("Analysis Results", "https://acme.test", None, &report);
        assert!(!text.contains("Job ID"));
        assert!(text.contains("Makes anvils"));
        assert!(text.contains("Type: B2B\nTarget Market: Coyotes"));
    }

    #[test]
    fn batch_summary_reports_each_member() {
        let report = BatchStatusReport {
            batch_id: BatchId::new("b1"),
            status: JobStatus::Completed,
            progress: BatchProgress {
                total: 2,
                completed: 1,
                failed: 1,
                processing: 0,
                percentage: 100.0,
            },
            jobs: vec![
                BatchJobReport {
                    job_id: JobId::new("j1"),
                    url: "https://a.test".to_string(),
                    status: JobStatus::Completed,
                    result: Some(AnalysisReport {
                        company_name: Some("A".to_string()),
                        ..AnalysisReport::default()
                    }),
                    error: None,
                },
                BatchJobReport {
                    job_id: JobId::new("j2"),
                    url: "https://b.test".to_string(),
                    status: JobStatus::Failed,
                    result: None,
                    error: Some("timeout".to_string()),
                },
            ],
        };
        let text = batch_summary(&report);
        assert!(text.contains("### 1. https://a.test\n**Status:** completed\n**Company:** A"));
        assert!(text.contains("### 2. https://b.test\n**Status:** failed\n**Error:** timeout"));
    }

    #[test]
    fn empty_lists_point_at_submission_tools() {
        assert!(job_list(&[]).contains("submit_job"));
        assert!(batch_list(&[]).contains("submit_bulk_job"));
        assert_eq!(cache_stats(&CacheStats::default()), "Cache is empty.");
    }
}
