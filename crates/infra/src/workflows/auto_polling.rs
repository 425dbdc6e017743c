use std::time::Duration;

use sitelens_core::JobStatusReport;

use super::args::{AnalyzeBulkWaitArgs, AnalyzeUrlWaitArgs};
use super::{ToolError, ToolOutput, ToolService, render, validate_url, validate_urls};
use crate::oracle::AnalysisOracle;
use crate::store::KeyValueStore;

impl<S: KeyValueStore, O: AnalysisOracle> ToolService<S, O> {
    /// Analyze one URL end to end: cache lookup, submit, wait, cache, settle.
    pub async fn analyze_url_wait(&self, args: AnalyzeUrlWaitArgs) -> Result<ToolOutput, ToolError> {
        let url = validate_url(&args.url)?;

        if let Some(cached) = self.cache().get_cached_result(&url).await? {
            tracing::info!(url = %url, job_id = %cached.job_id, "cache hit");
            return Ok(ToolOutput::text(render::analysis(
                "Analysis Results (from cache)",
                &url,
                None,
                &cached.result,
            )));
        }

        let submitted = self.start_job(&url, args.webhook_url).await?;
        let job_id = submitted.job_id;
        let policy = self
            .job_policy
            .with_timeout(Duration::from_secs(args.timeout_seconds));

        let report = self
            .waiter
            .wait_for_job_until(&job_id, policy, &self.shutdown)
            .await?;

        self.absorb_job(&url, &report).await?;
        match report {
            JobStatusReport::Completed { result, .. } => Ok(ToolOutput::text(render::analysis(
                "Analysis Results",
                &url,
                Some(job_id.as_str()),
                &result,
            ))),
            JobStatusReport::Failed { error, .. } => Ok(ToolOutput::error(format!(
                "Analysis failed for {url}\n\nJob ID: {job_id}\nError: {}",
                error.as_deref().unwrap_or("unknown error")
            ))),
            JobStatusReport::Processing { .. } => Ok(ToolOutput::text(format!(
                "Analysis still processing.\n\nJob ID: {job_id}\nUse get_job_results to check later."
            ))),
        }
    }

    /// Analyze URLs as one batch and wait for the batch to settle.
    ///
    /// Every member is reported on its own; one failed job does not hide the rest.
    pub async fn analyze_bulk_wait(&self, args: AnalyzeBulkWaitArgs) -> Result<ToolOutput, ToolError> {
        let urls = validate_urls(&args.urls)?;
        let submitted = self.start_batch(urls, args.webhook_url).await?;
        let batch_id = submitted.batch_id;
        let policy = self
            .batch_policy
            .with_timeout(Duration::from_secs(args.timeout_seconds));

        let report = self
            .waiter
            .wait_for_batch_until(&batch_id, policy, &self.shutdown)
            .await?;

        self.absorb_batch(&report).await?;
        Ok(ToolOutput::text(render::batch_summary(&report)))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use sitelens_core::{AnalysisReport, BatchId, JobId, JobStatus};

    use super::super::tests::service;

    fn named(name: &str) -> AnalysisReport {
        AnalysisReport {
            company_name: Some(name.to_string()),
            tldr: Some(format!("{name} does things")),
            ..AnalysisReport::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn completed_wait_caches_then_settles() {
        let (service, oracle) = service();
        oracle.complete_after("job-1", 2, named("Acme"));

        let out = service
            .call("analyze_url_wait", json!({"url": "https://acme.test"}))
            .await
            .unwrap();

        assert!(!out.is_error);
        assert!(out.text.starts_with("# Analysis Results\n\n**URL:** https://acme.test\n**Job ID:** job-1"));
        assert_eq!(oracle.job_status_calls(&JobId::new("job-1")), 3);

        let cached = service
            .cache()
            .get_cached_result("https://acme.test")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cached.job_id, JobId::new("job-1"));
        let job = service.tracker().get_job(&JobId::new("job-1")).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.completed_at.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn cache_hit_skips_submission() {
        let (service, oracle) = service();
        service
            .cache()
            .cache_result("https://acme.test", &JobId::new("old-job"), &named("Acme"))
            .await
            .unwrap();

        let out = service
            .call("analyze_url_wait", json!({"url": "https://acme.test"}))
            .await
            .unwrap();

        assert!(out.text.starts_with("# Analysis Results (from cache)"));
        assert!(out.text.contains("**Company:** Acme"));
        assert!(oracle.submissions().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_is_an_error_naming_the_job_and_budget() {
        let (service, oracle) = service();

        let out = service
            .call(
                "analyze_url_wait",
                json!({"url": "https://slow.test", "timeout_seconds": 30}),
            )
            .await
            .unwrap();

        assert!(out.is_error);
        assert_eq!(out.text, "Error during analysis: job job-1 timed out after 30000ms");
        assert_eq!(oracle.job_status_calls(&JobId::new("job-1")), 6);
        let job = service.tracker().get_job(&JobId::new("job-1")).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Processing);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_analysis_is_an_error_and_settles() {
        let (service, oracle) = service();
        oracle.fail_job("job-1", "site unreachable");

        let out = service
            .call("analyze_url_wait", json!({"url": "https://down.test"}))
            .await
            .unwrap();

        assert!(out.is_error);
        assert!(out.text.contains("Error: site unreachable"));
        let job = service.tracker().get_job(&JobId::new("job-1")).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(service.cache().cache_stats().await.unwrap().urls.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn bulk_wait_reports_each_member_independently() {
        let (service, oracle) = service();
        oracle.complete_after("job-1", 1, named("Alpha"));
        oracle.fail_job("job-2", "blocked");
        oracle.complete_after("job-3", 2, named("Gamma"));

        let out = service
            .call(
                "analyze_bulk_wait",
                json!({"urls": ["https://a.test", "https://b.test", "https://c.test"]}),
            )
            .await
            .unwrap();

        assert!(!out.is_error);
        assert!(out.text.contains("**Completed:** 2\n**Failed:** 1"));
        assert!(out.text.contains("### 1. https://a.test\n**Status:** completed\n**Company:** Alpha"));
        assert!(out.text.contains("### 2. https://b.test\n**Status:** failed\n**Error:** blocked"));
        assert!(out.text.contains("### 3. https://c.test\n**Status:** completed\n**Company:** Gamma"));
        assert_eq!(oracle.batch_status_calls(&BatchId::new("batch-1")), 3);

        let stats = service.cache().cache_stats().await.unwrap();
        assert_eq!(stats.total_cached, 2);
        let batch = service
            .tracker()
            .get_batch(&BatchId::new("batch-1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(batch.status, JobStatus::Completed);
        let failed = service.tracker().get_job(&JobId::new("job-2")).await.unwrap().unwrap();
        assert_eq!(failed.error.as_deref(), Some("blocked"));
    }

    #[tokio::test(start_paused = true)]
    async fn bulk_wait_timeout_names_the_batch() {
        let (service, _) = service();
        let out = service
            .call(
                "analyze_bulk_wait",
                json!({"urls": ["https://a.test"], "timeout_seconds": 20}),
            )
            .await
            .unwrap();
        assert!(out.is_error);
        assert_eq!(
            out.text,
            "Error during batch analysis: batch batch-1 timed out after 20000ms"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_waits() {
        let (service, _) = service();
        let token = tokio_util::sync::CancellationToken::new();
        let service = service.with_shutdown(token.clone());
        token.cancel();

        let out = service
            .call("analyze_url_wait", json!({"url": "https://a.test"}))
            .await
            .unwrap();
        assert!(out.is_error);
        assert_eq!(out.text, "Error during analysis: wait for job job-1 was cancelled");
    }
}
