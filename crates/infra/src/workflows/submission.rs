use sitelens_core::{
    BatchRecord, JobRecord, SubmitBatchRequest, SubmitBatchResponse, SubmitJobRequest,
    SubmitJobResponse,
};
use tracing::info;

use super::args::{SubmitBulkJobArgs, SubmitJobArgs};
use super::{ToolError, ToolOutput, ToolService, render, validate_url, validate_urls};
use crate::oracle::AnalysisOracle;
use crate::store::KeyValueStore;

impl<S: KeyValueStore, O: AnalysisOracle> ToolService<S, O> {
    pub async fn submit_job(&self, args: SubmitJobArgs) -> Result<ToolOutput, ToolError> {
        let url = validate_url(&args.url)?;
        let response = self.start_job(&url, args.webhook_url).await?;
        Ok(ToolOutput::text(render::job_submitted(&response, &url)))
    }

    pub async fn submit_bulk_job(&self, args: SubmitBulkJobArgs) -> Result<ToolOutput, ToolError> {
        let urls = validate_urls(&args.urls)?;
        let response = self.start_batch(urls, args.webhook_url).await?;
        Ok(ToolOutput::text(render::batch_submitted(&response)))
    }

    /// Submit one URL and track it as processing.
    pub(crate) async fn start_job(
        &self,
        url: &str,
        webhook_url: Option<String>,
    ) -> Result<SubmitJobResponse, ToolError> {
        let request = SubmitJobRequest {
            url: url.to_string(),
            webhook_url: self.resolve_webhook(webhook_url).await?,
        };
        let response = self.oracle().submit_job(&request).await?;

        self.tracker()
            .record_job(&JobRecord::processing(response.job_id.clone(), url))
            .await?;
        info!(job_id = %response.job_id, url = %url, "job submitted");
        Ok(response)
    }

    /// Submit URLs as a batch; track the batch and each member job.
    pub(crate) async fn start_batch(
        &self,
        urls: Vec<String>,
        webhook_url: Option<String>,
    ) -> Result<SubmitBatchResponse, ToolError> {
        let request = SubmitBatchRequest {
            urls,
            webhook_url: self.resolve_webhook(webhook_url).await?,
        };
        let response = self.oracle().submit_batch(&request).await?;

        let batch = BatchRecord::processing(
            response.batch_id.clone(),
            response.job_ids.clone(),
            request.urls,
        )?;
        self.tracker().record_batch(&batch).await?;
        for (job_id, url) in batch.members() {
            let job = JobRecord::processing(job_id.clone(), url).in_batch(batch.batch_id.clone());
            self.tracker().record_job(&job).await?;
        }

        info!(
            batch_id = %response.batch_id,
            jobs = response.job_ids.len(),
            "batch submitted"
        );
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use sitelens_core::{BatchId, JobId, JobStatus};

    use super::super::tests::service;
    use super::*;
    use crate::oracle::OracleError;

    #[tokio::test]
    async fn submit_job_tracks_processing_record() {
        let (service, oracle) = service();
        let out = service
            .submit_job(SubmitJobArgs {
                url: "https://acme.test".to_string(),
                webhook_url: None,
            })
            .await
            .unwrap();

        assert!(!out.is_error);
        assert!(out.text.contains("Job ID: job-1"));
        let job = service.tracker().get_job(&JobId::new("job-1")).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Processing);
        assert_eq!(job.url, "https://acme.test");
        assert_eq!(oracle.submissions()[0].webhook_url, None);
    }

    #[tokio::test]
    async fn configured_webhook_is_used_when_none_given() {
        let (service, oracle) = service();
        service
            .tracker()
            .set_webhook_url("https://hooks.test/in")
            .await
            .unwrap();

        service
            .call("submit_job", json!({"url": "https://acme.test"}))
            .await
            .unwrap();
        service
            .call(
                "submit_job",
                json!({"url": "https://acme.test", "webhook_url": "https://other.test/hook"}),
            )
            .await
            .unwrap();

        let submissions = oracle.submissions();
        assert_eq!(submissions[0].webhook_url.as_deref(), Some("https://hooks.test/in"));
        assert_eq!(submissions[1].webhook_url.as_deref(), Some("https://other.test/hook"));
    }

    #[tokio::test]
    async fn batch_of_three_tracks_aligned_members() {
        let (service, _) = service();
        let urls = vec![
            "https://a.test".to_string(),
            "https://b.test".to_string(),
            "https://c.test".to_string(),
        ];
        let out = service
            .submit_bulk_job(SubmitBulkJobArgs {
                urls: urls.clone(),
                webhook_url: None,
            })
            .await
            .unwrap();
        assert!(out.text.contains("Total URLs: 3"));

        let batch = service
            .tracker()
            .get_batch(&BatchId::new("batch-1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(batch.job_ids.len(), 3);
        assert_eq!(batch.urls.len(), 3);

        for (job_id, url) in batch.job_ids.iter().zip(&urls) {
            let job = service.tracker().get_job(job_id).await.unwrap().unwrap();
            assert_eq!(&job.url, url);
            assert_eq!(job.batch_id, Some(batch.batch_id.clone()));
        }
    }

    #[tokio::test]
    async fn invalid_input_is_rejected_before_submission() {
        let (service, oracle) = service();
        let out = service
            .call("submit_bulk_job", json!({"urls": []}))
            .await
            .unwrap();
        assert!(out.is_error);
        assert!(out.text.contains("expected between 1 and 100 urls"));

        let out = service
            .call("submit_job", json!({"url": "not a url"}))
            .await
            .unwrap();
        assert!(out.is_error);
        assert!(oracle.submissions().is_empty());
    }

    #[tokio::test]
    async fn service_errors_leave_nothing_tracked() {
        let (service, oracle) = service();
        oracle.fail_next(OracleError::transport(401, "invalid api key"));

        let out = service
            .call("submit_job", json!({"url": "https://acme.test"}))
            .await
            .unwrap();
        assert!(out.is_error);
        assert_eq!(
            out.text,
            "Error submitting job: analysis service error (401): invalid api key"
        );
        assert!(service.tracker().list_jobs(20).await.unwrap().is_empty());
    }
}
