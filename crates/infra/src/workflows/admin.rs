use super::args::{ClearCacheArgs, ConfigureWebhookArgs};
use super::{ToolError, ToolOutput, ToolService, render, validate_url};
use crate::oracle::AnalysisOracle;
use crate::store::KeyValueStore;

impl<S: KeyValueStore, O: AnalysisOracle> ToolService<S, O> {
    /// Replace the webhook used for submissions that do not name one.
    pub async fn configure_webhook(&self, args: ConfigureWebhookArgs) -> Result<ToolOutput, ToolError> {
        let url = validate_url(&args.webhook_url)?;
        let config = self.tracker().set_webhook_url(&url).await?;
        tracing::info!(webhook_url = %config.url, "webhook configured");
        Ok(ToolOutput::text(render::webhook_configured(&config)))
    }

    /// Clear one URL's cached result, or the whole cache when no URL is given.
    pub async fn clear_cache(&self, args: ClearCacheArgs) -> Result<ToolOutput, ToolError> {
        let text = match args.url {
            Some(url) => {
                let url = url.trim();
                if self.cache().clear_cache(url).await? {
                    format!("Cache cleared for {url}")
                } else {
                    format!("No cached results found for {url}")
                }
            }
            None => {
                let cleared = self.cache().clear_all_cache().await?;
                tracing::info!(cleared, "cache cleared");
                format!("Cleared {cleared} cached results")
            }
        };
        Ok(ToolOutput::text(text))
    }

    pub async fn cache_stats(&self) -> Result<ToolOutput, ToolError> {
        let stats = self.cache().cache_stats().await?;
        Ok(ToolOutput::text(render::cache_stats(&stats)))
    }
}
