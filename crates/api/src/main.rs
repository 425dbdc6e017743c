use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;

use sitelens_api::app::{build_app, services};
use sitelens_infra::cache::CacheSweeper;
use sitelens_infra::config::Settings;
use sitelens_infra::oracle::HttpOracle;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    sitelens_observability::init();

    let settings = Settings::from_env().context("failed to load settings")?;
    let shutdown = CancellationToken::new();

    let store = services::open_store(&settings)
        .await
        .context("failed to open store")?;
    let oracle = HttpOracle::with_options(
        settings.api_key.clone(),
        &settings.base_url,
        settings.request_timeout,
    )
    .context("failed to build analysis client")?;
    tracing::info!(base_url = %oracle.base_url(), "analysis service configured");

    let services = services::AppServices::new(
        store,
        Arc::new(oracle),
        settings.cache_ttl_secs,
        shutdown.clone(),
    );

    let sweeper = settings.cache_sweep_interval.map(|interval| {
        CacheSweeper::new(services.tools.cache().clone(), interval).start(shutdown.clone())
    });

    let app = build_app(Arc::new(services));

    let listener = tokio::net::TcpListener::bind(settings.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", settings.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await
        .context("server error")?;

    shutdown.cancel();
    if let Some(sweeper) = sweeper {
        let _ = sweeper.await;
    }
    Ok(())
}

/// Resolves on Ctrl-C. Cancelling `shutdown` also ends waits that are still polling.
async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
    shutdown.cancel();
}
