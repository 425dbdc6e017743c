use std::sync::Arc;

use axum::{Json, extract::Extension, http::StatusCode};

use sitelens_infra::workflows::catalog;

use crate::app::dto::ServiceInfo;
use crate::app::services::AppServices;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn index(Extension(services): Extension<Arc<AppServices>>) -> Json<ServiceInfo> {
    Json(ServiceInfo {
        name: "sitelens",
        version: env!("CARGO_PKG_VERSION"),
        description: "Website analysis jobs with tracking, result caching and waiting",
        tools: catalog().len(),
        started_at: services.started_at,
    })
}
