use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::Value;

use sitelens_infra::workflows::{ToolSpec, catalog};

use crate::app::dto::ToolCallResponse;
use crate::app::errors::{json_error, tool_error_to_response};
use crate::app::services::AppServices;

pub async fn list_tools() -> Json<&'static [ToolSpec]> {
    Json(catalog())
}

/// Run a tool. The body is a JSON object of arguments; an empty body means none.
///
/// Tool failures are still `200 OK` with `isError: true`.
pub async fn call_tool(
    Extension(services): Extension<Arc<AppServices>>,
    Path(name): Path<String>,
    body: Bytes,
) -> Response {
    let args = if body.iter().all(u8::is_ascii_whitespace) {
        Value::Null
    } else {
        match serde_json::from_slice::<Value>(&body) {
            Ok(args) => args,
            Err(e) => {
                return json_error(
                    StatusCode::BAD_REQUEST,
                    "invalid_json",
                    format!("request body is not valid JSON: {e}"),
                );
            }
        }
    };

    match services.tools.call(&name, args).await {
        Ok(output) => {
            if output.is_error {
                tracing::info!(tool = %name, "tool reported an error");
            }
            Json(ToolCallResponse::from(output)).into_response()
        }
        Err(e) => tool_error_to_response(e),
    }
}
