use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use sitelens_infra::workflows::ToolError;

/// Errors that escape a tool call. Everything else is reported inside the tool output.
pub fn tool_error_to_response(err: ToolError) -> axum::response::Response {
    match err {
        ToolError::UnknownTool(name) => json_error(
            StatusCode::NOT_FOUND,
            "unknown_tool",
            format!("no tool named '{name}'"),
        ),
        ToolError::InvalidArguments { message, .. } => {
            json_error(StatusCode::BAD_REQUEST, "invalid_arguments", message)
        }
        other => json_error(StatusCode::INTERNAL_SERVER_ERROR, "tool_error", other.to_string()),
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
