use chrono::{DateTime, Utc};
use serde::Serialize;

use sitelens_infra::workflows::ToolOutput;

#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub description: &'static str,
    pub tools: usize,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub text: String,
}

/// Tool result envelope: a list of content blocks plus an error flag.
#[derive(Debug, Serialize)]
pub struct ToolCallResponse {
    pub content: Vec<ContentBlock>,
    #[serde(rename = "isError")]
    pub is_error: bool,
}

impl From<ToolOutput> for ToolCallResponse {
    fn from(output: ToolOutput) -> Self {
        Self {
            content: vec![ContentBlock {
                kind: "text",
                text: output.text,
            }],
            is_error: output.is_error,
        }
    }
}
