use serde::{Deserialize, Serialize};

/// Body of POST /assist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistRequest {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// Answer returned to the client, plus the caller's remaining allowance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistResponse {
    pub answer: String,
    pub model: String,
    pub usage_count: u32,
    pub usage_limit: u32,
}
