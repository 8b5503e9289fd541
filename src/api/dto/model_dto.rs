//! AI model selection DTOs for `/api/ai/model`.

use serde::{Deserialize, Serialize};

/// Response body for `GET /api/ai/model`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiModelInfo {
    /// Model currently used for analysis (e.g. `"gpt"`, `"claude"`).
    pub current_model: String,
    /// Models the backend accepts.
    #[serde(default)]
    pub available_models: Vec<String>,
}

/// Request body for `POST /api/ai/model`.
#[derive(Debug, Clone, Serialize)]
pub struct SetAiModelRequest<'a> {
    /// Requested model name.
    pub model: &'a str,
}

/// Response body for `POST /api/ai/model`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SetAiModelResponse {
    /// Confirmation message.
    #[serde(default)]
    pub message: Option<String>,
    /// Model in effect after the change.
    #[serde(default)]
    pub current_model: Option<String>,
}
