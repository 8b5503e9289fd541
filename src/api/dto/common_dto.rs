//! Shared response envelope fields.

use serde::Deserialize;
use serde_json::Value;

/// Default page size for `GET /api/trading/history`.
pub const DEFAULT_HISTORY_LIMIT: u32 = 50;

/// The status fields every backend response may carry alongside its payload.
///
/// `detail` is where the backend puts the reason for an HTTP error.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseMeta {
    /// Explicit success flag. Absent on some endpoints (notably the status
    /// endpoint), which is treated as success.
    #[serde(default)]
    pub success: Option<bool>,
    /// Human-readable outcome message.
    #[serde(default)]
    pub message: Option<String>,
    /// Error text reported alongside a failure.
    #[serde(default)]
    pub error: Option<String>,
    /// Error detail attached to non-2xx responses.
    #[serde(default)]
    pub detail: Option<Value>,
}

impl ResponseMeta {
    /// Extracts the meta fields from a response body. Bodies that are not
    /// objects yield an empty meta.
    #[must_use]
    pub fn from_body(body: &Value) -> Self {
        Self::deserialize(body).unwrap_or_default()
    }

    /// Returns `true` unless the backend explicitly reported failure.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.success != Some(false)
    }

    /// Best available description of a failure.
    #[must_use]
    pub fn failure_message(&self) -> String {
        if let Some(message) = self.error.as_ref().or(self.message.as_ref()) {
            return message.clone();
        }
        match &self.detail {
            Some(Value::String(detail)) => detail.clone(),
            Some(other) => other.to_string(),
            None => "request failed".to_string(),
        }
    }
}
