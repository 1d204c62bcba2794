use serde::{Deserialize, Serialize};

/// Request body for `POST /api/generate-caption`
#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct CaptionRequest {
    /// Image as a data URI
    #[serde(default)]
    pub image: Option<String>,
}

/// Outcome of a caption request, as it travels over the wire.
///
/// Serializes to `{"caption": "..."}` or `{"error": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CaptionResult {
    Caption { caption: String },
    Error { error: String },
}

impl CaptionResult {
    pub fn caption(caption: impl Into<String>) -> Self {
        CaptionResult::Caption { caption: caption.into() }
    }

    pub fn error(error: impl Into<String>) -> Self {
        CaptionResult::Error { error: error.into() }
    }
}

/// Health status response for the /health endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthStatus {
    /// Status indicator
    pub status: String,

    /// Caption model in use
    pub model: String,

    /// Server uptime in seconds
    pub uptime_secs: u64,
}
