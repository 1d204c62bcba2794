use actix_web::http::StatusCode;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use crate::api::models::CaptionRequest;
use crate::codec::{self, ValidationRules};
use crate::remote::{CaptionModel, RemoteError};

pub const MISSING_IMAGE_MESSAGE: &str = "Please select an image to generate a caption";
pub const INVALID_BODY_MESSAGE: &str = "Invalid request body";
pub const NO_CAPTION_MESSAGE: &str = "No caption generated";
pub const FALLBACK_FAILURE_MESSAGE: &str = "Failed to generate caption";

/// Rejections produced by the caption pipeline
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProxyError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Internal(String),
}

impl ProxyError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ProxyError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<RemoteError> for ProxyError {
    fn from(err: RemoteError) -> Self {
        let message = err.to_string();
        if message.trim().is_empty() {
            ProxyError::Internal(FALLBACK_FAILURE_MESSAGE.to_string())
        } else {
            ProxyError::Internal(message)
        }
    }
}

/// Runs one caption request from raw body to caption text.
///
/// This function performs the following steps:
/// 1. Parses the JSON body and extracts the image field
/// 2. Decodes the data URI
/// 3. Validates type and size against `rules`
/// 4. Calls the model with the bytes labelled as `content_type`
/// 5. Rejects empty captions
///
/// Nothing is shared between calls and nothing is retried.
///
/// # Arguments
/// * `body` - Raw request body
/// * `model` - Caption model to call
/// * `rules` - Validation limits
/// * `content_type` - Fixed content type sent to the model
///
/// # Returns
/// * `Result<String, ProxyError>` - The caption or a classified rejection
#[instrument(skip(body, model, rules), fields(body_len = body.len()))]
pub async fn handle_caption_request(
    body: &[u8],
    model: &dyn CaptionModel,
    rules: &ValidationRules,
    content_type: &str,
) -> Result<String, ProxyError> {
    // Step 1: Parse the body
    let request: CaptionRequest = serde_json::from_slice(body).map_err(|e| {
        warn!("Rejected unparsable request body: {}", e);
        ProxyError::BadRequest(INVALID_BODY_MESSAGE.to_string())
    })?;

    let data_uri = match request.image.as_deref() {
        Some(image) if !image.is_empty() => image,
        _ => {
            warn!("Rejected request without image");
            return Err(ProxyError::BadRequest(MISSING_IMAGE_MESSAGE.to_string()));
        }
    };

    // Step 2: Decode
    let (mime_type, raw) = codec::decode(data_uri).map_err(|e| {
        warn!("Rejected malformed data URI: {:?}", e);
        ProxyError::BadRequest(e.to_string())
    })?;

    // Step 3: Validate
    codec::validate(&mime_type, &raw, rules).map_err(|e| {
        warn!("Rejected image (mime={}, bytes={}): {:?}", mime_type, raw.len(), e);
        ProxyError::BadRequest(e.to_string())
    })?;
    debug!("Image accepted: mime={}, bytes={}", mime_type, raw.len());

    // Step 4: Caption
    let caption = model.caption(raw, content_type).await.map_err(|e| {
        error!("Caption model failed: {:?}", e);
        ProxyError::from(e)
    })?;

    // Step 5: An empty caption counts as a failure; any other text is returned as-is
    if caption.is_empty() {
        error!("Caption model returned no caption");
        return Err(ProxyError::Internal(NO_CAPTION_MESSAGE.to_string()));
    }

    info!("Generated caption: {}", caption);
    Ok(caption)
}
