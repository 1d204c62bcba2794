use async_trait::async_trait;
use thiserror::Error;

#[cfg(any(test, feature = "test-util"))]
pub mod fake;
pub mod huggingface;

#[cfg(any(test, feature = "test-util"))]
pub use fake::FakeCaptionModel;
pub use huggingface::HuggingFaceModel;

/// Errors surfaced by a remote captioning model
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("{0}")]
    Transport(#[from] reqwest::Error),

    /// The model answered with a non-success status
    #[error("{message}")]
    Status { status: u16, message: String },

    #[error("Unexpected response from caption model: {0}")]
    Decode(String),

    /// Failure without a usable message
    #[error("Failed to generate caption")]
    Unknown,
}

/// A hosted image-to-text model.
///
/// Implementations return the generated text as-is; an empty string means
/// the model produced nothing and is treated by the caller as a failure.
#[async_trait]
pub trait CaptionModel: Send + Sync {
    /// Captions raw image bytes labelled with `content_type`
    async fn caption(&self, image: Vec<u8>, content_type: &str) -> Result<String, RemoteError>;

    /// Identifier reported by the health endpoint
    fn model_id(&self) -> &str;
}
