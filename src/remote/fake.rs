use async_trait::async_trait;
use std::sync::{Mutex, PoisonError};
use tracing::debug;

use crate::remote::{CaptionModel, RemoteError};

#[derive(Debug, Clone)]
enum Behavior {
    Caption(String),
    Fail(Option<String>),
}

/// A recorded call to [`FakeCaptionModel`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub image: Vec<u8>,
    pub content_type: String,
}

/// Deterministic stand-in for a hosted model
#[derive(Debug)]
pub struct FakeCaptionModel {
    behavior: Behavior,
    calls: Mutex<Vec<RecordedCall>>,
}

impl FakeCaptionModel {
    /// Always answers with `caption`
    pub fn returning(caption: &str) -> Self {
        Self::with_behavior(Behavior::Caption(caption.to_string()))
    }

    /// Answers with an empty caption
    pub fn empty() -> Self {
        Self::with_behavior(Behavior::Caption(String::new()))
    }

    /// Fails with `message` as the remote error
    pub fn failing(message: &str) -> Self {
        Self::with_behavior(Behavior::Fail(Some(message.to_string())))
    }

    /// Fails without any message
    pub fn failing_silently() -> Self {
        Self::with_behavior(Behavior::Fail(None))
    }

    fn with_behavior(behavior: Behavior) -> Self {
        Self {
            behavior,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[async_trait]
impl CaptionModel for FakeCaptionModel {
    async fn caption(&self, image: Vec<u8>, content_type: &str) -> Result<String, RemoteError> {
        debug!("Fake caption model called with {} bytes", image.len());
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedCall {
                image,
                content_type: content_type.to_string(),
            });

        match &self.behavior {
            Behavior::Caption(text) => Ok(text.clone()),
            Behavior::Fail(Some(message)) => Err(RemoteError::Status {
                status: 503,
                message: message.clone(),
            }),
            Behavior::Fail(None) => Err(RemoteError::Unknown),
        }
    }

    fn model_id(&self) -> &str {
        "fake/caption-model"
    }
}
