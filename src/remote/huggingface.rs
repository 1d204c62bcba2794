use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, error, info, instrument, trace};
use url::Url;

use crate::remote::{CaptionModel, RemoteError};

/// Default Hugging Face inference host
pub const DEFAULT_MODEL_BASE_URL: &str = "https://api-inference.huggingface.co";

/// Default image-to-text model
pub const DEFAULT_MODEL_ID: &str = "Salesforce/blip-image-captioning-large";

/// One generated caption as returned by the inference API
#[derive(Debug, Deserialize)]
struct GeneratedText {
    #[serde(default)]
    generated_text: Option<String>,
}

/// The API answers with either a list of generations or a single object
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ImageToTextOutput {
    Many(Vec<GeneratedText>),
    One(GeneratedText),
}

impl ImageToTextOutput {
    fn into_text(self) -> String {
        let first = match self {
            ImageToTextOutput::Many(items) => items.into_iter().next(),
            ImageToTextOutput::One(item) => Some(item),
        };
        first.and_then(|item| item.generated_text).unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: String,
}

/// Image-to-text model served by the Hugging Face Inference API
pub struct HuggingFaceModel {
    client: Client,
    endpoint: Url,
    model_id: String,
}

impl HuggingFaceModel {
    /// Creates a client for `<base_url>/models/<model_id>`
    ///
    /// # Arguments
    /// * `base_url` - Inference API host, e.g. `https://api-inference.huggingface.co`
    /// * `model_id` - Model repository id
    /// * `api_key` - Optional bearer token
    ///
    /// # Returns
    /// * `Result<Self>` - A configured client or an error for a bad URL/key
    pub fn new(base_url: &str, model_id: &str, api_key: Option<&str>) -> Result<Self> {
        let endpoint = model_endpoint(base_url, model_id)?;

        let mut headers = HeaderMap::new();
        if let Some(key) = api_key {
            let value = HeaderValue::from_str(&format!("Bearer {}", key))
                .context("API key is not a valid header value")?;
            headers.insert(AUTHORIZATION, value);
        } else {
            debug!("No API key configured, calling caption model anonymously");
        }

        // No timeout: a captioning call fails only when the transport does
        let client = Client::builder()
            .default_headers(headers)
            .build()
            .context("Failed to build HTTP client")?;

        info!("Caption model endpoint: {}", endpoint);
        Ok(Self {
            client,
            endpoint,
            model_id: model_id.to_string(),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

/// Joins the API host and model id into the inference URL
pub fn model_endpoint(base_url: &str, model_id: &str) -> Result<Url> {
    let mut base = Url::parse(base_url).with_context(|| format!("Invalid model base URL '{}'", base_url))?;
    let path = format!("models/{}", model_id.trim_matches('/'));
    // Url::join replaces the last path segment unless the base ends in '/'
    if !base.path().ends_with('/') {
        let with_slash = format!("{}/", base.path());
        base.set_path(&with_slash);
    }
    base.join(&path)
        .with_context(|| format!("Invalid model id '{}'", model_id))
}

#[async_trait]
impl CaptionModel for HuggingFaceModel {
    #[instrument(skip(self, image), fields(bytes = image.len(), model = %self.model_id))]
    async fn caption(&self, image: Vec<u8>, content_type: &str) -> Result<String, RemoteError> {
        debug!("Sending image to caption model");
        let resp = self
            .client
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, content_type)
            .body(image)
            .send()
            .await
            .map_err(|e| {
                error!("Caption model request failed: {}", e);
                RemoteError::Transport(e)
            })?;

        let status = resp.status();
        let body = resp.bytes().await?;
        trace!("Caption model answered {} with {} bytes", status, body.len());

        if !status.is_success() {
            let message = serde_json::from_slice::<ApiError>(&body)
                .map(|e| e.error)
                .unwrap_or_else(|_| format!("Caption model returned HTTP {}", status.as_u16()));
            error!("Caption model rejected request: {} ({})", message, status);
            return Err(RemoteError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let output: ImageToTextOutput = serde_json::from_slice(&body)
            .map_err(|e| RemoteError::Decode(e.to_string()))?;
        Ok(output.into_text())
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}
