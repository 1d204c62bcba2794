use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, error, instrument};
use url::Url;

use crate::api::models::CaptionResult;
use crate::api::CAPTION_ROUTE;

/// Failures of the client-to-server exchange
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Could not reach the caption service: {0}")]
    Network(#[from] reqwest::Error),

    /// The server answered with any status other than 200
    #[error("{message}")]
    Rejected { status: u16, message: String },

    #[error("Unexpected response from the caption service: {0}")]
    MalformedResponse(String),
}

/// Sends an encoded image to a caption endpoint
#[async_trait]
pub trait CaptionTransport: Send + Sync {
    async fn generate_caption(&self, data_uri: &str) -> Result<String, TransportError>;
}

/// Talks to a caption server over HTTP
pub struct HttpTransport {
    client: Client,
    endpoint: Url,
}

impl HttpTransport {
    /// Creates a transport for the server at `base_url`
    ///
    /// # Arguments
    /// * `base_url` - Server root, e.g. `http://127.0.0.1:8080`
    ///
    /// # Returns
    /// * `Result<Self>` - The transport or an error for a bad URL
    pub fn new(base_url: &str) -> Result<Self> {
        let endpoint = Url::parse(base_url)
            .and_then(|base| base.join(CAPTION_ROUTE))
            .with_context(|| format!("Invalid server URL '{}'", base_url))?;
        // No timeout: the request runs until the server answers or the connection fails
        let client = Client::builder().build().context("Failed to build HTTP client")?;
        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl CaptionTransport for HttpTransport {
    #[instrument(skip(self, data_uri), fields(endpoint = %self.endpoint, len = data_uri.len()))]
    async fn generate_caption(&self, data_uri: &str) -> Result<String, TransportError> {
        debug!("Posting image to caption service");
        let resp = self
            .client
            .post(self.endpoint.clone())
            .json(&json!({ "image": data_uri }))
            .send()
            .await?;

        let status = resp.status();
        let body = resp.bytes().await?;
        let parsed = serde_json::from_slice::<CaptionResult>(&body);

        // Only 200 carries a caption
        if status != StatusCode::OK {
            let message = match parsed {
                Ok(CaptionResult::Error { error }) => error,
                _ => format!("Failed to generate caption (HTTP {})", status.as_u16()),
            };
            error!("Caption service rejected request: {} ({})", message, status);
            return Err(TransportError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        match parsed {
            Ok(CaptionResult::Caption { caption }) => Ok(caption),
            Ok(CaptionResult::Error { error }) => Err(TransportError::MalformedResponse(format!(
                "success status with error body: {}",
                error
            ))),
            Err(e) => Err(TransportError::MalformedResponse(e.to_string())),
        }
    }
}
