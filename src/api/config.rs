use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::remote::huggingface::{model_endpoint, DEFAULT_MODEL_BASE_URL, DEFAULT_MODEL_ID};

/// Prefix for environment overrides, e.g. `CAPTION_API_PORT=9000`
pub const ENV_PREFIX: &str = "CAPTION_API";

/// Variable the hosted model key is read from when not set in config
pub const API_KEY_ENV: &str = "HUGGINGFACE_API_KEY";

/// Content type presented to the caption model regardless of upload type
pub const DEFAULT_REMOTE_CONTENT_TYPE: &str = "image/webp";

/// Request body ceiling; above the image limit so oversize images get a
/// proper validation message instead of a transport rejection
pub const DEFAULT_MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

/// Configuration for the API server
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ApiConfig {
    /// Address to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Inference API host
    pub model_base_url: String,

    /// Model repository id
    pub model_id: String,

    /// Bearer token for the inference API
    pub api_key: Option<String>,

    /// Content type sent with every image
    pub remote_content_type: String,

    /// Largest accepted request body
    pub max_body_bytes: usize,

    /// Directory for log files
    pub log_dir: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            model_base_url: DEFAULT_MODEL_BASE_URL.to_string(),
            model_id: DEFAULT_MODEL_ID.to_string(),
            api_key: None,
            remote_content_type: DEFAULT_REMOTE_CONTENT_TYPE.to_string(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            log_dir: "logs".to_string(),
        }
    }
}

impl ApiConfig {
    /// Loads configuration from defaults, an optional file, and the environment.
    ///
    /// Later sources win: file values override defaults and `CAPTION_API_*`
    /// variables override the file.
    ///
    /// # Arguments
    /// * `path` - Optional config file (any format the `config` crate reads)
    ///
    /// # Returns
    /// * `Result<ApiConfig>` - The merged configuration or an error
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            debug!("Reading configuration file: {}", path);
            builder = builder.add_source(File::with_name(path).required(true));
        }
        builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true));

        let mut config: ApiConfig = builder
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;

        if config.api_key.is_none() {
            config.api_key = std::env::var(API_KEY_ENV).ok().filter(|key| !key.is_empty());
        }
        config.validate()?;
        Ok(config)
    }

    /// Checks values that would otherwise only fail at request time
    pub fn validate(&self) -> Result<()> {
        self.model_endpoint()?;
        if self.remote_content_type.is_empty() {
            anyhow::bail!("remote_content_type cannot be empty");
        }
        if self.max_body_bytes == 0 {
            anyhow::bail!("max_body_bytes must be greater than zero");
        }
        Ok(())
    }

    pub fn model_endpoint(&self) -> Result<Url> {
        model_endpoint(&self.model_base_url, &self.model_id)
    }
}
