use actix_web::{web, App, HttpServer};
use anyhow::Result;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument};

pub mod config;
pub mod handlers;
pub mod models;
pub mod processor;

use crate::api::config::ApiConfig;
use crate::api::handlers::{generate_caption_handler, health_check, StartedAt};
use crate::remote::{CaptionModel, HuggingFaceModel};

/// Route of the caption endpoint
pub const CAPTION_ROUTE: &str = "/api/generate-caption";

/// Registers the API routes and their shared state.
///
/// Used by [`start_server`] and by tests that build an in-process app.
pub fn configure(
    config: ApiConfig,
    model: Arc<dyn CaptionModel>,
    started: StartedAt,
) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg: &mut web::ServiceConfig| {
        cfg.app_data(web::PayloadConfig::new(config.max_body_bytes))
            .app_data(web::Data::new(config))
            .app_data(web::Data::new(model))
            .app_data(web::Data::new(started))
            .service(web::resource(CAPTION_ROUTE).route(web::post().to(generate_caption_handler)))
            .service(web::resource("/health").route(web::get().to(health_check)));
    }
}

/// Starts the API server with the specified configuration
///
/// Builds the caption model client from the configuration and serves the
/// caption and health endpoints until shutdown.
///
/// # Arguments
/// * `config` - API configuration
///
/// # Returns
/// * `Result<()>` - Success or an error
#[instrument(skip(config), fields(host = %config.host, port = config.port))]
pub async fn start_server(config: ApiConfig) -> Result<()> {
    info!("Starting caption API server on {}:{}", config.host, config.port);

    let model = HuggingFaceModel::new(&config.model_base_url, &config.model_id, config.api_key.as_deref())
        .map_err(|e| {
            error!("Failed to initialize caption model client: {}", e);
            e
        })?;
    let model: Arc<dyn CaptionModel> = Arc::new(model);

    serve(config, model).await
}

/// Serves the API with an already constructed model
pub async fn serve(config: ApiConfig, model: Arc<dyn CaptionModel>) -> Result<()> {
    let host = config.host.clone();
    let port = config.port;
    debug!(
        "Body limit: {} bytes, remote content type: {}",
        config.max_body_bytes, config.remote_content_type
    );

    let started = StartedAt(Instant::now());
    let server = HttpServer::new(move || {
        App::new().configure(configure(config.clone(), model.clone(), started))
    })
    .bind((host.as_str(), port))
    .map_err(|e| {
        error!("Failed to bind to {}:{}: {}", host, port, e);
        e
    })?;

    info!("Starting HTTP server at {}:{}", host, port);
    if let Err(e) = server.run().await {
        error!("Server error: {}", e);
        return Err(e.into());
    }

    info!("Server shutdown complete");
    Ok(())
}
