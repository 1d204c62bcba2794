use actix_web::{web, HttpResponse, Responder};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::api::config::ApiConfig;
use crate::api::models::{CaptionResult, HealthStatus};
use crate::api::processor::{handle_caption_request, ProxyError};
use crate::codec::ValidationRules;
use crate::remote::CaptionModel;

/// Time the server started, for the health endpoint
#[derive(Debug, Clone, Copy)]
pub struct StartedAt(pub Instant);

/// HTTP handler for caption requests
///
/// Runs the caption pipeline on the raw body and maps its outcome onto
/// `200 {caption}`, `400 {error}` or `500 {error}`.
///
/// # Arguments
/// * `body` - Raw JSON request body
/// * `config` - API configuration
/// * `model` - Shared caption model
///
/// # Returns
/// * HTTP response with the caption or error information
#[instrument(skip(body, config, model), fields(body_len = body.len()))]
pub async fn generate_caption_handler(
    body: web::Bytes,
    config: web::Data<ApiConfig>,
    model: web::Data<Arc<dyn CaptionModel>>,
) -> impl Responder {
    info!("Received caption request");

    let rules = ValidationRules::default();
    match handle_caption_request(&body, model.get_ref().as_ref(), &rules, &config.remote_content_type).await {
        Ok(caption) => {
            info!("Caption request completed successfully");
            HttpResponse::Ok().json(CaptionResult::caption(caption))
        },
        Err(e @ ProxyError::BadRequest(_)) => {
            warn!("Caption request rejected: {}", e);
            HttpResponse::build(e.status_code()).json(CaptionResult::error(e.to_string()))
        },
        Err(e @ ProxyError::Internal(_)) => {
            warn!("Caption request failed: {}", e);
            HttpResponse::build(e.status_code()).json(CaptionResult::error(e.to_string()))
        },
    }
}

/// Health check endpoint for monitoring service status
///
/// # Arguments
/// * `model` - Shared caption model
/// * `started` - Server start time
///
/// # Returns
/// * HTTP response with health status information
#[instrument(skip(model, started))]
pub async fn health_check(
    model: web::Data<Arc<dyn CaptionModel>>,
    started: web::Data<StartedAt>,
) -> impl Responder {
    debug!("Processing health check request");
    let uptime_secs = started.0.elapsed().as_secs();

    HttpResponse::Ok().json(HealthStatus {
        status: "healthy".to_string(),
        model: model.model_id().to_string(),
        uptime_secs,
    })
}
