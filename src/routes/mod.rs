//! HTTP routes for the inference bridge
//!
//! This module defines all HTTP endpoints exposed by the gateway.

pub mod admin;
pub mod audio;
pub mod chat;
pub mod health;
pub mod metrics;
pub mod models;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{middleware::loopback::loopback_guard, AppState};

/// Create the main application router
pub fn create_router(state: Arc<AppState>) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Forwarding endpoints
    let api_routes = Router::new()
        .route("/v1/models", get(models::list_models))
        .route("/v1/chat/completions", post(chat::chat_completions))
        .route("/v1/vision/completions", post(chat::vision_completions))
        .route("/v1/audio/transcriptions", post(audio::transcribe))
        .route(
            "/v1/audio/transcriptions/base64",
            post(audio::transcribe_base64),
        );

    // Reconfiguration is gated on the peer address before any body parsing
    let admin_routes = Router::new()
        .route("/internal/config", post(admin::update_config))
        .layer(middleware::from_fn(loopback_guard));

    // Public routes - no restrictions
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/metrics", get(metrics::prometheus_metrics));

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .merge(admin_routes)
        // Global middleware (applied to all routes)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
