//! Runtime reconfiguration endpoint
//!
//! Rewrites the backend identity in-process. Reachable only from loopback;
//! the guard in `middleware::loopback` runs before this handler.

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Serialize;
use tracing::info;

use crate::{config::BackendUpdate, error::BridgeError, AppState};

/// Reconfiguration result, listing the fields that changed
#[derive(Debug, Serialize)]
pub struct ConfigUpdateResponse {
    pub status: &'static str,
    pub updated: Vec<&'static str>,
}

/// Apply a partial backend configuration update
pub async fn update_config(
    State(state): State<Arc<AppState>>,
    Json(update): Json<BackendUpdate>,
) -> Result<Json<ConfigUpdateResponse>, BridgeError> {
    let updated = state.backend.apply(update).await;

    info!(updated = ?updated, "backend configuration updated");

    Ok(Json(ConfigUpdateResponse {
        status: "ok",
        updated,
    }))
}
