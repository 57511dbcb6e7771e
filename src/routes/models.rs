//! Models endpoint
//!
//! Lists the models available from the upstream backend.

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Serialize;
use serde_json::Value;

use crate::{error::BridgeError, AppState};

/// Models list response
///
/// Model descriptors are backend-defined and passed through verbatim.
#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    pub data: Vec<Value>,
    pub default_model: String,
}

/// Fetch available models from the backend and return them with the
/// configured default model
pub async fn list_models(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ModelsResponse>, BridgeError> {
    let cfg = state.backend.snapshot().await;
    let data = state.llm.list_models(&cfg).await?;

    Ok(Json(ModelsResponse {
        data,
        default_model: cfg.chat_model,
    }))
}
