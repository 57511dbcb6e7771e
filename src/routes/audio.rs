//! Audio transcription endpoints
//!
//! Forwards audio to the backend's transcription endpoint, either as a
//! multipart upload or as a base64 JSON payload decoded into the same shape.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Multipart, State},
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use crate::{
    error::BridgeError,
    proxy::TranscriptionRequest,
    routes::metrics::record_request,
    AppState,
};

fn default_filename() -> String {
    "audio.ogg".to_string()
}

/// Base64 transcription request body
#[derive(Debug, Clone, Deserialize)]
pub struct Base64TranscriptionRequest {
    pub audio_data: String,
    #[serde(default = "default_filename")]
    pub filename: String,
    pub model: Option<String>,
    pub language: Option<String>,
}

/// Handle multipart audio transcription requests
pub async fn transcribe(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<Value>, BridgeError> {
    let start_time = Instant::now();

    let mut audio = None;
    let mut filename = default_filename();
    let mut model = None;
    let mut language = None;
    let mut response_format = "json".to_string();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| BridgeError::ClientInput(format!("invalid multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                if let Some(file_name) = field.file_name() {
                    filename = file_name.to_string();
                }
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| BridgeError::ClientInput(format!("failed to read file part: {e}")))?;
                audio = Some(bytes.to_vec());
            }
            "model" => model = Some(read_text_field(field).await?),
            "language" => language = Some(read_text_field(field).await?),
            "response_format" => response_format = read_text_field(field).await?,
            _ => {}
        }
    }

    let audio = audio.ok_or_else(|| BridgeError::ClientInput("missing file part".to_string()))?;

    info!(filename = %filename, bytes = audio.len(), "forwarding audio transcription");

    let cfg = state.backend.snapshot().await;
    let request = TranscriptionRequest {
        audio,
        filename,
        model,
        language,
        response_format,
    };
    let body = state.llm.transcribe(request, &cfg).await?;

    record_request("success", "transcription", start_time.elapsed().as_secs_f64());
    Ok(Json(body))
}

/// Handle base64-encoded audio transcription requests
///
/// Malformed base64 fails before any upstream call is made.
pub async fn transcribe_base64(
    State(state): State<Arc<AppState>>,
    Json(request): Json<Base64TranscriptionRequest>,
) -> Result<Json<Value>, BridgeError> {
    let start_time = Instant::now();

    let cfg = state.backend.snapshot().await;
    let body = state
        .llm
        .transcribe_base64(
            &request.audio_data,
            request.filename,
            request.model,
            request.language,
            &cfg,
        )
        .await?;

    record_request("success", "transcription", start_time.elapsed().as_secs_f64());
    Ok(Json(body))
}

async fn read_text_field(field: axum::extract::multipart::Field<'_>) -> Result<String, BridgeError> {
    field
        .text()
        .await
        .map_err(|e| BridgeError::ClientInput(format!("invalid multipart field: {e}")))
}
