//! Chat and vision completion endpoints
//!
//! OpenAI-compatible completion endpoints. Chat handles both streaming and
//! non-streaming responses; vision forwards multimodal content with a single
//! upstream attempt and no streaming.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::{
    error::BridgeError,
    routes::metrics::record_request,
    AppState,
};

/// Message content: a plain string or an ordered list of multimodal parts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

/// One part of a multimodal message
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

/// Chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: MessageContent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Backend-defined tool call objects, forwarded verbatim
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Value>,
}

fn default_temperature() -> f64 {
    0.7
}

fn default_max_tokens() -> u32 {
    2048
}

/// Chat completion request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub stream: bool,
    /// Tool definitions with backend-defined JSON schemas, forwarded verbatim
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<String>,
}

impl ChatCompletionRequest {
    /// Build the upstream payload.
    ///
    /// Fills in the configured default model when the request names none,
    /// and attaches `tools`/`tool_choice` only when tools are present
    /// (`tool_choice` defaults to `"auto"`).
    pub fn upstream_payload(&self, default_model: &str) -> Value {
        let mut payload = json!({
            "model": self.model.as_deref().unwrap_or(default_model),
            "messages": self.messages,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
            "stream": self.stream,
        });

        if let Some(tools) = &self.tools {
            if !tools.is_empty() {
                payload["tools"] = json!(tools);
                payload["tool_choice"] = json!(self.tool_choice.as_deref().unwrap_or("auto"));
            }
        }

        payload
    }
}

/// Handle chat completion requests
///
/// Proxies the request to the upstream backend, returning either the
/// upstream JSON verbatim or a translated SSE stream.
pub async fn chat_completions(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatCompletionRequest>,
) -> Result<Response, BridgeError> {
    let start_time = Instant::now();

    // One consistent view of the backend identity for the whole call
    let cfg = state.backend.snapshot().await;
    let payload = request.upstream_payload(&cfg.chat_model);
    let model = payload["model"].as_str().unwrap_or_default().to_string();

    info!(
        model = %model,
        stream = request.stream,
        messages = request.messages.len(),
        "forwarding chat completion"
    );

    if request.stream {
        let stream = state.llm.chat_completion_stream(&payload, &cfg).await?;

        // Re-emit each payload as an SSE event; a mid-stream error aborts
        // the body, leaving the stream without its [DONE] marker. The
        // duration metric covers the whole stream, recorded after the
        // last event is written.
        let events = async_stream::stream! {
            futures::pin_mut!(stream);
            while let Some(item) = stream.next().await {
                yield item.map(|payload| format!("data: {payload}\n\n"));
            }
            record_request("streaming", &model, start_time.elapsed().as_secs_f64());
        };

        let response = Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "text/event-stream")
            .header(header::CACHE_CONTROL, "no-cache")
            .header("X-Accel-Buffering", "no")
            .body(Body::from_stream(events))
            .map_err(|e| BridgeError::Internal(e.into()))?;

        Ok(response)
    } else {
        let body = state.llm.chat_completion(&payload, &cfg).await?;
        record_request("success", &model, start_time.elapsed().as_secs_f64());

        info!(
            model = %model,
            duration_ms = %format!("{:.2}", start_time.elapsed().as_secs_f64() * 1000.0),
            "chat completion request completed"
        );

        Ok(Json(body).into_response())
    }
}

/// Handle vision completion requests
///
/// Same payload shape as chat with multimodal content parts, but a single
/// upstream attempt: no retry, no streaming.
pub async fn vision_completions(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatCompletionRequest>,
) -> Result<Json<Value>, BridgeError> {
    let start_time = Instant::now();

    let cfg = state.backend.snapshot().await;
    let mut payload = request.upstream_payload(&cfg.chat_model);
    payload["stream"] = Value::Bool(false);
    let model = payload["model"].as_str().unwrap_or_default().to_string();

    info!(model = %model, messages = request.messages.len(), "forwarding vision completion");

    let body = state.llm.completion_once(&payload, &cfg).await?;
    record_request("success", &model, start_time.elapsed().as_secs_f64());

    Ok(Json(body))
}
