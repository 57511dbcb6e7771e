//! LLM backend client
//!
//! Forwards OpenAI-shaped requests to the configured upstream backend.
//! Chat completions carry a narrow retry policy: some aggregator backends
//! intermittently return 400 for tool-calling payloads when load-balanced
//! to an instance without tool support, so 400 is retried with backoff
//! while every other non-2xx status fails immediately.

use std::time::Duration;

use base64::Engine;
use futures::Stream;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::multipart;
use reqwest::StatusCode;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::BackendConfig;
use crate::error::{BridgeError, BridgeResult};
use crate::proxy::pool::ClientPool;
use crate::streaming::translate_stream;

/// Additional attempts after the first 400 (3 attempts total)
const MAX_RETRIES: u32 = 2;
/// Backoff grows linearly: 0.5s after the first failure, 1.0s after the second
const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

/// Audio transcription request forwarded as a multipart form
#[derive(Debug, Clone)]
pub struct TranscriptionRequest {
    pub audio: Vec<u8>,
    pub filename: String,
    pub model: Option<String>,
    pub language: Option<String>,
    pub response_format: String,
}

impl TranscriptionRequest {
    /// Decode a base64 payload into the multipart shape.
    ///
    /// Malformed base64 is a client-input failure and never reaches the
    /// upstream backend.
    pub fn from_base64(
        audio_data: &str,
        filename: String,
        model: Option<String>,
        language: Option<String>,
    ) -> BridgeResult<Self> {
        let audio = base64::engine::general_purpose::STANDARD
            .decode(audio_data)
            .map_err(|e| BridgeError::ClientInput(format!("invalid base64 audio data: {e}")))?;

        Ok(Self {
            audio,
            filename,
            model,
            language,
            response_format: "json".to_string(),
        })
    }
}

/// Client for the upstream OpenAI-compatible backend
///
/// Holds no backend identity itself: every call receives a [`BackendConfig`]
/// snapshot taken by the caller at request entry.
#[derive(Debug, Default)]
pub struct LlmBackend {
    pool: ClientPool,
}

impl LlmBackend {
    pub fn new() -> Self {
        Self {
            pool: ClientPool::new(),
        }
    }

    /// Forward a chat completion and return the upstream JSON body verbatim.
    ///
    /// Retries on 400 up to [`MAX_RETRIES`] extra attempts with the same
    /// payload; a 400 on the final attempt surfaces as a failure.
    pub async fn chat_completion(
        &self,
        payload: &Value,
        cfg: &BackendConfig,
    ) -> BridgeResult<Value> {
        let url = format!("{}/chat/completions", cfg.base_url);
        let client = self.pool.acquire();

        let mut attempt = 0u32;
        loop {
            let response = client
                .post(&url)
                .headers(self.auth_headers(cfg))
                .json(payload)
                .send()
                .await
                .map_err(|e| self.transport_error(e))?;

            let status = response.status();
            if status == StatusCode::BAD_REQUEST && attempt < MAX_RETRIES {
                attempt += 1;
                let body = response.text().await.unwrap_or_default();
                warn!(
                    attempt,
                    max_attempts = MAX_RETRIES + 1,
                    body = %truncate(&body, 500),
                    "upstream returned 400, retrying"
                );
                if let Some(names) = tool_names(payload) {
                    warn!(tools = ?names, "tools present in rejected payload");
                }
                tokio::time::sleep(RETRY_BASE_DELAY * attempt).await;
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(BridgeError::UpstreamRejected {
                    status: status.as_u16(),
                    body,
                });
            }

            return Ok(response.json().await?);
        }
    }

    /// Forward a completion-shaped request with a single attempt.
    ///
    /// The vision path uses this: no retry, no streaming.
    pub async fn completion_once(
        &self,
        payload: &Value,
        cfg: &BackendConfig,
    ) -> BridgeResult<Value> {
        let url = format!("{}/chat/completions", cfg.base_url);
        let response = self
            .pool
            .acquire()
            .post(&url)
            .headers(self.auth_headers(cfg))
            .json(payload)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BridgeError::UpstreamRejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }

    /// Forward a streaming chat completion.
    ///
    /// A non-2xx status before any body is read is a hard failure. Once
    /// emission begins the request is never retried: partial output may
    /// already be with the caller. Upstream EOF flushes any unterminated
    /// final line and appends one `[DONE]` payload; a mid-stream transport
    /// error ends the stream with an error and no terminal marker.
    pub async fn chat_completion_stream(
        &self,
        payload: &Value,
        cfg: &BackendConfig,
    ) -> BridgeResult<impl Stream<Item = BridgeResult<String>> + Send + 'static> {
        let url = format!("{}/chat/completions", cfg.base_url);
        let response = self
            .pool
            .acquire()
            .post(&url)
            .headers(self.auth_headers(cfg))
            .json(payload)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BridgeError::UpstreamRejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(translate_stream(response.bytes_stream()))
    }

    /// Fetch the backend's model list, unwrapping the top-level `data` array
    pub async fn list_models(&self, cfg: &BackendConfig) -> BridgeResult<Vec<Value>> {
        let url = format!("{}/models", cfg.base_url);
        let response = self
            .pool
            .acquire()
            .get(&url)
            .headers(self.auth_headers(cfg))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BridgeError::UpstreamRejected {
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = response.json().await?;
        Ok(body
            .get("data")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default())
    }

    /// Forward an audio transcription as a multipart form. Single attempt.
    pub async fn transcribe(
        &self,
        request: TranscriptionRequest,
        cfg: &BackendConfig,
    ) -> BridgeResult<Value> {
        let url = format!("{}/audio/transcriptions", cfg.base_url);
        let model = request
            .model
            .unwrap_or_else(|| cfg.stt_model.clone());

        debug!(model = %model, filename = %request.filename, bytes = request.audio.len(), "forwarding transcription");

        let file = multipart::Part::bytes(request.audio)
            .file_name(request.filename)
            .mime_str("application/octet-stream")
            .map_err(|e| BridgeError::Internal(e.into()))?;

        let mut form = multipart::Form::new()
            .text("model", model)
            .text("response_format", request.response_format)
            .part("file", file);
        if let Some(language) = request.language {
            form = form.text("language", language);
        }

        let response = self
            .pool
            .acquire()
            .post(&url)
            .headers(self.auth_headers(cfg))
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BridgeError::UpstreamRejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }

    /// Decode a base64 audio payload, then forward it like [`Self::transcribe`]
    pub async fn transcribe_base64(
        &self,
        audio_data: &str,
        filename: String,
        model: Option<String>,
        language: Option<String>,
        cfg: &BackendConfig,
    ) -> BridgeResult<Value> {
        let request = TranscriptionRequest::from_base64(audio_data, filename, model, language)?;
        self.transcribe(request, cfg).await
    }

    /// Authorization header when an API key is configured; empty otherwise
    fn auth_headers(&self, cfg: &BackendConfig) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if !cfg.api_key.is_empty() {
            match HeaderValue::from_str(&format!("Bearer {}", cfg.api_key)) {
                Ok(value) => {
                    headers.insert(AUTHORIZATION, value);
                }
                Err(e) => {
                    warn!(error = %e, "API key is not a valid header value, sending unauthenticated");
                }
            }
        }
        headers
    }

    /// Classify a transport failure; connect errors invalidate the pool so
    /// the next call rebuilds it
    fn transport_error(&self, err: reqwest::Error) -> BridgeError {
        if err.is_connect() {
            self.pool.reset();
        }
        BridgeError::UpstreamUnavailable(err.to_string())
    }
}

/// Names of the tools in a chat payload, for retry diagnostics
fn tool_names(payload: &Value) -> Option<Vec<&str>> {
    let tools = payload.get("tools")?.as_array()?;
    Some(
        tools
            .iter()
            .map(|tool| {
                tool.pointer("/function/name")
                    .and_then(Value::as_str)
                    .unwrap_or("?")
            })
            .collect(),
    )
}

/// Truncate to at most `max` characters without splitting a code point
fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
