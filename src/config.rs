//! Configuration for the inference bridge
//!
//! Listen settings and upstream defaults are loaded from environment
//! variables once at startup. The upstream backend identity (URL, API key,
//! default models) then lives in a shared cell that can be rewritten at
//! runtime through the `/internal/config` endpoint without a restart.

use std::env;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Deserialize;
use tokio::sync::RwLock;

/// Default backend: a confidential-compute hosted OpenAI-compatible API.
/// For local dev point `LLM_BACKEND_URL` at Ollama or vLLM.
pub const DEFAULT_BACKEND_URL: &str = "https://api.redpill.ai/v1";
pub const DEFAULT_CHAT_MODEL: &str = "deepseek/deepseek-chat-v3-0324";
/// Whisper Small V3 Turbo keeps transcription latency low on CPU-only hosts.
pub const DEFAULT_STT_MODEL: &str = "whisper-small-v3-turbo";

/// Application configuration
#[derive(Debug, Clone)]
pub struct Settings {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Initial upstream backend identity
    pub backend: BackendConfig,
}

impl Settings {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("INFERENCE_PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()
                .context("Invalid INFERENCE_PORT")?,

            backend: BackendConfig {
                base_url: env::var("LLM_BACKEND_URL")
                    .unwrap_or_else(|_| DEFAULT_BACKEND_URL.to_string()),
                api_key: env::var("LLM_API_KEY").unwrap_or_default(),
                chat_model: env::var("MODEL_NAME")
                    .unwrap_or_else(|_| DEFAULT_CHAT_MODEL.to_string()),
                stt_model: env::var("STT_MODEL_NAME")
                    .unwrap_or_else(|_| DEFAULT_STT_MODEL.to_string()),
            },
        })
    }
}

/// Upstream backend identity
///
/// Forwarders receive an owned snapshot of this struct, never the shared
/// cell itself, so one call always sees a single consistent set of values.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Base URL of the OpenAI-compatible backend (includes the `/v1` prefix)
    pub base_url: String,
    /// Bearer token for the backend; empty means no Authorization header
    pub api_key: String,
    /// Default chat completion model
    pub chat_model: String,
    /// Default speech-to-text model
    pub stt_model: String,
}

/// Partial update applied through `/internal/config`
///
/// Absent fields leave the corresponding backend value untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BackendUpdate {
    pub llm_api_key: Option<String>,
    pub llm_backend_url: Option<String>,
    pub model_name: Option<String>,
}

/// Runtime-mutable backend configuration cell
///
/// Shared across all in-flight calls. Readers clone one snapshot at call
/// entry; a reconfiguration racing with an in-flight call can therefore
/// never mix old and new credentials within a single upstream request.
#[derive(Debug, Clone)]
pub struct SharedBackendConfig {
    inner: Arc<RwLock<BackendConfig>>,
}

impl SharedBackendConfig {
    pub fn new(initial: BackendConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(initial)),
        }
    }

    /// Take a consistent snapshot of the current backend identity
    pub async fn snapshot(&self) -> BackendConfig {
        self.inner.read().await.clone()
    }

    /// Overwrite the fields present in `update`, returning the names of the
    /// fields that were actually changed
    pub async fn apply(&self, update: BackendUpdate) -> Vec<&'static str> {
        let mut updated = Vec::new();
        let mut config = self.inner.write().await;

        if let Some(api_key) = update.llm_api_key {
            config.api_key = api_key;
            updated.push("llm_api_key");
        }
        if let Some(base_url) = update.llm_backend_url {
            config.base_url = base_url;
            updated.push("llm_backend_url");
        }
        if let Some(model_name) = update.model_name {
            config.chat_model = model_name;
            updated.push("model_name");
        }

        updated
    }
}
