//! Inference Bridge - OpenAI-compatible LLM gateway
//!
//! This library provides the core functionality for the inference bridge:
//! it forwards chat, vision and transcription requests to a configurable
//! OpenAI-compatible backend, translating streaming responses and retrying
//! transient upstream failures.

pub mod config;
pub mod error;
pub mod middleware;
pub mod proxy;
pub mod routes;
pub mod streaming;

use std::sync::Arc;

pub use crate::config::{BackendConfig, BackendUpdate, Settings, SharedBackendConfig};
pub use crate::error::{BridgeError, BridgeResult};
pub use crate::proxy::{ClientPool, LlmBackend};

/// Application state shared across all request handlers
pub struct AppState {
    pub settings: Settings,
    /// Runtime-mutable backend identity; handlers snapshot it per call
    pub backend: SharedBackendConfig,
    /// Upstream client with the shared connection pool
    pub llm: Arc<LlmBackend>,
}

impl AppState {
    /// Create a new application state
    pub fn new(settings: Settings) -> Self {
        let backend = SharedBackendConfig::new(settings.backend.clone());
        let llm = Arc::new(LlmBackend::new());

        Self {
            settings,
            backend,
            llm,
        }
    }
}
