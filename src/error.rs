//! Error types for the inference bridge
//!
//! Forwarding failures surface the upstream status and body unchanged; the
//! HTTP layer maps every forwarding failure to 502 so callers can tell
//! "the bridge is fine, the backend is not" apart from bridge bugs.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Application-level errors
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Upstream backend unreachable: {0}")]
    UpstreamUnavailable(String),

    #[error("Upstream backend returned {status}: {body}")]
    UpstreamRejected { status: u16, body: String },

    #[error("Invalid input: {0}")]
    ClientInput(String),

    #[error("Access denied")]
    AccessDenied,

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<reqwest::Error> for BridgeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            Self::UpstreamUnavailable(err.to_string())
        } else {
            Self::Internal(err.into())
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

/// Error details
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl BridgeError {
    /// HTTP status this error maps to at the gateway surface
    pub fn status_code(&self) -> StatusCode {
        match self {
            // All forwarding failures, including malformed transcription
            // input, surface as 502 per the gateway contract
            BridgeError::UpstreamUnavailable(_)
            | BridgeError::UpstreamRejected { .. }
            | BridgeError::ClientInput(_) => StatusCode::BAD_GATEWAY,
            BridgeError::AccessDenied => StatusCode::FORBIDDEN,
            BridgeError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            BridgeError::UpstreamUnavailable(_) => "UPSTREAM_UNAVAILABLE",
            BridgeError::UpstreamRejected { .. } => "UPSTREAM_ERROR",
            BridgeError::ClientInput(_) => "INVALID_INPUT",
            BridgeError::AccessDenied => "FORBIDDEN",
            BridgeError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for BridgeError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            BridgeError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code: self.code().to_string(),
                message,
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for convenience
pub type BridgeResult<T> = Result<T, BridgeError>;
