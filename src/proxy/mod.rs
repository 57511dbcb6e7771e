//! Upstream request forwarding
//!
//! `pool` owns the shared HTTP client; `backend` builds and issues the
//! actual upstream requests.

pub mod backend;
pub mod pool;

pub use backend::{LlmBackend, TranscriptionRequest};
pub use pool::ClientPool;
