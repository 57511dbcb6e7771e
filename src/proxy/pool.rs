//! Pooled HTTP client management
//!
//! One long-lived reqwest client carries all upstream traffic so TCP
//! connections to the backend are reused across calls. The client is built
//! lazily under a mutex, and a connect-level failure invalidates it so the
//! next acquisition rebuilds the pool.

use std::sync::Mutex;
use std::time::Duration;

/// Fail fast when the backend is unreachable
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Large completions and transcriptions take a while
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
/// Keepalive connections held below the effective connection ceiling
const MAX_IDLE_PER_HOST: usize = 5;
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

/// Lazily initialized, shared HTTP client
#[derive(Debug, Default)]
pub struct ClientPool {
    client: Mutex<Option<reqwest::Client>>,
}

impl ClientPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the pooled client, building it on first use.
    ///
    /// The check-and-create runs under the mutex, so concurrent first
    /// acquisitions cannot build duplicate pools.
    pub fn acquire(&self) -> reqwest::Client {
        let mut slot = self.client.lock().unwrap_or_else(|e| e.into_inner());
        slot.get_or_insert_with(Self::build).clone()
    }

    /// Drop the cached client; the next `acquire` rebuilds the pool.
    ///
    /// Called after connect-level failures, where the pooled connections
    /// may be stale.
    pub fn reset(&self) {
        let mut slot = self.client.lock().unwrap_or_else(|e| e.into_inner());
        *slot = None;
    }

    fn build() -> reqwest::Client {
        reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .pool_max_idle_per_host(MAX_IDLE_PER_HOST)
            .pool_idle_timeout(POOL_IDLE_TIMEOUT)
            .build()
            .expect("failed to build HTTP client")
    }
}
