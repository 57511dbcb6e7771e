//! Loopback-only access guard
//!
//! Runtime reconfiguration is trusted solely because it is unreachable from
//! off-host callers. The guard rejects non-loopback peers before the request
//! body is ever inspected.

use std::net::{IpAddr, SocketAddr};

use axum::{
    extract::{ConnectInfo, Request},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::error::BridgeError;

/// Middleware restricting a route to loopback peers
pub async fn loopback_guard(
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Result<Response, BridgeError> {
    ensure_loopback(peer.ip())?;
    Ok(next.run(request).await)
}

/// Reject any peer address that is not loopback
pub fn ensure_loopback(peer: IpAddr) -> Result<(), BridgeError> {
    if peer.is_loopback() {
        Ok(())
    } else {
        warn!(%peer, "rejected internal request from non-loopback address");
        Err(BridgeError::AccessDenied)
    }
}
