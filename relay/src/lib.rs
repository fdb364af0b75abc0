//! Relay server library.
//!
//! The public end of the tunnel: accepts one authenticated WebSocket
//! tunnel connection at `/tunnel` and proxies every other inbound
//! request through it. Exposed as a library so integration tests can
//! run the relay in-process.

pub mod pending;
pub mod proxy;
pub mod registry;
pub mod tunnel;

use std::sync::Arc;

use axum::routing::get;
use axum::Router;

use crate::pending::PendingResponses;
use crate::registry::Registry;

/// Shared relay state.
#[derive(Clone)]
pub struct AppState {
    pub token: String,
    pub registry: Arc<Registry>,
    pub pending: Arc<PendingResponses>,
}

impl AppState {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            registry: Arc::new(Registry::new()),
            pending: Arc::new(PendingResponses::new()),
        }
    }
}

/// Build the relay router: health probe, tunnel upgrade, and the
/// catch-all proxy.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/tunnel", get(tunnel::tunnel_handler))
        .fallback(proxy::proxy_handler)
        .with_state(state)
}
