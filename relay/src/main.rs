//! burrow-relay: the publicly reachable end of the tunnel.
//!
//! Deploy this on a server to accept one authenticated tunnel
//! connection and proxy inbound HTTP traffic through it.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use tracing::{info, warn};

use burrow_relay::{app, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("burrow_relay=info")
        .init();

    if let Err(e) = burrow_shared::env::load(".env") {
        warn!("env: {e}");
    }

    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse()
        .context("invalid PORT")?;
    let token = std::env::var("TUN_TOKEN")
        .unwrap_or_default()
        .trim()
        .to_string();
    if token.is_empty() {
        anyhow::bail!("TUN_TOKEN is required");
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    info!("burrow-relay listening on {addr}");

    axum::serve(listener, app(AppState::new(token))).await?;
    Ok(())
}
