//! Catch-all proxy handler.
//!
//! Correlates each inbound HTTP request with a response arriving over
//! the tunnel: mint an id, register a waiter, write the serialized
//! request to the active tunnel connection, then block until the
//! matching response is delivered or the timeout evicts the waiter.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::response::IntoResponse;
use hyper::header::{HeaderName, HeaderValue};
use hyper::Response;
use rand::rngs::OsRng;
use rand::RngCore;
use tokio::time::timeout;
use tracing::info;

use burrow_shared::protocol::{self, Headers};
use burrow_shared::Error;

use crate::registry::TunnelConn;
use crate::AppState;

/// How long a proxied request waits for its tunnel response before the
/// pending entry is evicted.
pub const RESPONSE_TIMEOUT: Duration = Duration::from_secs(30);

/// Largest request body the relay will buffer.
const MAX_BODY: usize = 10 * 1024 * 1024;

pub async fn proxy_handler(
    State(state): State<AppState>,
    req: Request<Body>,
) -> axum::response::Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let path = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());

    let reply = forward(&state, &method, &path, req).await;

    info!(
        "{} {} {} {:.2}ms",
        reply.status().as_u16(),
        method,
        path,
        start.elapsed().as_secs_f64() * 1000.0
    );
    reply
}

async fn forward(
    state: &AppState,
    method: &str,
    path: &str,
    req: Request<Body>,
) -> axum::response::Response {
    // No client attached: fail fast, without registering a waiter.
    let Some(conn) = state.registry.current().await else {
        return (StatusCode::SERVICE_UNAVAILABLE, Error::NoTunnel.to_string()).into_response();
    };

    let mut headers = Headers::new();
    for (name, value) in req.headers() {
        if let Ok(value) = value.to_str() {
            headers
                .entry(name.as_str().to_string())
                .or_default()
                .push(value.to_string());
        }
    }

    let body = match axum::body::to_bytes(req.into_body(), MAX_BODY).await {
        Ok(body) => body,
        Err(_) => {
            return (StatusCode::BAD_REQUEST, "failed to read body").into_response();
        }
    };

    let request = protocol::Request {
        id: new_id(),
        method: method.to_string(),
        path: path.to_string(),
        headers,
        body: body.to_vec(),
    };

    match correlate(state, conn, request).await {
        Ok(resp) => tunnel_response(resp),
        Err(err) => (error_status(&err), err.to_string()).into_response(),
    }
}

/// Register, write, wait. The pending entry is removed exactly once:
/// by the tunnel read loop resolving it, or here on failure/timeout.
async fn correlate(
    state: &AppState,
    conn: Arc<TunnelConn>,
    request: protocol::Request,
) -> Result<protocol::Response, Error> {
    let id = request.id.clone();
    let waiter = state.pending.register(&id);

    let frame = match serde_json::to_string(&request) {
        Ok(frame) => frame,
        Err(e) => {
            state.pending.evict(&id);
            return Err(Error::Protocol(e.to_string()));
        }
    };
    if conn.send_text(frame).await.is_err() {
        state.pending.evict(&id);
        return Err(Error::ConnectionLost);
    }

    match timeout(RESPONSE_TIMEOUT, waiter).await {
        Ok(Ok(resp)) => Ok(resp),
        Ok(Err(_)) => {
            state.pending.evict(&id);
            Err(Error::ConnectionLost)
        }
        Err(_) => {
            state.pending.evict(&id);
            Err(Error::UpstreamTimeout)
        }
    }
}

/// Mirror the tunneled response's status, headers, and body to the
/// external caller.
fn tunnel_response(resp: protocol::Response) -> axum::response::Response {
    let mut builder =
        Response::builder().status(StatusCode::from_u16(resp.status).unwrap_or(StatusCode::OK));
    if let Some(headers) = builder.headers_mut() {
        for (name, values) in &resp.headers {
            let Ok(name) = HeaderName::from_bytes(name.as_bytes()) else {
                continue;
            };
            for value in values {
                if let Ok(value) = HeaderValue::from_str(value) {
                    headers.append(name.clone(), value);
                }
            }
        }
    }
    match builder.body(Body::from(resp.body)) {
        Ok(r) => r.into_response(),
        Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, "response build error").into_response(),
    }
}

fn error_status(err: &Error) -> StatusCode {
    match err {
        Error::NoTunnel => StatusCode::SERVICE_UNAVAILABLE,
        Error::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
        Error::ConnectionLost | Error::Protocol(_) | Error::Connection(_) => {
            StatusCode::BAD_GATEWAY
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// 128 bits from the OS RNG, hex-encoded. Collisions are negligible at
/// any plausible request volume.
fn new_id() -> String {
    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}
