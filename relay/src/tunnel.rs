//! Tunnel endpoint: authenticated WebSocket upgrade and the
//! per-connection socket loop.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{interval_at, sleep_until, Instant};
use tracing::{info, warn};

use burrow_shared::protocol::{self, PING_PERIOD, PONG_WAIT};

use crate::registry::TunnelConn;
use crate::AppState;

/// Outbound frames queued per connection before senders see
/// backpressure.
const WRITE_BUFFER: usize = 64;

pub async fn tunnel_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    // The credential is checked before the upgrade; a rejected connect
    // never touches the registry slot.
    if !authorized(&headers, &state.token) {
        return (StatusCode::UNAUTHORIZED, "unauthorized").into_response();
    }
    let user = headers
        .get("x-tunnel-user")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    ws.on_upgrade(move |socket| handle_socket(socket, state, user))
}

fn authorized(headers: &HeaderMap, token: &str) -> bool {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return false;
    };
    let Ok(value) = value.to_str() else {
        return false;
    };
    match value.strip_prefix("Bearer ") {
        Some(presented) => presented.trim() == token,
        None => false,
    }
}

async fn handle_socket(socket: WebSocket, state: AppState, user: String) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut outbound) = mpsc::channel::<Message>(WRITE_BUFFER);
    let conn = Arc::new(TunnelConn::new(user, tx));

    if let Some(previous) = state.registry.install(conn.clone()).await {
        info!(
            "{}new tunnel connection, closing previous",
            label(previous.user())
        );
        // Outside the registry lock: closing must not block lookups.
        previous.close().await;
    }
    info!("{}tunnel connected", label(conn.user()));

    let mut ping = interval_at(Instant::now() + PING_PERIOD, PING_PERIOD);
    let mut deadline = Instant::now() + PONG_WAIT;

    loop {
        tokio::select! {
            msg = stream.next() => match msg {
                Some(Ok(Message::Text(frame))) => {
                    match serde_json::from_str::<protocol::Response>(&frame) {
                        // A response whose waiter is gone is dropped.
                        Ok(resp) => {
                            state.pending.resolve(resp);
                        }
                        Err(e) => warn!("invalid response frame: {e}"),
                    }
                }
                Some(Ok(Message::Pong(_))) => {
                    deadline = Instant::now() + PONG_WAIT;
                }
                Some(Ok(Message::Ping(payload))) => {
                    if sink.send(Message::Pong(payload)).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    // A replaced connection dying is not news; the
                    // replacement already logged the transition.
                    let replaced = !matches!(
                        state.registry.current().await,
                        Some(ref current) if Arc::ptr_eq(current, &conn)
                    );
                    if !replaced {
                        warn!("{}tunnel read error: {e}", label(conn.user()));
                    }
                    break;
                }
                Some(Ok(_)) => {}
            },
            frame = outbound.recv() => match frame {
                Some(Message::Close(frame)) => {
                    let _ = sink.send(Message::Close(frame)).await;
                    break;
                }
                Some(msg) => {
                    if sink.send(msg).await.is_err() {
                        break;
                    }
                }
                None => break,
            },
            _ = ping.tick() => {
                if sink.send(Message::Ping(Vec::new())).await.is_err() {
                    break;
                }
            }
            _ = sleep_until(deadline) => {
                warn!("{}tunnel keepalive expired", label(conn.user()));
                break;
            }
        }
    }

    if state.registry.remove_if(&conn).await {
        info!("{}tunnel disconnected", label(conn.user()));
    }
}

fn label(user: &str) -> String {
    if user.is_empty() {
        String::new()
    } else {
        format!("[{user}] ")
    }
}
