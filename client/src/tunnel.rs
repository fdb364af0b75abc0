//! Tunnel session and reconnect loop.
//!
//! One session is one authenticated WebSocket connection to the relay:
//! a read loop that spawns a task per tunneled request, a keepalive
//! exchange, and a single writer so replies and pings never interleave
//! mid-frame. The outer loop reconnects with jittered backoff until
//! interrupted.

use std::sync::Arc;

use anyhow::Result;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{interval_at, sleep, sleep_until, Instant};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{error, info, warn};

use burrow_shared::protocol::{self, PING_PERIOD, PONG_WAIT};
use burrow_shared::Error;

use crate::backoff::{self, Backoff};
use crate::config::ClientConfig;
use crate::forward::Forwarder;

/// Outbound frames buffered ahead of the writer.
const WRITE_BUFFER: usize = 64;

/// How a session ended when it did not fail.
#[derive(Debug, PartialEq, Eq)]
enum SessionEnd {
    /// Ctrl-C: stop reconnecting and exit.
    Interrupted,
    /// The relay closed the connection cleanly.
    Closed,
}

/// Outer loop: keep one tunnel session alive, reconnecting with
/// jittered backoff on failure, until interrupted.
pub async fn run(config: ClientConfig) -> Result<()> {
    let forwarder = Arc::new(Forwarder::new(config.local.clone(), config.allow.clone())?);
    let mut backoff = Backoff::new();

    loop {
        let started = Instant::now();
        let outcome = session(&config, forwarder.clone()).await;
        backoff.observe(started.elapsed());

        let base = match outcome {
            Ok(SessionEnd::Interrupted) => {
                info!("interrupted");
                return Ok(());
            }
            // A clean remote close is not a failure: retry, but do
            // not grow the backoff.
            Ok(SessionEnd::Closed) => backoff.current(),
            Err(e) => {
                error!("connection error: {e}");
                backoff.next()
            }
        };

        let delay = backoff::jitter(base);
        info!("reconnecting in {delay:?}...");
        tokio::select! {
            _ = sleep(delay) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                return Ok(());
            }
        }
    }
}

async fn session(
    config: &ClientConfig,
    forwarder: Arc<Forwarder>,
) -> std::result::Result<SessionEnd, Error> {
    let mut request = config
        .server
        .as_str()
        .into_client_request()
        .map_err(|e| Error::Config(format!("TUN_SERVER: {e}")))?;
    let auth = HeaderValue::from_str(&format!("Bearer {}", config.token))
        .map_err(|e| Error::Config(format!("TUN_TOKEN: {e}")))?;
    request.headers_mut().insert("Authorization", auth);
    if !config.user.is_empty() {
        if let Ok(user) = HeaderValue::from_str(&config.user) {
            request.headers_mut().insert("X-Tunnel-User", user);
        }
    }

    let (ws, _) = connect_async(request).await.map_err(connect_error)?;
    info!("connected to {}, forwarding to {}", config.server, config.local);

    let (mut sink, mut stream) = ws.split();
    let (tx, mut outbound) = mpsc::channel::<Message>(WRITE_BUFFER);

    let mut ping = interval_at(Instant::now() + PING_PERIOD, PING_PERIOD);
    let mut deadline = Instant::now() + PONG_WAIT;

    loop {
        tokio::select! {
            msg = stream.next() => match msg {
                Some(Ok(Message::Text(frame))) => {
                    match serde_json::from_str::<protocol::Request>(&frame) {
                        Ok(req) => {
                            // One task per tunneled request; replies
                            // funnel back through the writer channel.
                            let forwarder = forwarder.clone();
                            let tx = tx.clone();
                            tokio::spawn(async move {
                                reply(forwarder, req, tx).await;
                            });
                        }
                        Err(e) => warn!("invalid request frame: {e}"),
                    }
                }
                Some(Ok(Message::Ping(payload))) => {
                    if sink.send(Message::Pong(payload)).await.is_err() {
                        return Err(Error::ConnectionLost);
                    }
                }
                Some(Ok(Message::Pong(_))) => {
                    deadline = Instant::now() + PONG_WAIT;
                }
                Some(Ok(Message::Close(_))) | None => return Ok(SessionEnd::Closed),
                Some(Err(e)) => return Err(Error::Connection(e.to_string())),
                Some(Ok(_)) => {}
            },
            frame = outbound.recv() => {
                // The loop holds `tx`, so the channel cannot close.
                if let Some(msg) = frame {
                    if sink.send(msg).await.is_err() {
                        return Err(Error::ConnectionLost);
                    }
                }
            }
            _ = ping.tick() => {
                if sink.send(Message::Ping(Vec::new())).await.is_err() {
                    return Err(Error::ConnectionLost);
                }
            }
            _ = sleep_until(deadline) => {
                return Err(Error::Connection("keepalive expired".to_string()));
            }
            _ = tokio::signal::ctrl_c() => {
                let _ = sink.send(Message::Close(None)).await;
                return Ok(SessionEnd::Interrupted);
            }
        }
    }
}

async fn reply(forwarder: Arc<Forwarder>, req: protocol::Request, tx: mpsc::Sender<Message>) {
    info!("{} {}", req.method, req.path);
    let resp = forwarder.handle(req).await;
    match serde_json::to_string(&resp) {
        Ok(frame) => {
            if tx.send(Message::Text(frame)).await.is_err() {
                warn!("session ended before response could be written");
            }
        }
        Err(e) => error!("encode response: {e}"),
    }
}

/// A 401 handshake rejection is an auth failure, not a generic dial
/// error.
fn connect_error(e: WsError) -> Error {
    match &e {
        WsError::Http(resp) if resp.status() == 401 => Error::AuthRejected,
        _ => Error::Connection(e.to_string()),
    }
}
