//! Single-slot tunnel registry.
//!
//! The relay supports exactly one active tunnel at a time: a new
//! authenticated connection replaces the previous one, and teardown is
//! compare-and-clear so a stale connection can never erase its
//! replacement.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::ws::Message;
use tokio::sync::{mpsc, RwLock};

use burrow_shared::{Error, Result};

static NEXT_CONN_ID: AtomicU64 = AtomicU64::new(1);

/// Handle to one live tunnel connection.
///
/// Frames written through it funnel into the connection's single
/// writer loop, so application messages and keepalive pings never
/// interleave mid-frame.
pub struct TunnelConn {
    id: u64,
    user: String,
    tx: mpsc::Sender<Message>,
}

impl TunnelConn {
    pub fn new(user: String, tx: mpsc::Sender<Message>) -> Self {
        Self {
            id: NEXT_CONN_ID.fetch_add(1, Ordering::Relaxed),
            user,
            tx,
        }
    }

    /// User label presented at connect time, for log attribution.
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Queue an application frame for the writer loop. Fails once the
    /// connection's loop has exited.
    pub async fn send_text(&self, frame: String) -> Result<()> {
        self.tx
            .send(Message::Text(frame))
            .await
            .map_err(|_| Error::ConnectionLost)
    }

    /// Ask the connection's writer loop to shut the socket down.
    pub async fn close(&self) {
        let _ = self.tx.send(Message::Close(None)).await;
    }
}

/// The single tunnel-connection slot.
///
/// Lookups (one per proxied request) take the read lock; connect and
/// disconnect take the write lock. No lock is held across a network
/// operation: `install` hands the displaced connection back to the
/// caller, which closes it after releasing the lock.
#[derive(Default)]
pub struct Registry {
    slot: RwLock<Option<Arc<TunnelConn>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a new connection, returning the one it displaced.
    pub async fn install(&self, conn: Arc<TunnelConn>) -> Option<Arc<TunnelConn>> {
        let mut slot = self.slot.write().await;
        slot.replace(conn)
    }

    /// Clear the slot only if it still holds `conn`. A false return
    /// means the connection was already replaced, and the caller
    /// should skip its "disconnected" log line.
    pub async fn remove_if(&self, conn: &TunnelConn) -> bool {
        let mut slot = self.slot.write().await;
        match slot.as_ref() {
            Some(current) if current.id == conn.id => {
                *slot = None;
                true
            }
            _ => false,
        }
    }

    /// The current connection, if a client is attached.
    pub async fn current(&self) -> Option<Arc<TunnelConn>> {
        self.slot.read().await.clone()
    }
}
