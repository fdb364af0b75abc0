//! Pending-response table.
//!
//! Maps request ids to one-shot waiters. Every entry is removed
//! exactly once: either `resolve` delivers the matching response or
//! the proxy handler evicts it on timeout or write failure, never
//! both.

use dashmap::DashMap;
use tokio::sync::oneshot;
use tracing::debug;

use burrow_shared::protocol::Response;

#[derive(Default)]
pub struct PendingResponses {
    waiters: DashMap<String, oneshot::Sender<Response>>,
}

impl PendingResponses {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a waiter for `id`. At most one live entry per id.
    pub fn register(&self, id: &str) -> oneshot::Receiver<Response> {
        let (tx, rx) = oneshot::channel();
        self.waiters.insert(id.to_string(), tx);
        rx
    }

    /// Deliver a response to its waiter. A response with no matching
    /// entry (already timed out, or an unknown id) is dropped.
    pub fn resolve(&self, response: Response) -> bool {
        match self.waiters.remove(&response.id) {
            Some((id, tx)) => {
                if tx.send(response).is_err() {
                    debug!("waiter for {id} gone before delivery");
                    return false;
                }
                true
            }
            None => false,
        }
    }

    /// Drop the waiter for `id`, if still present.
    pub fn evict(&self, id: &str) {
        self.waiters.remove(id);
    }

    pub fn len(&self) -> usize {
        self.waiters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiters.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn response(id: &str, status: u16) -> Response {
        Response::synthetic(id.to_string(), status, Vec::new())
    }

    #[tokio::test]
    async fn test_register_and_resolve() {
        let pending = PendingResponses::new();
        let rx = pending.register("r1");
        assert_eq!(pending.len(), 1);

        assert!(pending.resolve(response("r1", 200)));
        assert!(pending.is_empty());
        assert_eq!(rx.await.unwrap().status, 200);
    }

    #[tokio::test]
    async fn test_resolve_unknown_id_dropped() {
        let pending = PendingResponses::new();
        assert!(!pending.resolve(response("ghost", 200)));
    }

    #[tokio::test]
    async fn test_evicted_waiter_gets_nothing() {
        let pending = PendingResponses::new();
        let rx = pending.register("r1");
        pending.evict("r1");

        assert!(pending.is_empty());
        // A late response after eviction is discarded without error.
        assert!(!pending.resolve(response("r1", 200)));
        assert!(rx.await.is_err());
    }

    #[tokio::test]
    async fn test_second_resolve_fails() {
        let pending = PendingResponses::new();
        let rx = pending.register("r1");

        assert!(pending.resolve(response("r1", 200)));
        assert!(!pending.resolve(response("r1", 500)));
        assert_eq!(rx.await.unwrap().status, 200);
    }

    #[tokio::test]
    async fn test_no_cross_delivery_between_ids() {
        let pending = Arc::new(PendingResponses::new());

        let mut tasks = Vec::new();
        for i in 0..32 {
            let id = format!("req-{i}");
            let rx = pending.register(&id);
            let pending = pending.clone();
            tasks.push(tokio::spawn(async move {
                pending.resolve(Response::synthetic(id.clone(), 200, id.clone()));
                let got = rx.await.unwrap();
                assert_eq!(got.body, id.into_bytes());
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        assert!(pending.is_empty());
    }
}
