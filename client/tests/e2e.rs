//! End-to-end tests: a real relay, a real client session, and a local
//! service, all over loopback sockets.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum::routing::post;
use axum::Router;
use tokio::time::sleep;

use burrow::config::ClientConfig;
use burrow::filter::AllowList;
use burrow::tunnel;
use burrow_relay::AppState;

async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn client_config(relay: SocketAddr, local: SocketAddr, allow: &str) -> ClientConfig {
    ClientConfig {
        server: format!("ws://{relay}/tunnel"),
        local: format!("http://{local}"),
        token: "t".to_string(),
        allow: AllowList::parse(allow).unwrap(),
        user: "itest".to_string(),
    }
}

/// Retry until the relay stops answering 503, i.e. the client tunnel
/// has come up.
async fn post_until_connected(url: &str) -> reqwest::Response {
    let http = reqwest::Client::new();
    for _ in 0..100 {
        let resp = http.post(url).body("{}").send().await.unwrap();
        if resp.status() != reqwest::StatusCode::SERVICE_UNAVAILABLE {
            return resp;
        }
        sleep(Duration::from_millis(50)).await;
    }
    panic!("tunnel did not become ready in time");
}

#[tokio::test]
async fn test_end_to_end_forwarding() {
    let local = Router::new().route(
        "/slack/events",
        post(|| async { (StatusCode::OK, [("X-Test", "ok")], "{}") }),
    );
    let local_addr = serve(local).await;
    let relay_addr = serve(burrow_relay::app(AppState::new("t"))).await;

    let url = format!("http://{relay_addr}/slack/events");

    // Before the client connects there is no tunnel to forward over.
    let resp = reqwest::Client::new()
        .post(&url)
        .body("{}")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::SERVICE_UNAVAILABLE);

    let client = tokio::spawn(tunnel::run(client_config(
        relay_addr,
        local_addr,
        "POST /slack/events",
    )));

    let resp = post_until_connected(&url).await;
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    assert_eq!(resp.headers()["x-test"], "ok");
    assert_eq!(resp.text().await.unwrap(), "{}");

    client.abort();
}

#[tokio::test]
async fn test_filter_rejects_without_touching_local_service() {
    let hits = Arc::new(AtomicUsize::new(0));
    let counted = hits.clone();
    let local = Router::new().fallback(move || {
        let counted = counted.clone();
        async move {
            counted.fetch_add(1, Ordering::SeqCst);
            "hit"
        }
    });
    let local_addr = serve(local).await;
    let relay_addr = serve(burrow_relay::app(AppState::new("t"))).await;

    // Only GET /health is allowed; POST /x must be answered by the
    // client's filter, not the local service.
    let client = tokio::spawn(tunnel::run(client_config(
        relay_addr,
        local_addr,
        "GET /health",
    )));

    let resp = post_until_connected(&format!("http://{relay_addr}/x")).await;
    assert_eq!(resp.status(), reqwest::StatusCode::FORBIDDEN);
    assert_eq!(resp.text().await.unwrap(), "forbidden by tunnel filter");
    assert_eq!(hits.load(Ordering::SeqCst), 0);

    client.abort();
}
