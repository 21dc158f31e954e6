//! Integration tests for the callback server.
//!
//! These tests start a real HTTP server, send actual HTTP requests,
//! and verify end-to-end functionality.

use callback_server::{CallbackServer, EventPayload, ServerConfig, TlsConfig};
use serde_json::json;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

async fn start_loopback(capacity: usize) -> (CallbackServer, mpsc::Receiver<EventPayload>) {
    let (tx, rx) = mpsc::channel::<EventPayload>(capacity);
    let config = ServerConfig::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0);
    let server = CallbackServer::start(config, tx)
        .await
        .expect("Failed to start event listener");
    (server, rx)
}

/// A device event POSTed to the root path reaches the channel unchanged.
#[tokio::test]
async fn test_event_listener_end_to_end() {
    let (mut server, mut rx) = start_loopback(16).await;
    let client = reqwest::Client::new();

    let event = json!({
        "content": {
            "deviceId": "1",
            "name": "switch",
            "value": "on",
            "displayName": "Kitchen",
            "descriptionText": "Kitchen was turned on",
            "unit": null,
            "type": null,
            "data": null
        }
    });

    let response = client
        .post(format!("{}/", server.url()))
        .json(&event)
        .send()
        .await
        .expect("Failed to send HTTP request");

    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "OK");

    let payload = timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("Timeout waiting for payload")
        .expect("Channel closed");

    assert_eq!(payload.body, event);
    assert!(payload.remote.is_some());
    assert_eq!(server.router().routed(), 1);

    server.shutdown().await;
}

/// A body that is not JSON is answered with 400 and never forwarded.
#[tokio::test]
async fn test_invalid_json_is_rejected() {
    let (mut server, mut rx) = start_loopback(16).await;
    let client = reqwest::Client::new();

    let response = client
        .post(server.url())
        .header("Content-Type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    assert!(
        timeout(Duration::from_millis(100), rx.recv()).await.is_err(),
        "Unparseable body must not be forwarded"
    );

    server.shutdown().await;
}

#[tokio::test]
async fn test_non_post_and_unknown_paths() {
    let (mut server, mut rx) = start_loopback(16).await;
    let client = reqwest::Client::new();

    let response = client.get(server.url()).send().await.unwrap();
    assert_eq!(response.status(), 405);

    let response = client
        .post(format!("{}/other", server.url()))
        .json(&json!({"content": {}}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);

    assert!(timeout(Duration::from_millis(100), rx.recv()).await.is_err());

    server.shutdown().await;
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let (mut server, _rx) = start_loopback(16).await;
    let client = reqwest::Client::new();

    let response = client
        .post(server.url())
        .body(vec![b' '; 2 * 1024 * 1024])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 413);

    server.shutdown().await;
}

/// Sequentially sent events come out of the channel in the same order.
#[tokio::test]
async fn test_events_preserve_order() {
    let (mut server, mut rx) = start_loopback(64).await;
    let client = reqwest::Client::new();

    for i in 0..20 {
        let response = client
            .post(server.url())
            .json(&json!({ "content": { "deviceId": i, "name": "level", "value": i } }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
    }

    for i in 0..20 {
        let payload = timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(payload.body["content"]["deviceId"], i);
    }

    server.shutdown().await;
}

/// A stopped listener frees its port and a new listener can take it.
#[tokio::test]
async fn test_restart_on_same_port() {
    let (tx, mut rx) = mpsc::channel::<EventPayload>(16);
    let loopback = IpAddr::V4(Ipv4Addr::LOCALHOST);

    let mut first = CallbackServer::start(ServerConfig::new(loopback, 0), tx.clone())
        .await
        .unwrap();
    let port = first.port();
    first.shutdown().await;

    let mut second = CallbackServer::start(ServerConfig::new(loopback, port), tx)
        .await
        .unwrap();
    assert_eq!(second.port(), port);

    let response = reqwest::Client::new()
        .post(second.url())
        .json(&json!({"content": {"name": "mode", "value": "Night"}}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let payload = timeout(Duration::from_secs(1), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payload.body["content"]["value"], "Night");

    second.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_stops_accepting() {
    let (mut server, _rx) = start_loopback(16).await;
    let url = server.url();

    server.shutdown().await;
    server.shutdown().await;

    let result = reqwest::Client::new()
        .post(url)
        .timeout(Duration::from_secs(1))
        .json(&json!({}))
        .send()
        .await;
    assert!(result.is_err());
}

/// With a certificate configured the listener speaks HTTPS and still hands
/// events to the channel.
#[tokio::test]
async fn test_https_listener_delivers_events() {
    let fixtures = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures");
    let (tx, mut rx) = mpsc::channel::<EventPayload>(8);
    let config = ServerConfig::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0).with_tls(Some(
        TlsConfig::new(format!("{fixtures}/cert.pem"), format!("{fixtures}/key.pem")),
    ));
    let mut server = CallbackServer::start(config, tx)
        .await
        .expect("Failed to start HTTPS event listener");
    assert!(server.url().starts_with("https://"));

    let client = reqwest::Client::builder()
        .danger_accept_invalid_certs(true)
        .build()
        .unwrap();
    let event = json!({"content": {"deviceId": "7", "name": "lock", "value": "locked"}});

    let response = client
        .post(server.url())
        .json(&event)
        .send()
        .await
        .expect("Failed to send HTTPS request");
    assert_eq!(response.status(), 200);

    let payload = timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("Timeout waiting for payload")
        .expect("Channel closed");
    assert_eq!(payload.body, event);

    let plain = server.url().replacen("https://", "http://", 1);
    assert!(reqwest::Client::new().post(plain).json(&event).send().await.is_err());

    server.shutdown().await;
}
