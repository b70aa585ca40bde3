//! Integration tests for the collector client against a local listener.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use tp_client::{CollectorClient, DeliveryError, IDENTITY_HEADER, Transport};
use tp_core::{Domain, Event, Identity};

/// A captured HTTP request: lower-cased head plus raw body.
struct Captured {
    head: String,
    body: String,
}

/// Accepts one connection, records the request, and answers with `status_line`.
async fn one_shot_collector(status_line: &'static str) -> (String, oneshot::Receiver<Captured>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("http://{}/events", listener.local_addr().unwrap());
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        let mut chunk = [0_u8; 4096];
        let header_end = loop {
            let n = socket.read(&mut chunk).await.unwrap();
            assert!(n > 0, "connection closed before headers");
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };
        let head = String::from_utf8_lossy(&buf[..header_end]).to_lowercase();
        let content_length = head
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .map_or(0, |v| v.trim().parse::<usize>().unwrap());
        while buf.len() < header_end + content_length {
            let n = socket.read(&mut chunk).await.unwrap();
            assert!(n > 0, "connection closed before body");
            buf.extend_from_slice(&chunk[..n]);
        }
        let body = String::from_utf8_lossy(&buf[header_end..header_end + content_length]).to_string();

        let response = format!("{status_line}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n");
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.unwrap();
        let _ = tx.send(Captured { head, body });
    });

    (endpoint, rx)
}

fn batch() -> Vec<Event> {
    let domain = Domain::new("example.com").unwrap();
    vec![
        Event::active(domain.clone(), "2025-01-01T00:00:00Z".parse().unwrap()),
        Event::inactive(domain, "2025-01-01T00:05:00Z".parse().unwrap()),
    ]
}

#[tokio::test]
async fn test_posts_batch_with_identity_header() {
    let (endpoint, captured) = one_shot_collector("HTTP/1.1 204 No Content").await;
    let client = CollectorClient::new(&endpoint, Duration::from_secs(5)).unwrap();
    let identity = Identity::generate();

    client.send_batch(identity, &batch()).await.unwrap();

    let request = captured.await.unwrap();
    assert!(request.head.starts_with("post /events http/1.1"));
    assert!(request.head.contains("content-type: application/json"));
    assert!(request.head.contains(&format!(
        "{}: {identity}",
        IDENTITY_HEADER.to_lowercase()
    )));

    let body: serde_json::Value = serde_json::from_str(&request.body).unwrap();
    assert_eq!(body["events"].as_array().unwrap().len(), 2);
    assert_eq!(body["events"][0]["kind"], "active");
    assert_eq!(body["events"][1]["kind"], "inactive");
    assert_eq!(body["events"][1]["timestamp"], "2025-01-01T00:05:00.000Z");
}

#[tokio::test]
async fn test_ok_status_is_success() {
    let (endpoint, _captured) = one_shot_collector("HTTP/1.1 200 OK").await;
    let client = CollectorClient::new(&endpoint, Duration::from_secs(5)).unwrap();
    assert!(client.send_batch(Identity::generate(), &batch()).await.is_ok());
}

#[tokio::test]
async fn test_server_error_is_rejected() {
    let (endpoint, _captured) = one_shot_collector("HTTP/1.1 503 Service Unavailable").await;
    let client = CollectorClient::new(&endpoint, Duration::from_secs(5)).unwrap();
    let err = client
        .send_batch(Identity::generate(), &batch())
        .await
        .unwrap_err();
    assert!(matches!(err, DeliveryError::Rejected { status: 503, .. }));
}

#[tokio::test]
async fn test_redirect_without_location_is_rejected() {
    let (endpoint, _captured) = one_shot_collector("HTTP/1.1 302 Found").await;
    let client = CollectorClient::new(&endpoint, Duration::from_secs(5)).unwrap();
    let err = client
        .send_batch(Identity::generate(), &batch())
        .await
        .unwrap_err();
    assert!(matches!(err, DeliveryError::Rejected { status: 302, .. }));
}

#[tokio::test]
async fn test_refused_connection_is_a_request_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("http://{}/events", listener.local_addr().unwrap());
    drop(listener);

    let client = CollectorClient::new(&endpoint, Duration::from_secs(5)).unwrap();
    let err = client
        .send_batch(Identity::generate(), &batch())
        .await
        .unwrap_err();
    assert!(matches!(err, DeliveryError::Request(_)));
}
