//! Integration tests for HttpDecisionClient
//!
//! These tests run the client against a minimal HTTP server on a loopback
//! socket, covering the request payload, verdict parsing, status errors
//! and timeouts.

use labgate_core::{CardUid, Direction};
use labgate_network::{Decision, DecisionError, DecisionService, HttpDecisionClient, HttpDecisionConfig};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

/// Read one HTTP request (headers plus `Content-Length` body) and return the body.
async fn read_request(stream: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];

    loop {
        let n = stream.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);

        let text = String::from_utf8_lossy(&buf).to_string();
        if let Some(header_end) = text.find("\r\n\r\n") {
            let content_length = text[..header_end]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if buf.len() >= header_end + 4 + content_length {
                return text[header_end + 4..header_end + 4 + content_length].to_string();
            }
        }
    }
    String::new()
}

/// Serve one request with `status` and `body`, reporting the request body.
async fn serve_once(status: &'static str, body: &'static str) -> (SocketAddr, oneshot::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let request = read_request(&mut stream).await;
        let _ = tx.send(request);

        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        stream.write_all(response.as_bytes()).await.unwrap();
        stream.shutdown().await.unwrap();
    });

    (addr, rx)
}

fn client(addr: SocketAddr, timeout: Duration) -> HttpDecisionClient {
    HttpDecisionClient::new(HttpDecisionConfig {
        url: format!("http://{addr}/api/access"),
        controller_id: "RASPI_001".to_string(),
        timeout,
    })
    .unwrap()
}

fn uid() -> CardUid {
    CardUid::from_hex("04A2B3C4").unwrap()
}

#[tokio::test]
async fn test_granted_and_payload() {
    let (addr, request_rx) = serve_once("200 OK", r#"{"openDoor": true}"#).await;
    let client = client(addr, Duration::from_secs(2));

    let decision = client.decide(&uid(), Direction::Inside).await.unwrap();
    assert_eq!(decision, Decision::Granted);

    let body: serde_json::Value = serde_json::from_str(&request_rx.await.unwrap()).unwrap();
    assert_eq!(body["cardUID"], "04a2b3c4");
    assert_eq!(body["isInside"], true);
    assert_eq!(body["controllerId"], "RASPI_001");
}

#[tokio::test]
async fn test_denied() {
    let (addr, request_rx) = serve_once("200 OK", r#"{"openDoor": false}"#).await;
    let client = client(addr, Duration::from_secs(2));

    let decision = client.decide(&uid(), Direction::Outside).await.unwrap();
    assert_eq!(decision, Decision::Denied);

    let body: serde_json::Value = serde_json::from_str(&request_rx.await.unwrap()).unwrap();
    assert_eq!(body["isInside"], false);
}

#[tokio::test]
async fn test_missing_field_is_denied() {
    let (addr, _rx) = serve_once("200 OK", r#"{"message": "unknown card"}"#).await;
    let client = client(addr, Duration::from_secs(2));

    assert_eq!(client.decide(&uid(), Direction::Inside).await.unwrap(), Decision::Denied);
}

#[tokio::test]
async fn test_server_error_status() {
    let (addr, _rx) = serve_once("503 Service Unavailable", "{}").await;
    let client = client(addr, Duration::from_secs(2));

    let err = client.decide(&uid(), Direction::Inside).await.unwrap_err();
    assert!(matches!(err, DecisionError::Status { status: 503 }));
}

#[tokio::test]
async fn test_malformed_body() {
    let (addr, _rx) = serve_once("200 OK", "not json").await;
    let client = client(addr, Duration::from_secs(2));

    let err = client.decide(&uid(), Direction::Inside).await.unwrap_err();
    assert!(matches!(err, DecisionError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_timeout_when_server_is_silent() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (_stream, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;
    });

    let client = client(addr, Duration::from_millis(200));
    let err = client.decide(&uid(), Direction::Inside).await.unwrap_err();
    assert!(matches!(err, DecisionError::Timeout { duration_ms: 200 }));
}

#[tokio::test]
async fn test_connection_refused_is_transport_error() {
    // Bind then drop to get a port nobody listens on.
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };

    let client = client(addr, Duration::from_secs(1));
    let err = client.decide(&uid(), Direction::Inside).await.unwrap_err();
    assert!(matches!(err, DecisionError::Transport(_)));
}
