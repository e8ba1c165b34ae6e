//! Server list fetching against local stand-in metaservers.

use std::time::Duration;

use ashfire::metaserver::{MetaserverError, fetch_servers, request_servers};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Serves `response` to one connection after reading the request head.
/// Returns the url to ask and the request the client sent.
async fn serve_once(response: String) -> (String, tokio::task::JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/meta_client.php", listener.local_addr().unwrap());
    let handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 512];
        while !request.ends_with(b"\r\n\r\n") {
            let n = stream.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
        }
        stream.write_all(response.as_bytes()).await.unwrap();
        String::from_utf8(request).unwrap()
    });
    (url, handle)
}

fn block(hostname: &str, port: u16, players: u32) -> String {
    format!(
        "START_SERVER_DATA\nhostname={hostname}\nport={port}\nnum_players={players}\nEND_SERVER_DATA\n"
    )
}

fn ok(body: String) -> String {
    format!("HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\n\r\n{body}")
}

// =========================================================================
// request_servers
// =========================================================================

#[tokio::test]
async fn test_request_servers_sends_get_and_parses_body() {
    let (url, server) = serve_once(ok(block("play.example.org", 13327, 4))).await;

    let entries = request_servers(&url, Duration::from_secs(5)).await.unwrap();

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].address(), "play.example.org:13327");
    assert_eq!(entries[0].num_players, 4);
    let request = server.await.unwrap();
    assert!(request.starts_with("GET /meta_client.php HTTP/1.0\r\n"), "{request}");
}

#[tokio::test]
async fn test_request_servers_error_status() {
    let (url, _server) = serve_once("HTTP/1.1 503 Service Unavailable\r\n\r\n".into()).await;

    let result = request_servers(&url, Duration::from_secs(5)).await;

    assert!(matches!(result, Err(MetaserverError::Status { ref status, .. }) if status.contains("503")));
}

#[tokio::test]
async fn test_request_servers_silent_server_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/", listener.local_addr().unwrap());
    let _hold = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;
        drop(stream);
    });

    let result = request_servers(&url, Duration::from_millis(100)).await;

    assert!(matches!(result, Err(MetaserverError::Timeout { .. })));
}

// =========================================================================
// fetch_servers
// =========================================================================

#[tokio::test]
async fn test_fetch_servers_merges_and_skips_failures() {
    let (first, _a) = serve_once(ok(format!(
        "{}{}",
        block("a.example.org", 13327, 1),
        block("b.example.org", 13327, 2)
    )))
    .await;
    let (second, _b) = serve_once(ok(format!(
        "{}{}",
        block("b.example.org", 13327, 9),
        block("b.example.org", 13328, 3)
    )))
    .await;

    // Bind then drop to get a port nobody listens on.
    let dead = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let dead_url = format!("http://{}/", dead.local_addr().unwrap());
    drop(dead);

    let urls = vec![dead_url, first, "https://secure.example.org/".to_owned(), second];
    let servers = fetch_servers(&urls, Duration::from_secs(5)).await;

    let listed: Vec<(String, u32)> = servers
        .iter()
        .map(|s| (s.address(), s.num_players))
        .collect();
    assert_eq!(
        listed,
        [
            ("a.example.org:13327".to_owned(), 1),
            ("b.example.org:13327".to_owned(), 2),
            ("b.example.org:13328".to_owned(), 3),
        ]
    );
}
