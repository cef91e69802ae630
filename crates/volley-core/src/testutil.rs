//! Minimal HTTP/1.1 server used by engine tests, built directly on
//! `tokio::net` so the real request path is exercised without external
//! services.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Spawn the canned-response test server and return its bound address.
///
/// Routes:
/// - `GET /health`    → 200 `{"status":"ok"}`
/// - `POST /users`    → 201 `{"id":7,"name":"alice"}`
/// - `GET /users/7`   → 200 `{"id":7,"name":"alice","tags":["a","b"]}`
/// - `GET /slow`      → 200 after a 200 ms delay
/// - anything else    → 404 `{"error":"not found"}`
///
/// The listener task runs until the test's runtime shuts down.
pub(crate) async fn spawn_test_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("test server should bind an ephemeral port");
    let addr = listener.local_addr().expect("listener should have an address");

    tokio::spawn(async move {
        loop {
            let Ok((socket, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(handle_connection(socket));
        }
    });

    addr
}

async fn handle_connection(mut socket: TcpStream) {
    let Some(request) = read_request(&mut socket).await else {
        return;
    };

    let first_line = request.lines().next().unwrap_or("");
    let mut parts = first_line.split_whitespace();
    let method = parts.next().unwrap_or("");
    let target = parts.next().unwrap_or("");
    let path = target.split('?').next().unwrap_or("");

    let (status_line, body) = match (method, path) {
        ("GET", "/health") => ("200 OK", r#"{"status":"ok"}"#),
        ("POST", "/users") => ("201 Created", r#"{"id":7,"name":"alice"}"#),
        ("GET", "/users/7") => ("200 OK", r#"{"id":7,"name":"alice","tags":["a","b"]}"#),
        ("GET", "/slow") => {
            tokio::time::sleep(Duration::from_millis(200)).await;
            ("200 OK", r#"{"status":"slow"}"#)
        }
        _ => ("404 Not Found", r#"{"error":"not found"}"#),
    };

    let response = format!(
        "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
}

/// Read one request: headers plus any Content-Length body.
async fn read_request(socket: &mut TcpStream) -> Option<String> {
    let mut buf = Vec::with_capacity(4096);
    let mut chunk = [0u8; 2048];

    // Headers first.
    let header_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = find_header_end(&buf) {
            break pos;
        }
        if buf.len() > 64 * 1024 {
            return None;
        }
    };

    // Then drain the body so the client never sees a reset mid-write.
    let headers = String::from_utf8_lossy(&buf[..header_end]).into_owned();
    let content_length = headers
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            if name.eq_ignore_ascii_case("content-length") {
                value.trim().parse::<usize>().ok()
            } else {
                None
            }
        })
        .unwrap_or(0);

    let mut body_read = buf.len() - (header_end + 4);
    while body_read < content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        body_read += n;
        buf.extend_from_slice(&chunk[..n]);
    }

    Some(String::from_utf8_lossy(&buf).into_owned())
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}
