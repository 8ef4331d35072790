//! A one-shot streaming HTTP stub for backend tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// A captured request: the request line plus headers, and the body.
pub struct CapturedRequest {
    pub head: String,
    pub body: String,
}

/// How the stub answers.
pub struct StubResponse {
    pub status: u16,
    pub content_type: &'static str,
    /// Body pieces, flushed one at a time.
    pub pieces: Vec<String>,
    /// Keep the connection open this long after the last piece.
    pub hold: Duration,
}

impl StubResponse {
    pub fn ok(content_type: &'static str, pieces: &[&str]) -> Self {
        Self {
            status: 200,
            content_type,
            pieces: pieces.iter().map(|p| p.to_string()).collect(),
            hold: Duration::ZERO,
        }
    }
}

/// Serve exactly one request, streaming `response` and then closing.
pub async fn serve_once(response: StubResponse) -> (String, oneshot::Receiver<CapturedRequest>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let request = read_request(&mut socket).await;
        let _ = tx.send(request);

        let head = format!(
            "HTTP/1.1 {} Stub\r\nContent-Type: {}\r\nConnection: close\r\n\r\n",
            response.status, response.content_type
        );
        if socket.write_all(head.as_bytes()).await.is_err() {
            return;
        }
        for piece in &response.pieces {
            if socket.write_all(piece.as_bytes()).await.is_err() {
                return;
            }
            socket.flush().await.ok();
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        tokio::time::sleep(response.hold).await;
        socket.shutdown().await.ok();
    });

    (format!("http://{addr}"), rx)
}

/// Serve one request with `first_piece` and then keep the response open,
/// waiting for the client to hang up.
///
/// The receiver yields `true` once the client closes its end within
/// `patience`, `false` otherwise.
pub async fn serve_until_hangup(
    content_type: &'static str,
    first_piece: &'static str,
    patience: Duration,
) -> (String, oneshot::Receiver<bool>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        read_request(&mut socket).await;

        let head = format!("HTTP/1.1 200 Stub\r\nContent-Type: {content_type}\r\nConnection: close\r\n\r\n");
        socket.write_all(head.as_bytes()).await.unwrap();
        socket.write_all(first_piece.as_bytes()).await.unwrap();
        socket.flush().await.ok();

        let mut chunk = [0u8; 64];
        let hung_up = matches!(
            tokio::time::timeout(patience, socket.read(&mut chunk)).await,
            Ok(Ok(0) | Err(_))
        );
        let _ = tx.send(hung_up);
    });

    (format!("http://{addr}"), rx)
}

/// An address nothing listens on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> CapturedRequest {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..end]).to_string();
            let length = content_length(&head);
            if buf.len() >= end + 4 + length {
                let body = String::from_utf8_lossy(&buf[end + 4..end + 4 + length]).to_string();
                return CapturedRequest { head, body };
            }
        }
    }
    CapturedRequest { head: String::from_utf8_lossy(&buf).to_string(), body: String::new() }
}

fn content_length(head: &str) -> usize {
    head.lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length").then(|| value.trim().parse().ok())?
        })
        .unwrap_or(0)
}
