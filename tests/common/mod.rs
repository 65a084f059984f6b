//! Shared utilities for integration tests.

use axum::body::{Body, Bytes};
use axum::extract::Request;
use axum::http::{HeaderMap, StatusCode};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tower::{Service, ServiceExt};

/// Status, headers and buffered body of a response.
#[allow(dead_code)]
pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

#[allow(dead_code)]
impl Reply {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("body is not JSON")
    }
}

/// Send one request through `svc` and buffer the response.
#[allow(dead_code)]
pub async fn send<S>(svc: S, method: &str, path: &str) -> Reply
where
    S: Service<Request, Response = axum::response::Response, Error = Infallible>,
{
    let req = Request::builder()
        .method(method)
        .uri(path)
        .body(Body::empty())
        .unwrap();
    let response = svc.oneshot(req).await.unwrap();
    let (parts, body) = response.into_parts();
    Reply {
        status: parts.status,
        headers: parts.headers,
        body: axum::body::to_bytes(body, 1024 * 1024).await.unwrap(),
    }
}

/// Speak raw HTTP/1.1 to `addr` and return the full response text.
#[allow(dead_code)]
pub async fn raw_request(addr: SocketAddr, method: &str, path: &str) -> String {
    raw_request_with_body(addr, method, path, &[]).await
}

/// [`raw_request`] carrying `body`.
#[allow(dead_code)]
pub async fn raw_request_with_body(addr: SocketAddr, method: &str, path: &str, body: &[u8]) -> String {
    let mut socket = TcpStream::connect(addr).await.unwrap();
    let head = format!(
        "{} {} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\nContent-Length: {}\r\n\r\n",
        method,
        path,
        addr,
        body.len()
    );
    socket.write_all(head.as_bytes()).await.unwrap();
    socket.write_all(body).await.unwrap();

    let mut response = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), socket.read_to_end(&mut response))
        .await
        .expect("server did not close the connection")
        .unwrap();
    String::from_utf8(response).unwrap()
}
