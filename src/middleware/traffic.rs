//! HTTP traffic dumping for debugging.
//!
//! # Responsibilities
//! - Decide per request whether dumping is on
//! - Dump the full request and response (status, headers, body)
//! - Keep each dump contiguous under concurrent requests
//!
//! # Design Decisions
//! - The on/off decision comes from an injected [`DebugFlag`], evaluated on
//!   every request so the toggle can change while serving
//! - Request and response bodies are buffered and forwarded in full; only the
//!   copy written to the dump is cut at a byte limit
//! - A dump is assembled in memory and written to the sink in one call while
//!   holding the sink's mutex
//! - Disabled means passthrough: nothing is buffered

use axum::{
    body::{Body, Bytes},
    extract::Request,
    http::{request, HeaderMap},
    response::Response,
};
use futures_util::future::BoxFuture;
use std::fmt;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// Environment variable consulted by [`DebugFlag::from_default_env`].
pub const DEBUG_HTTP_TRAFFIC: &str = "DEBUG_HTTP_TRAFFIC";

/// Default cap on the body bytes copied into one dump.
pub const DEFAULT_MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Accessor deciding whether traffic dumping is enabled.
#[derive(Clone)]
pub struct DebugFlag(Arc<dyn Fn() -> bool + Send + Sync>);

impl DebugFlag {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Enabled while environment variable `var` equals `true`.
    /// The variable is read on every check.
    pub fn from_env(var: impl Into<String>) -> Self {
        let var = var.into();
        Self::new(move || std::env::var(&var).map(|v| v == "true").unwrap_or(false))
    }

    /// [`DebugFlag::from_env`] on `DEBUG_HTTP_TRAFFIC`.
    pub fn from_default_env() -> Self {
        Self::from_env(DEBUG_HTTP_TRAFFIC)
    }

    /// A flag that never changes.
    pub fn fixed(enabled: bool) -> Self {
        Self::new(move || enabled)
    }

    pub fn is_enabled(&self) -> bool {
        (self.0)()
    }
}

impl fmt::Debug for DebugFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DebugFlag").field(&self.is_enabled()).finish()
    }
}

/// Mutex-guarded diagnostic writer shared by all requests.
#[derive(Clone)]
pub struct DumpSink(Arc<Mutex<Box<dyn Write + Send>>>);

impl DumpSink {
    pub fn new<W>(writer: W) -> Self
    where
        W: Write + Send + 'static,
    {
        Self(Arc::new(Mutex::new(Box::new(writer))))
    }

    pub fn stderr() -> Self {
        Self::new(std::io::stderr())
    }

    /// Write one complete dump.
    pub fn write_dump(&self, dump: &[u8]) {
        let mut writer = self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Err(e) = writer.write_all(dump).and_then(|()| writer.flush()) {
            tracing::warn!(error = %e, "Failed to write traffic dump");
        }
    }
}

impl fmt::Debug for DumpSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DumpSink(..)")
    }
}

/// Layer that dumps traffic while its [`DebugFlag`] is on.
#[derive(Debug, Clone)]
pub struct TrafficDumpLayer {
    flag: DebugFlag,
    sink: DumpSink,
    max_body_bytes: usize,
}

impl TrafficDumpLayer {
    pub fn new(flag: DebugFlag, sink: DumpSink) -> Self {
        Self {
            flag,
            sink,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    /// Toggle from `DEBUG_HTTP_TRAFFIC`, dumps to stderr.
    pub fn from_default_env() -> Self {
        Self::new(DebugFlag::from_default_env(), DumpSink::stderr())
    }

    pub fn max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }
}

impl<S> Layer<S> for TrafficDumpLayer {
    type Service = TrafficDump<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TrafficDump {
            inner,
            flag: self.flag.clone(),
            sink: self.sink.clone(),
            max_body_bytes: self.max_body_bytes,
        }
    }
}

/// Service produced by [`TrafficDumpLayer`].
#[derive(Debug, Clone)]
pub struct TrafficDump<S> {
    inner: S,
    flag: DebugFlag,
    sink: DumpSink,
    max_body_bytes: usize,
}

impl<S> Service<Request> for TrafficDump<S>
where
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Response, S::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        // Take the service that was driven to readiness, leave a clone behind.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        if !self.flag.is_enabled() {
            return Box::pin(inner.call(req));
        }

        let sink = self.sink.clone();
        let limit = self.max_body_bytes;

        Box::pin(async move {
            let mut dump = Vec::new();

            let (parts, body) = req.into_parts();
            write_request_head(&mut dump, &parts);
            let body = dump_body(&mut dump, body, limit).await;

            let response = inner.call(Request::from_parts(parts, Body::from(body))).await?;

            let (parts, body) = response.into_parts();
            dump.extend_from_slice(format!("HTTP/1.1 {}\r\n", parts.status.as_u16()).as_bytes());
            write_headers(&mut dump, &parts.headers);
            dump.extend_from_slice(b"\r\n");
            let body = dump_body(&mut dump, body, limit).await;
            dump.extend_from_slice(b"\n");

            sink.write_dump(&dump);
            Ok(Response::from_parts(parts, Body::from(body)))
        })
    }
}

fn write_request_head(dump: &mut Vec<u8>, parts: &request::Parts) {
    let target = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    dump.extend_from_slice(format!("{} {} {:?}\r\n", parts.method, target, parts.version).as_bytes());
    write_headers(dump, &parts.headers);
    dump.extend_from_slice(b"\r\n");
}

fn write_headers(dump: &mut Vec<u8>, headers: &HeaderMap) {
    for (name, value) in headers {
        dump.extend_from_slice(name.as_str().as_bytes());
        dump.extend_from_slice(b": ");
        dump.extend_from_slice(value.as_bytes());
        dump.extend_from_slice(b"\r\n");
    }
}

/// Buffer all of `body` and append at most `limit` bytes of it to the dump.
/// The returned bytes are the complete body. A read failure is written to the
/// dump in place of the body and the body continues empty.
async fn dump_body(dump: &mut Vec<u8>, body: Body, limit: usize) -> Bytes {
    match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) if bytes.len() > limit => {
            dump.extend_from_slice(&bytes[..limit]);
            dump.extend_from_slice(
                format!("\r\n[{} more body bytes not dumped]", bytes.len() - limit).as_bytes(),
            );
            bytes
        }
        Ok(bytes) => {
            dump.extend_from_slice(&bytes);
            bytes
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to buffer body for traffic dump");
            dump.extend_from_slice(e.to_string().as_bytes());
            Bytes::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tower::{service_fn, ServiceBuilder, ServiceExt};

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuf {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    async fn echo(req: Request) -> Result<Response, Infallible> {
        let body = axum::body::to_bytes(req.into_body(), usize::MAX).await.unwrap();
        let response = Response::builder()
            .status(StatusCode::CREATED)
            .header("x-echo", "yes")
            .body(Body::from(body))
            .unwrap();
        Ok(response)
    }

    fn post(body: &'static str) -> Request {
        Request::builder()
            .method("POST")
            .uri("/v1/jobs?debug=1")
            .header("x-client", "test")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_dump_when_enabled() {
        let buf = SharedBuf::default();
        let svc = ServiceBuilder::new()
            .layer(TrafficDumpLayer::new(DebugFlag::fixed(true), DumpSink::new(buf.clone())))
            .service(service_fn(echo));

        let response = svc.oneshot(post("hello")).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers().get("x-echo").unwrap(), "yes");
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"hello");

        let dump = buf.contents();
        assert!(dump.starts_with("POST /v1/jobs?debug=1 HTTP/1.1\r\n"));
        assert!(dump.contains("x-client: test\r\n"));
        assert!(dump.contains("\r\n\r\nhello"));
        assert!(dump.contains("HTTP/1.1 201\r\n"));
        assert!(dump.contains("x-echo: yes\r\n"));
        assert!(dump.ends_with("hello\n"));
    }

    #[tokio::test]
    async fn test_passthrough_when_disabled() {
        let buf = SharedBuf::default();
        let svc = ServiceBuilder::new()
            .layer(TrafficDumpLayer::new(DebugFlag::fixed(false), DumpSink::new(buf.clone())))
            .service(service_fn(echo));

        let response = svc.oneshot(post("quiet")).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert!(buf.contents().is_empty());
    }

    #[tokio::test]
    async fn test_flag_checked_per_request() {
        let enabled = Arc::new(AtomicBool::new(false));
        let e = enabled.clone();
        let buf = SharedBuf::default();
        let svc = ServiceBuilder::new()
            .layer(TrafficDumpLayer::new(
                DebugFlag::new(move || e.load(Ordering::SeqCst)),
                DumpSink::new(buf.clone()),
            ))
            .service(service_fn(echo));

        svc.clone().oneshot(post("first")).await.unwrap();
        assert!(buf.contents().is_empty());

        enabled.store(true, Ordering::SeqCst);
        svc.oneshot(post("second")).await.unwrap();
        assert!(buf.contents().contains("second"));
    }

    #[tokio::test]
    async fn test_oversized_body_forwarded_in_full() {
        let buf = SharedBuf::default();
        let svc = ServiceBuilder::new()
            .layer(
                TrafficDumpLayer::new(DebugFlag::fixed(true), DumpSink::new(buf.clone()))
                    .max_body_bytes(4),
            )
            .service(service_fn(echo));

        let response = svc.oneshot(post("hello world")).await.unwrap();
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"hello world");

        let dump = buf.contents();
        assert!(!dump.contains("hello world"));
        assert!(dump.contains("\r\n\r\nhell\r\n[7 more body bytes not dumped]"));
    }

    #[tokio::test]
    async fn test_response_keeps_declared_length() {
        let buf = SharedBuf::default();
        let svc = ServiceBuilder::new()
            .layer(
                TrafficDumpLayer::new(DebugFlag::fixed(true), DumpSink::new(buf.clone()))
                    .max_body_bytes(4),
            )
            .service(service_fn(|_req: Request| async {
                let response = Response::builder()
                    .header("content-length", "11")
                    .body(Body::from("hello world"))
                    .unwrap();
                Ok::<_, Infallible>(response)
            }));

        let response = svc.oneshot(post("")).await.unwrap();
        assert_eq!(response.headers().get("content-length").unwrap(), "11");
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(body.len(), 11);
    }

    #[tokio::test]
    async fn test_body_above_default_limit_reaches_handler() {
        let buf = SharedBuf::default();
        let svc = ServiceBuilder::new()
            .layer(TrafficDumpLayer::new(DebugFlag::fixed(true), DumpSink::new(buf.clone())))
            .service(service_fn(echo));

        let payload = vec![b'x'; DEFAULT_MAX_BODY_BYTES + 10];
        let req = Request::builder()
            .method("POST")
            .uri("/upload")
            .body(Body::from(payload.clone()))
            .unwrap();
        let response = svc.oneshot(req).await.unwrap();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(body.len(), payload.len());

        // Request and response copies are each cut at the default limit.
        let dump = buf.contents();
        assert_eq!(dump.matches("[10 more body bytes not dumped]").count(), 2);
        assert!(dump.len() < 2 * DEFAULT_MAX_BODY_BYTES + 1024);
    }

    #[tokio::test]
    async fn test_concurrent_dumps_do_not_interleave() {
        let buf = SharedBuf::default();
        let svc = ServiceBuilder::new()
            .layer(TrafficDumpLayer::new(DebugFlag::fixed(true), DumpSink::new(buf.clone())))
            .service(service_fn(echo));

        let mut tasks = Vec::new();
        for i in 0..16 {
            let svc = svc.clone();
            tasks.push(tokio::spawn(async move {
                let req = Request::builder()
                    .method("PUT")
                    .uri(format!("/jobs/{}", i))
                    .body(Body::from(format!("body-{}", i)))
                    .unwrap();
                svc.oneshot(req).await.unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let dump = buf.contents();
        for i in 0..16 {
            let request_line = format!("PUT /jobs/{} HTTP/1.1\r\n\r\nbody-{}HTTP/1.1 201\r\n", i, i);
            assert!(dump.contains(&request_line), "dump for request {} is not contiguous", i);
        }
    }

    #[test]
    fn test_env_flag() {
        let flag = DebugFlag::from_env("REGEXP_ROUTER_TEST_TRAFFIC_FLAG");
        std::env::remove_var("REGEXP_ROUTER_TEST_TRAFFIC_FLAG");
        assert!(!flag.is_enabled());
        std::env::set_var("REGEXP_ROUTER_TEST_TRAFFIC_FLAG", "true");
        assert!(flag.is_enabled());
        std::env::set_var("REGEXP_ROUTER_TEST_TRAFFIC_FLAG", "1");
        assert!(!flag.is_enabled());
    }
}
