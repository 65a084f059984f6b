//! Exported variables endpoint.
//!
//! Serves every variable of a [`VarsProvider`] as one JSON object on a single
//! path and passes every other request through.

use axum::{
    body::Body,
    extract::Request,
    http::{header, HeaderValue},
    response::Response,
};
use futures_util::future::BoxFuture;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};

use crate::http::error::JSON_CONTENT_TYPE;
use crate::observability::vars::VarsProvider;

pub const DEFAULT_VARS_ENDPOINT: &str = "/debug/vars";

/// Layer that exposes exported variables at `endpoint`.
#[derive(Clone)]
pub struct VarsLayer {
    endpoint: Arc<str>,
    provider: Arc<dyn VarsProvider>,
}

impl VarsLayer {
    /// An empty `endpoint` means [`DEFAULT_VARS_ENDPOINT`].
    pub fn new<P>(endpoint: &str, provider: P) -> Self
    where
        P: VarsProvider + 'static,
    {
        let endpoint = if endpoint.is_empty() {
            DEFAULT_VARS_ENDPOINT
        } else {
            endpoint
        };
        Self {
            endpoint: Arc::from(endpoint),
            provider: Arc::new(provider),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl<S> Layer<S> for VarsLayer {
    type Service = VarsEndpoint<S>;

    fn layer(&self, inner: S) -> Self::Service {
        VarsEndpoint {
            inner,
            endpoint: self.endpoint.clone(),
            provider: self.provider.clone(),
        }
    }
}

#[derive(Clone)]
pub struct VarsEndpoint<S> {
    inner: S,
    endpoint: Arc<str>,
    provider: Arc<dyn VarsProvider>,
}

impl<S> Service<Request> for VarsEndpoint<S>
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
        if req.uri().path() != &*self.endpoint {
            let clone = self.inner.clone();
            let mut inner = std::mem::replace(&mut self.inner, clone);
            return Box::pin(inner.call(req));
        }

        let body = render(&self.provider.snapshot());
        let mut response = Response::new(Body::from(body));
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(JSON_CONTENT_TYPE),
        );
        Box::pin(async move { Ok(response) })
    }
}

/// `{\n"name": value,\n...\n}\n`, one variable per line.
fn render(snapshot: &BTreeMap<String, Value>) -> String {
    let mut out = String::from("{\n");
    for (i, (name, value)) in snapshot.iter().enumerate() {
        if i > 0 {
            out.push_str(",\n");
        }
        out.push_str(&Value::String(name.clone()).to_string());
        out.push_str(": ");
        out.push_str(&value.to_string());
    }
    out.push_str("\n}\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::vars::Vars;
    use axum::http::StatusCode;
    use std::convert::Infallible;
    use tower::{service_fn, ServiceBuilder, ServiceExt};

    async fn teapot(_req: Request) -> Result<Response, Infallible> {
        let mut response = Response::new(Body::from("inner"));
        *response.status_mut() = StatusCode::IM_A_TEAPOT;
        Ok(response)
    }

    fn get(path: &str) -> Request {
        Request::builder().uri(path).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_serves_vars_at_default_endpoint() {
        let vars = Vars::new();
        vars.counter("requests").unwrap().add(7);
        let svc = ServiceBuilder::new()
            .layer(VarsLayer::new("", vars))
            .service(service_fn(teapot));

        let response = svc.oneshot(get("/debug/vars")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json; charset=utf-8"
        );
        let body = axum::body::to_bytes(response.into_body(), 4096).await.unwrap();
        assert_eq!(&body[..], b"{\n\"requests\": 7\n}\n");
    }

    #[tokio::test]
    async fn test_output_is_valid_json() {
        let mut snapshot = BTreeMap::new();
        snapshot.insert("b".to_string(), serde_json::json!({"nested": [1, 2]}));
        snapshot.insert("a".to_string(), Value::from("text"));
        let svc = ServiceBuilder::new()
            .layer(VarsLayer::new("/internal/vars", snapshot))
            .service(service_fn(teapot));

        let response = svc.oneshot(get("/internal/vars")).await.unwrap();
        let body = axum::body::to_bytes(response.into_body(), 4096).await.unwrap();
        let text = std::str::from_utf8(&body).unwrap();
        assert!(text.starts_with("{\n\"a\": \"text\",\n\"b\": "));
        let parsed: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["b"]["nested"][1], 2);
    }

    #[tokio::test]
    async fn test_empty_provider() {
        let svc = ServiceBuilder::new()
            .layer(VarsLayer::new("", Vars::new()))
            .service(service_fn(teapot));
        let response = svc.oneshot(get("/debug/vars")).await.unwrap();
        let body = axum::body::to_bytes(response.into_body(), 4096).await.unwrap();
        assert_eq!(&body[..], b"{\n\n}\n");
    }

    #[tokio::test]
    async fn test_other_paths_pass_through() {
        let svc = ServiceBuilder::new()
            .layer(VarsLayer::new("", Vars::new()))
            .service(service_fn(teapot));

        for path in ["/", "/debug/vars/", "/debug/varsx", "/debug"] {
            let response = svc.clone().oneshot(get(path)).await.unwrap();
            assert_eq!(response.status(), StatusCode::IM_A_TEAPOT, "path {}", path);
        }
    }
}
