//! Profiling endpoints under a path prefix.
//!
//! Exposes `<prefix>/cmdline`, `<prefix>/profile`, `<prefix>/symbol` and
//! `<prefix>/trace`. Every other path, including unknown paths under the
//! prefix, is passed to the wrapped service.

use axum::{extract::Request, response::Response};
use futures_util::future::BoxFuture;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};

use crate::observability::profiler::{ProcessProfiler, Profiler};

pub const DEFAULT_PPROF_PREFIX: &str = "/debug/pprof";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endpoint {
    Cmdline,
    Profile,
    Symbol,
    Trace,
}

impl Endpoint {
    fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "/cmdline" => Some(Endpoint::Cmdline),
            "/profile" => Some(Endpoint::Profile),
            "/symbol" => Some(Endpoint::Symbol),
            "/trace" => Some(Endpoint::Trace),
            _ => None,
        }
    }
}

/// Layer that serves profiling endpoints below `prefix`.
#[derive(Clone)]
pub struct PprofLayer {
    prefix: Arc<str>,
    profiler: Arc<dyn Profiler>,
}

impl PprofLayer {
    /// Profiling endpoints backed by [`ProcessProfiler`].
    /// An empty `prefix` means [`DEFAULT_PPROF_PREFIX`].
    pub fn new(prefix: &str) -> Self {
        Self::with_profiler(prefix, ProcessProfiler::new())
    }

    pub fn with_profiler<P: Profiler>(prefix: &str, profiler: P) -> Self {
        let prefix = if prefix.is_empty() {
            DEFAULT_PPROF_PREFIX
        } else {
            prefix
        };
        Self {
            prefix: Arc::from(prefix),
            profiler: Arc::new(profiler),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl<S> Layer<S> for PprofLayer {
    type Service = Pprof<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Pprof {
            inner,
            prefix: self.prefix.clone(),
            profiler: self.profiler.clone(),
        }
    }
}

#[derive(Clone)]
pub struct Pprof<S> {
    inner: S,
    prefix: Arc<str>,
    profiler: Arc<dyn Profiler>,
}

impl<S> Pprof<S> {
    fn endpoint(&self, path: &str) -> Option<Endpoint> {
        path.strip_prefix(&*self.prefix).and_then(Endpoint::from_suffix)
    }
}

impl<S> Service<Request> for Pprof<S>
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
        let Some(endpoint) = self.endpoint(req.uri().path()) else {
            let clone = self.inner.clone();
            let mut inner = std::mem::replace(&mut self.inner, clone);
            return Box::pin(inner.call(req));
        };

        tracing::debug!(endpoint = ?endpoint, path = %req.uri().path(), "Serving profiling endpoint");
        let response = match endpoint {
            Endpoint::Cmdline => self.profiler.cmdline(req),
            Endpoint::Profile => self.profiler.profile(req),
            Endpoint::Symbol => self.profiler.symbol(req),
            Endpoint::Trace => self.profiler.trace(req),
        };
        Box::pin(async move { Ok(response.await) })
    }
}
