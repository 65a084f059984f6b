//! Route table and dispatch.
//!
//! # Responsibilities
//! - Store routes in registration order
//! - Find the first route whose pattern matches the request path
//! - Resolve the method: invoke the handler, answer `OPTIONS`, or reject
//! - Answer unmatched paths with a structured 404
//!
//! # Design Decisions
//! - First path match wins; the scan stops there whatever the method is
//! - Routes with overlapping patterns are never merged
//! - Routes live behind an `Arc`, so clones share one table and serving needs
//!   no locks. Registering on a shared router copies the table first.
//! - The dispatcher never produces a 5xx on its own

use axum::{
    extract::Request,
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
};
use futures_util::future::BoxFuture;
use std::convert::Infallible;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::Service;

use crate::http::error::ApiError;
use crate::observability::metrics;
use crate::routing::handler::{service_handler, Handler};
use crate::routing::matcher::Pattern;
use crate::routing::route::{Route, RouteError};

/// A router that matches request paths against regular expressions.
///
/// ```no_run
/// use axum::extract::Request;
/// use regexp_router::RegexpRouter;
///
/// let mut router = RegexpRouter::new();
/// router.route(r"^/v1/jobs/(?P<id>[^\s/]+)$", ["GET", "POST"], |_req: Request| async {
///     "Hello World!"
/// });
/// ```
#[derive(Clone, Default)]
pub struct RegexpRouter {
    routes: Arc<Vec<Route>>,
}

/// What the dispatcher decided for a request.
enum Outcome<'a> {
    Handle(&'a Route),
    Options(&'a Route),
    MethodNotAllowed(&'a Route),
    NotFound,
}

impl RegexpRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for `pattern`, allowing `methods`.
    ///
    /// # Panics
    ///
    /// Panics if the pattern does not compile or the method list is invalid.
    /// Route tables are built at startup and a broken definition must keep the
    /// process from serving; use [`RegexpRouter::try_route`] to handle the
    /// error instead.
    pub fn route<M, H>(&mut self, pattern: &str, methods: M, handler: H) -> &mut Self
    where
        M: IntoIterator,
        M::Item: AsRef<str>,
        H: Handler,
    {
        if let Err(e) = self.try_route(pattern, methods, handler) {
            panic!("{}", e);
        }
        self
    }

    /// Register a handler, returning an error on an invalid definition.
    pub fn try_route<M, H>(&mut self, pattern: &str, methods: M, handler: H) -> Result<&mut Self, RouteError>
    where
        M: IntoIterator,
        M::Item: AsRef<str>,
        H: Handler,
    {
        let compiled = Pattern::new(pattern).map_err(|source| {
            tracing::error!(pattern = %pattern, error = %source, "Invalid route pattern");
            RouteError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            }
        })?;
        self.try_route_pattern(compiled, methods, handler)
    }

    /// Register a handler for a pattern compiled ahead of time.
    pub fn try_route_pattern<M, H>(&mut self, pattern: Pattern, methods: M, handler: H) -> Result<&mut Self, RouteError>
    where
        M: IntoIterator,
        M::Item: AsRef<str>,
        H: Handler,
    {
        let route = Route::new(pattern, methods, Arc::new(handler)).map_err(|e| {
            tracing::error!(error = %e, "Invalid route definition");
            e
        })?;

        tracing::debug!(
            pattern = %route.pattern(),
            methods = ?route.methods(),
            index = self.routes.len(),
            "Route registered"
        );
        Arc::make_mut(&mut self.routes).push(route);
        Ok(self)
    }

    /// Register a tower service as the handler for `pattern`.
    ///
    /// # Panics
    ///
    /// Same conditions as [`RegexpRouter::route`].
    pub fn route_service<M, S>(&mut self, pattern: &str, methods: M, service: S) -> &mut Self
    where
        M: IntoIterator,
        M::Item: AsRef<str>,
        S: Service<Request, Error = Infallible> + Clone + Send + Sync + 'static,
        S::Response: IntoResponse,
        S::Future: Send + 'static,
    {
        self.route(pattern, methods, service_handler(service))
    }

    /// Fallible counterpart of [`RegexpRouter::route_service`].
    pub fn try_route_service<M, S>(&mut self, pattern: &str, methods: M, service: S) -> Result<&mut Self, RouteError>
    where
        M: IntoIterator,
        M::Item: AsRef<str>,
        S: Service<Request, Error = Infallible> + Clone + Send + Sync + 'static,
        S::Response: IntoResponse,
        S::Future: Send + 'static,
    {
        self.try_route(pattern, methods, service_handler(service))
    }

    /// Registered routes in match-priority order.
    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    fn resolve(&self, method: &Method, path: &str) -> Outcome<'_> {
        let Some(route) = self.routes.iter().find(|r| r.pattern().matches(path)) else {
            return Outcome::NotFound;
        };

        let upper = method.as_str().to_ascii_uppercase();
        if route.allows(&upper) {
            Outcome::Handle(route)
        } else if upper == Method::OPTIONS.as_str() {
            Outcome::Options(route)
        } else {
            Outcome::MethodNotAllowed(route)
        }
    }

    /// Dispatch one request and produce its response.
    pub async fn dispatch(&self, req: Request) -> Response {
        let path = req.uri().path().to_string();
        let method = req.method().clone();

        match self.resolve(&method, &path) {
            Outcome::Handle(route) => {
                tracing::debug!(method = %method, path = %path, pattern = %route.pattern(), "Dispatching to handler");
                metrics::record_dispatch(method.as_str(), metrics::OUTCOME_HANDLED);
                route.handler().call(req).await
            }
            Outcome::Options(route) => {
                tracing::debug!(method = %method, path = %path, pattern = %route.pattern(), "Answering OPTIONS");
                metrics::record_dispatch(method.as_str(), metrics::OUTCOME_OPTIONS);
                let mut response = StatusCode::OK.into_response();
                insert_allow(&mut response, route);
                response
            }
            Outcome::MethodNotAllowed(route) => {
                tracing::debug!(method = %method, path = %path, pattern = %route.pattern(), "Method not allowed");
                metrics::record_dispatch(method.as_str(), metrics::OUTCOME_METHOD_NOT_ALLOWED);
                let mut response = ApiError::method_not_allowed(&path).into_response();
                insert_allow(&mut response, route);
                response
            }
            Outcome::NotFound => {
                tracing::debug!(method = %method, path = %path, "No route matched");
                metrics::record_dispatch(method.as_str(), metrics::OUTCOME_NOT_FOUND);
                ApiError::not_found(&path).into_response()
            }
        }
    }
}

fn insert_allow(response: &mut Response, route: &Route) {
    // Method tokens and ", " are always valid header characters.
    if let Ok(allow) = HeaderValue::from_str(&route.allow_header()) {
        response.headers_mut().insert(header::ALLOW, allow);
    }
}

impl std::fmt::Debug for RegexpRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.routes.iter()).finish()
    }
}

impl Service<Request> for RegexpRouter {
    type Response = Response;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Response, Infallible>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let router = self.clone();
        Box::pin(async move { Ok(router.dispatch(req).await) })
    }
}
