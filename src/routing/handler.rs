//! Route handlers.
//!
//! A handler receives the original request and is fully responsible for the
//! response. Any async function or closure taking a request and returning
//! something that implements [`IntoResponse`] is a handler, and any infallible
//! `tower::Service` can be adapted into one with [`service_handler`].

use axum::{
    extract::Request,
    response::{IntoResponse, Response},
};
use futures_util::future::BoxFuture;
use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use tower::{Service, ServiceExt};

/// A request handler stored in a route.
pub trait Handler: Send + Sync + 'static {
    fn call(&self, req: Request) -> BoxFuture<'static, Response>;
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse,
{
    fn call(&self, req: Request) -> BoxFuture<'static, Response> {
        let fut = (self)(req);
        Box::pin(async move { fut.await.into_response() })
    }
}

/// Type-erased handler shared between clones of a router.
pub type BoxHandler = Arc<dyn Handler>;

/// Adapt a tower service into a [`Handler`].
///
/// The service is cloned for every request, so layered per-route middleware
/// keeps working as it would inside any other tower stack.
pub fn service_handler<S>(service: S) -> impl Handler
where
    S: Service<Request, Error = Infallible> + Clone + Send + Sync + 'static,
    S::Response: IntoResponse,
    S::Future: Send + 'static,
{
    move |req: Request| {
        let service = service.clone();
        async move {
            match service.oneshot(req).await {
                Ok(response) => response.into_response(),
                Err(never) => match never {},
            }
        }
    }
}
