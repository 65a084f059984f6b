//! Regular-expression HTTP request router.
//!
//! Routes are `(pattern, methods, handler)` rules tried in registration order.
//! The first rule whose pattern matches the whole request path decides the
//! outcome: its handler runs when the method is allowed, `OPTIONS` is answered
//! with an `Allow` header, and any other method gets a structured 405. Paths
//! no rule matches get a structured 404.
//!
//! The router is a `tower::Service`, so it mounts into Axum, Hyper or any
//! tower stack, alongside the bundled middleware in [`middleware`].

pub mod config;
pub mod http;
pub mod middleware;
pub mod observability;
pub mod routing;

pub use config::RouterConfig;
pub use http::ApiError;
pub use routing::{Pattern, RegexpRouter, RouteError};
