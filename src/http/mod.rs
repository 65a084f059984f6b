//! HTTP protocol helpers shared by the router and middleware.

pub mod error;
pub mod server;

pub use error::{ApiError, JSON_CONTENT_TYPE};
pub use server::{build_app, serve};
