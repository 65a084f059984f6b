//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Registration (at startup):
//!     pattern, methods, handler
//!     → matcher.rs (compile anchored pattern)
//!     → route.rs (normalize methods)
//!     → router.rs (append to table)
//!
//! Incoming Request (method, path)
//!     → router.rs (scan table in order)
//!     → matcher.rs (full-path match)
//!     → handler.rs (invoke) | OPTIONS | 405 | 404
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, read-only while serving
//! - First match wins (registration order)
//! - Path is resolved before method

pub mod handler;
pub mod matcher;
pub mod route;
pub mod router;

pub use handler::{service_handler, BoxHandler, Handler};
pub use matcher::Pattern;
pub use route::{Route, RouteError};
pub use router::RegexpRouter;
