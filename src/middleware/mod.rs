//! Middleware wrapping the router (or any other service).
//!
//! # Data Flow
//! ```text
//! Request (stack mounted by http::build_app)
//!     → traffic.rs (dump request/response while debugging)
//!     → pprof.rs (profiling endpoints under a prefix)
//!     → vars.rs (exported variables on one path)
//!     → RegexpRouter
//!         → per-route services, optionally wrapped in
//!           content_type.rs (JSON content type on responses)
//! ```
//!
//! # Design Decisions
//! - Every wrapper is a tower `Layer`; the wrapped service keeps the same
//!   request and response types
//! - Wrappers are independent and can be stacked in any order

pub mod content_type;
pub mod pprof;
pub mod traffic;
pub mod vars;

pub use content_type::{json_content_type, JsonContentTypeLayer};
pub use pprof::{PprofLayer, DEFAULT_PPROF_PREFIX};
pub use traffic::{DebugFlag, DumpSink, TrafficDumpLayer, DEBUG_HTTP_TRAFFIC};
pub use vars::{VarsLayer, DEFAULT_VARS_ENDPOINT};
