//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Router and middleware produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (dispatch counters, Prometheus exporter)
//!     → vars.rs (exported process variables, served by the vars endpoint)
//!     → profiler.rs (command line, symbols, runtime sampling)
//! ```
//!
//! # Design Decisions
//! - Structured logging for machine parsing
//! - Metrics are cheap (atomic increments)
//! - Exported variables are read through a provider trait, never a global

pub mod logging;
pub mod metrics;
pub mod profiler;
pub mod vars;

pub use profiler::{ProcessProfiler, ProfileError, Profiler};
pub use vars::{Counter, Func, Var, Vars, VarsError, VarsProvider};
