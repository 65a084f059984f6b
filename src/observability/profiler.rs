//! Process profiling handlers.
//!
//! # Responsibilities
//! - Report the process command line
//! - Resolve program counters to symbol names
//! - Sample the async runtime over a window (summary and raw timeline)
//!
//! # Design Decisions
//! - Endpoints depend on the [`Profiler`] trait; [`ProcessProfiler`] is the
//!   built-in implementation
//! - Runtime samples come from Tokio's runtime metrics, so sampling never
//!   needs a signal handler or an external agent
//! - The `seconds` parameter falls back to a default when missing, invalid or
//!   not positive; a window longer than the profiler's maximum is a 400

use axum::{
    body::Body,
    extract::{Query, Request},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
};
use futures_util::future::BoxFuture;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// Limit for `symbol` request bodies.
const MAX_SYMBOL_BODY_BYTES: usize = 64 * 1024;

/// Longest window `profile` and `trace` accept by default.
pub const DEFAULT_MAX_WINDOW: Duration = Duration::from_secs(300);

/// Why a profiling request could not be served.
#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("requested window of {seconds}s exceeds the {}s limit", .max.as_secs_f64())]
    WindowTooLong { seconds: f64, max: Duration },

    #[error("no async runtime to sample: {0}")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),
}

impl ProfileError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProfileError::WindowTooLong { .. } => StatusCode::BAD_REQUEST,
            ProfileError::NoRuntime(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Handlers behind the profiling endpoints.
pub trait Profiler: Send + Sync + 'static {
    /// The process command line, arguments separated by NUL bytes.
    fn cmdline(&self, req: Request) -> BoxFuture<'static, Response>;

    /// A runtime profile collected over `?seconds=` (integer, default 30).
    fn profile(&self, req: Request) -> BoxFuture<'static, Response>;

    /// Program counter to symbol lookup.
    fn symbol(&self, req: Request) -> BoxFuture<'static, Response>;

    /// A sample timeline collected over `?seconds=` (float, default 1).
    fn trace(&self, req: Request) -> BoxFuture<'static, Response>;
}

/// Built-in [`Profiler`] for the running process.
#[derive(Debug, Clone)]
pub struct ProcessProfiler {
    profile_interval: Duration,
    trace_interval: Duration,
    max_window: Duration,
}

impl Default for ProcessProfiler {
    fn default() -> Self {
        Self {
            profile_interval: Duration::from_millis(100),
            trace_interval: Duration::from_millis(10),
            max_window: DEFAULT_MAX_WINDOW,
        }
    }
}

impl ProcessProfiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sampling period used by `profile`.
    pub fn profile_interval(mut self, interval: Duration) -> Self {
        self.profile_interval = interval;
        self
    }

    /// Sampling period used by `trace`.
    pub fn trace_interval(mut self, interval: Duration) -> Self {
        self.trace_interval = interval;
        self
    }

    /// Longest window accepted by `profile` and `trace`.
    pub fn max_window(mut self, max: Duration) -> Self {
        self.max_window = max;
        self
    }

    fn check_window(&self, seconds: f64) -> Result<Duration, ProfileError> {
        match Duration::try_from_secs_f64(seconds) {
            Ok(window) if window <= self.max_window => Ok(window),
            _ => Err(ProfileError::WindowTooLong {
                seconds,
                max: self.max_window,
            }),
        }
    }
}

impl Profiler for ProcessProfiler {
    fn cmdline(&self, _req: Request) -> BoxFuture<'static, Response> {
        let cmdline = std::env::args().collect::<Vec<_>>().join("\0");
        Box::pin(async move { text_response(StatusCode::OK, cmdline) })
    }

    fn profile(&self, req: Request) -> BoxFuture<'static, Response> {
        let seconds = match query_param(&req, "seconds").and_then(|s| s.parse::<u64>().ok()) {
            Some(s) if s > 0 => s,
            _ => 30,
        };
        let window = self.check_window(seconds as f64);
        let interval = self.profile_interval;

        Box::pin(async move {
            let samples = match window {
                Ok(window) => sample_runtime(window, interval).await,
                Err(e) => Err(e),
            };
            let samples = match samples {
                Ok(samples) => samples,
                Err(e) => {
                    return text_response(
                        e.status(),
                        format!("Could not enable runtime profiling: {}\n", e),
                    )
                }
            };
            tracing::debug!(seconds, samples = samples.len(), "Runtime profile collected");

            let mut response = axum::Json(RuntimeProfile::summarize(seconds, &samples)).into_response();
            response.headers_mut().insert(
                header::CONTENT_DISPOSITION,
                HeaderValue::from_static("attachment; filename=\"profile\""),
            );
            response
        })
    }

    fn symbol(&self, req: Request) -> BoxFuture<'static, Response> {
        Box::pin(async move {
            // POST bodies carry the addresses; GET carries them in the query.
            let input = if req.method() == Method::POST {
                match axum::body::to_bytes(req.into_body(), MAX_SYMBOL_BODY_BYTES).await {
                    Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                    Err(e) => return text_response(StatusCode::BAD_REQUEST, format!("{}\n", e)),
                }
            } else {
                req.uri().query().unwrap_or_default().to_string()
            };

            // Only a zero/non-zero count matters to clients.
            let mut out = String::from("num_symbols: 1\n");
            for pc in input.split('+').filter_map(parse_pc) {
                if let Some(name) = resolve_symbol(pc) {
                    out.push_str(&format!("{:#x} {}\n", pc, name));
                }
            }
            text_response(StatusCode::OK, out)
        })
    }

    fn trace(&self, req: Request) -> BoxFuture<'static, Response> {
        let seconds = match query_param(&req, "seconds").and_then(|s| s.parse::<f64>().ok()) {
            Some(s) if s > 0.0 => s,
            _ => 1.0,
        };
        let window = self.check_window(seconds);
        let interval = self.trace_interval;

        Box::pin(async move {
            let samples = match window {
                Ok(window) => sample_runtime(window, interval).await,
                Err(e) => Err(e),
            };
            match samples {
                Ok(samples) => {
                    let mut response = axum::Json(RuntimeTrace { seconds, samples }).into_response();
                    response.headers_mut().insert(
                        header::CONTENT_DISPOSITION,
                        HeaderValue::from_static("attachment; filename=\"trace\""),
                    );
                    response
                }
                Err(e) => text_response(e.status(), format!("Could not enable tracing: {}\n", e)),
            }
        })
    }
}

/// One observation of the async runtime.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RuntimeSample {
    pub elapsed_ms: u64,
    pub workers: usize,
    pub alive_tasks: usize,
    pub global_queue_depth: usize,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Stats {
    pub min: usize,
    pub max: usize,
    pub mean: f64,
}

impl Stats {
    fn of(values: impl Iterator<Item = usize>) -> Self {
        let mut stats = Stats {
            min: usize::MAX,
            ..Stats::default()
        };
        let mut count = 0usize;
        let mut total = 0usize;
        for v in values {
            stats.min = stats.min.min(v);
            stats.max = stats.max.max(v);
            total += v;
            count += 1;
        }
        if count == 0 {
            return Stats::default();
        }
        stats.mean = total as f64 / count as f64;
        stats
    }
}

/// Summary returned by the `profile` endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct RuntimeProfile {
    pub seconds: u64,
    pub samples: usize,
    pub workers: usize,
    pub alive_tasks: Stats,
    pub global_queue_depth: Stats,
}

impl RuntimeProfile {
    fn summarize(seconds: u64, samples: &[RuntimeSample]) -> Self {
        Self {
            seconds,
            samples: samples.len(),
            workers: samples.last().map(|s| s.workers).unwrap_or_default(),
            alive_tasks: Stats::of(samples.iter().map(|s| s.alive_tasks)),
            global_queue_depth: Stats::of(samples.iter().map(|s| s.global_queue_depth)),
        }
    }
}

/// Timeline returned by the `trace` endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct RuntimeTrace {
    pub seconds: f64,
    pub samples: Vec<RuntimeSample>,
}

/// Sample the current runtime every `every` until `window` has elapsed.
async fn sample_runtime(window: Duration, every: Duration) -> Result<Vec<RuntimeSample>, ProfileError> {
    let handle = tokio::runtime::Handle::try_current()?;
    let metrics = handle.metrics();
    let start = Instant::now();
    let mut ticker = tokio::time::interval(every.max(Duration::from_millis(1)));
    let mut samples = Vec::new();

    loop {
        ticker.tick().await;
        let elapsed = start.elapsed();
        samples.push(RuntimeSample {
            elapsed_ms: elapsed.as_millis() as u64,
            workers: metrics.num_workers(),
            alive_tasks: metrics.num_alive_tasks(),
            global_queue_depth: metrics.global_queue_depth(),
        });
        if elapsed >= window {
            break;
        }
    }
    Ok(samples)
}

fn query_param(req: &Request, name: &str) -> Option<String> {
    let Query(params) = Query::<HashMap<String, String>>::try_from_uri(req.uri()).ok()?;
    params.get(name).cloned()
}

/// Parse `0x`-prefixed hex or decimal program counters. Zero is ignored.
fn parse_pc(word: &str) -> Option<u64> {
    let word = word.trim();
    let pc = match word.strip_prefix("0x").or_else(|| word.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok()?,
        None => word.parse().ok()?,
    };
    (pc != 0).then_some(pc)
}

fn resolve_symbol(pc: u64) -> Option<String> {
    let mut name = None;
    backtrace::resolve(pc as usize as *mut std::ffi::c_void, |symbol| {
        if name.is_none() {
            name = symbol.name().map(|n| n.to_string());
        }
    });
    name
}

fn text_response(status: StatusCode, body: impl Into<Body>) -> Response {
    let mut response = Response::new(body.into());
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(TEXT_PLAIN));
    headers.insert(header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    response
}
