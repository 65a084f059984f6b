//! Demo server for the regexp router.
//!
//! Serves a small jobs API behind the router with the traffic dump and
//! introspection middleware enabled.
//!
//! ```text
//! regexp-router --config router.toml
//! DEBUG_HTTP_TRAFFIC=true regexp-router --bind 127.0.0.1:3000
//! ```

use std::convert::Infallible;
use std::path::PathBuf;

use axum::{
    body::Body,
    extract::Request,
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use clap::Parser;
use serde_json::json;
use tokio::net::TcpListener;
use tower::ServiceBuilder;

use regexp_router::config::{load_config, RouterConfig};
use regexp_router::http::{build_app, serve};
use regexp_router::middleware::json_content_type;
use regexp_router::observability::{logging, metrics, Counter, Vars};
use regexp_router::{RegexpRouter, RouteError};

#[derive(Debug, Parser)]
#[command(name = "regexp-router", version, about = "Regular-expression HTTP router demo server")]
struct Args {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => RouterConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
    }

    logging::init(&config.observability.log_level);
    tracing::info!("regexp-router v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        introspection = config.introspection.enabled,
        traffic_env_var = %config.debug.traffic_env_var,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        metrics::init_metrics(config.observability.metrics_address.parse()?);
    }

    let vars = Vars::with_process_defaults();
    let jobs_created = vars.counter("jobs_created")?;

    // A bad route definition stops startup here.
    let router = build_router(jobs_created)?;
    tracing::info!(routes = router.len(), "Route table built");

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let app = build_app(&config, router, vars);
    serve(listener, app).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

fn build_router(jobs_created: Counter) -> Result<RegexpRouter, RouteError> {
    let mut router = RegexpRouter::new();

    router.try_route("/health", ["GET", "HEAD"], |_req: Request| async {
        Json(json!({ "status": "ok" }))
    })?;

    router.try_route_service(
        r"^/v1/jobs/(?P<id>[^\s/]+)$",
        ["GET", "POST"],
        ServiceBuilder::new()
            .layer(json_content_type())
            .service(tower::service_fn(move |req: Request| {
                let jobs_created = jobs_created.clone();
                async move { Ok::<_, Infallible>(job(req, &jobs_created)) }
            })),
    )?;

    Ok(router)
}

/// Job handler. The body carries no content type of its own; the JSON tag
/// comes from the route's middleware.
fn job(req: Request, jobs_created: &Counter) -> Response {
    let id = req.uri().path().rsplit('/').next().unwrap_or_default();
    let (status, body) = if req.method() == Method::POST {
        jobs_created.increment();
        (StatusCode::CREATED, json!({ "id": id, "status": "queued" }))
    } else {
        (StatusCode::OK, json!({ "id": id, "status": "unknown" }))
    };
    (status, Body::from(body.to_string())).into_response()
}
