//! HTTP server setup.
//!
//! # Responsibilities
//! - Wrap the router with the traffic dump and introspection layers
//! - Mount the result into an Axum app with request tracing
//! - Serve on a listener until Ctrl+C
//!
//! # Design Decisions
//! - The regexp router is mounted as the fallback service, so Axum's own
//!   routing never shadows it
//! - Traffic dumping is the outermost layer and sees introspection traffic too

use axum::Router;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::config::RouterConfig;
use crate::middleware::{DebugFlag, DumpSink, PprofLayer, TrafficDumpLayer, VarsLayer};
use crate::observability::vars::VarsProvider;
use crate::routing::RegexpRouter;

/// Build the Axum app serving `router` with all configured middleware.
pub fn build_app<P>(config: &RouterConfig, router: RegexpRouter, vars: P) -> Router
where
    P: VarsProvider + 'static,
{
    let traffic = TrafficDumpLayer::new(
        DebugFlag::from_env(config.debug.traffic_env_var.clone()),
        DumpSink::stderr(),
    )
    .max_body_bytes(config.debug.max_dump_body_bytes);

    let app = if config.introspection.enabled {
        let service = ServiceBuilder::new()
            .layer(traffic)
            .layer(PprofLayer::new(&config.introspection.pprof_prefix))
            .layer(VarsLayer::new(&config.introspection.vars_endpoint, vars))
            .service(router);
        Router::new().fallback_service(service)
    } else {
        let service = ServiceBuilder::new().layer(traffic).service(router);
        Router::new().fallback_service(service)
    };

    app.layer(TraceLayer::new_for_http())
}

/// Serve `app` on `listener` until a shutdown signal arrives.
pub async fn serve(listener: TcpListener, app: Router) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, "HTTP server starting");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("HTTP server stopped");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
