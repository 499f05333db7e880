//! HTTP surface for the compliance advisor.
//!
//! Routes:
//! - `GET /health`
//! - `POST /advisor/answer`: `{query|question, session_id?, context?}`
//! - `POST /chat_assistant`: same request, legacy response shape
//! - `POST /admin/reload`: only with `gateway.enable_admin_routes`
//!
//! Built on Axum. Every answered, refused or failed question produces one
//! turn record.

pub mod error;
pub mod routes;
pub mod runtime;
pub mod turn_log;

pub use error::{ApiError, status_for};
pub use routes::{CallerIdentity, GatewayState, SharedState};
pub use runtime::{Runtime, RuntimeCache};
pub use turn_log::{JsonlTurnSink, MemoryTurnSink, TracingTurnSink, TurnLogger};

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::{Method, header};
use axum::routing::{get, post};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

/// Build the router. The admin route is mounted only when `admin_routes`.
pub fn build_router(state: SharedState, admin_routes: bool) -> Router {
    let mut router = Router::new()
        .route("/health", get(routes::health_handler))
        .route(routes::ANSWER_ROUTE, post(routes::answer_handler))
        .route(routes::LEGACY_ROUTE, post(routes::chat_assistant_handler));
    if admin_routes {
        router = router.route("/admin/reload", post(routes::reload_handler));
    }

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .max_age(std::time::Duration::from_secs(3600));

    router
        .with_state(state)
        .layer(DefaultBodyLimit::max(256 * 1024))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Serve until Ctrl-C, then release the runtime (and its adapter client).
pub async fn serve(runtime: Arc<RuntimeCache>, port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let current = runtime.get(false).await?;
    let gateway = &current.config().gateway;
    let addr = format!("{}:{}", gateway.host, port_override.unwrap_or(gateway.port));
    let app = build_router(
        Arc::new(GatewayState {
            runtime: Arc::clone(&runtime),
        }),
        gateway.enable_admin_routes,
    );
    drop(current);

    info!(addr = %addr, "Advisor gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    runtime.invalidate().await;
    info!("Advisor gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
