//! HTTP server.
//!
//! Hosts the service-to-service endpoints next to a health check.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/svc/following/save` | Save a feed entry into subscribers' following folders |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! Every request is traced through `tower-http`'s [`TraceLayer`].

use axum::{
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::context::AppContext;
use crate::following;

/// Builds the router with all routes and layers, bound to `ctx`.
///
/// Split from [`run_server`] so tests can serve it on an ephemeral port.
pub fn build_router(ctx: AppContext) -> Router {
    Router::new()
        .route("/svc/following/save", post(following::handle_save))
        .route("/health", get(handle_health))
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

/// Starts the HTTP server on `[server].bind` and runs until the process is
/// terminated.
pub async fn run_server(ctx: AppContext) -> anyhow::Result<()> {
    let bind_addr = ctx.config.server.bind.clone();
    let app = build_router(ctx);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "server listening");
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    /// Always `"ok"` when the server is running.
    status: String,
    /// The crate version from `Cargo.toml`.
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
