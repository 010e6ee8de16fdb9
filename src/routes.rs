//! Top-level router configuration.
//!
//! # Route Structure
//!
//! - `GET  /{short_code}`   - Short link redirect
//! - `GET  /health`         - Health check: link store, event channel, click queue
//! - `POST /api/v1/links`   - Link creation
//!
//! # Middleware
//!
//! - **Tracing** - Structured request/response logging
//! - **Path normalization** - Trailing slash handling

use crate::api;
use crate::api::handlers::{health_handler, redirect_handler};
use crate::api::middleware::tracing;
use crate::state::AppState;
use axum::Router;
use axum::routing::get;
use tower::Layer;
use tower_http::normalize_path::{NormalizePath, NormalizePathLayer};

/// Routes with state and tracing applied, without path normalization.
///
/// The redirect route extracts `ConnectInfo<SocketAddr>`, so the router must
/// be served with connect info (or given it by a test layer).
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/{short_code}", get(redirect_handler))
        .route("/health", get(health_handler))
        .nest("/api", api::routes::api_routes())
        .with_state(state)
        .layer(tracing::layer())
}

/// Constructs the application router with all routes and middleware.
pub fn app_router(state: AppState) -> NormalizePath<Router> {
    NormalizePathLayer::trim_trailing_slash().layer(router(state))
}
