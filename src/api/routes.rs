//! API route configuration.

use crate::api::handlers::create_link_handler;
use crate::state::AppState;
use axum::{Router, routing::post};

/// Versioned REST routes, nested under `/api`.
///
/// # Endpoints
///
/// - `POST /v1/links` - Create a short link
pub fn api_routes() -> Router<AppState> {
    Router::new().route("/v1/links", post(create_link_handler))
}
