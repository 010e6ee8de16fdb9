//! Handler for short URL redirect.

use axum::{
    extract::{ConnectInfo, Path, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::net::SocketAddr;

use crate::error::AppError;
use crate::state::AppState;
use crate::utils::client_ip::ClientContext;

/// Redirects a short code to its original URL.
///
/// # Endpoint
///
/// `GET /{short_code}`
///
/// # Click Tracking
///
/// The click is queued for the background worker before the response is
/// built and is never awaited. A full queue or a failing event channel has
/// no effect on the response.
///
/// # Errors
///
/// Returns 404 Not Found if the short code doesn't exist.
pub async fn redirect_handler(
    Path(short_code): Path<String>,
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let link = state.link_service.resolve(&short_code).await?;

    let location = HeaderValue::try_from(link.long_url.as_str()).map_err(|_| {
        AppError::internal(
            "Stored URL is not a valid Location header",
            json!({ "shortCode": short_code }),
        )
    })?;

    state
        .click_recorder
        .record_click(&link, ClientContext::from_request(&headers, Some(peer)));

    Ok((StatusCode::FOUND, [(header::LOCATION, location)]).into_response())
}
