//! Handler for link creation.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};
use serde_json::json;
use validator::Validate;

use crate::api::dto::links::{CreateLinkRequest, CreateLinkResponse};
use crate::error::AppError;
use crate::state::AppState;

/// Creates a short link.
///
/// # Endpoint
///
/// `POST /api/v1/links`
///
/// # Request Body
///
/// ```json
/// {
///   "longUrl": "https://example.com",
///   "customShortCode": "promo"   // optional
/// }
/// ```
///
/// # Response Codes
///
/// - **201 Created**: `{"shortUrl": "...", "shortCode": "..."}`
/// - **400 Bad Request**: custom code too long
/// - **409 Conflict**: custom code already taken
/// - **422 Unprocessable Entity**: missing or malformed body or `longUrl`,
///   or a custom code with forbidden characters
pub async fn create_link_handler(
    State(state): State<AppState>,
    payload: Result<Json<CreateLinkRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateLinkResponse>), AppError> {
    let Json(payload) = payload.map_err(|rejection| {
        AppError::validation(
            "Invalid request body",
            json!({ "reason": rejection.body_text() }),
        )
    })?;

    payload.validate()?;

    let created = state
        .link_service
        .create(&payload.long_url, payload.custom_short_code.as_deref())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateLinkResponse {
            short_url: created.short_url,
            short_code: created.link.short_code,
        }),
    ))
}
