//! Request-path error type and its HTTP mapping.
//!
//! Only errors that affect the requester's correctness live here. Telemetry
//! failures are recovered inside the click pipeline and never become an
//! [`AppError`].

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;

use crate::domain::codec::CodecError;

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorInfo,
}

/// Machine-readable error payload returned to API clients.
#[derive(Debug, Serialize)]
pub struct ErrorInfo {
    pub code: &'static str,
    pub message: String,
    pub details: Value,
}

#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed input (missing or invalid `longUrl`, bad custom code characters).
    #[error("{message}")]
    Validation { message: String, details: Value },

    #[error("Custom short code exceeds maximum length of {max}")]
    CodeTooLong { max: usize, actual: usize },

    #[error("Custom URL is already taken.")]
    CodeAlreadyTaken { code: String },

    #[error("{message}")]
    NotFound { message: String, details: Value },

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("{message}")]
    Internal { message: String, details: Value },
}

impl AppError {
    pub fn validation(message: impl Into<String>, details: Value) -> Self {
        Self::Validation {
            message: message.into(),
            details,
        }
    }

    pub fn not_found(message: impl Into<String>, details: Value) -> Self {
        Self::NotFound {
            message: message.into(),
            details,
        }
    }

    pub fn code_taken(code: impl Into<String>) -> Self {
        Self::CodeAlreadyTaken { code: code.into() }
    }

    pub fn internal(message: impl Into<String>, details: Value) -> Self {
        Self::Internal {
            message: message.into(),
            details,
        }
    }

    /// HTTP status this error is surfaced with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::CodeTooLong { .. } => StatusCode::BAD_REQUEST,
            AppError::CodeAlreadyTaken { .. } => StatusCode::CONFLICT,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Codec(_) | AppError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Converts the error into its serializable payload.
    pub fn to_error_info(&self) -> ErrorInfo {
        let (code, details) = match self {
            AppError::Validation { details, .. } => ("validation_error", details.clone()),
            AppError::CodeTooLong { max, actual } => (
                "code_too_long",
                json!({ "max_length": max, "provided_length": actual }),
            ),
            AppError::CodeAlreadyTaken { code } => ("code_taken", json!({ "code": code })),
            AppError::NotFound { details, .. } => ("not_found", details.clone()),
            AppError::Codec(_) => ("internal_error", json!({})),
            AppError::Internal { details, .. } => ("internal_error", details.clone()),
        };

        let message = match self {
            // Codec failures on stored data are internal; do not echo the input.
            AppError::Codec(_) => "Internal error".to_string(),
            other => other.to_string(),
        };

        ErrorInfo {
            code,
            message,
            details,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        let body = ErrorBody {
            error: self.to_error_info(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        tracing::error!("Database error: {}", e);
        AppError::internal("Database error", json!({}))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let details = serde_json::to_value(&errors).unwrap_or_else(|_| json!({}));
        AppError::validation("Request validation failed", details)
    }
}
