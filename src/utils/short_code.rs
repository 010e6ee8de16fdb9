//! Placeholder code generation and custom code validation.

use base64::Engine as _;
use regex::Regex;
use serde_json::json;
use std::sync::LazyLock;

use crate::domain::entities::PLACEHOLDER_PREFIX;
use crate::error::AppError;

/// Random bytes behind a placeholder code, before base64 encoding.
const PLACEHOLDER_BYTES: usize = 12;

/// Codes that would shadow a route.
const RESERVED_CODES: &[&str] = &["api", "health"];

static CUSTOM_CODE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").unwrap());

/// Generates a unique-enough temporary code for the first insert of an
/// auto-coded link.
///
/// The code is `temp_` followed by 16 URL-safe base64 characters, so it can
/// never be confused with a base62 code.
///
/// # Errors
///
/// Returns [`AppError::Internal`] if the system random number generator fails.
pub fn generate_placeholder_code() -> Result<String, AppError> {
    let mut buffer = [0u8; PLACEHOLDER_BYTES];

    getrandom::fill(&mut buffer).map_err(|e| {
        AppError::internal(
            "Failed to generate placeholder code",
            json!({ "reason": e.to_string() }),
        )
    })?;

    Ok(format!(
        "{}{}",
        PLACEHOLDER_PREFIX,
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buffer)
    ))
}

/// Validates the characters of a user-provided custom code.
///
/// Length is checked separately by the caller, before this runs.
///
/// # Rules
///
/// - Allowed characters: ASCII letters, digits, `_` and `-`
/// - Cannot be a reserved route name
/// - Cannot start with the placeholder prefix
///
/// # Errors
///
/// Returns [`AppError::Validation`] if any rule is violated.
pub fn validate_custom_code(code: &str) -> Result<(), AppError> {
    if !CUSTOM_CODE_REGEX.is_match(code) {
        return Err(AppError::validation(
            "Custom short code can only contain letters, digits, '_' and '-'",
            json!({ "customShortCode": code }),
        ));
    }

    if RESERVED_CODES.contains(&code) {
        return Err(AppError::validation(
            "This short code is reserved",
            json!({ "customShortCode": code }),
        ));
    }

    if code.starts_with(PLACEHOLDER_PREFIX) {
        return Err(AppError::validation(
            format!("Custom short code cannot start with '{}'", PLACEHOLDER_PREFIX),
            json!({ "customShortCode": code }),
        ));
    }

    Ok(())
}
