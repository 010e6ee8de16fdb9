//! Click event model published to the event channel.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::entities::Link;

/// A single redirect, as seen by downstream telemetry consumers.
///
/// Built by [`crate::application::services::ClickRecorder`] right before it
/// is queued for publishing, never mutated, and dropped after the publish
/// attempt completes. The JSON form is the wire message value; `short_code`
/// is the message key.
///
/// # Wire format
///
/// ```json
/// {
///   "linkId": 42,
///   "shortCode": "G",
///   "timestamp": "2025-01-02T10:30:00.000+00:00",
///   "userAgent": "Mozilla/5.0",
///   "ipAddress": "192.168.1.1",
///   "referer": "https://example.com"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickEvent {
    pub link_id: i64,
    pub short_code: String,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referer: Option<String>,
}

/// Reasons a serialized click event is rejected.
#[derive(Debug, Error)]
pub enum EventValidationError {
    #[error("JSON message cannot be empty")]
    Empty,

    #[error("Failed to parse JSON message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("linkId must be a positive number, got: {0}")]
    InvalidLinkId(i64),

    #[error("shortCode cannot be blank")]
    BlankShortCode,

    #[error("timestamp must be in ISO-8601 format, got: {0}")]
    InvalidTimestamp(String),
}

impl ClickEvent {
    /// Creates a click event for `link` stamped at `clicked_at`.
    pub fn new(
        link: &Link,
        clicked_at: DateTime<Utc>,
        user_agent: Option<String>,
        ip_address: Option<String>,
        referer: Option<String>,
    ) -> Self {
        Self {
            link_id: link.id,
            short_code: link.short_code.clone(),
            timestamp: clicked_at.to_rfc3339_opts(SecondsFormat::Millis, false),
            user_agent,
            ip_address,
            referer,
        }
    }

    /// The partition/ordering key for this event.
    pub fn key(&self) -> &str {
        &self.short_code
    }

    /// Serializes the event to its wire representation.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parses a wire message and checks the required fields.
    ///
    /// Accepts timestamps with an explicit offset (`+00:00`, `Z`) as well as
    /// local date-times without one, which are read as UTC.
    ///
    /// # Errors
    ///
    /// See [`EventValidationError`].
    pub fn parse_and_validate(json: &str) -> Result<Self, EventValidationError> {
        if json.trim().is_empty() {
            return Err(EventValidationError::Empty);
        }

        let event: ClickEvent = serde_json::from_str(json)?;
        event.validate()?;
        Ok(event)
    }

    /// Checks required fields of an already-deserialized event.
    pub fn validate(&self) -> Result<(), EventValidationError> {
        if self.link_id <= 0 {
            return Err(EventValidationError::InvalidLinkId(self.link_id));
        }

        if self.short_code.trim().is_empty() {
            return Err(EventValidationError::BlankShortCode);
        }

        if !is_iso8601(&self.timestamp) {
            return Err(EventValidationError::InvalidTimestamp(
                self.timestamp.clone(),
            ));
        }

        Ok(())
    }
}

fn is_iso8601(value: &str) -> bool {
    let value = value.trim();
    if value.is_empty() {
        return false;
    }

    DateTime::parse_from_rfc3339(value).is_ok()
        || chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
}
