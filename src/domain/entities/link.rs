//! Link entity representing a shortened URL mapping.

use chrono::{DateTime, Utc};

/// Prefix of the temporary code stored while an auto-generated link is being
/// allocated. A persisted row with this prefix is an interrupted allocation.
pub const PLACEHOLDER_PREFIX: &str = "temp_";

/// A shortened URL link.
///
/// `id` and `created_at` are assigned by storage and never change.
/// `short_code` is unique across all links.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Link {
    pub id: i64,
    pub long_url: String,
    pub short_code: String,
    pub created_at: DateTime<Utc>,
    pub click_count: i64,
}

impl Link {
    /// Creates a new Link instance.
    pub fn new(
        id: i64,
        long_url: String,
        short_code: String,
        created_at: DateTime<Utc>,
        click_count: i64,
    ) -> Self {
        Self {
            id,
            long_url,
            short_code,
            created_at,
            click_count,
        }
    }

    /// Returns true if this row still carries its allocation placeholder.
    pub fn is_placeholder(&self) -> bool {
        self.short_code.starts_with(PLACEHOLDER_PREFIX)
    }
}

/// Input data for inserting a new link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLink {
    pub long_url: String,
    pub short_code: String,
}

impl NewLink {
    pub fn new(long_url: impl Into<String>, short_code: impl Into<String>) -> Self {
        Self {
            long_url: long_url.into(),
            short_code: short_code.into(),
        }
    }
}
