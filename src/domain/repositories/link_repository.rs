//! Repository trait for the link store.

use crate::domain::entities::{Link, NewLink};
use crate::error::AppError;
use async_trait::async_trait;

/// Durable table of links keyed by a unique short code.
///
/// The store is the source of truth for short code uniqueness: concurrent
/// inserts or renames that would duplicate a code must be rejected with
/// [`AppError::CodeAlreadyTaken`], whatever the caller checked beforehand.
///
/// # Implementations
///
/// - [`crate::infrastructure::persistence::PgLinkRepository`] - PostgreSQL implementation
/// - [`crate::infrastructure::persistence::InMemoryLinkRepository`] - in-process store
/// - Test mocks available with `cfg(test)`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LinkRepository: Send + Sync {
    /// Inserts a new link and returns it with its storage-assigned id.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::CodeAlreadyTaken`] if the short code already exists.
    /// Returns [`AppError::Internal`] on database errors.
    async fn insert(&self, new_link: NewLink) -> Result<Link, AppError>;

    /// Finds a link by its short code.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn find_by_code(&self, short_code: &str) -> Result<Option<Link>, AppError>;

    /// Replaces the short code of an existing link.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::CodeAlreadyTaken`] if another link owns `short_code`.
    /// Returns [`AppError::NotFound`] if no link has this id.
    async fn update_code(&self, id: i64, short_code: &str) -> Result<Link, AppError>;

    /// Adds one to the link's click counter.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors. A missing id is not an error.
    async fn increment_click_count(&self, id: i64) -> Result<(), AppError>;

    /// Lists links still carrying an allocation placeholder code, oldest first.
    async fn find_placeholders(&self, limit: i64) -> Result<Vec<Link>, AppError>;

    /// Deletes a link only while it still carries its placeholder code.
    ///
    /// Returns `Ok(true)` if a row was removed.
    async fn discard_placeholder(&self, id: i64) -> Result<bool, AppError>;

    /// Counts all links.
    async fn count(&self) -> Result<i64, AppError>;

    /// Checks that the store is reachable.
    async fn health_check(&self) -> bool;
}
