//! Link creation and resolution service.

use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::domain::codec;
use crate::domain::entities::{Link, NewLink};
use crate::domain::repositories::LinkRepository;
use crate::error::AppError;
use crate::utils::short_code::{generate_placeholder_code, validate_custom_code};

/// Attempts at allocating a derived code before giving up.
///
/// An attempt only fails when the derived code is already owned by a custom
/// link, which needs an unlucky custom code choice for every id in a row.
const MAX_ALLOCATION_ATTEMPTS: usize = 3;

/// A newly created link and its public URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedLink {
    pub link: Link,
    pub short_url: String,
}

/// Outcome of a placeholder repair run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RepairReport {
    /// Links renamed to their derived code.
    pub repaired: Vec<Link>,
    /// Ids whose derived code is owned by another link.
    pub conflicts: Vec<i64>,
}

/// Creates links and resolves short codes.
///
/// Auto-generated codes use a two-step protocol: the link is inserted with a
/// random `temp_` placeholder to obtain its id, then renamed to
/// `codec::encode(id)`. Uniqueness follows from ids being unique and the
/// codec being injective. An interruption between the two steps leaves a
/// placeholder row behind, which [`LinkService::repair_placeholders`] fixes.
pub struct LinkService<L: LinkRepository + ?Sized> {
    link_repository: Arc<L>,
    base_url: String,
    max_custom_code_length: usize,
}

impl<L: LinkRepository + ?Sized> LinkService<L> {
    pub fn new(link_repository: Arc<L>, base_url: &str, max_custom_code_length: usize) -> Self {
        Self {
            link_repository,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_custom_code_length,
        }
    }

    /// Creates a link, with `custom_code` if one is given.
    ///
    /// An empty custom code counts as none.
    ///
    /// # Errors
    ///
    /// - [`AppError::Validation`] if the URL is malformed or the custom code
    ///   has forbidden characters
    /// - [`AppError::CodeTooLong`] if the custom code exceeds the limit
    /// - [`AppError::CodeAlreadyTaken`] if the custom code is in use
    pub async fn create(
        &self,
        long_url: &str,
        custom_code: Option<&str>,
    ) -> Result<CreatedLink, AppError> {
        validate_long_url(long_url)?;

        let link = match custom_code.filter(|code| !code.is_empty()) {
            Some(code) => self.create_with_custom_code(long_url, code).await?,
            None => self.create_with_derived_code(long_url).await?,
        };

        let short_url = self.build_short_url(&link.short_code);
        info!(id = link.id, short_code = %link.short_code, "Link created");

        Ok(CreatedLink { link, short_url })
    }

    async fn create_with_custom_code(&self, long_url: &str, code: &str) -> Result<Link, AppError> {
        let length = code.chars().count();
        if length > self.max_custom_code_length {
            return Err(AppError::CodeTooLong {
                max: self.max_custom_code_length,
                actual: length,
            });
        }

        validate_custom_code(code)?;

        // Early rejection only; the store's unique constraint settles races.
        if self.link_repository.find_by_code(code).await?.is_some() {
            return Err(AppError::code_taken(code));
        }

        self.link_repository
            .insert(NewLink::new(long_url, code))
            .await
    }

    async fn create_with_derived_code(&self, long_url: &str) -> Result<Link, AppError> {
        for attempt in 1..=MAX_ALLOCATION_ATTEMPTS {
            let placeholder = generate_placeholder_code()?;

            let row = match self
                .link_repository
                .insert(NewLink::new(long_url, placeholder))
                .await
            {
                Ok(row) => row,
                Err(AppError::CodeAlreadyTaken { .. }) => continue,
                Err(e) => return Err(e),
            };

            let code = codec::encode(row.id)?;

            match self.link_repository.update_code(row.id, &code).await {
                Ok(link) => return Ok(link),
                Err(AppError::CodeAlreadyTaken { .. }) => {
                    warn!(
                        id = row.id,
                        short_code = %code,
                        attempt,
                        "Derived code is owned by a custom link, discarding placeholder"
                    );
                    if let Err(e) = self.link_repository.discard_placeholder(row.id).await {
                        warn!(id = row.id, "Failed to discard placeholder: {}", e);
                    }
                }
                Err(e) => {
                    error!(
                        id = row.id,
                        placeholder = %row.short_code,
                        "Failed to assign derived code, placeholder left behind: {}",
                        e
                    );
                    return Err(e);
                }
            }
        }

        Err(AppError::internal(
            "Failed to allocate short code",
            json!({ "attempts": MAX_ALLOCATION_ATTEMPTS }),
        ))
    }

    /// Looks up the link for `short_code`.
    ///
    /// Placeholder rows are interrupted allocations and never resolve.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] if no finished link has this code.
    pub async fn resolve(&self, short_code: &str) -> Result<Link, AppError> {
        self.link_repository
            .find_by_code(short_code)
            .await?
            .filter(|link| !link.is_placeholder())
            .ok_or_else(|| {
                AppError::not_found("Short link not found", json!({ "shortCode": short_code }))
            })
    }

    /// Public URL for `short_code`.
    pub fn build_short_url(&self, short_code: &str) -> String {
        format!("{}/{}", self.base_url, short_code)
    }

    /// Lists placeholder rows left by interrupted allocations.
    pub async fn find_placeholders(&self, limit: i64) -> Result<Vec<Link>, AppError> {
        self.link_repository.find_placeholders(limit).await
    }

    /// Renames up to `limit` placeholder rows to their derived code.
    ///
    /// # Errors
    ///
    /// Stops at the first storage error other than a code conflict.
    pub async fn repair_placeholders(&self, limit: i64) -> Result<RepairReport, AppError> {
        let mut report = RepairReport::default();

        for orphan in self.link_repository.find_placeholders(limit).await? {
            let code = codec::encode(orphan.id)?;

            match self.link_repository.update_code(orphan.id, &code).await {
                Ok(link) => {
                    info!(id = link.id, short_code = %link.short_code, "Placeholder repaired");
                    report.repaired.push(link);
                }
                Err(AppError::CodeAlreadyTaken { .. }) => {
                    warn!(id = orphan.id, short_code = %code, "Derived code already taken");
                    report.conflicts.push(orphan.id);
                }
                Err(e) => return Err(e),
            }
        }

        Ok(report)
    }
}

fn validate_long_url(long_url: &str) -> Result<(), AppError> {
    if long_url.trim().is_empty() {
        return Err(AppError::validation(
            "longUrl must not be empty",
            json!({ "field": "longUrl" }),
        ));
    }

    url::Url::parse(long_url).map_err(|e| {
        AppError::validation(
            "longUrl must be a valid URL",
            json!({ "field": "longUrl", "reason": e.to_string() }),
        )
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::repositories::MockLinkRepository;
    use chrono::Utc;
    use mockall::predicate::eq;

    fn link(id: i64, code: &str) -> Link {
        Link::new(id, "https://example.com".to_string(), code.to_string(), Utc::now(), 0)
    }

    fn service(repo: MockLinkRepository) -> LinkService<MockLinkRepository> {
        LinkService::new(Arc::new(repo), "https://sho.rt/", 10)
    }

    #[tokio::test]
    async fn test_create_derives_code_from_id() {
        let mut repo = MockLinkRepository::new();
        repo.expect_insert()
            .withf(|new_link| new_link.short_code.starts_with("temp_"))
            .times(1)
            .returning(|new_link| Ok(link(125, &new_link.short_code)));
        repo.expect_update_code()
            .with(eq(125_i64), eq("21"))
            .times(1)
            .returning(|id, code| Ok(link(id, code)));

        let created = service(repo)
            .create("https://example.com", None)
            .await
            .unwrap();

        assert_eq!(created.link.short_code, "21");
        assert_eq!(codec::decode("21").unwrap(), 125);
        assert_eq!(created.short_url, "https://sho.rt/21");
    }

    #[tokio::test]
    async fn test_empty_custom_code_is_treated_as_none() {
        let mut repo = MockLinkRepository::new();
        repo.expect_find_by_code().times(0);
        repo.expect_insert()
            .times(1)
            .returning(|new_link| Ok(link(1, &new_link.short_code)));
        repo.expect_update_code()
            .times(1)
            .returning(|id, code| Ok(link(id, code)));

        let created = service(repo)
            .create("https://example.com", Some(""))
            .await
            .unwrap();

        assert_eq!(created.link.short_code, "1");
    }

    #[tokio::test]
    async fn test_derived_code_collision_discards_and_retries() {
        let mut repo = MockLinkRepository::new();
        let mut next_id = 9;
        repo.expect_insert().times(2).returning(move |new_link| {
            next_id += 1;
            Ok(link(next_id, &new_link.short_code))
        });
        repo.expect_update_code()
            .with(eq(10_i64), eq("a"))
            .times(1)
            .returning(|_, code| Err(AppError::code_taken(code)));
        repo.expect_discard_placeholder()
            .with(eq(10_i64))
            .times(1)
            .returning(|_| Ok(true));
        repo.expect_update_code()
            .with(eq(11_i64), eq("b"))
            .times(1)
            .returning(|id, code| Ok(link(id, code)));

        let created = service(repo)
            .create("https://example.com", None)
            .await
            .unwrap();

        assert_eq!(created.link.id, 11);
        assert_eq!(created.link.short_code, "b");
    }

    #[tokio::test]
    async fn test_allocation_gives_up_after_max_attempts() {
        let mut repo = MockLinkRepository::new();
        repo.expect_insert()
            .times(MAX_ALLOCATION_ATTEMPTS)
            .returning(|new_link| Ok(link(1, &new_link.short_code)));
        repo.expect_update_code()
            .times(MAX_ALLOCATION_ATTEMPTS)
            .returning(|_, code| Err(AppError::code_taken(code)));
        repo.expect_discard_placeholder()
            .times(MAX_ALLOCATION_ATTEMPTS)
            .returning(|_| Ok(true));

        let err = service(repo)
            .create("https://example.com", None)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Internal { .. }));
    }

    #[tokio::test]
    async fn test_failed_rename_surfaces_error() {
        let mut repo = MockLinkRepository::new();
        repo.expect_insert()
            .times(1)
            .returning(|new_link| Ok(link(7, &new_link.short_code)));
        repo.expect_update_code()
            .times(1)
            .returning(|_, _| Err(AppError::internal("Database error", json!({}))));
        repo.expect_discard_placeholder().times(0);

        let err = service(repo)
            .create("https://example.com", None)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Internal { .. }));
    }

    #[tokio::test]
    async fn test_create_with_custom_code() {
        let mut repo = MockLinkRepository::new();
        repo.expect_find_by_code()
            .with(eq("promo"))
            .times(1)
            .returning(|_| Ok(None));
        repo.expect_insert()
            .withf(|new_link| new_link.short_code == "promo")
            .times(1)
            .returning(|new_link| Ok(link(3, &new_link.short_code)));
        repo.expect_update_code().times(0);

        let created = service(repo)
            .create("https://example.com", Some("promo"))
            .await
            .unwrap();

        assert_eq!(created.link.short_code, "promo");
        assert_eq!(created.short_url, "https://sho.rt/promo");
    }

    #[tokio::test]
    async fn test_custom_code_too_long_touches_no_storage() {
        let mut repo = MockLinkRepository::new();
        repo.expect_find_by_code().times(0);
        repo.expect_insert().times(0);

        let err = service(repo)
            .create("https://example.com", Some("elevenchars"))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::CodeTooLong { max: 10, actual: 11 }));
    }

    #[tokio::test]
    async fn test_length_is_checked_before_characters() {
        let repo = MockLinkRepository::new();

        let err = service(repo)
            .create("https://example.com", Some("bad chars!!"))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::CodeTooLong { .. }));
    }

    #[tokio::test]
    async fn test_custom_code_with_bad_characters() {
        let repo = MockLinkRepository::new();

        let err = service(repo)
            .create("https://example.com", Some("a b"))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_custom_code_taken_by_pre_check() {
        let mut repo = MockLinkRepository::new();
        repo.expect_find_by_code()
            .returning(|code| Ok(Some(link(1, code))));
        repo.expect_insert().times(0);

        let err = service(repo)
            .create("https://example.com", Some("dup"))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::CodeAlreadyTaken { code } if code == "dup"));
    }

    #[tokio::test]
    async fn test_custom_code_race_lost_at_insert() {
        let mut repo = MockLinkRepository::new();
        repo.expect_find_by_code().returning(|_| Ok(None));
        repo.expect_insert()
            .returning(|new_link| Err(AppError::code_taken(new_link.short_code)));

        let err = service(repo)
            .create("https://example.com", Some("dup"))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::CodeAlreadyTaken { .. }));
    }

    #[tokio::test]
    async fn test_invalid_long_url_rejected() {
        for url in ["", "   ", "not-a-url"] {
            let mut repo = MockLinkRepository::new();
            repo.expect_insert().times(0);

            let err = service(repo).create(url, None).await.unwrap_err();
            assert!(matches!(err, AppError::Validation { .. }), "{url:?}");
        }
    }

    #[tokio::test]
    async fn test_resolve() {
        let mut repo = MockLinkRepository::new();
        repo.expect_find_by_code()
            .with(eq("G"))
            .returning(|code| Ok(Some(link(42, code))));
        repo.expect_find_by_code()
            .with(eq("unknown"))
            .returning(|_| Ok(None));
        repo.expect_find_by_code()
            .with(eq("temp_x"))
            .returning(|code| Ok(Some(link(5, code))));

        let service = service(repo);

        assert_eq!(service.resolve("G").await.unwrap().id, 42);
        assert!(matches!(
            service.resolve("unknown").await,
            Err(AppError::NotFound { .. })
        ));
        assert!(matches!(
            service.resolve("temp_x").await,
            Err(AppError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_repair_placeholders() {
        let mut repo = MockLinkRepository::new();
        repo.expect_find_placeholders()
            .with(eq(100_i64))
            .returning(|_| Ok(vec![link(62, "temp_a"), link(63, "temp_b")]));
        repo.expect_update_code()
            .with(eq(62_i64), eq("10"))
            .returning(|id, code| Ok(link(id, code)));
        repo.expect_update_code()
            .with(eq(63_i64), eq("11"))
            .returning(|_, code| Err(AppError::code_taken(code)));

        let report = service(repo).repair_placeholders(100).await.unwrap();

        assert_eq!(report.repaired.len(), 1);
        assert_eq!(report.repaired[0].short_code, "10");
        assert_eq!(report.conflicts, vec![63]);
    }

    #[test]
    fn test_build_short_url_strips_trailing_slash() {
        let service = service(MockLinkRepository::new());
        assert_eq!(service.build_short_url("abc"), "https://sho.rt/abc");
    }
}
