//! PostgreSQL implementation of the link repository.

use async_trait::async_trait;
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;

use crate::domain::entities::{Link, NewLink};
use crate::domain::repositories::LinkRepository;
use crate::error::AppError;
use crate::utils::db_error::is_unique_violation_on_code;

const LINK_COLUMNS: &str = "id, long_url, short_code, created_at, click_count";

/// PostgreSQL repository for link storage and retrieval.
///
/// Relies on the `links_short_code_key` unique constraint (see `migrations/`)
/// to arbitrate concurrent writers of the same short code.
pub struct PgLinkRepository {
    pool: Arc<PgPool>,
}

impl PgLinkRepository {
    /// Creates a new repository with a database connection pool.
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

fn map_write_error(e: sqlx::Error, short_code: &str) -> AppError {
    if is_unique_violation_on_code(&e) {
        AppError::code_taken(short_code)
    } else {
        e.into()
    }
}

#[async_trait]
impl LinkRepository for PgLinkRepository {
    async fn insert(&self, new_link: NewLink) -> Result<Link, AppError> {
        sqlx::query_as::<_, Link>(&format!(
            "INSERT INTO links (long_url, short_code) VALUES ($1, $2) RETURNING {LINK_COLUMNS}"
        ))
        .bind(&new_link.long_url)
        .bind(&new_link.short_code)
        .fetch_one(self.pool.as_ref())
        .await
        .map_err(|e| map_write_error(e, &new_link.short_code))
    }

    async fn find_by_code(&self, short_code: &str) -> Result<Option<Link>, AppError> {
        let link = sqlx::query_as::<_, Link>(&format!(
            "SELECT {LINK_COLUMNS} FROM links WHERE short_code = $1"
        ))
        .bind(short_code)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(link)
    }

    async fn update_code(&self, id: i64, short_code: &str) -> Result<Link, AppError> {
        sqlx::query_as::<_, Link>(&format!(
            "UPDATE links SET short_code = $2 WHERE id = $1 RETURNING {LINK_COLUMNS}"
        ))
        .bind(id)
        .bind(short_code)
        .fetch_optional(self.pool.as_ref())
        .await
        .map_err(|e| map_write_error(e, short_code))?
        .ok_or_else(|| AppError::not_found("Link not found", json!({ "id": id })))
    }

    async fn increment_click_count(&self, id: i64) -> Result<(), AppError> {
        sqlx::query("UPDATE links SET click_count = click_count + 1 WHERE id = $1")
            .bind(id)
            .execute(self.pool.as_ref())
            .await?;

        Ok(())
    }

    async fn find_placeholders(&self, limit: i64) -> Result<Vec<Link>, AppError> {
        let links = sqlx::query_as::<_, Link>(&format!(
            r"SELECT {LINK_COLUMNS} FROM links WHERE short_code LIKE 'temp\_%' ORDER BY id LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(links)
    }

    async fn discard_placeholder(&self, id: i64) -> Result<bool, AppError> {
        let result =
            sqlx::query(r"DELETE FROM links WHERE id = $1 AND short_code LIKE 'temp\_%'")
                .bind(id)
                .execute(self.pool.as_ref())
                .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn count(&self) -> Result<i64, AppError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM links")
            .fetch_one(self.pool.as_ref())
            .await?;

        Ok(count.0)
    }

    async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1")
            .execute(self.pool.as_ref())
            .await
            .is_ok()
    }
}
