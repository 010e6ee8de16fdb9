//! In-memory implementation of the link repository.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use crate::domain::entities::{Link, NewLink};
use crate::domain::repositories::LinkRepository;
use crate::error::AppError;

#[derive(Default)]
struct Tables {
    next_id: i64,
    links: BTreeMap<i64, Link>,
    by_code: HashMap<String, i64>,
}

/// Link store kept in process memory.
///
/// Mirrors the PostgreSQL repository's contract: ids start at 1 and grow
/// monotonically, and short codes are unique. Used by tests and local runs.
#[derive(Default)]
pub struct InMemoryLinkRepository {
    inner: Mutex<Tables>,
}

impl InMemoryLinkRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Tables>, AppError> {
        self.inner
            .lock()
            .map_err(|_| AppError::internal("Link store lock poisoned", json!({})))
    }
}

#[async_trait]
impl LinkRepository for InMemoryLinkRepository {
    async fn insert(&self, new_link: NewLink) -> Result<Link, AppError> {
        let mut tables = self.lock()?;

        if tables.by_code.contains_key(&new_link.short_code) {
            return Err(AppError::code_taken(new_link.short_code));
        }

        tables.next_id += 1;
        let link = Link::new(
            tables.next_id,
            new_link.long_url,
            new_link.short_code,
            Utc::now(),
            0,
        );

        tables.by_code.insert(link.short_code.clone(), link.id);
        tables.links.insert(link.id, link.clone());
        Ok(link)
    }

    async fn find_by_code(&self, short_code: &str) -> Result<Option<Link>, AppError> {
        let tables = self.lock()?;
        Ok(tables
            .by_code
            .get(short_code)
            .and_then(|id| tables.links.get(id))
            .cloned())
    }

    async fn update_code(&self, id: i64, short_code: &str) -> Result<Link, AppError> {
        let mut tables = self.lock()?;

        if let Some(owner) = tables.by_code.get(short_code)
            && *owner != id
        {
            return Err(AppError::code_taken(short_code));
        }

        let Some(link) = tables.links.get_mut(&id) else {
            return Err(AppError::not_found("Link not found", json!({ "id": id })));
        };

        let old_code = std::mem::replace(&mut link.short_code, short_code.to_string());
        let updated = link.clone();

        tables.by_code.remove(&old_code);
        tables.by_code.insert(short_code.to_string(), id);
        Ok(updated)
    }

    async fn increment_click_count(&self, id: i64) -> Result<(), AppError> {
        let mut tables = self.lock()?;
        if let Some(link) = tables.links.get_mut(&id) {
            link.click_count += 1;
        }
        Ok(())
    }

    async fn find_placeholders(&self, limit: i64) -> Result<Vec<Link>, AppError> {
        let tables = self.lock()?;
        Ok(tables
            .links
            .values()
            .filter(|link| link.is_placeholder())
            .take(usize::try_from(limit).unwrap_or(0))
            .cloned()
            .collect())
    }

    async fn discard_placeholder(&self, id: i64) -> Result<bool, AppError> {
        let mut tables = self.lock()?;

        let code = match tables.links.get(&id) {
            Some(link) if link.is_placeholder() => link.short_code.clone(),
            _ => return Ok(false),
        };

        tables.links.remove(&id);
        tables.by_code.remove(&code);
        Ok(true)
    }

    async fn count(&self) -> Result<i64, AppError> {
        Ok(self.lock()?.links.len() as i64)
    }

    async fn health_check(&self) -> bool {
        self.inner.lock().is_ok()
    }
}
