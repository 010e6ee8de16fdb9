//! PostgreSQL repository tests. Require `DATABASE_URL`; run with
//! `cargo test -- --ignored`.

use linkrelay::application::services::LinkService;
use linkrelay::domain::codec;
use linkrelay::domain::entities::NewLink;
use linkrelay::domain::repositories::LinkRepository;
use linkrelay::error::AppError;
use linkrelay::infrastructure::persistence::PgLinkRepository;
use sqlx::PgPool;
use std::sync::Arc;

#[sqlx::test]
#[ignore = "requires DATABASE_URL"]
async fn test_insert_and_find_by_code(pool: PgPool) {
    let repo = PgLinkRepository::new(Arc::new(pool));

    let link = repo
        .insert(NewLink::new("https://example.com", "abc123"))
        .await
        .unwrap();

    assert!(link.id > 0);
    assert_eq!(link.short_code, "abc123");
    assert_eq!(link.click_count, 0);

    let found = repo.find_by_code("abc123").await.unwrap().unwrap();
    assert_eq!(found.id, link.id);
    assert_eq!(found.long_url, "https://example.com");
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL"]
async fn test_find_by_code_not_found(pool: PgPool) {
    let repo = PgLinkRepository::new(Arc::new(pool));

    assert!(repo.find_by_code("missing").await.unwrap().is_none());
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL"]
async fn test_duplicate_code_maps_to_conflict(pool: PgPool) {
    let repo = PgLinkRepository::new(Arc::new(pool));

    repo.insert(NewLink::new("https://a.example.com", "dup"))
        .await
        .unwrap();
    let result = repo
        .insert(NewLink::new("https://b.example.com", "dup"))
        .await;

    assert!(matches!(result, Err(AppError::CodeAlreadyTaken { code }) if code == "dup"));
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL"]
async fn test_update_code_conflict(pool: PgPool) {
    let repo = PgLinkRepository::new(Arc::new(pool));

    repo.insert(NewLink::new("https://a.example.com", "taken"))
        .await
        .unwrap();
    let placeholder = repo
        .insert(NewLink::new("https://b.example.com", "temp_abc"))
        .await
        .unwrap();

    let result = repo.update_code(placeholder.id, "taken").await;
    assert!(matches!(result, Err(AppError::CodeAlreadyTaken { .. })));

    let unchanged = repo.find_by_code("temp_abc").await.unwrap().unwrap();
    assert_eq!(unchanged.id, placeholder.id);
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL"]
async fn test_increment_click_count(pool: PgPool) {
    let repo = PgLinkRepository::new(Arc::new(pool));

    let link = repo
        .insert(NewLink::new("https://example.com", "counted"))
        .await
        .unwrap();

    for _ in 0..3 {
        repo.increment_click_count(link.id).await.unwrap();
    }

    let found = repo.find_by_code("counted").await.unwrap().unwrap();
    assert_eq!(found.click_count, 3);
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL"]
async fn test_placeholders_are_listed_and_discarded(pool: PgPool) {
    let repo = PgLinkRepository::new(Arc::new(pool));

    let real = repo
        .insert(NewLink::new("https://example.com", "tempest"))
        .await
        .unwrap();
    let orphan = repo
        .insert(NewLink::new("https://example.com", "temp_orphan"))
        .await
        .unwrap();

    let placeholders = repo.find_placeholders(10).await.unwrap();
    assert_eq!(placeholders.len(), 1);
    assert_eq!(placeholders[0].id, orphan.id);

    assert!(!repo.discard_placeholder(real.id).await.unwrap());
    assert!(repo.discard_placeholder(orphan.id).await.unwrap());
    assert_eq!(repo.count().await.unwrap(), 1);
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL"]
async fn test_create_derives_code_from_id(pool: PgPool) {
    let repo = Arc::new(PgLinkRepository::new(Arc::new(pool)));
    let service = LinkService::new(Arc::clone(&repo), "https://sho.rt", 50);

    let created = service.create("https://example.com", None).await.unwrap();

    assert_eq!(
        codec::decode(&created.link.short_code).unwrap(),
        created.link.id
    );
    assert_eq!(
        created.short_url,
        format!("https://sho.rt/{}", created.link.short_code)
    );
    assert!(repo.find_placeholders(10).await.unwrap().is_empty());
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL"]
async fn test_repair_placeholders(pool: PgPool) {
    let repo = Arc::new(PgLinkRepository::new(Arc::new(pool)));
    let service = LinkService::new(Arc::clone(&repo), "https://sho.rt", 50);

    let orphan = repo
        .insert(NewLink::new("https://example.com", "temp_left_over"))
        .await
        .unwrap();

    let report = service.repair_placeholders(10).await.unwrap();

    assert_eq!(report.repaired.len(), 1);
    assert!(report.conflicts.is_empty());
    assert_eq!(
        report.repaired[0].short_code,
        codec::encode(orphan.id).unwrap()
    );
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL"]
async fn test_health_check(pool: PgPool) {
    let repo = PgLinkRepository::new(Arc::new(pool));

    assert!(repo.health_check().await);
}
