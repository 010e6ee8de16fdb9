mod common;

use axum::http::StatusCode;
use linkrelay::domain::codec;
use linkrelay::domain::entities::NewLink;
use linkrelay::domain::repositories::LinkRepository;
use serde_json::json;

#[tokio::test]
async fn test_create_link_derives_code_from_id() {
    let ctx = common::create_test_context();
    let server = ctx.server();

    let response = server
        .post("/api/v1/links")
        .json(&json!({ "longUrl": "https://example.com/some/long/path" }))
        .await;

    response.assert_status(StatusCode::CREATED);

    let body = response.json::<serde_json::Value>();
    let short_code = body["shortCode"].as_str().unwrap();
    assert_eq!(body["shortUrl"], format!("{}/{}", common::BASE_URL, short_code));

    let stored = ctx.repo.find_by_code(short_code).await.unwrap().unwrap();
    assert_eq!(codec::decode(short_code).unwrap(), stored.id);
    assert_eq!(stored.long_url, "https://example.com/some/long/path");
}

#[tokio::test]
async fn test_create_link_with_custom_code() {
    let ctx = common::create_test_context();
    let server = ctx.server();

    let response = server
        .post("/api/v1/links")
        .json(&json!({
            "longUrl": "https://example.com/promo",
            "customShortCode": "promo-24"
        }))
        .await;

    response.assert_status(StatusCode::CREATED);

    let body = response.json::<serde_json::Value>();
    assert_eq!(body["shortCode"], "promo-24");
    assert_eq!(body["shortUrl"], "https://sho.rt/promo-24");
}

#[tokio::test]
async fn test_empty_custom_code_is_ignored() {
    let ctx = common::create_test_context();
    let server = ctx.server();

    let response = server
        .post("/api/v1/links")
        .json(&json!({ "longUrl": "https://example.com", "customShortCode": "" }))
        .await;

    response.assert_status(StatusCode::CREATED);

    let body = response.json::<serde_json::Value>();
    let short_code = body["shortCode"].as_str().unwrap();
    assert!(codec::decode(short_code).is_ok());
}

#[tokio::test]
async fn test_duplicate_custom_code_conflicts() {
    let ctx = common::create_test_context();
    let server = ctx.server();

    let first = server
        .post("/api/v1/links")
        .json(&json!({ "longUrl": "https://example.com/a", "customShortCode": "dup" }))
        .await;
    first.assert_status(StatusCode::CREATED);

    let second = server
        .post("/api/v1/links")
        .json(&json!({ "longUrl": "https://example.com/b", "customShortCode": "dup" }))
        .await;
    second.assert_status(StatusCode::CONFLICT);

    let body = second.json::<serde_json::Value>();
    assert_eq!(body["error"]["code"], "code_taken");
    assert_eq!(body["error"]["message"], "Custom URL is already taken.");

    let stored = ctx.repo.find_by_code("dup").await.unwrap().unwrap();
    assert_eq!(stored.long_url, "https://example.com/a");
}

#[tokio::test]
async fn test_custom_code_too_long() {
    let ctx = common::create_test_context();
    let server = ctx.server();

    let response = server
        .post("/api/v1/links")
        .json(&json!({
            "longUrl": "https://example.com",
            "customShortCode": "abcdefghijk"
        }))
        .await;

    response.assert_status_bad_request();

    let body = response.json::<serde_json::Value>();
    assert_eq!(body["error"]["code"], "code_too_long");
    assert_eq!(ctx.repo.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_custom_code_at_max_length_is_accepted() {
    let ctx = common::create_test_context();
    let server = ctx.server();

    let response = server
        .post("/api/v1/links")
        .json(&json!({
            "longUrl": "https://example.com",
            "customShortCode": "abcdefghij"
        }))
        .await;

    response.assert_status(StatusCode::CREATED);
}

#[tokio::test]
async fn test_custom_code_with_forbidden_characters() {
    let ctx = common::create_test_context();
    let server = ctx.server();

    for code in ["bad code", "a/b", "ümlaut", "api", "temp_x"] {
        let response = server
            .post("/api/v1/links")
            .json(&json!({ "longUrl": "https://example.com", "customShortCode": code }))
            .await;

        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    }

    assert_eq!(ctx.repo.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_missing_long_url() {
    let ctx = common::create_test_context();
    let server = ctx.server();

    let response = server
        .post("/api/v1/links")
        .json(&json!({ "customShortCode": "abc" }))
        .await;

    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    let body = response.json::<serde_json::Value>();
    assert_eq!(body["error"]["code"], "validation_error");
}

#[tokio::test]
async fn test_malformed_long_url() {
    let ctx = common::create_test_context();
    let server = ctx.server();

    let response = server
        .post("/api/v1/links")
        .json(&json!({ "longUrl": "not a url" }))
        .await;

    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_malformed_body() {
    let ctx = common::create_test_context();
    let server = ctx.server();

    let response = server.post("/api/v1/links").text("{not json").await;

    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_derived_code_collision_allocates_new_id() {
    let ctx = common::create_test_context();
    let server = ctx.server();

    // Id 1 goes to this custom link, whose code is what id 2 would derive.
    let squatted = codec::encode(2).unwrap();
    ctx.repo
        .insert(NewLink::new("https://example.com/custom", squatted.clone()))
        .await
        .unwrap();

    let response = server
        .post("/api/v1/links")
        .json(&json!({ "longUrl": "https://example.com/derived" }))
        .await;

    response.assert_status(StatusCode::CREATED);

    let body = response.json::<serde_json::Value>();
    let short_code = body["shortCode"].as_str().unwrap();
    assert_ne!(short_code, squatted);
    assert_eq!(codec::decode(short_code).unwrap(), 3);

    let custom = ctx.repo.find_by_code(&squatted).await.unwrap().unwrap();
    assert_eq!(custom.long_url, "https://example.com/custom");
    assert!(ctx.repo.find_placeholders(10).await.unwrap().is_empty());
}
