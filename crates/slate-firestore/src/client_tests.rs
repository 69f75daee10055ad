//! Tests for the Firestore client and repositories against a mock server.

use std::time::Duration;

use serde_json::{json, Value as JsonValue};
use serial_test::serial;
use slate_models::{CacheEntry, NewShootingDay, ResponseCache};
use wiremock::matchers::{body_partial_json, header, method, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::ai_cache::FirestoreResponseCache;
use crate::client::{FirestoreClient, FirestoreConfig};
use crate::error::FirestoreError;
use crate::retry::RetryConfig;
use crate::scene_repo::SceneRepository;
use crate::schedule_repo::{ScheduleRepository, RESET_ORDER};

// =============================================================================
// Helpers
// =============================================================================

fn emulator_config(server: &MockServer) -> FirestoreConfig {
    FirestoreConfig {
        project_id: "test-project".to_string(),
        database_id: "(default)".to_string(),
        timeout: Duration::from_secs(5),
        connect_timeout: Duration::from_secs(2),
        retry: RetryConfig {
            max_retries: 1,
            base_delay_ms: 1,
            max_delay_ms: 2,
        },
        emulator_host: Some(server.address().to_string()),
    }
}

async fn client_for(server: &MockServer) -> FirestoreClient {
    FirestoreClient::new(emulator_config(server)).await.unwrap()
}

fn doc_name(path: &str) -> String {
    format!("projects/test-project/databases/(default)/documents/{}", path)
}

fn commit_ok() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "writeResults": [{}],
        "commitTime": "2026-01-01T00:00:00Z"
    }))
}

async fn commit_bodies(server: &MockServer) -> Vec<JsonValue> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.url.path().ends_with(":commit"))
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .collect()
}

// =============================================================================
// Error mapping
// =============================================================================

#[test]
fn test_error_from_http_status() {
    assert!(matches!(FirestoreError::from_http_status(429, "slow down"), FirestoreError::RateLimited(_)));
    assert!(matches!(FirestoreError::from_http_status(503, "unavailable"), FirestoreError::ServerError(503, _)));
    assert!(matches!(FirestoreError::from_http_status(404, "gone"), FirestoreError::NotFound(_)));
    assert!(matches!(FirestoreError::from_http_status(409, "exists"), FirestoreError::AlreadyExists(_)));
    assert!(matches!(FirestoreError::from_http_status(400, "bad"), FirestoreError::RequestFailed(_)));
}

#[test]
fn test_retryable_classification() {
    assert!(FirestoreError::from_http_status(500, "boom").is_retryable());
    assert!(FirestoreError::from_http_status(429, "slow down").is_retryable());
    assert!(!FirestoreError::from_http_status(400, "bad").is_retryable());
    assert!(!FirestoreError::from_http_status(403, "denied").is_retryable());
    assert_eq!(FirestoreError::RateLimited(2000).retry_after_ms(), Some(2000));
    assert_eq!(FirestoreError::ServerError(502, "x".into()).http_status(), Some(502));
}

#[test]
fn test_store_error_conversion() {
    let err: slate_models::StoreError = FirestoreError::not_found("projects/p1").into();
    assert!(matches!(err, slate_models::StoreError::NotFound(_)));

    let err: slate_models::StoreError = FirestoreError::ServerError(500, "boom".into()).into();
    assert!(matches!(err, slate_models::StoreError::Backend(_)));
}

// =============================================================================
// Config
// =============================================================================

#[test]
#[serial]
fn test_config_requires_project_id() {
    std::env::remove_var("GCP_PROJECT_ID");
    std::env::remove_var("FIREBASE_PROJECT_ID");
    assert!(FirestoreConfig::from_env().is_err());

    std::env::set_var("GCP_PROJECT_ID", "");
    assert!(FirestoreConfig::from_env().is_err());
    std::env::remove_var("GCP_PROJECT_ID");
}

#[test]
#[serial]
fn test_config_reads_env() {
    std::env::set_var("GCP_PROJECT_ID", "gcp-project");
    std::env::set_var("FIREBASE_PROJECT_ID", "firebase-project");
    std::env::set_var("FIRESTORE_CONNECT_TIMEOUT_SECS", "not-a-number");
    std::env::set_var("FIRESTORE_RETRY_BASE_MS", "50");
    std::env::set_var("FIRESTORE_EMULATOR_HOST", "localhost:8080");

    let config = FirestoreConfig::from_env().unwrap();
    assert_eq!(config.project_id, "gcp-project");
    assert_eq!(config.connect_timeout, Duration::from_secs(5));
    assert_eq!(config.retry.base_delay_ms, 50);
    assert_eq!(config.emulator_host.as_deref(), Some("localhost:8080"));

    for key in [
        "GCP_PROJECT_ID",
        "FIREBASE_PROJECT_ID",
        "FIRESTORE_CONNECT_TIMEOUT_SECS",
        "FIRESTORE_RETRY_BASE_MS",
        "FIRESTORE_EMULATOR_HOST",
    ] {
        std::env::remove_var(key);
    }
}

// =============================================================================
// Client
// =============================================================================

#[tokio::test]
async fn test_get_missing_document_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"/documents/projects/p404$"))
        .and(header("authorization", "Bearer owner"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    assert!(client.get_document("projects", "p404").await.unwrap().is_none());
}

#[tokio::test]
async fn test_expired_token_is_refreshed_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"/documents/projects/p1$"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"error": {"status": "UNAUTHENTICATED"}})),
        )
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"/documents/projects/p1$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": doc_name("projects/p1"),
            "fields": {"owner_id": {"stringValue": "u1"}}
        })))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let doc = client.get_document("projects", "p1").await.unwrap().unwrap();
    assert_eq!(doc.get::<String>("owner_id").as_deref(), Some("u1"));
}

#[tokio::test]
async fn test_run_query_skips_rows_without_documents() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path_regex(r"/documents/projects/p1:runQuery$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"document": {"name": doc_name("projects/p1/scenes/b"), "fields": {"sort_order": {"integerValue": "2"}}}},
            {"document": {"name": doc_name("projects/p1/scenes/a"), "fields": {"sort_order": {"integerValue": "1"}}}},
            {"readTime": "2026-01-01T00:00:00Z"}
        ])))
        .mount(&server)
        .await;

    let scenes = SceneRepository::new(client_for(&server).await)
        .list("p1")
        .await
        .unwrap();
    let ids: Vec<&str> = scenes.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b"]);
}

#[tokio::test]
async fn test_server_errors_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path_regex(r":runQuery$"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path_regex(r":runQuery$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let scenes = SceneRepository::new(client_for(&server).await)
        .list("p1")
        .await
        .unwrap();
    assert!(scenes.is_empty());
}

// =============================================================================
// Schedule repository
// =============================================================================

#[tokio::test]
async fn test_reset_deletes_in_dependency_order() {
    let server = MockServer::start().await;
    for collection in RESET_ORDER {
        Mock::given(method("POST"))
            .and(path_regex(r"/documents/projects/p1:runQuery$"))
            .and(body_partial_json(json!({
                "structuredQuery": {"from": [{"collectionId": collection}]}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"document": {"name": doc_name(&format!("projects/p1/{}/row1", collection)), "fields": {}}}
            ])))
            .mount(&server)
            .await;
    }
    Mock::given(method("POST"))
        .and(path_regex(r":commit$"))
        .respond_with(commit_ok())
        .expect(4)
        .mount(&server)
        .await;

    let counts = ScheduleRepository::new(client_for(&server).await)
        .reset("p1")
        .await
        .unwrap();
    assert_eq!(counts.total(), 4);
    assert_eq!(counts.days, 1);

    let deleted: Vec<String> = commit_bodies(&server)
        .await
        .iter()
        .map(|body| body["writes"][0]["delete"].as_str().unwrap().to_string())
        .collect();
    for (name, collection) in deleted.iter().zip(RESET_ORDER) {
        assert!(name.contains(&format!("/{}/", collection)), "{} not in {}", collection, name);
    }
}

#[tokio::test]
async fn test_create_day_commits_day_sheet_and_links_together() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path_regex(r":commit$"))
        .respond_with(commit_ok())
        .expect(1)
        .mount(&server)
        .await;

    let day = ScheduleRepository::new(client_for(&server).await)
        .create(NewShootingDay {
            project_id: "p1".into(),
            date: chrono::NaiveDate::from_ymd_opt(2026, 6, 1).unwrap(),
            day_number: 1,
            unit: slate_models::DEFAULT_UNIT.into(),
            general_call: Some("07:00".into()),
            estimated_wrap: None,
            notes: None,
            scene_ids: vec!["s1".into(), "s2".into()],
        })
        .await
        .unwrap();

    let bodies = commit_bodies(&server).await;
    let writes = bodies[0]["writes"].as_array().unwrap();
    assert_eq!(writes.len(), 4);
    assert!(writes[0]["update"]["name"].as_str().unwrap().ends_with(&format!("/shooting_days/{}", day.id)));
    assert_eq!(writes[1]["update"]["fields"]["status"]["stringValue"], "DRAFT");
    assert_eq!(writes[3]["update"]["fields"]["scene_id"]["stringValue"], "s2");
    assert_eq!(writes[3]["update"]["fields"]["sort_order"]["integerValue"], "1");
}

#[tokio::test]
async fn test_failed_day_commit_surfaces_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path_regex(r":commit$"))
        .respond_with(ResponseTemplate::new(400).set_body_string("INVALID_ARGUMENT"))
        .mount(&server)
        .await;

    let result = ScheduleRepository::new(client_for(&server).await)
        .create(NewShootingDay {
            project_id: "p1".into(),
            date: chrono::NaiveDate::from_ymd_opt(2026, 6, 1).unwrap(),
            day_number: 1,
            unit: slate_models::DEFAULT_UNIT.into(),
            general_call: None,
            estimated_wrap: None,
            notes: None,
            scene_ids: vec![],
        })
        .await;
    assert!(matches!(result, Err(FirestoreError::RequestFailed(_))));
}

#[tokio::test]
async fn test_mark_scheduled_masks_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path_regex(r":commit$"))
        .respond_with(commit_ok())
        .mount(&server)
        .await;

    SceneRepository::new(client_for(&server).await)
        .set_scheduled("p1", &["s1".to_string(), "s2".to_string()])
        .await
        .unwrap();

    let bodies = commit_bodies(&server).await;
    let writes = bodies[0]["writes"].as_array().unwrap();
    assert_eq!(writes.len(), 2);
    assert_eq!(writes[0]["updateMask"]["fieldPaths"], json!(["status", "updated_at"]));
    assert_eq!(writes[0]["update"]["fields"]["status"]["stringValue"], "SCHEDULED");
}

// =============================================================================
// AI cache
// =============================================================================

fn cache_doc(response: &str, expires_at: &str) -> JsonValue {
    json!({
        "name": doc_name("ai_cache/schedule-build__k1"),
        "fields": {
            "endpoint": {"stringValue": "schedule-build"},
            "cache_key": {"stringValue": "k1"},
            "response": {"stringValue": response},
            "user_id": {"stringValue": "u1"},
            "expires_at": {"timestampValue": expires_at},
            "updated_at": {"timestampValue": "2026-01-01T00:00:00Z"}
        }
    })
}

#[tokio::test]
async fn test_cache_hit_returns_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"/documents/ai_cache/schedule-build__k1$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(cache_doc(r#"{"days":[]}"#, "2999-01-01T00:00:00Z")))
        .mount(&server)
        .await;

    let cache = FirestoreResponseCache::new(client_for(&server).await);
    assert_eq!(cache.get("schedule-build", "k1").await, Some(json!({"days": []})));
}

#[tokio::test]
async fn test_expired_cache_entry_is_deleted_and_missed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"/documents/ai_cache/schedule-build__k1$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(cache_doc("{}", "2020-01-01T00:00:00Z")))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path_regex(r"/documents/ai_cache/schedule-build__k1$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let cache = FirestoreResponseCache::new(client_for(&server).await);
    assert_eq!(cache.get("schedule-build", "k1").await, None);
}

#[tokio::test]
async fn test_cache_errors_are_swallowed() {
    let server = MockServer::start().await;
    Mock::given(wiremock::matchers::any())
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let cache = FirestoreResponseCache::new(client_for(&server).await);
    assert_eq!(cache.get("schedule-build", "k1").await, None);
    cache
        .set(CacheEntry::new("schedule-build", "k1", json!({}), 60, None, "u1"))
        .await;
    cache.invalidate_project("schedule-view", "p1").await;
}

#[tokio::test]
async fn test_cache_set_writes_json_string() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path_regex(r"/documents/ai_cache/schedule-build__k2$"))
        .and(body_partial_json(json!({
            "fields": {"response": {"stringValue": "{\"days\":[1]}"}, "project_id": {"stringValue": "p1"}}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": doc_name("ai_cache/schedule-build__k2")})))
        .expect(1)
        .mount(&server)
        .await;

    let cache = FirestoreResponseCache::new(client_for(&server).await);
    cache
        .set(CacheEntry::new("schedule-build", "k2", json!({"days": [1]}), 60, Some("p1".into()), "u1"))
        .await;
}
