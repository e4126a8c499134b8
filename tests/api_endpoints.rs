//! Endpoint-level tests for the axum router.
//!
//! Drives the router directly with `tower::ServiceExt::oneshot` using an
//! in-memory fake source and the memory catalog cache, so no network or
//! Redis is involved.

// Integration tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use chrono::Utc;
use promptdeck::cache::{CatalogCache, MemoryCatalogCache};
use promptdeck::config::{AppConfig, SourceConfig};
use promptdeck::http::{AppState, router};
use promptdeck::models::PromptRecord;
use promptdeck::source::PromptSource;
use promptdeck::webhook::RECORD_CHANGED_EVENT;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tower::ServiceExt;

struct FakeSource {
    records: Vec<PromptRecord>,
    fail: AtomicBool,
    calls: AtomicUsize,
}

impl FakeSource {
    fn new(records: Vec<PromptRecord>) -> Arc<Self> {
        Arc::new(Self {
            records,
            fail: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl PromptSource for FakeSource {
    async fn fetch_records(&self) -> promptdeck::Result<Vec<PromptRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(promptdeck::Error::Upstream {
                operation: "list_records".to_string(),
                cause: "unavailable".to_string(),
            });
        }
        Ok(self.records.clone())
    }
}

fn record(id: &str, category: &str) -> PromptRecord {
    PromptRecord {
        id: id.to_string(),
        title: format!("title {id}"),
        description: String::new(),
        content: "prompt body".to_string(),
        category: category.to_string(),
        tags: Vec::new(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn build_app(config: AppConfig, source: Arc<FakeSource>) -> (Router, Arc<dyn CatalogCache>) {
    let cache: Arc<dyn CatalogCache> = Arc::new(MemoryCatalogCache::new(60));
    let state = AppState::new(config, source, Arc::clone(&cache));
    (router(state), cache)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("body is JSON")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("build request")
}

fn post_webhook(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/webhook/bitable")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("build request")
}

fn record_changed_event(event_id: &str, table_id: &str, token: Option<&str>) -> Value {
    let mut header = json!({
        "event_id": event_id,
        "event_type": RECORD_CHANGED_EVENT,
    });
    if let Some(token) = token {
        header["token"] = json!(token);
    }
    json!({ "header": header, "event": { "table_id": table_id } })
}

/// Builds an encrypted envelope the way the upstream notifier does:
/// AES-256-CBC with a SHA-256-derived key, 16-byte IV prefix, base64.
fn encrypt_envelope(plaintext: &str, encrypt_key: &str) -> String {
    use aes::cipher::block_padding::Pkcs7;
    use aes::cipher::{BlockEncryptMut, KeyIvInit};
    use base64::Engine;
    use sha2::{Digest, Sha256};

    type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;

    let key = Sha256::digest(encrypt_key.as_bytes());
    let iv = [9_u8; 16];
    let ciphertext = Aes256CbcEnc::new_from_slices(&key, &iv)
        .expect("cipher setup")
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());
    let mut raw = iv.to_vec();
    raw.extend_from_slice(&ciphertext);
    base64::engine::general_purpose::STANDARD.encode(raw)
}

fn sign_body(timestamp: &str, nonce: &str, encrypt_key: &str, body: &str) -> String {
    use sha2::{Digest, Sha256};

    let mut hasher = Sha256::new();
    hasher.update(timestamp.as_bytes());
    hasher.update(nonce.as_bytes());
    hasher.update(encrypt_key.as_bytes());
    hasher.update(body.as_bytes());
    hex::encode(hasher.finalize())
}

// ============================================================================
// Read endpoint
// ============================================================================

#[tokio::test]
async fn test_prompts_endpoint_serves_and_caches() {
    let source = FakeSource::new(vec![record("r1", "Coding"), record("r2", "Writing")]);
    let (app, _cache) = build_app(AppConfig::new(), Arc::clone(&source));

    let response = app.clone().oneshot(get("/api/prompts")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["total"], 2);
    assert_eq!(body["categories"], json!(["Coding", "Writing"]));
    assert_eq!(body["data"][0]["id"], "r1");

    // The background warm should make the second call a cache hit.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let response = app.oneshot(get("/api/prompts")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(source.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_prompts_endpoint_cold_failure_is_500() {
    let source = FakeSource::new(Vec::new());
    source.fail.store(true, Ordering::SeqCst);
    let (app, _cache) = build_app(AppConfig::new(), source);

    let response = app.oneshot(get("/api/prompts")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "FETCH_ERROR");
    assert_eq!(body["message"], "数据加载失败，请稍后重试");
}

#[tokio::test]
async fn test_prompts_endpoint_prefers_cache_over_failure() {
    let source = FakeSource::new(Vec::new());
    let (app, cache) = build_app(AppConfig::new(), Arc::clone(&source));

    cache.write(&[record("old", "General")], &["General".to_string()]).await;
    source.fail.store(true, Ordering::SeqCst);

    let response = app.oneshot(get("/api/prompts")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"][0]["id"], "old");
}

// ============================================================================
// Webhook endpoint
// ============================================================================

#[tokio::test]
async fn test_webhook_rejects_invalid_json() {
    let (app, _cache) = build_app(AppConfig::new(), FakeSource::new(Vec::new()));

    let request = Request::builder()
        .method("POST")
        .uri("/api/webhook/bitable")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Invalid JSON");
}

#[tokio::test]
async fn test_webhook_echoes_verification_challenge() {
    // Challenge is echoed even though a verification token is configured
    // and the request carries none.
    let config = AppConfig::new().with_verification_token("v-token");
    let (app, _cache) = build_app(config, FakeSource::new(Vec::new()));

    let response = app
        .oneshot(post_webhook(json!({
            "type": "url_verification",
            "challenge": "abc123",
        })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["challenge"], "abc123");
}

#[tokio::test]
async fn test_webhook_token_mismatch_is_401_and_no_sync() {
    let source = FakeSource::new(Vec::new());
    let config = AppConfig::new().with_verification_token("v-token");
    let (app, _cache) = build_app(config, Arc::clone(&source));

    let response = app
        .oneshot(post_webhook(record_changed_event("ev-1", "tbl_x", Some("wrong"))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(source.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_webhook_triggers_sync_once_per_event() {
    let source = FakeSource::new(vec![record("r1", "Coding")]);
    let (app, _cache) = build_app(AppConfig::new(), Arc::clone(&source));

    let event = record_changed_event("ev-dup", "tbl_x", None);
    let response = app.clone().oneshot(post_webhook(event.clone())).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["code"], 0);

    // Replay: still acknowledged, but no second sync.
    let response = app.oneshot(post_webhook(event)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["code"], 0);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(source.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_webhook_ignores_other_tables() {
    let source = FakeSource::new(Vec::new());
    let config =
        AppConfig::new().with_source(SourceConfig::default().with_table_id("tbl_target"));
    let (app, _cache) = build_app(config, Arc::clone(&source));

    let response = app
        .oneshot(post_webhook(record_changed_event("ev-2", "tbl_other", None)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["code"], 0);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(source.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_webhook_decrypts_envelope_and_echoes_challenge() {
    let config = AppConfig::new().with_encrypt_key("envelope-key");
    let (app, _cache) = build_app(config, FakeSource::new(Vec::new()));

    let plaintext = json!({ "type": "url_verification", "challenge": "enc-123" }).to_string();
    let envelope = encrypt_envelope(&plaintext, "envelope-key");

    let response = app
        .oneshot(post_webhook(json!({ "encrypt": envelope })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["challenge"], "enc-123");
}

#[tokio::test]
async fn test_webhook_undecryptable_envelope_is_400() {
    let config = AppConfig::new().with_encrypt_key("envelope-key");
    let (app, _cache) = build_app(config, FakeSource::new(Vec::new()));

    // Valid base64, wrong key: decryption fails and the delivery is treated
    // like an unparseable body.
    let envelope = encrypt_envelope("{}", "some-other-key");
    let response = app
        .oneshot(post_webhook(json!({ "encrypt": envelope })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Invalid JSON");
}

#[tokio::test]
async fn test_webhook_signature_mismatch_is_401_and_no_sync() {
    let source = FakeSource::new(Vec::new());
    let config = AppConfig::new().with_encrypt_key("envelope-key");
    let (app, _cache) = build_app(config, Arc::clone(&source));

    let body = record_changed_event("ev-sig-1", "tbl_x", None).to_string();
    let request = Request::builder()
        .method("POST")
        .uri("/api/webhook/bitable")
        .header("x-lark-request-timestamp", "1700000000")
        .header("x-lark-request-nonce", "nonce-1")
        .header("x-lark-signature", "0000000000000000")
        .body(Body::from(body))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "Invalid signature");

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(source.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_webhook_valid_signature_is_accepted() {
    let source = FakeSource::new(vec![record("r1", "Coding")]);
    let config = AppConfig::new().with_encrypt_key("envelope-key");
    let (app, _cache) = build_app(config, Arc::clone(&source));

    let body = record_changed_event("ev-sig-2", "tbl_x", None).to_string();
    let signature = sign_body("1700000000", "nonce-2", "envelope-key", &body);
    let request = Request::builder()
        .method("POST")
        .uri("/api/webhook/bitable")
        .header("x-lark-request-timestamp", "1700000000")
        .header("x-lark-request-nonce", "nonce-2")
        .header("x-lark-signature", signature)
        .body(Body::from(body))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["code"], 0);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(source.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_webhook_health_check() {
    let (app, _cache) = build_app(AppConfig::new(), FakeSource::new(Vec::new()));

    let response = app.oneshot(get("/api/webhook/bitable")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["endpoint"], "Bitable Webhook");
    assert!(body["timestamp"].is_string());
}

// ============================================================================
// Cron endpoint
// ============================================================================

#[tokio::test]
async fn test_cron_requires_bearer_secret() {
    let config = AppConfig::new().with_cron_secret("cron-s3cret");
    let (app, _cache) = build_app(config, FakeSource::new(Vec::new()));

    let response = app.clone().oneshot(get("/api/cron/sync")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .uri("/api/cron/sync")
        .header(header::AUTHORIZATION, "Bearer wrong")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_cron_syncs_when_stale() {
    let source = FakeSource::new(vec![record("r1", "Coding")]);
    let config = AppConfig::new().with_cron_secret("cron-s3cret");
    let (app, _cache) = build_app(config, Arc::clone(&source));

    let request = Request::builder()
        .uri("/api/cron/sync")
        .header(header::AUTHORIZATION, "Bearer cron-s3cret")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["synced"], true);
    assert_eq!(body["promptCount"], 1);

    // Cache is now fresh, so a second trigger skips the sync.
    let request = Request::builder()
        .uri("/api/cron/sync")
        .header(header::AUTHORIZATION, "Bearer cron-s3cret")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    let body = body_json(response).await;
    assert_eq!(body["synced"], false);
    assert_eq!(body["message"], "Cache is fresh, sync skipped");
    assert_eq!(source.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_cron_reports_sync_failure_as_500() {
    let source = FakeSource::new(Vec::new());
    source.fail.store(true, Ordering::SeqCst);
    let (app, _cache) = build_app(AppConfig::new(), source);

    let response = app.oneshot(get("/api/cron/sync")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Sync failed");
    assert!(body["error"].as_str().unwrap().contains("list_records"));
}
