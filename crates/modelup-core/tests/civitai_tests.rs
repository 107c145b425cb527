//! Civitai gateway against a local server speaking the same JSON.

mod common;

use axum::extract::Path as UrlPath;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use common::spawn_server;
use modelup_core::network::RetryConfig;
use modelup_core::{CancellationToken, CatalogGateway, CivitaiClient, HttpClient, UpdaterError};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const KNOWN_DIGEST: &str = "af1349b9f5f9a1a6a0404dea36dcc9499bcb25c9adc112b7cc9a93cae41f3262";

async fn by_hash(UrlPath(digest): UrlPath<String>) -> Response {
    if digest != KNOWN_DIGEST {
        return (StatusCode::NOT_FOUND, Json(json!({"error": "Model not found"}))).into_response();
    }
    Json(json!({
        "id": 11,
        "modelId": 7,
        "name": "v1",
        "publishedAt": "2023-05-01T10:00:00.000Z",
        "files": [{
            "name": "cute-v1.safetensors",
            "downloadUrl": "https://civitai.com/api/download/models/11",
            "primary": true,
            "metadata": {"format": "SafeTensor"},
            "hashes": {"SHA256": "ABCDEF", "BLAKE3": KNOWN_DIGEST.to_uppercase()}
        }]
    }))
    .into_response()
}

async fn model(UrlPath(id): UrlPath<u64>) -> Response {
    if id != 7 {
        return StatusCode::NOT_FOUND.into_response();
    }
    Json(json!({
        "id": 7,
        "name": "Cute Style",
        "modelVersions": [
            {"id": 12, "name": "v2", "publishedAt": "2023-06-01T00:00:00Z", "files": []},
            {"id": 11, "name": "v1", "publishedAt": "2023-05-01T10:00:00Z", "files": []}
        ]
    }))
    .into_response()
}

async fn catalog_base() -> String {
    let app = Router::new()
        .route("/api/v1/model-versions/by-hash/:digest", get(by_hash))
        .route("/api/v1/models/:id", get(model));
    format!("{}/api/v1", spawn_server(app).await)
}

fn client(base: &str) -> CivitaiClient {
    let http = Arc::new(HttpClient::new().unwrap());
    CivitaiClient::with_base_url(http, base, CancellationToken::new())
}

fn fast_retry() -> RetryConfig {
    RetryConfig::new()
        .with_max_attempts(3)
        .with_base_delay(Duration::from_millis(1))
        .with_jitter(false)
}

#[tokio::test]
async fn test_lookup_version_by_digest() {
    let base = catalog_base().await;

    let version = client(&base)
        .lookup_version_by_digest(KNOWN_DIGEST)
        .await
        .unwrap();

    assert_eq!(version.id, 11);
    assert_eq!(version.model_id, 7);
    assert_eq!(version.name, "v1");
    assert!(version.published_at.is_some());
    assert_eq!(version.files[0].download_url, "https://civitai.com/api/download/models/11");
}

#[tokio::test]
async fn test_unknown_digest_is_not_found() {
    let base = catalog_base().await;

    let err = client(&base)
        .lookup_version_by_digest("0000")
        .await
        .unwrap_err();
    assert!(matches!(err, UpdaterError::NotFound { .. }));
}

#[tokio::test]
async fn test_lookup_model_fills_model_id() {
    let base = catalog_base().await;

    let model = client(&base).lookup_model(7).await.unwrap();

    assert_eq!(model.name, "Cute Style");
    assert_eq!(model.versions.len(), 2);
    assert!(model.versions.iter().all(|v| v.model_id == 7));
}

#[tokio::test]
async fn test_unknown_model_is_not_found() {
    let base = catalog_base().await;
    let err = client(&base).lookup_model(8).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_transient_errors_are_retried() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = attempts.clone();
    let app = Router::new().route(
        "/models/:id",
        get(move |UrlPath(id): UrlPath<u64>| {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    return StatusCode::SERVICE_UNAVAILABLE.into_response();
                }
                Json(json!({"id": id, "name": "Flaky", "modelVersions": []})).into_response()
            }
        }),
    );
    let base = spawn_server(app).await;

    let model = client(&base)
        .with_retry(fast_retry())
        .lookup_model(5)
        .await
        .unwrap();

    assert_eq!(model.name, "Flaky");
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = attempts.clone();
    let app = Router::new().route(
        "/models/:id",
        get(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                StatusCode::FORBIDDEN
            }
        }),
    );
    let base = spawn_server(app).await;

    let err = client(&base)
        .with_retry(fast_retry())
        .lookup_model(5)
        .await
        .unwrap_err();

    assert!(matches!(err, UpdaterError::CatalogFailed { status: 403, .. }));
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_api_token_sent_as_bearer() {
    let app = Router::new().route(
        "/models/:id",
        get(|headers: HeaderMap| async move {
            match headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
                Some("Bearer secret-token") => {
                    Json(json!({"id": 1, "name": "Private", "modelVersions": []})).into_response()
                }
                _ => StatusCode::UNAUTHORIZED.into_response(),
            }
        }),
    );
    let base = spawn_server(app).await;

    let anonymous = client(&base).lookup_model(1).await.unwrap_err();
    assert!(matches!(anonymous, UpdaterError::CatalogFailed { status: 401, .. }));

    let http = HttpClient::new()
        .unwrap()
        .with_api_token(Some("secret-token".to_string()));
    let authed = CivitaiClient::with_base_url(Arc::new(http), base, CancellationToken::new());
    assert_eq!(authed.lookup_model(1).await.unwrap().name, "Private");
}

#[tokio::test]
async fn test_rate_limit_surfaces_after_retries() {
    let app = Router::new().route(
        "/models/:id",
        get(|| async { (StatusCode::TOO_MANY_REQUESTS, [(header::RETRY_AFTER, "0")]) }),
    );
    let base = spawn_server(app).await;

    let err = client(&base)
        .with_retry(fast_retry())
        .lookup_model(1)
        .await
        .unwrap_err();
    assert!(matches!(err, UpdaterError::RateLimited { .. }));
}
