//! Civitai v1 API gateway.

use super::{CatalogGateway, ModelRecord, VersionRecord};
use crate::cancel::CancellationToken;
use crate::config::CatalogConfig;
use crate::error::{Result, UpdaterError};
use crate::network::{retry_async, HttpClient, RetryConfig};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::debug;

/// Catalog gateway backed by the Civitai REST API.
pub struct CivitaiClient {
    http: Arc<HttpClient>,
    base_url: String,
    retry: RetryConfig,
    cancel: CancellationToken,
}

impl CivitaiClient {
    /// Create a client against the public Civitai API.
    pub fn new(http: Arc<HttpClient>, cancel: CancellationToken) -> Self {
        Self::with_base_url(http, CatalogConfig::DEFAULT_BASE_URL, cancel)
    }

    /// Create a client against another deployment (or a test server).
    pub fn with_base_url(
        http: Arc<HttpClient>,
        base_url: impl Into<String>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            retry: RetryConfig::default(),
            cancel,
        }
    }

    /// Override the retry policy.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, subject: &str) -> Result<T> {
        retry_async(&self.retry, &self.cancel, || async move {
            let response = self.http.get(url).await?;
            let status = response.status();

            if status == StatusCode::NOT_FOUND {
                return Err(UpdaterError::NotFound {
                    subject: subject.to_string(),
                });
            }
            if !status.is_success() {
                if HttpClient::is_retryable_status(status) {
                    return Err(UpdaterError::Network {
                        message: format!("HTTP {} from {}", status, url),
                        cause: None,
                    });
                }
                return Err(UpdaterError::CatalogFailed {
                    url: url.to_string(),
                    status: status.as_u16(),
                });
            }

            let body = response.bytes().await?;
            Ok(serde_json::from_slice(&body)?)
        })
        .await
    }
}

#[async_trait]
impl CatalogGateway for CivitaiClient {
    async fn lookup_version_by_digest(&self, digest: &str) -> Result<VersionRecord> {
        let url = format!(
            "{}/model-versions/by-hash/{}",
            self.base_url,
            urlencoding::encode(digest)
        );
        debug!("Looking up version by digest {}", digest);
        self.get_json(&url, &format!("digest {}", digest)).await
    }

    async fn lookup_model(&self, model_id: u64) -> Result<ModelRecord> {
        let url = format!("{}/models/{}", self.base_url, model_id);
        debug!("Looking up model {}", model_id);
        let mut model: ModelRecord = self.get_json(&url, &format!("model {}", model_id)).await?;

        // Embedded versions omit modelId.
        for version in &mut model.versions {
            version.model_id = model.id;
        }
        Ok(model)
    }
}
