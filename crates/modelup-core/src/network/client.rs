//! HTTP client shared by the catalog gateway and the fetcher.
//!
//! Wraps reqwest with:
//! - Separate API and download clients (downloads have no total timeout)
//! - Optional bearer token on every request
//! - 429 handling with `Retry-After`
//! - User-agent management

use crate::config::NetworkConfig;
use crate::error::{Result, UpdaterError};
use reqwest::{header, Client, Response, StatusCode};
use std::time::Duration;
use tracing::debug;

/// HTTP client used for catalog lookups and file downloads.
pub struct HttpClient {
    /// Client for API requests (has total timeout)
    api: Client,
    /// Client for downloads (connect timeout only)
    download: Client,
    /// Bearer token sent with every request.
    api_token: Option<String>,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("has_api_token", &self.api_token.is_some())
            .finish()
    }
}

impl HttpClient {
    /// Create a new HTTP client with default configuration.
    pub fn new() -> Result<Self> {
        Self::with_timeout(NetworkConfig::REQUEST_TIMEOUT)
    }

    /// Create a new HTTP client with a custom API request timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let api = Client::builder()
            .timeout(timeout)
            .connect_timeout(NetworkConfig::CONNECT_TIMEOUT)
            .user_agent(NetworkConfig::USER_AGENT)
            .build()
            .map_err(|e| UpdaterError::Network {
                message: format!("Failed to create HTTP client: {}", e),
                cause: None,
            })?;

        let download = Client::builder()
            .connect_timeout(NetworkConfig::CONNECT_TIMEOUT)
            .user_agent(NetworkConfig::USER_AGENT)
            .build()
            .map_err(|e| UpdaterError::Network {
                message: format!("Failed to create download client: {}", e),
                cause: None,
            })?;

        Ok(Self {
            api,
            download,
            api_token: None,
        })
    }

    /// Attach a bearer token. Empty tokens are ignored.
    pub fn with_api_token(mut self, token: Option<String>) -> Self {
        self.api_token = token.filter(|t| !t.trim().is_empty());
        self
    }

    /// GET an API endpoint. 429 becomes `RateLimited`; any other status is
    /// returned for the caller to interpret.
    pub async fn get(&self, url: &str) -> Result<Response> {
        let response = self
            .authorize(self.api.get(url))
            .send()
            .await
            .map_err(|e| network_error("GET", url, e))?;

        debug!("GET {} -> {}", url, response.status());
        check_rate_limit(response, url)
    }

    /// Start a streaming download. The status is not checked here.
    pub async fn get_stream(&self, url: &str) -> Result<Response> {
        let response = self
            .authorize(self.download.get(url))
            .send()
            .await
            .map_err(|e| network_error("GET", url, e))?;

        debug!("GET {} -> {}", url, response.status());
        Ok(response)
    }

    /// Check if an HTTP status code indicates a retryable error.
    pub fn is_retryable_status(status: StatusCode) -> bool {
        matches!(status.as_u16(), 408 | 429 | 500 | 502 | 503 | 504)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

fn network_error(method: &str, url: &str, err: reqwest::Error) -> UpdaterError {
    if err.is_timeout() {
        return UpdaterError::Timeout(NetworkConfig::REQUEST_TIMEOUT);
    }
    UpdaterError::Network {
        message: format!("{} {} failed: {}", method, url, err),
        cause: std::error::Error::source(&err).map(|s| s.to_string()),
    }
}

fn check_rate_limit(response: Response, url: &str) -> Result<Response> {
    if response.status() != StatusCode::TOO_MANY_REQUESTS {
        return Ok(response);
    }

    let retry_after = response
        .headers()
        .get(header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok());

    Err(UpdaterError::RateLimited {
        service: extract_domain(url),
        retry_after_secs: retry_after,
    })
}

/// Extract domain from a URL.
pub fn extract_domain(url: &str) -> String {
    url::Url::parse(url)
        .map(|u| u.host_str().unwrap_or("unknown").to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}
