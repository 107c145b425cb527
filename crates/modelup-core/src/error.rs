//! Error types for the model updater.
//!
//! Every failure a run can hit is a variant here, so callers branch on the
//! variant instead of inspecting status codes. `NotFound`-style errors skip a
//! single target. `UserCancelled`, `Cancelled` and `Prompt` abort the whole
//! run. Anything else is reported against the target that produced it.

use crate::config::NetworkConfig;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the updater.
#[derive(Debug, Error)]
pub enum UpdaterError {
    // Catalog lookups
    #[error("Model information is not found: {subject}")]
    NotFound { subject: String },

    #[error("No file matches the requested format in version {version}")]
    FileNotFound { version: String },

    #[error("Catalog request {url} failed with HTTP {status}")]
    CatalogFailed { url: String, status: u16 },

    // Download integrity
    #[error("Hash mismatch for {file}: expected {expected}, got {actual}")]
    HashMismatch {
        file: String,
        expected: String,
        actual: String,
    },

    #[error("Catalog declares no digest for {file}")]
    MissingDigest { file: String },

    // Transport
    #[error("Download failed for {url}: {message}")]
    DownloadFailed {
        url: String,
        status: Option<u16>,
        message: String,
    },

    #[error("Response from {url} does not declare a filename")]
    NoFilename { url: String },

    #[error("Refusing to write invalid filename: {name:?}")]
    InvalidFilename { name: String },

    #[error("Network error: {message}")]
    Network {
        message: String,
        /// Optional cause description
        cause: Option<String>,
    },

    #[error("Request timeout after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Rate limited by {service}, retry after {retry_after_secs:?} seconds")]
    RateLimited {
        service: String,
        retry_after_secs: Option<u64>,
    },

    // File system
    #[error("File already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    #[error("Configuration error: {message}")]
    Config { message: String },

    // Aborts
    #[error("Prompt failed: {message}")]
    Prompt {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Cancelled by user")]
    UserCancelled,

    #[error("Operation was cancelled")]
    Cancelled,
}

/// Result type alias for updater operations.
pub type Result<T> = std::result::Result<T, UpdaterError>;

impl From<std::io::Error> for UpdaterError {
    fn from(err: std::io::Error) -> Self {
        UpdaterError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for UpdaterError {
    fn from(err: serde_json::Error) -> Self {
        UpdaterError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<reqwest::Error> for UpdaterError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            UpdaterError::Timeout(NetworkConfig::REQUEST_TIMEOUT)
        } else {
            UpdaterError::Network {
                message: err.to_string(),
                cause: std::error::Error::source(&err).map(|s| s.to_string()),
            }
        }
    }
}

impl UpdaterError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        UpdaterError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// The catalog has nothing for this digest/model, or the version has no
    /// usable file. Skip the target and keep going.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            UpdaterError::NotFound { .. } | UpdaterError::FileNotFound { .. }
        )
    }

    /// Errors that end the whole run rather than a single target.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            UpdaterError::UserCancelled | UpdaterError::Cancelled | UpdaterError::Prompt { .. }
        )
    }

    /// Check if this error should trigger a retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            UpdaterError::Network { .. }
                | UpdaterError::Timeout(_)
                | UpdaterError::RateLimited { .. }
        )
    }
}
