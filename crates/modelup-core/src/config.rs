//! Centralized configuration for the updater.
//!
//! Constants for network behaviour, catalog endpoints and directory scanning,
//! plus the two user-selectable enums (`FileFormat`, `HashAlgorithm`).

use crate::error::{Result, UpdaterError};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Network-related configuration.
pub struct NetworkConfig;

impl NetworkConfig {
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
    pub const MAX_RETRIES: u32 = 3;
    pub const RETRY_BASE_DELAY: Duration = Duration::from_secs(1);
    pub const DOWNLOAD_PROGRESS_INTERVAL: Duration = Duration::from_millis(100);
    pub const DOWNLOAD_TEMP_SUFFIX: &'static str = ".part";
    pub const USER_AGENT: &'static str = concat!("modelup/", env!("CARGO_PKG_VERSION"));
}

/// Remote catalog configuration.
pub struct CatalogConfig;

impl CatalogConfig {
    pub const DEFAULT_BASE_URL: &'static str = "https://civitai.com/api/v1";
    pub const API_TOKEN_ENV: &'static str = "CIVITAI_API_TOKEN";
}

/// Local directory scanning configuration.
pub struct ScanConfig;

impl ScanConfig {
    /// Chunk size for streaming file hashes (8MB).
    pub const HASH_CHUNK_SIZE: usize = 8 * 1024 * 1024;

    /// Extensions treated as model files (compared without the dot).
    pub const MODEL_FILE_EXTENSIONS: &'static [&'static str] = &["safetensors", "ckpt", "pt"];

    /// Directories scanned when no target is given, relative to the working directory.
    pub const DEFAULT_TARGETS: &'static [&'static str] = &[
        "models/hypernetworks",
        "models/Lora",
        "models/Stable-diffusion",
        "models/VAE",
        "embeddings",
    ];

    /// Default targets resolved against `root`.
    pub fn default_targets(root: &Path) -> Vec<PathBuf> {
        Self::DEFAULT_TARGETS
            .iter()
            .map(|t| t.split('/').fold(root.to_path_buf(), |acc, part| acc.join(part)))
            .collect()
    }
}

/// Check whether a path carries one of the recognised model-file extensions.
pub fn is_model_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| ScanConfig::MODEL_FILE_EXTENSIONS.contains(&ext))
        .unwrap_or(false)
}

/// Preferred file format when a version ships more than one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FileFormat {
    #[default]
    SafeTensor,
    Pickle,
}

impl FileFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileFormat::SafeTensor => "safetensor",
            FileFormat::Pickle => "pickle",
        }
    }

    pub fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "safetensor" => Ok(FileFormat::SafeTensor),
            "pickle" => Ok(FileFormat::Pickle),
            other => Err(UpdaterError::Config {
                message: format!(
                    "unknown file format {:?} (expected safetensor or pickle)",
                    other
                ),
            }),
        }
    }

    /// Case-insensitive match against a catalog format tag.
    ///
    /// Civitai reports "SafeTensor" and "PickleTensor"; the short forms are
    /// accepted too.
    pub fn matches(&self, tag: &str) -> bool {
        let tag = tag.to_lowercase();
        match self {
            FileFormat::SafeTensor => tag == "safetensor" || tag == "safetensors",
            FileFormat::Pickle => tag == "pickle" || tag == "pickletensor",
        }
    }
}

impl std::fmt::Display for FileFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Digest algorithm used to identify local files in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HashAlgorithm {
    #[default]
    Blake3,
    Sha256,
}

impl HashAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            HashAlgorithm::Blake3 => "blake3",
            HashAlgorithm::Sha256 => "sha256",
        }
    }

    pub fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "blake3" => Ok(HashAlgorithm::Blake3),
            "sha256" => Ok(HashAlgorithm::Sha256),
            other => Err(UpdaterError::Config {
                message: format!(
                    "unknown hash algorithm {:?} (expected blake3 or sha256)",
                    other
                ),
            }),
        }
    }
}

impl std::fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
