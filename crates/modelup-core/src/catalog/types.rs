//! Catalog records as the core reads them.
//!
//! Field names follow the Civitai v1 API (camelCase JSON). Everything the
//! core does not need is ignored on deserialization.

use crate::config::{FileFormat, HashAlgorithm};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One published release of a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionRecord {
    /// Version identifier.
    pub id: u64,
    /// Identifier of the logical model. Absent when the version is embedded
    /// in a model response; the gateway fills it in.
    #[serde(default)]
    pub model_id: u64,
    /// Human-readable version name (not guaranteed unique).
    pub name: String,
    /// Publication time. Unpublished versions have none.
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub files: Vec<FileRecord>,
}

impl VersionRecord {
    /// Strictly newer by publication time.
    ///
    /// A version without a timestamp is never newer; a reference without a
    /// timestamp sorts before every published version.
    pub fn is_newer_than(&self, other: &VersionRecord) -> bool {
        self.published_at.is_some() && self.published_at > other.published_at
    }
}

/// A downloadable file attached to a version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    #[serde(default)]
    pub name: String,
    pub download_url: String,
    #[serde(default)]
    pub primary: bool,
    #[serde(default)]
    pub metadata: FileMetadata,
    #[serde(default)]
    pub hashes: FileHashes,
}

impl FileRecord {
    /// Declared format tag, e.g. "SafeTensor" or "PickleTensor".
    pub fn format(&self) -> Option<&str> {
        self.metadata.format.as_deref()
    }

    pub fn matches_format(&self, format: FileFormat) -> bool {
        self.format().map(|tag| format.matches(tag)).unwrap_or(false)
    }

    /// Declared digest for `algorithm`, if the catalog provides one.
    pub fn declared_digest(&self, algorithm: HashAlgorithm) -> Option<&str> {
        let digest = match algorithm {
            HashAlgorithm::Sha256 => self.hashes.sha256.as_deref(),
            HashAlgorithm::Blake3 => self.hashes.blake3.as_deref(),
        };
        digest.filter(|d| !d.trim().is_empty())
    }

    /// Name used in messages: the catalog file name, or the URL.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.download_url
        } else {
            &self.name
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileMetadata {
    #[serde(default)]
    pub format: Option<String>,
}

/// Digests declared by the catalog (uppercase hex on Civitai).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileHashes {
    #[serde(rename = "SHA256", default)]
    pub sha256: Option<String>,
    #[serde(rename = "BLAKE3", default)]
    pub blake3: Option<String>,
}

/// A logical model and every version the catalog lists for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelRecord {
    pub id: u64,
    pub name: String,
    #[serde(rename = "modelVersions", default)]
    pub versions: Vec<VersionRecord>,
}
