//! Remote model catalog.
//!
//! - [`types`] - Version, file and model records
//! - [`civitai`] - HTTP implementation against the Civitai v1 API
//!
//! The resolver only sees the [`CatalogGateway`] trait, so tests substitute
//! an in-memory catalog.

mod civitai;
mod types;

pub use civitai::CivitaiClient;
pub use types::{FileHashes, FileMetadata, FileRecord, ModelRecord, VersionRecord};

use crate::error::Result;
use async_trait::async_trait;

/// Read-only lookups against the remote catalog.
///
/// Implementations return `UpdaterError::NotFound` when the catalog has no
/// record; every other error is a transport or decoding failure.
#[async_trait]
pub trait CatalogGateway: Send + Sync {
    /// The version whose file produced `digest`.
    async fn lookup_version_by_digest(&self, digest: &str) -> Result<VersionRecord>;

    /// The model and all its versions. Every returned version has
    /// `model_id == model_id`.
    async fn lookup_model(&self, model_id: u64) -> Result<ModelRecord>;
}
