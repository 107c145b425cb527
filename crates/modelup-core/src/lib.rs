//! Modelup Core - finds newer catalog versions of local model files.
//!
//! Local files are identified by content digest, matched against a remote
//! catalog, and compared by publication time against every version of the
//! same model. Chosen versions are downloaded, verified against the
//! catalog's declared digests, and only then moved into place.
//!
//! The terminal front end lives in the `modelup-cli` crate.
//!
//! # Example
//!
//! ```rust,ignore
//! use modelup_core::{CancellationToken, CivitaiClient, HttpClient, UpdateResolver};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> modelup_core::Result<()> {
//!     let cancel = CancellationToken::new();
//!     let http = Arc::new(HttpClient::new()?);
//!     let catalog = Arc::new(CivitaiClient::new(http, cancel.clone()));
//!
//!     let resolver = UpdateResolver::new(catalog, cancel);
//!     for update in resolver.resolve_directory("models/Lora".as_ref()).await? {
//!         println!("{}: {:?}", update.model_name, update.candidates.names());
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod cancel;
pub mod catalog;
pub mod config;
pub mod error;
pub mod events;
pub mod fetcher;
pub mod hashing;
pub mod network;
pub mod resolver;
pub mod runner;
pub mod selector;

// Re-export commonly used types
pub use cancel::{CancellationToken, CancelledError};
pub use catalog::{CatalogGateway, CivitaiClient, FileRecord, ModelRecord, VersionRecord};
pub use config::{FileFormat, HashAlgorithm};
pub use error::{Result, UpdaterError};
pub use events::{NoopReporter, Reporter, UpdateEvent};
pub use fetcher::Fetcher;
pub use hashing::{compute_file_digest, DualHash};
pub use network::HttpClient;
pub use resolver::{CandidateSet, Update, UpdateResolver};
pub use runner::{RunSummary, Runner};
pub use selector::{SelectionError, VersionSelector};
