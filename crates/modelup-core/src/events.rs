//! Events emitted while resolving and fetching updates.
//!
//! The core never prints. Front ends implement [`Reporter`] to turn these
//! into progress bars, coloured notices or log lines.

use std::path::PathBuf;

/// Something observable happened during a run.
#[derive(Debug, Clone)]
pub enum UpdateEvent {
    /// A directory walk began.
    ScanStarted { dir: PathBuf },

    /// Hashing of a local file began.
    HashStarted { path: PathBuf, total_bytes: u64 },
    /// More of the file has been hashed.
    HashProgress {
        path: PathBuf,
        bytes_processed: u64,
        total_bytes: u64,
    },
    /// The digest is ready.
    HashFinished { path: PathBuf, digest: String },

    /// The catalog does not know this file.
    DigestNotFound { path: PathBuf },
    /// The model has no version newer than the local one.
    NoUpdate { model: String },
    /// Newer versions exist.
    UpdateAvailable {
        model: String,
        current: String,
        candidates: usize,
    },
    /// The user declined every candidate.
    Skipped { model: String, candidates: usize },

    /// A download began.
    DownloadStarted {
        file_name: String,
        total_bytes: Option<u64>,
    },
    /// More bytes arrived.
    DownloadProgress {
        file_name: String,
        bytes_downloaded: u64,
        total_bytes: Option<u64>,
    },
    /// The download was verified and committed.
    Fetched {
        model: String,
        version: String,
        path: PathBuf,
    },
    /// The superseded local file was deleted.
    Removed { path: PathBuf },

    /// A recoverable failure, attributed to a target or model.
    Failed { target: String, error: String },
}

/// Receiver for [`UpdateEvent`]s.
pub trait Reporter: Send + Sync {
    fn on_event(&self, event: UpdateEvent);
}

/// Reporter that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl Reporter for NoopReporter {
    fn on_event(&self, _event: UpdateEvent) {}
}
