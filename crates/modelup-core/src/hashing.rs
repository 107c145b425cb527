//! Streaming content digests for model files.
//!
//! Provides:
//! - Single-algorithm hashing of a reader or file in fixed-size chunks
//! - Single-pass SHA256 + BLAKE3 accumulation for downloads
//! - Case-insensitive comparison against catalog-declared digests

use crate::cancel::CancellationToken;
use crate::config::{HashAlgorithm, ScanConfig};
use crate::error::{Result, UpdaterError};
use crate::events::{Reporter, UpdateEvent};
use blake3::Hasher as Blake3Hasher;
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

/// Incremental hasher for one algorithm.
pub enum Digester {
    Blake3(Box<Blake3Hasher>),
    Sha256(Sha256),
}

impl Digester {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Blake3 => Digester::Blake3(Box::new(Blake3Hasher::new())),
            HashAlgorithm::Sha256 => Digester::Sha256(Sha256::new()),
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        match self {
            Digester::Blake3(h) => {
                h.update(data);
            }
            Digester::Sha256(h) => h.update(data),
        }
    }

    /// Lowercase hex digest.
    pub fn finalize(self) -> String {
        match self {
            Digester::Blake3(h) => h.finalize().to_hex().to_string(),
            Digester::Sha256(h) => hex::encode(h.finalize()),
        }
    }
}

/// Both digests of one byte stream, lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DualHash {
    pub sha256: String,
    pub blake3: String,
}

impl DualHash {
    pub fn get(&self, algorithm: HashAlgorithm) -> &str {
        match algorithm {
            HashAlgorithm::Sha256 => &self.sha256,
            HashAlgorithm::Blake3 => &self.blake3,
        }
    }
}

/// Accumulates SHA256 and BLAKE3 over chunks as they stream past.
pub struct DualDigester {
    sha256: Sha256,
    blake3: Blake3Hasher,
}

impl DualDigester {
    pub fn new() -> Self {
        Self {
            sha256: Sha256::new(),
            blake3: Blake3Hasher::new(),
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        self.sha256.update(data);
        self.blake3.update(data);
    }

    pub fn finalize(self) -> DualHash {
        DualHash {
            sha256: hex::encode(self.sha256.finalize()),
            blake3: self.blake3.finalize().to_hex().to_string(),
        }
    }
}

impl Default for DualDigester {
    fn default() -> Self {
        Self::new()
    }
}

/// Hash everything `reader` yields, `chunk_size` bytes at a time.
///
/// `on_chunk` is called with the running byte count after every chunk and
/// may abort the hash by returning an error.
pub fn hash_reader<R: Read>(
    mut reader: R,
    algorithm: HashAlgorithm,
    chunk_size: usize,
    mut on_chunk: impl FnMut(u64) -> Result<()>,
) -> Result<String> {
    let mut digester = Digester::new(algorithm);
    let mut buffer = vec![0u8; chunk_size];
    let mut processed: u64 = 0;

    loop {
        let bytes_read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };

        digester.update(&buffer[..bytes_read]);
        processed += bytes_read as u64;
        on_chunk(processed)?;
    }

    Ok(digester.finalize())
}

/// Compute the digest of a file on disk.
///
/// Runs on the blocking pool, reports progress to `reporter`, and stops at
/// the next chunk boundary once `cancel` fires.
pub async fn compute_file_digest(
    path: impl AsRef<Path>,
    algorithm: HashAlgorithm,
    cancel: CancellationToken,
    reporter: Arc<dyn Reporter>,
) -> Result<String> {
    let path = path.as_ref().to_path_buf();

    tokio::task::spawn_blocking(move || {
        let file = std::fs::File::open(&path).map_err(|e| UpdaterError::io_with_path(e, &path))?;
        let total_bytes = file
            .metadata()
            .map_err(|e| UpdaterError::io_with_path(e, &path))?
            .len();

        reporter.on_event(UpdateEvent::HashStarted {
            path: path.clone(),
            total_bytes,
        });

        let digest = hash_reader(file, algorithm, ScanConfig::HASH_CHUNK_SIZE, |processed| {
            cancel.check()?;
            reporter.on_event(UpdateEvent::HashProgress {
                path: path.clone(),
                bytes_processed: processed,
                total_bytes,
            });
            Ok(())
        })
        .map_err(|e| match e {
            UpdaterError::Io {
                source: Some(source),
                ..
            } => UpdaterError::io_with_path(source, &path),
            other => other,
        })?;

        tracing::debug!("{} digest of {}: {}", algorithm, path.display(), digest);
        reporter.on_event(UpdateEvent::HashFinished {
            path: path.clone(),
            digest: digest.clone(),
        });

        Ok(digest)
    })
    .await
    .map_err(|e| UpdaterError::Io {
        message: format!("Hash computation task failed: {}", e),
        path: None,
        source: None,
    })?
}

/// Compare a computed digest with a declared one, ignoring case.
pub fn digests_match(actual: &str, declared: &str) -> bool {
    actual.eq_ignore_ascii_case(declared.trim())
}
