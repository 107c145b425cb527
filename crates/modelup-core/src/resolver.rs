//! Resolution of local model files to newer catalog versions.
//!
//! A local file is identified only by its content digest. The digest maps to
//! a catalog version, the version's model lists every release, and the
//! releases published strictly after the local one become candidates.
//!
//! When a directory holds several versions of the same model, only the most
//! recently published of them counts as "current", so a version the user
//! already has is never offered again.

use crate::cancel::CancellationToken;
use crate::catalog::{CatalogGateway, VersionRecord};
use crate::config::{is_model_file, HashAlgorithm};
use crate::error::{Result, UpdaterError};
use crate::events::{NoopReporter, Reporter, UpdateEvent};
use crate::hashing::compute_file_digest;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Versions of one model published after the current one.
///
/// Keyed by version id and ordered by publication time (oldest first), so
/// two versions sharing a name never shadow each other.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateSet {
    versions: Vec<VersionRecord>,
}

impl CandidateSet {
    /// Every version in `versions` strictly newer than `current`.
    pub fn newer_than(
        current: &VersionRecord,
        versions: impl IntoIterator<Item = VersionRecord>,
    ) -> Self {
        let mut newer: Vec<VersionRecord> = Vec::new();
        for version in versions {
            if version.is_newer_than(current) && !newer.iter().any(|v| v.id == version.id) {
                newer.push(version);
            }
        }
        newer.sort_by(|a, b| a.published_at.cmp(&b.published_at).then(a.id.cmp(&b.id)));
        Self { versions: newer }
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    /// Candidates, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &VersionRecord> {
        self.versions.iter()
    }

    /// Version names, oldest first.
    pub fn names(&self) -> Vec<&str> {
        self.versions.iter().map(|v| v.name.as_str()).collect()
    }

    /// First candidate with this name.
    pub fn get(&self, name: &str) -> Option<&VersionRecord> {
        self.versions.iter().find(|v| v.name == name)
    }

    pub fn by_id(&self, id: u64) -> Option<&VersionRecord> {
        self.versions.iter().find(|v| v.id == id)
    }

    /// The only candidate, if there is exactly one.
    pub fn single(&self) -> Option<&VersionRecord> {
        match self.versions.as_slice() {
            [only] => Some(only),
            _ => None,
        }
    }

    /// Display labels paired with their versions, oldest first.
    ///
    /// Labels are the version names; colliding names get a `(#id)` suffix
    /// so every label is unique.
    pub fn labeled(&self) -> Vec<(String, &VersionRecord)> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for v in &self.versions {
            *counts.entry(v.name.as_str()).or_default() += 1;
        }

        self.versions
            .iter()
            .map(|v| {
                let label = if counts[v.name.as_str()] > 1 {
                    format!("{} (#{})", v.name, v.id)
                } else {
                    v.name.clone()
                };
                (label, v)
            })
            .collect()
    }
}

/// Newer versions of one model, relative to the version found locally.
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub model_id: u64,
    pub model_name: String,
    /// The most recently published version present locally.
    pub current: VersionRecord,
    /// The local file that resolved to `current`.
    pub local_file: PathBuf,
    pub candidates: CandidateSet,
}

impl Update {
    pub fn current_version_name(&self) -> &str {
        &self.current.name
    }
}

/// Resolves local files to [`Update`]s through a [`CatalogGateway`].
pub struct UpdateResolver {
    catalog: Arc<dyn CatalogGateway>,
    algorithm: HashAlgorithm,
    cancel: CancellationToken,
    reporter: Arc<dyn Reporter>,
}

impl UpdateResolver {
    pub fn new(catalog: Arc<dyn CatalogGateway>, cancel: CancellationToken) -> Self {
        Self {
            catalog,
            algorithm: HashAlgorithm::default(),
            cancel,
            reporter: Arc::new(NoopReporter),
        }
    }

    /// Digest algorithm used for catalog lookups.
    pub fn with_algorithm(mut self, algorithm: HashAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Resolve a single file.
    ///
    /// Fails with `NotFound` when the catalog does not know the file. The
    /// returned update may have no candidates.
    pub async fn resolve_one(&self, file: &Path) -> Result<Update> {
        let current = self.lookup_local(file).await?;

        self.cancel.check()?;
        let model = self.catalog.lookup_model(current.model_id).await?;

        let candidates = CandidateSet::newer_than(&current, model.versions);
        Ok(Update {
            model_id: model.id,
            model_name: model.name,
            current,
            local_file: file.to_path_buf(),
            candidates,
        })
    }

    /// Resolve every model file under `dir`, one update per model that has
    /// at least one newer version.
    ///
    /// Files the catalog does not know are skipped with a notice; other
    /// per-file or per-model failures are reported and skipped. Only
    /// cancellation aborts the scan.
    pub async fn resolve_directory(&self, dir: &Path) -> Result<Vec<Update>> {
        self.reporter.on_event(UpdateEvent::ScanStarted {
            dir: dir.to_path_buf(),
        });

        let mut groups: BTreeMap<u64, Vec<(VersionRecord, PathBuf)>> = BTreeMap::new();

        for entry in WalkDir::new(dir).sort_by_file_name() {
            self.cancel.check()?;

            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry under {}: {}", dir.display(), e);
                    self.report_failure(
                        e.path().unwrap_or(dir).display().to_string(),
                        e.to_string(),
                    );
                    continue;
                }
            };
            if !entry.file_type().is_file() || !is_model_file(entry.path()) {
                continue;
            }

            let path = entry.path();
            match self.lookup_local(path).await {
                Ok(version) => {
                    debug!(
                        "{} is version {} ({}) of model {}",
                        path.display(),
                        version.name,
                        version.id,
                        version.model_id
                    );
                    groups
                        .entry(version.model_id)
                        .or_default()
                        .push((version, path.to_path_buf()));
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) if e.is_not_found() => {
                    warn!("Model information is not found for {}", path.display());
                    self.reporter.on_event(UpdateEvent::DigestNotFound {
                        path: path.to_path_buf(),
                    });
                }
                Err(e) => self.report_failure(path.display().to_string(), e.to_string()),
            }
        }

        let mut updates = Vec::new();
        for (model_id, locals) in groups {
            let Some((current, local_file)) = newest_local(locals) else {
                continue;
            };

            self.cancel.check()?;
            let model = match self.catalog.lookup_model(model_id).await {
                Ok(model) => model,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    self.report_failure(local_file.display().to_string(), e.to_string());
                    continue;
                }
            };

            let candidates = CandidateSet::newer_than(&current, model.versions);
            if candidates.is_empty() {
                debug!("{} is up to date at {}", model.name, current.name);
                continue;
            }

            updates.push(Update {
                model_id: model.id,
                model_name: model.name,
                current,
                local_file,
                candidates,
            });
        }

        Ok(updates)
    }

    async fn lookup_local(&self, path: &Path) -> Result<VersionRecord> {
        self.cancel.check()?;
        let digest = compute_file_digest(
            path,
            self.algorithm,
            self.cancel.clone(),
            self.reporter.clone(),
        )
        .await?;

        self.cancel.check()?;
        self.catalog
            .lookup_version_by_digest(&digest)
            .await
            .map_err(|e| match e {
                UpdaterError::NotFound { .. } => UpdaterError::NotFound {
                    subject: path.display().to_string(),
                },
                other => other,
            })
    }

    fn report_failure(&self, target: String, error: String) {
        self.reporter.on_event(UpdateEvent::Failed { target, error });
    }
}

/// The most recently published local version; the first one wins ties.
fn newest_local(locals: Vec<(VersionRecord, PathBuf)>) -> Option<(VersionRecord, PathBuf)> {
    let mut iter = locals.into_iter();
    let mut best = iter.next()?;
    for candidate in iter {
        if candidate.0.is_newer_than(&best.0) {
            best = candidate;
        }
    }
    Some(best)
}
