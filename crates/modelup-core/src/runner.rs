//! Runs an update pass over a list of targets.
//!
//! Per target: resolve, present candidates, fetch what was chosen, then
//! offer to remove the superseded file. Targets are handled one at a time.
//! A failure is reported against its target and the run moves on. Only
//! cancellation (Ctrl-C, or an interrupted prompt) or a prompt that cannot
//! be answered ends the run early.

use crate::cancel::CancellationToken;
use crate::catalog::VersionRecord;
use crate::error::{Result, UpdaterError};
use crate::events::{NoopReporter, Reporter, UpdateEvent};
use crate::fetcher::Fetcher;
use crate::resolver::{Update, UpdateResolver};
use crate::selector::VersionSelector;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Counters for a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Models with at least one newer version.
    pub updates_found: usize,
    /// Versions downloaded and verified.
    pub fetched: usize,
    /// Updates the user declined.
    pub skipped: usize,
    /// Targets, models or downloads that failed.
    pub failed: usize,
    /// Superseded local files deleted.
    pub removed: usize,
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} update(s) found, {} fetched, {} skipped, {} failed, {} removed",
            self.updates_found, self.fetched, self.skipped, self.failed, self.removed
        )
    }
}

/// Drives resolver, selector and fetcher over a set of targets.
pub struct Runner {
    resolver: UpdateResolver,
    fetcher: Fetcher,
    selector: Arc<dyn VersionSelector>,
    cancel: CancellationToken,
    reporter: Arc<dyn Reporter>,
}

impl Runner {
    pub fn new(
        resolver: UpdateResolver,
        fetcher: Fetcher,
        selector: Arc<dyn VersionSelector>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            resolver,
            fetcher,
            selector,
            cancel,
            reporter: Arc::new(NoopReporter),
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Process every target in order.
    ///
    /// A file target is checked on its own and updates land next to it. A
    /// directory target is scanned as a whole and updates land in that
    /// directory. Returns `UserCancelled`, `Cancelled` or `Prompt` if the
    /// run was aborted; every other failure is counted in the summary.
    pub async fn run(&self, targets: &[PathBuf]) -> Result<RunSummary> {
        let mut summary = RunSummary::default();

        for target in targets {
            self.cancel.check()?;

            let result = match std::fs::metadata(target) {
                Ok(meta) if meta.is_file() => self.update_file(target, &mut summary).await,
                Ok(meta) if meta.is_dir() => self.update_directory(target, &mut summary).await,
                Ok(_) => Err(UpdaterError::Config {
                    message: format!("{} is neither a file nor a directory", target.display()),
                }),
                Err(e) => Err(UpdaterError::io_with_path(e, target)),
            };

            match result {
                Ok(()) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => self.fail(&mut summary, display_name(target), &e),
            }
        }

        info!("Run finished: {}", summary);
        Ok(summary)
    }

    async fn update_file(&self, path: &Path, summary: &mut RunSummary) -> Result<()> {
        let update = match self.resolver.resolve_one(path).await {
            Ok(update) => update,
            Err(e) if matches!(e, UpdaterError::NotFound { .. }) => {
                warn!("Model information is not found for {}", path.display());
                self.reporter.on_event(UpdateEvent::DigestNotFound {
                    path: path.to_path_buf(),
                });
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let dest_dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        self.apply(update, dest_dir, summary).await
    }

    async fn update_directory(&self, dir: &Path, summary: &mut RunSummary) -> Result<()> {
        let updates = self.resolver.resolve_directory(dir).await?;
        debug!("{} model(s) under {} have updates", updates.len(), dir.display());

        for update in updates {
            self.cancel.check()?;

            let model = update.model_name.clone();
            match self.apply(update, dir, summary).await {
                Ok(()) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => self.fail(summary, model, &e),
            }
        }
        Ok(())
    }

    /// Present one update, fetch what the user picks, and offer removal.
    async fn apply(&self, update: Update, dest_dir: &Path, summary: &mut RunSummary) -> Result<()> {
        if update.candidates.is_empty() {
            self.reporter.on_event(UpdateEvent::NoUpdate {
                model: update.model_name.clone(),
            });
            return Ok(());
        }

        summary.updates_found += 1;
        self.reporter.on_event(UpdateEvent::UpdateAvailable {
            model: update.model_name.clone(),
            current: update.current_version_name().to_string(),
            candidates: update.candidates.len(),
        });

        let chosen: Vec<&VersionRecord> = match update.candidates.single() {
            Some(version) => {
                let message = format!(
                    "Do you want to update {} \u{279c} {}",
                    update.current_version_name(),
                    version.name
                );
                if self.selector.confirm(&message)? {
                    vec![version]
                } else {
                    vec![]
                }
            }
            None => {
                let labeled = update.candidates.labeled();
                let options: Vec<String> = labeled.iter().map(|(label, _)| label.clone()).collect();
                let message = format!(
                    "Which versions do you want to download (current: {})",
                    update.current_version_name()
                );

                let selected = self.selector.choose_many(&message, &options)?;
                selected
                    .iter()
                    .filter_map(|choice| {
                        let found = labeled.iter().find(|(label, _)| label == choice);
                        if found.is_none() {
                            warn!("Ignoring unknown selection {:?}", choice);
                        }
                        found.map(|(_, version)| *version)
                    })
                    .collect()
            }
        };

        if chosen.is_empty() {
            summary.skipped += 1;
            self.reporter.on_event(UpdateEvent::Skipped {
                model: update.model_name.clone(),
                candidates: update.candidates.len(),
            });
            return Ok(());
        }

        let mut any_fetched = false;
        for version in chosen {
            self.cancel.check()?;
            any_fetched |= self.fetch_one(&update, version, dest_dir, summary).await?;
        }

        if any_fetched {
            self.offer_removal(&update.local_file, summary).await?;
        }
        Ok(())
    }

    /// Fetch one chosen version. Non-fatal failures are reported and yield
    /// `Ok(false)` so the remaining choices still run.
    async fn fetch_one(
        &self,
        update: &Update,
        version: &VersionRecord,
        dest_dir: &Path,
        summary: &mut RunSummary,
    ) -> Result<bool> {
        match self.fetcher.fetch(version, dest_dir).await {
            Ok(path) => {
                summary.fetched += 1;
                self.reporter.on_event(UpdateEvent::Fetched {
                    model: update.model_name.clone(),
                    version: version.name.clone(),
                    path,
                });
                Ok(true)
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                self.fail(
                    summary,
                    format!("{} {}", update.model_name, version.name),
                    &e,
                );
                Ok(false)
            }
        }
    }

    async fn offer_removal(&self, old: &Path, summary: &mut RunSummary) -> Result<()> {
        let message = format!(
            "Do you want to remove the old version: {}",
            display_name(old)
        );
        if !self.selector.confirm(&message)? {
            return Ok(());
        }

        tokio::fs::remove_file(old)
            .await
            .map_err(|e| UpdaterError::io_with_path(e, old))?;

        info!("Removed {}", old.display());
        summary.removed += 1;
        self.reporter.on_event(UpdateEvent::Removed {
            path: old.to_path_buf(),
        });
        Ok(())
    }

    fn fail(&self, summary: &mut RunSummary, target: String, error: &UpdaterError) {
        warn!("Failed to update {}: {}", target, error);
        summary.failed += 1;
        self.reporter.on_event(UpdateEvent::Failed {
            target,
            error: error.to_string(),
        });
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
