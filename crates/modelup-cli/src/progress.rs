//! Terminal rendering of run events.

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use modelup_core::{Reporter, UpdateEvent};
use std::path::Path;
use std::sync::Mutex;

const BYTES_TEMPLATE: &str =
    "{spinner:.green} {prefix} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})";
const SPINNER_TEMPLATE: &str = "{spinner:.green} {prefix} {bytes} ({bytes_per_sec})";

/// Renders run events as progress bars and coloured notices.
///
/// At most one bar is live at a time since hashing and downloading never
/// overlap.
pub struct TerminalReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl TerminalReporter {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    fn start_bar(&self, prefix: String, total: Option<u64>) {
        let pb = match total {
            Some(len) => {
                let pb = ProgressBar::new(len);
                pb.set_style(bar_style(BYTES_TEMPLATE).progress_chars("#>-"));
                pb
            }
            None => {
                let pb = ProgressBar::new_spinner();
                pb.set_style(bar_style(SPINNER_TEMPLATE));
                pb
            }
        };
        pb.set_prefix(prefix);

        if let Ok(mut slot) = self.bar.lock() {
            if let Some(old) = slot.replace(pb) {
                old.finish_and_clear();
            }
        }
    }

    fn set_position(&self, pos: u64) {
        if let Ok(slot) = self.bar.lock() {
            if let Some(pb) = slot.as_ref() {
                pb.set_position(pos);
            }
        }
    }

    fn clear_bar(&self) {
        if let Ok(mut slot) = self.bar.lock() {
            if let Some(pb) = slot.take() {
                pb.finish_and_clear();
            }
        }
    }

    fn notice(&self, line: String) {
        self.clear_bar();
        println!("{}", line);
    }
}

impl Reporter for TerminalReporter {
    fn on_event(&self, event: UpdateEvent) {
        match event {
            UpdateEvent::ScanStarted { dir } => {
                self.notice(format!("\u{279c} {}", dir.display()));
            }
            UpdateEvent::HashStarted { path, total_bytes } => {
                self.start_bar(file_name(&path), Some(total_bytes));
            }
            UpdateEvent::HashProgress {
                bytes_processed, ..
            } => self.set_position(bytes_processed),
            UpdateEvent::HashFinished { .. } => self.clear_bar(),
            UpdateEvent::DigestNotFound { path } => self.notice(
                style(format!(
                    "Model information is not found: {}",
                    file_name(&path)
                ))
                .yellow()
                .to_string(),
            ),
            UpdateEvent::NoUpdate { model } => {
                self.notice(format!("{} has no updates", model));
            }
            UpdateEvent::UpdateAvailable {
                model, candidates, ..
            } => {
                let line = if candidates == 1 {
                    format!("{} has a newer version", model)
                } else {
                    format!("{} has multiple newer versions", model)
                };
                self.notice(style(line).green().to_string());
            }
            UpdateEvent::Skipped { candidates, .. } => {
                self.notice(style(skipped_message(candidates)).yellow().to_string());
            }
            UpdateEvent::DownloadStarted {
                file_name,
                total_bytes,
            } => self.start_bar(file_name, total_bytes),
            UpdateEvent::DownloadProgress {
                bytes_downloaded, ..
            } => self.set_position(bytes_downloaded),
            UpdateEvent::Fetched {
                model,
                version,
                path,
            } => self.notice(
                style(format!(
                    "Downloaded {} {} to {}",
                    model,
                    version,
                    path.display()
                ))
                .green()
                .to_string(),
            ),
            UpdateEvent::Removed { path } => {
                self.notice(format!("Removed {}", path.display()));
            }
            UpdateEvent::Failed { target, error } => self.notice(
                style(format!("Failed to update {}: {}", target, error))
                    .red()
                    .to_string(),
            ),
        }
    }
}

fn skipped_message(candidates: usize) -> &'static str {
    if candidates == 1 {
        "Skipped downloading the newer model"
    } else {
        "Skipped downloading any models"
    }
}

fn bar_style(template: &str) -> ProgressStyle {
    ProgressStyle::with_template(template).unwrap_or_else(|_| ProgressStyle::default_bar())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
