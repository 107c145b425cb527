//! Verified downloads of catalog files.
//!
//! Provides:
//! - File selection within a version (format preference, then primary)
//! - Destination naming from `Content-Disposition`
//! - Streaming into a hidden temp file while hashing
//! - Digest verification before a no-clobber rename to the final name

use crate::cancel::CancellationToken;
use crate::catalog::{FileRecord, VersionRecord};
use crate::config::{FileFormat, HashAlgorithm, NetworkConfig};
use crate::error::{Result, UpdaterError};
use crate::events::{NoopReporter, Reporter, UpdateEvent};
use crate::hashing::{digests_match, DualDigester};
use crate::network::HttpClient;
use futures::StreamExt;
use reqwest::header;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Pick the file to download from `version`.
///
/// The first file whose declared format matches `format` wins; otherwise
/// the primary file. Fails with `FileNotFound` when neither exists.
pub fn select_file(version: &VersionRecord, format: FileFormat) -> Result<&FileRecord> {
    version
        .files
        .iter()
        .find(|f| f.matches_format(format))
        .or_else(|| version.files.iter().find(|f| f.primary))
        .ok_or_else(|| UpdaterError::FileNotFound {
            version: version.name.clone(),
        })
}

/// Extract the filename from a `Content-Disposition` header value.
///
/// `filename*=UTF-8''...` is preferred over `filename=`. Quoted values may
/// contain `;` and backslash escapes.
pub fn parse_content_disposition(value: &str) -> Option<String> {
    let mut plain = None;
    let mut extended = None;

    for param in split_params(value).into_iter().skip(1) {
        let Some((key, raw)) = param.split_once('=') else {
            continue;
        };
        let raw = param_value(raw);

        match key.trim().to_ascii_lowercase().as_str() {
            "filename*" => {
                // charset'language'percent-encoded
                let mut parts = raw.splitn(3, '\'');
                let charset = parts.next().unwrap_or_default();
                if let Some(encoded) = parts.nth(1) {
                    if charset.eq_ignore_ascii_case("utf-8") {
                        if let Ok(decoded) = urlencoding::decode(encoded) {
                            extended = Some(decoded.into_owned());
                        }
                    }
                }
            }
            "filename" => plain = Some(raw),
            _ => {}
        }
    }

    extended.or(plain)
}

/// Split header parameters on `;`, leaving separators inside quoted strings
/// alone.
fn split_params(value: &str) -> Vec<&str> {
    let mut params = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut escaped = false;

    for (i, c) in value.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            ';' if !in_quotes => {
                params.push(&value[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    params.push(&value[start..]);
    params
}

/// A parameter value: either a bare token or a quoted string whose
/// backslash escapes are resolved. Anything after the closing quote is
/// dropped.
fn param_value(raw: &str) -> String {
    let raw = raw.trim();
    let Some(quoted) = raw.strip_prefix('"') else {
        return raw.to_string();
    };

    let mut out = String::with_capacity(quoted.len());
    let mut chars = quoted.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            }
            '"' => break,
            _ => out.push(c),
        }
    }
    out
}

/// Reject names that would escape the destination directory.
pub fn validate_filename(name: &str) -> Result<()> {
    let invalid = name.trim().is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0', '"']);

    if invalid {
        return Err(UpdaterError::InvalidFilename {
            name: name.to_string(),
        });
    }
    Ok(())
}

/// Downloads version files and commits them only after verification.
pub struct Fetcher {
    http: Arc<HttpClient>,
    format: FileFormat,
    cancel: CancellationToken,
    reporter: Arc<dyn Reporter>,
    progress_interval: Duration,
}

impl Fetcher {
    pub fn new(http: Arc<HttpClient>, cancel: CancellationToken) -> Self {
        Self {
            http,
            format: FileFormat::default(),
            cancel,
            reporter: Arc::new(NoopReporter),
            progress_interval: NetworkConfig::DOWNLOAD_PROGRESS_INTERVAL,
        }
    }

    /// Preferred file format when a version offers several files.
    pub fn with_format(mut self, format: FileFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn format(&self) -> FileFormat {
        self.format
    }

    /// Download the selected file of `version` into `dest_dir`.
    ///
    /// Returns the path of the committed file.
    pub async fn fetch(&self, version: &VersionRecord, dest_dir: &Path) -> Result<PathBuf> {
        let file = select_file(version, self.format)?;
        debug!(
            "Selected {} ({:?}) from version {}",
            file.display_name(),
            file.format(),
            version.name
        );
        self.fetch_file(file, dest_dir).await
    }

    /// Download `file` into `dest_dir`, verifying every declared digest.
    pub async fn fetch_file(&self, file: &FileRecord, dest_dir: &Path) -> Result<PathBuf> {
        let expected: Vec<(HashAlgorithm, &str)> = [HashAlgorithm::Sha256, HashAlgorithm::Blake3]
            .into_iter()
            .filter_map(|alg| file.declared_digest(alg).map(|d| (alg, d)))
            .collect();
        if expected.is_empty() {
            return Err(UpdaterError::MissingDigest {
                file: file.display_name().to_string(),
            });
        }

        self.cancel.check()?;
        let url = file.download_url.as_str();
        let response = self.http.get_stream(url).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(UpdaterError::DownloadFailed {
                url: url.to_string(),
                status: Some(status.as_u16()),
                message: format!("Download failed with status {}", status),
            });
        }

        let file_name = response
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_disposition)
            .ok_or_else(|| UpdaterError::NoFilename {
                url: url.to_string(),
            })?;
        validate_filename(&file_name)?;

        let destination = dest_dir.join(&file_name);
        if destination.exists() {
            return Err(UpdaterError::AlreadyExists(destination));
        }

        let mut temp = tempfile::Builder::new()
            .prefix(&format!(".{}.", file_name))
            .suffix(NetworkConfig::DOWNLOAD_TEMP_SUFFIX)
            .tempfile_in(dest_dir)
            .map_err(|e| UpdaterError::io_with_path(e, dest_dir))?;

        let total_bytes = response.content_length();
        self.reporter.on_event(UpdateEvent::DownloadStarted {
            file_name: file_name.clone(),
            total_bytes,
        });

        let mut digester = DualDigester::new();
        let mut bytes_downloaded: u64 = 0;
        let mut last_progress_update = Instant::now();
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            self.cancel.check()?;

            let chunk = chunk.map_err(|e| UpdaterError::Network {
                message: format!("Error reading download stream: {}", e),
                cause: std::error::Error::source(&e).map(|s| s.to_string()),
            })?;

            temp.write_all(&chunk)
                .map_err(|e| UpdaterError::io_with_path(e, temp.path()))?;
            digester.update(&chunk);
            bytes_downloaded += chunk.len() as u64;

            if last_progress_update.elapsed() >= self.progress_interval {
                self.report_progress(&file_name, bytes_downloaded, total_bytes);
                last_progress_update = Instant::now();
            }
        }

        temp.flush()
            .map_err(|e| UpdaterError::io_with_path(e, temp.path()))?;
        self.report_progress(&file_name, bytes_downloaded, total_bytes);

        let actual = digester.finalize();
        for (algorithm, declared) in expected {
            if !digests_match(actual.get(algorithm), declared) {
                warn!(
                    "{} mismatch for {}: expected {}, got {}",
                    algorithm,
                    file_name,
                    declared,
                    actual.get(algorithm)
                );
                return Err(UpdaterError::HashMismatch {
                    file: file_name,
                    expected: declared.to_string(),
                    actual: actual.get(algorithm).to_string(),
                });
            }
        }

        temp.persist_noclobber(&destination).map_err(|e| {
            if e.error.kind() == std::io::ErrorKind::AlreadyExists {
                UpdaterError::AlreadyExists(destination.clone())
            } else {
                UpdaterError::io_with_path(e.error, &destination)
            }
        })?;

        info!(
            "Downloaded {} bytes to {}",
            bytes_downloaded,
            destination.display()
        );
        Ok(destination)
    }

    fn report_progress(&self, file_name: &str, bytes_downloaded: u64, total_bytes: Option<u64>) {
        self.reporter.on_event(UpdateEvent::DownloadProgress {
            file_name: file_name.to_string(),
            bytes_downloaded,
            total_bytes,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{FileHashes, FileMetadata};

    fn file(name: &str, format: Option<&str>, primary: bool) -> FileRecord {
        FileRecord {
            name: name.to_string(),
            download_url: format!("https://example.com/{}", name),
            primary,
            metadata: FileMetadata {
                format: format.map(String::from),
            },
            hashes: FileHashes::default(),
        }
    }

    fn version_with(files: Vec<FileRecord>) -> VersionRecord {
        VersionRecord {
            id: 1,
            model_id: 1,
            name: "v1".into(),
            published_at: None,
            files,
        }
    }

    #[test]
    fn test_select_prefers_format_over_primary() {
        let v = version_with(vec![
            file("a.ckpt", Some("PickleTensor"), true),
            file("a.safetensors", Some("SafeTensor"), false),
        ]);
        assert_eq!(
            select_file(&v, FileFormat::SafeTensor).unwrap().name,
            "a.safetensors"
        );
        assert_eq!(select_file(&v, FileFormat::Pickle).unwrap().name, "a.ckpt");
    }

    #[test]
    fn test_select_falls_back_to_primary() {
        let v = version_with(vec![
            file("a.zip", Some("Other"), false),
            file("a.ckpt", Some("PickleTensor"), true),
        ]);
        assert_eq!(
            select_file(&v, FileFormat::SafeTensor).unwrap().name,
            "a.ckpt"
        );
    }

    #[test]
    fn test_select_format_match_is_case_insensitive() {
        let v = version_with(vec![file("a.safetensors", Some("safetensor"), false)]);
        assert!(select_file(&v, FileFormat::SafeTensor).is_ok());
    }

    #[test]
    fn test_select_nothing_usable() {
        let v = version_with(vec![file("a.zip", Some("Other"), false)]);
        let err = select_file(&v, FileFormat::SafeTensor).unwrap_err();
        assert!(matches!(err, UpdaterError::FileNotFound { ref version } if version == "v1"));
        assert!(err.is_not_found());
    }

    #[test]
    fn test_content_disposition_plain() {
        assert_eq!(
            parse_content_disposition("attachment; filename=\"model.safetensors\""),
            Some("model.safetensors".to_string())
        );
        assert_eq!(
            parse_content_disposition("attachment;filename=model.ckpt"),
            Some("model.ckpt".to_string())
        );
    }

    #[test]
    fn test_content_disposition_prefers_extended() {
        let value = "attachment; filename=\"fallback.safetensors\"; filename*=UTF-8''caf%C3%A9%20v2.safetensors";
        assert_eq!(
            parse_content_disposition(value),
            Some("café v2.safetensors".to_string())
        );
    }

    #[test]
    fn test_content_disposition_quoted_separator() {
        assert_eq!(
            parse_content_disposition("attachment; filename=\"a;b.safetensors\""),
            Some("a;b.safetensors".to_string())
        );
        assert_eq!(
            parse_content_disposition("attachment; filename=\"x;y.pt\"; size=10"),
            Some("x;y.pt".to_string())
        );
    }

    #[test]
    fn test_content_disposition_escaped_quotes() {
        assert_eq!(
            parse_content_disposition(r#"attachment; filename="say \"hi\"; ok.pt""#),
            Some(r#"say "hi"; ok.pt"#.to_string())
        );
        assert_eq!(
            parse_content_disposition(r#"attachment; filename="back\\slash.pt""#),
            Some(r"back\slash.pt".to_string())
        );
    }

    #[test]
    fn test_content_disposition_without_filename() {
        assert_eq!(parse_content_disposition("attachment"), None);
        assert_eq!(parse_content_disposition("inline; size=10"), None);
    }

    #[test]
    fn test_validate_filename() {
        assert!(validate_filename("model.safetensors").is_ok());
        assert!(validate_filename("").is_err());
        assert!(validate_filename("..").is_err());
        assert!(validate_filename("../evil.pt").is_err());
        assert!(validate_filename("dir\\evil.pt").is_err());
        assert!(validate_filename("\"a").is_err());
    }
}
