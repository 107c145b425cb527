//! Shared fixtures for the integration tests: an in-memory catalog, a
//! scripted selector, a recording reporter and a local HTTP file server.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::{Path as UrlPath, State};
use axum::http::{header, StatusCode};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use chrono::{TimeZone, Utc};
use modelup_core::catalog::{FileHashes, FileMetadata};
use modelup_core::{
    CatalogGateway, FileRecord, ModelRecord, Reporter, Result, SelectionError, UpdateEvent,
    UpdaterError, VersionRecord, VersionSelector,
};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ---------------------------------------------------------------------------
// Digests and records
// ---------------------------------------------------------------------------

pub fn blake3_hex(content: &[u8]) -> String {
    blake3::hash(content).to_hex().to_string()
}

pub fn sha256_hex(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}

pub fn version(id: u64, model_id: u64, name: &str, published_secs: i64) -> VersionRecord {
    VersionRecord {
        id,
        model_id,
        name: name.to_string(),
        published_at: Some(Utc.timestamp_opt(published_secs, 0).unwrap()),
        files: vec![],
    }
}

/// A primary SafeTensor file served at `url` whose declared digests are
/// those of `content` (SHA256 uppercase, as Civitai reports it).
pub fn file_for(url: &str, content: &[u8]) -> FileRecord {
    FileRecord {
        name: url.rsplit('/').next().unwrap_or_default().to_string(),
        download_url: url.to_string(),
        primary: true,
        metadata: FileMetadata {
            format: Some("SafeTensor".to_string()),
        },
        hashes: FileHashes {
            sha256: Some(sha256_hex(content).to_uppercase()),
            blake3: Some(blake3_hex(content)),
        },
    }
}

pub fn write_file(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

/// Names of everything directly inside `dir`, sorted.
pub fn dir_entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

// ---------------------------------------------------------------------------
// Fake catalog
// ---------------------------------------------------------------------------

/// In-memory catalog keyed by BLAKE3 digest.
#[derive(Default)]
pub struct FakeCatalog {
    by_digest: HashMap<String, VersionRecord>,
    models: HashMap<u64, ModelRecord>,
    broken_digests: HashSet<String>,
    digest_lookups: AtomicUsize,
    model_lookups: AtomicUsize,
}

impl FakeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Files with this content resolve to `version`.
    pub fn with_local(mut self, content: &[u8], version: VersionRecord) -> Self {
        self.by_digest.insert(blake3_hex(content), version);
        self
    }

    /// Lookups for files with this content fail with a network error.
    pub fn with_broken(mut self, content: &[u8]) -> Self {
        self.broken_digests.insert(blake3_hex(content));
        self
    }

    pub fn with_model(mut self, id: u64, name: &str, versions: Vec<VersionRecord>) -> Self {
        self.models.insert(
            id,
            ModelRecord {
                id,
                name: name.to_string(),
                versions,
            },
        );
        self
    }

    pub fn digest_lookups(&self) -> usize {
        self.digest_lookups.load(Ordering::SeqCst)
    }

    pub fn model_lookups(&self) -> usize {
        self.model_lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CatalogGateway for FakeCatalog {
    async fn lookup_version_by_digest(&self, digest: &str) -> Result<VersionRecord> {
        self.digest_lookups.fetch_add(1, Ordering::SeqCst);
        let digest = digest.to_lowercase();
        if self.broken_digests.contains(&digest) {
            return Err(UpdaterError::Network {
                message: "connection reset".to_string(),
                cause: None,
            });
        }
        self.by_digest
            .get(&digest)
            .cloned()
            .ok_or(UpdaterError::NotFound { subject: digest })
    }

    async fn lookup_model(&self, model_id: u64) -> Result<ModelRecord> {
        self.model_lookups.fetch_add(1, Ordering::SeqCst);
        self.models
            .get(&model_id)
            .cloned()
            .ok_or_else(|| UpdaterError::NotFound {
                subject: format!("model {}", model_id),
            })
    }
}

// ---------------------------------------------------------------------------
// Scripted selector
// ---------------------------------------------------------------------------

/// One scripted answer, consumed in order.
#[derive(Debug, Clone)]
pub enum Answer {
    Yes,
    No,
    Pick(Vec<&'static str>),
    Interrupt,
    /// The terminal went away.
    Broken,
}

/// A prompt the selector was shown.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub message: String,
    pub options: Vec<String>,
}

#[derive(Default)]
pub struct ScriptedSelector {
    answers: Mutex<VecDeque<Answer>>,
    prompts: Mutex<Vec<Prompt>>,
}

impl ScriptedSelector {
    pub fn new(answers: Vec<Answer>) -> Self {
        Self {
            answers: Mutex::new(answers.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<Prompt> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.prompts().into_iter().map(|p| p.message).collect()
    }

    fn next(&self, message: &str, options: &[String]) -> Answer {
        self.prompts.lock().unwrap().push(Prompt {
            message: message.to_string(),
            options: options.to_vec(),
        });
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("unexpected prompt: {}", message))
    }
}

impl VersionSelector for ScriptedSelector {
    fn confirm(&self, message: &str) -> std::result::Result<bool, SelectionError> {
        match self.next(message, &[]) {
            Answer::Yes => Ok(true),
            Answer::No => Ok(false),
            Answer::Interrupt => Err(SelectionError::Interrupted),
            Answer::Broken => Err(not_connected()),
            other => panic!("confirm got {:?} for {}", other, message),
        }
    }

    fn choose_many(
        &self,
        message: &str,
        options: &[String],
    ) -> std::result::Result<Vec<String>, SelectionError> {
        match self.next(message, options) {
            Answer::Pick(picked) => Ok(picked.into_iter().map(String::from).collect()),
            Answer::Interrupt => Err(SelectionError::Interrupted),
            Answer::Broken => Err(not_connected()),
            other => panic!("choose_many got {:?} for {}", other, message),
        }
    }
}

fn not_connected() -> SelectionError {
    SelectionError::Io(std::io::Error::new(
        std::io::ErrorKind::NotConnected,
        "not a terminal",
    ))
}

// ---------------------------------------------------------------------------
// Recording reporter
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<UpdateEvent>>,
}

impl RecordingReporter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<UpdateEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&UpdateEvent) -> bool) -> usize {
        self.events.lock().unwrap().iter().filter(|e| pred(e)).count()
    }
}

impl Reporter for RecordingReporter {
    fn on_event(&self, event: UpdateEvent) {
        self.events.lock().unwrap().push(event);
    }
}

// ---------------------------------------------------------------------------
// Local HTTP server
// ---------------------------------------------------------------------------

/// A canned download response.
#[derive(Debug, Clone)]
pub struct Served {
    pub status: StatusCode,
    pub disposition: Option<String>,
    pub body: Vec<u8>,
}

impl Served {
    pub fn attachment(file_name: &str, body: &[u8]) -> Self {
        Self {
            status: StatusCode::OK,
            disposition: Some(format!("attachment; filename=\"{}\"", file_name)),
            body: body.to_vec(),
        }
    }

    pub fn without_filename(body: &[u8]) -> Self {
        Self {
            status: StatusCode::OK,
            disposition: None,
            body: body.to_vec(),
        }
    }

    pub fn status(status: StatusCode) -> Self {
        Self {
            status,
            disposition: None,
            body: Vec::new(),
        }
    }
}

/// Bind `app` on an ephemeral local port and return its base URL.
pub async fn spawn_server(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Serve `files` under `/download/{key}`. Returns the base URL.
pub async fn spawn_file_server(files: Vec<(&str, Served)>) -> String {
    let files: HashMap<String, Served> = files
        .into_iter()
        .map(|(key, served)| (key.to_string(), served))
        .collect();

    let app = Router::new()
        .route("/download/:key", get(serve_file))
        .with_state(Arc::new(files));
    spawn_server(app).await
}

async fn serve_file(
    State(files): State<Arc<HashMap<String, Served>>>,
    UrlPath(key): UrlPath<String>,
) -> Response {
    let Some(served) = files.get(&key) else {
        return Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Body::empty())
            .unwrap();
    };

    let mut builder = Response::builder().status(served.status);
    if let Some(disposition) = &served.disposition {
        builder = builder.header(header::CONTENT_DISPOSITION, disposition);
    }
    builder.body(Body::from(served.body.clone())).unwrap()
}
