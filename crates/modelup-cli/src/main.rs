//! modelup - checks local model files for newer Civitai versions.
//!
//! Each target is either a model file or a directory to scan. Without
//! targets, the usual Stable Diffusion WebUI model folders under the current
//! directory are checked.

mod progress;
mod prompt;

use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use modelup_core::config::{CatalogConfig, ScanConfig};
use modelup_core::{
    CancellationToken, CivitaiClient, Fetcher, FileFormat, HashAlgorithm, HttpClient, Runner,
    UpdateResolver,
};
use progress::TerminalReporter;
use prompt::DialoguerSelector;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "modelup", version)]
#[command(about = "Find and download newer versions of local Civitai models")]
struct Args {
    /// Model files or directories to check
    targets: Vec<PathBuf>,

    /// Preferred file format when a version ships several files
    #[arg(long, default_value = "safetensor", value_parser = ["safetensor", "pickle"])]
    format: String,

    /// Digest used to look up local files
    #[arg(long, default_value = "blake3", value_parser = ["blake3", "sha256"])]
    hash: String,

    /// Civitai API token
    #[arg(long, env = "CIVITAI_API_TOKEN", hide_env_values = true)]
    api_token: Option<String>,

    /// Catalog API base URL
    #[arg(long, default_value = CatalogConfig::DEFAULT_BASE_URL)]
    catalog_url: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.debug);

    let format = FileFormat::from_str(&args.format)?;
    let algorithm = HashAlgorithm::from_str(&args.hash)?;

    let targets = if args.targets.is_empty() {
        let cwd = std::env::current_dir().context("Failed to read current directory")?;
        let found = existing_default_targets(&cwd);
        if found.is_empty() {
            println!(
                "{}",
                style(format!("No model folders found under {}", cwd.display())).yellow()
            );
            return Ok(());
        }
        found
    } else {
        args.targets.clone()
    };
    debug!("Targets: {:?}", targets);

    let cancel = CancellationToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        if handler_token.is_cancelled() {
            std::process::exit(130);
        }
        handler_token.cancel();
    })
    .context("Failed to install Ctrl-C handler")?;

    let http = Arc::new(HttpClient::new()?.with_api_token(args.api_token.clone()));
    let catalog = Arc::new(CivitaiClient::with_base_url(
        http.clone(),
        args.catalog_url.as_str(),
        cancel.clone(),
    ));
    let reporter = Arc::new(TerminalReporter::new());

    let resolver = UpdateResolver::new(catalog, cancel.clone())
        .with_algorithm(algorithm)
        .with_reporter(reporter.clone());
    let fetcher = Fetcher::new(http, cancel.clone())
        .with_format(format)
        .with_reporter(reporter.clone());
    let runner = Runner::new(
        resolver,
        fetcher,
        Arc::new(DialoguerSelector::new()),
        cancel,
    )
    .with_reporter(reporter);

    info!(
        "Checking {} target(s) against {} (format {}, {} lookup)",
        targets.len(),
        args.catalog_url,
        format,
        algorithm
    );

    let summary = runner
        .run(&targets)
        .await
        .context("Failed to check for updates")?;

    println!();
    println!("{}", style(summary).bold());
    Ok(())
}

fn init_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

/// The default scan folders under `root` that exist.
fn existing_default_targets(root: &Path) -> Vec<PathBuf> {
    ScanConfig::default_targets(root)
        .into_iter()
        .filter(|p| p.is_dir())
        .collect()
}
