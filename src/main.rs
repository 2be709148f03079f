//! drivetree: crawl a cloud drive into a nested JSON tree.
//!
//! Thin binary entry point. All logic lives in the `drivetree-core` crate.

use anyhow::{bail, Context};
use clap::Parser;
use drivetree_core::client::{DriveAuth, DriveClient, DriveClientConfig, MemoryDrive};
use drivetree_core::crawler::{CrawlProgress, MAX_DEPTH};
use drivetree_core::{output, start_crawl, CrawlConfig, CrawlReport, ListingClient};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "drivetree", version, about = "Crawl a cloud drive into a nested JSON tree")]
struct Args {
    /// Identifier of the folder to start from
    #[arg(long, env = "DRIVETREE_ROOT_ID", default_value = "root")]
    root_id: String,

    /// Display name recorded for the root folder
    #[arg(long, default_value = "root")]
    root_name: String,

    /// OAuth bearer token for the Drive API
    #[arg(long, env = "DRIVETREE_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// API key for the Drive API (public folders only)
    #[arg(long, env = "DRIVETREE_API_KEY", hide_env_values = true, conflicts_with = "token")]
    api_key: Option<String>,

    /// Crawl a JSON fixture instead of the remote API
    #[arg(long, conflicts_with_all = ["token", "api_key"])]
    fixture: Option<PathBuf>,

    /// Directory that receives tree.json, tree.min.json and build-info.json
    #[arg(short, long, default_value = ".")]
    out: PathBuf,

    /// Deepest folder level whose subfolders are still descended
    #[arg(long, default_value_t = MAX_DEPTH)]
    max_depth: usize,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout: u64,

    /// Print the folder a browsing client would open for this path
    #[arg(long)]
    lookup: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialise structured logging.
    tracing_subscriber::fmt()
        .with_max_level(if args.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .init();

    tracing::info!("drivetree starting");

    let config = CrawlConfig {
        root_id: args.root_id.clone(),
        root_name: args.root_name.clone(),
        max_depth: args.max_depth,
        ..CrawlConfig::default()
    };

    let client: Box<dyn ListingClient> = match (&args.fixture, &args.token, &args.api_key) {
        (Some(path), _, _) => {
            let drive = MemoryDrive::from_fixture_file(path)
                .with_context(|| format!("loading fixture {}", path.display()))?;
            Box::new(drive)
        }
        (None, Some(token), _) => Box::new(http_client(
            DriveAuth::Bearer(token.clone()),
            args.timeout,
        )?),
        (None, None, Some(key)) => Box::new(http_client(
            DriveAuth::ApiKey(key.clone()),
            args.timeout,
        )?),
        (None, None, None) => {
            bail!("no credentials: pass --token, --api-key or --fixture")
        }
    };

    let report = run(client, config)?;
    let tree = report.tree();

    for issue in &report.issues {
        tracing::warn!("Partial folder {}: {}", issue.path, issue.reason);
    }

    let build_info = report.build_info(chrono::Utc::now());
    let written = output::write_outputs(&args.out, &tree, &build_info)
        .with_context(|| format!("writing output to {}", args.out.display()))?;
    tracing::info!("Tree written to {}", written.tree.display());

    if let Some(path) = &args.lookup {
        if tree.find(path).is_none() {
            tracing::warn!("{path:?} not found, falling back to root");
        }
        let target = tree.resolve_or_root(path);
        println!(
            "{} ({} entries, {} files below)",
            target.path(),
            target.children().len(),
            target.file_count()
        );
    }

    if report.cancelled {
        bail!("crawl was cancelled; output is incomplete");
    }
    Ok(())
}

fn http_client(auth: DriveAuth, timeout_secs: u64) -> anyhow::Result<DriveClient> {
    let mut config = DriveClientConfig::new(auth);
    config.timeout = Duration::from_secs(timeout_secs);
    DriveClient::new(config).context("building HTTP client")
}

/// Run the crawl on a background thread, logging progress as it arrives.
fn run(client: Box<dyn ListingClient>, config: CrawlConfig) -> anyhow::Result<CrawlReport> {
    let handle = start_crawl(client, config);

    for message in handle.progress_rx.iter() {
        match message {
            CrawlProgress::FolderStarted { path, depth } => {
                tracing::debug!("[{depth}] {path}");
            }
            CrawlProgress::Update {
                api_calls,
                folders,
                files,
            } if folders % 50 == 0 => {
                tracing::info!("{folders} folders, {files} files, {api_calls} API calls so far");
            }
            CrawlProgress::Complete { summary } => {
                tracing::info!("Crawl complete: {summary}");
                break;
            }
            CrawlProgress::Cancelled => break,
            _ => {}
        }
    }

    handle.join().context("crawl failed")
}
