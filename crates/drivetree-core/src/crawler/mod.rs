//! Crawler module: turns a paginated "list children" API into one nested tree.
//!
//! Entry points:
//! - [`crawl`] runs a crawl to completion on the calling thread.
//! - [`start_crawl`] runs it on a background thread and returns a
//!   [`CrawlHandle`] for progress, cancellation and the final result.
//!
//! A crawl either fails outright (root unreachable) or returns a
//! [`CrawlReport`] whose tree may contain partially read folders; the
//! reasons are listed in [`CrawlReport::issues`].

pub mod config;
pub mod folder;
mod paging;
pub mod progress;
pub mod state;

pub use config::{CrawlConfig, MAX_DEPTH};
pub use folder::{FolderOutcome, PartialReason};
pub use progress::CrawlProgress;
pub use state::{CrawlIssue, CrawlState, RegisteredFolder};

use crate::client::ListingClient;
use crate::error::CrawlError;
use crate::model::{format_folder, FolderNode, TreeNode, ROOT_PATH};
use crate::summary::{BuildInfo, RunSummary};
use chrono::{DateTime, Utc};
use crossbeam_channel::{Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tracing::info;

/// Maximum number of progress messages that may queue up in the channel.
///
/// The crawl thread never blocks on progress: when the channel is full,
/// further messages are dropped. The final result is always available
/// from [`CrawlHandle::join`].
pub const PROGRESS_CHANNEL_CAPACITY: usize = 1_024;

/// One crawl invocation: the client, its configuration, and run-scoped state.
pub struct Crawler<'a, C: ListingClient + ?Sized> {
    client: &'a C,
    config: &'a CrawlConfig,
    state: CrawlState,
    cancel_flag: Arc<AtomicBool>,
    progress_tx: Option<Sender<CrawlProgress>>,
}

impl<'a, C: ListingClient + ?Sized> Crawler<'a, C> {
    pub fn new(
        client: &'a C,
        config: &'a CrawlConfig,
        cancel_flag: Arc<AtomicBool>,
        progress_tx: Option<Sender<CrawlProgress>>,
    ) -> Self {
        Self {
            client,
            config,
            state: CrawlState::new(),
            cancel_flag,
            progress_tx,
        }
    }

    pub fn state(&self) -> &CrawlState {
        &self.state
    }

    fn is_cancelled(&self) -> bool {
        self.cancel_flag.load(Ordering::Relaxed)
    }

    fn send(&self, message: CrawlProgress) {
        if let Some(tx) = &self.progress_tx {
            let _ = tx.try_send(message);
        }
    }

    /// Crawl from the configured root and consume the crawler.
    pub fn run(mut self) -> Result<CrawlReport, CrawlError> {
        let start = Instant::now();
        let root_id = self.config.root_id.clone();
        info!("Starting crawl of {root_id}");

        let outcome = self.crawl_folder(&root_id, ROOT_PATH, 0)?;
        let cancelled = self.is_cancelled();
        // The root is the first folder visited, so it can only be missing
        // if the crawl was cancelled before it began.
        let root = match outcome {
            Some(outcome) => outcome.into_folder(),
            None => {
                let mut root = FolderNode::new(&root_id, &self.config.root_name, ROOT_PATH.into());
                root.error = Some(PartialReason::Cancelled.to_string());
                root
            }
        };

        let summary = RunSummary::compute(&self.state, &root, start.elapsed());
        info!(
            "Crawl of {root_id} {}: {}",
            if cancelled { "cancelled" } else { "complete" },
            summary
        );

        if cancelled {
            self.send(CrawlProgress::Cancelled);
        } else {
            self.send(CrawlProgress::Complete {
                summary: summary.clone(),
            });
        }

        Ok(CrawlReport {
            root_id,
            root_name: self.config.root_name.clone(),
            issues: self.state.take_issues(),
            root,
            summary,
            cancelled,
        })
    }
}

/// Everything a finished crawl produced.
#[derive(Debug, Clone)]
pub struct CrawlReport {
    pub root_id: String,
    pub root_name: String,
    /// Internal tree, including error annotations.
    pub root: FolderNode,
    pub summary: RunSummary,
    /// Every folder that was only partially read, in crawl order.
    pub issues: Vec<CrawlIssue>,
    /// `true` if the crawl stopped early on request.
    pub cancelled: bool,
}

impl CrawlReport {
    /// The externally consumed tree.
    pub fn tree(&self) -> TreeNode {
        format_folder(&self.root)
    }

    /// The persisted companion record for this crawl.
    pub fn build_info(&self, build_time: DateTime<Utc>) -> BuildInfo {
        BuildInfo {
            build_time,
            api_calls: self.summary.api_calls,
            folders_processed: self.summary.folders_processed,
            total_files: self.summary.total_files,
            root_folder_id: self.root_id.clone(),
            root_folder_name: self.root_name.clone(),
        }
    }
}

/// Run a full crawl on the calling thread.
pub fn crawl<C: ListingClient + ?Sized>(
    client: &C,
    config: &CrawlConfig,
) -> Result<CrawlReport, CrawlError> {
    Crawler::new(client, config, Arc::new(AtomicBool::new(false)), None).run()
}

/// Handle to a running or completed background crawl.
pub struct CrawlHandle {
    /// Receiver for progress updates from the crawl thread.
    pub progress_rx: Receiver<CrawlProgress>,
    cancel_flag: Arc<AtomicBool>,
    thread: thread::JoinHandle<Result<CrawlReport, CrawlError>>,
}

impl CrawlHandle {
    /// Request the crawl to stop as soon as possible.
    pub fn cancel(&self) {
        self.cancel_flag.store(true, Ordering::Relaxed);
    }

    /// Check whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancel_flag.load(Ordering::Relaxed)
    }

    /// Wait for the crawl thread and take its result.
    pub fn join(self) -> Result<CrawlReport, CrawlError> {
        self.thread.join().unwrap_or(Err(CrawlError::Aborted))
    }
}

/// Start a crawl on a background thread.
pub fn start_crawl<C>(client: C, config: CrawlConfig) -> CrawlHandle
where
    C: ListingClient + 'static,
{
    let (progress_tx, progress_rx) =
        crossbeam_channel::bounded::<CrawlProgress>(PROGRESS_CHANNEL_CAPACITY);
    let cancel_flag = Arc::new(AtomicBool::new(false));
    let cancel_clone = cancel_flag.clone();

    let thread = thread::Builder::new()
        .name("drivetree-crawler".into())
        .spawn(move || {
            Crawler::new(&client, &config, cancel_clone, Some(progress_tx)).run()
        })
        .expect("failed to spawn crawler thread");

    CrawlHandle {
        progress_rx,
        cancel_flag,
        thread,
    }
}
