/// Crawl progress reporting: lightweight messages sent from the crawl
/// thread to whoever holds the [`super::CrawlHandle`].
use super::folder::PartialReason;
use crate::summary::RunSummary;

/// Progress updates sent from the crawl thread.
///
/// The tree itself is only available from [`super::CrawlHandle::join`];
/// these messages carry counters and status only.
#[derive(Debug, Clone)]
pub enum CrawlProgress {
    /// A folder is about to be listed.
    FolderStarted { path: String, depth: usize },
    /// Running totals, sent after each folder completes.
    Update {
        api_calls: u64,
        folders: usize,
        files: u64,
    },
    /// A folder was only partially read.
    Issue { path: String, reason: PartialReason },
    /// The crawl finished and the summary is final.
    Complete { summary: RunSummary },
    /// The crawl stopped early on request.
    Cancelled,
}
