/// The recursive folder crawler.
///
/// Depth-first and strictly sequential: one request in flight at a time,
/// siblings in listing order. Each call returns a fully built subtree, so
/// a parent only ever holds completed children.
use super::paging::Listing;
use super::progress::CrawlProgress;
use super::state::CrawlIssue;
use super::Crawler;
use crate::client::{ListingClient, RawItem};
use crate::error::CrawlError;
use crate::model::{child_path, FileNode, FolderNode, Node};
use compact_str::CompactString;
use thiserror::Error;
use tracing::{debug, warn};

/// Why a folder came back incomplete.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PartialReason {
    #[error("metadata unavailable: {0}")]
    MetadataUnavailable(String),

    #[error("listing truncated: {0}")]
    ListingTruncated(String),

    #[error("rate limit retries exhausted")]
    RateLimitExhausted,

    #[error("crawl cancelled")]
    Cancelled,
}

/// Result of crawling one folder that was not skipped.
#[derive(Debug, Clone, PartialEq)]
pub enum FolderOutcome {
    Complete(FolderNode),
    Partial(FolderNode, PartialReason),
}

impl FolderOutcome {
    pub fn into_folder(self) -> FolderNode {
        match self {
            FolderOutcome::Complete(folder) | FolderOutcome::Partial(folder, _) => folder,
        }
    }
}

impl<C: ListingClient + ?Sized> Crawler<'_, C> {
    /// Crawl folder `id` located at logical `path`, `depth` levels below the root.
    ///
    /// Returns `Ok(None)` when the folder must be omitted from its parent:
    /// it was already visited in this crawl, or the crawl was cancelled
    /// before it started.
    pub fn crawl_folder(
        &mut self,
        id: &str,
        path: &str,
        depth: usize,
    ) -> Result<Option<FolderOutcome>, CrawlError> {
        if self.is_cancelled() {
            return Ok(None);
        }
        if !self.state.mark_visited(id) {
            debug!("Skipping already visited folder {id} at {path}");
            return Ok(None);
        }

        debug!("Crawling {path} (depth {depth})");
        self.send(CrawlProgress::FolderStarted {
            path: path.to_string(),
            depth,
        });

        let is_root = depth == 0;
        let name = if is_root {
            self.config.root_name.clone()
        } else {
            self.state.record_call();
            match self.client.get_metadata(id) {
                Ok(meta) => meta.name,
                Err(err) => {
                    warn!("Metadata for folder {id} at {path} unavailable: {err}");
                    let reason = PartialReason::MetadataUnavailable(err.to_string());
                    let mut folder =
                        FolderNode::new(id, &format!("[error: {err}]"), path.to_string());
                    folder.error = Some(reason.to_string());
                    return Ok(Some(self.finish(folder, depth, false, Some(reason))));
                }
            }
        };

        let mut folder = FolderNode::new(id, &name, path.to_string());
        let Listing { items, partial } = self.list_all_items(id, is_root)?;
        let mut reason = partial;

        let (subfolders, files): (Vec<RawItem>, Vec<RawItem>) =
            items.into_iter().partition(RawItem::is_folder);

        self.state.record_files(files.len());
        folder
            .children
            .extend(files.into_iter().map(|item| file_node(item, path)));

        let depth_limited = depth >= self.config.max_depth && !subfolders.is_empty();
        if depth < self.config.max_depth {
            for sub in &subfolders {
                if self.is_cancelled() {
                    break;
                }
                let sub_path = child_path(path, &sub.name);
                if let Some(outcome) = self.crawl_folder(&sub.id, &sub_path, depth + 1)? {
                    folder.children.push(Node::Folder(outcome.into_folder()));
                }
            }
        } else if depth_limited {
            warn!(
                "Depth limit {} reached at {path}; {} subfolders not descended",
                self.config.max_depth,
                subfolders.len()
            );
        }

        if self.is_cancelled() && reason.is_none() {
            reason = Some(PartialReason::Cancelled);
        }
        if let Some(r) = &reason {
            folder.error = Some(r.to_string());
        }

        Ok(Some(self.finish(folder, depth, depth_limited, reason)))
    }

    /// Register a completed folder, report it, and wrap it in its outcome.
    fn finish(
        &mut self,
        folder: FolderNode,
        depth: usize,
        depth_limited: bool,
        reason: Option<PartialReason>,
    ) -> FolderOutcome {
        self.state.register(&folder, depth, depth_limited);
        self.send(CrawlProgress::Update {
            api_calls: self.state.api_calls(),
            folders: self.state.folders_visited(),
            files: self.state.files_seen(),
        });

        match reason {
            None => FolderOutcome::Complete(folder),
            Some(reason) => {
                if reason != PartialReason::Cancelled {
                    self.state.record_issue(CrawlIssue {
                        folder_id: folder.id.clone(),
                        path: folder.path.clone(),
                        reason: reason.clone(),
                    });
                    self.send(CrawlProgress::Issue {
                        path: folder.path.clone(),
                        reason: reason.clone(),
                    });
                }
                FolderOutcome::Partial(folder, reason)
            }
        }
    }
}

fn file_node(item: RawItem, parent_path: &str) -> Node {
    Node::File(FileNode {
        path: child_path(parent_path, &item.name),
        name: CompactString::new(&item.name),
        id: item.id,
        mime_type: CompactString::new(&item.mime_type),
        size: item.size.unwrap_or(0),
        modified_time: item.modified_time,
    })
}
