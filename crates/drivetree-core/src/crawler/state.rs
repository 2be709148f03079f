/// Run-scoped crawl bookkeeping.
///
/// A `CrawlState` is created at the start of one crawl and dropped with it.
/// The traversal is strictly sequential, so plain collections are enough:
/// nothing else observes the state while a crawl is running.
use super::folder::PartialReason;
use crate::model::{FolderNode, Node};
use std::collections::{HashMap, HashSet};

/// What the registry keeps for each completed folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredFolder {
    pub name: String,
    pub path: String,
    pub depth: usize,
    pub direct_files: usize,
    pub direct_folders: usize,
    /// Read incompletely, for any reason including cancellation.
    pub partial: bool,
    /// Had subfolders that were not descended because of the depth limit.
    pub depth_limited: bool,
}

/// A folder that could only be partially read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlIssue {
    pub folder_id: String,
    pub path: String,
    pub reason: PartialReason,
}

#[derive(Debug, Default)]
pub struct CrawlState {
    visited: HashSet<String>,
    api_calls: u64,
    registry: HashMap<String, RegisteredFolder>,
    issues: Vec<CrawlIssue>,
    files_seen: u64,
}

impl CrawlState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_visited(&self, id: &str) -> bool {
        self.visited.contains(id)
    }

    /// Mark `id` visited. Returns `false` if it already was.
    pub fn mark_visited(&mut self, id: &str) -> bool {
        self.visited.insert(id.to_string())
    }

    /// Count one network call, successful or not.
    pub fn record_call(&mut self) {
        self.api_calls += 1;
    }

    pub fn record_files(&mut self, count: usize) {
        self.files_seen += count as u64;
    }

    pub fn record_issue(&mut self, issue: CrawlIssue) {
        self.issues.push(issue);
    }

    /// Record a finished folder for statistics.
    pub fn register(&mut self, folder: &FolderNode, depth: usize, depth_limited: bool) {
        let direct_folders = folder.children.iter().filter(|c| c.is_folder()).count();
        let direct_files = folder
            .children
            .iter()
            .filter(|c| matches!(c, Node::File(_)))
            .count();
        self.registry.insert(
            folder.id.clone(),
            RegisteredFolder {
                name: folder.name.to_string(),
                path: folder.path.clone(),
                depth,
                direct_files,
                direct_folders,
                partial: folder.error.is_some(),
                depth_limited,
            },
        );
    }

    pub fn api_calls(&self) -> u64 {
        self.api_calls
    }

    pub fn folders_visited(&self) -> usize {
        self.visited.len()
    }

    pub fn files_seen(&self) -> u64 {
        self.files_seen
    }

    pub fn registry(&self) -> &HashMap<String, RegisteredFolder> {
        &self.registry
    }

    pub fn issues(&self) -> &[CrawlIssue] {
        &self.issues
    }

    pub(crate) fn take_issues(&mut self) -> Vec<CrawlIssue> {
        std::mem::take(&mut self.issues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_visited_is_idempotent() {
        let mut state = CrawlState::new();
        assert!(state.mark_visited("a"));
        assert!(!state.mark_visited("a"));
        assert!(state.is_visited("a"));
        assert_eq!(state.folders_visited(), 1);
    }

    #[test]
    fn test_register_counts_direct_children() {
        let mut folder = FolderNode::new("d", "Archive", "/Archive".into());
        folder
            .children
            .push(Node::Folder(FolderNode::new("e", "Old", "/Archive/Old".into())));
        folder.error = Some("listing truncated".into());

        let mut state = CrawlState::new();
        state.register(&folder, 1, true);
        let entry = &state.registry()["d"];
        assert_eq!(entry.direct_folders, 1);
        assert_eq!(entry.direct_files, 0);
        assert_eq!(entry.depth, 1);
        assert!(entry.partial);
        assert!(entry.depth_limited);
    }
}
