/// Run summary: aggregate statistics computed once a crawl has finished.
///
/// Pure aggregation over the crawl state and the finished tree: no network
/// calls, no mutation.
use crate::crawler::{CrawlState, RegisteredFolder};
use crate::model::{FolderNode, Node};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub elapsed: Duration,
    /// Every network request made, including failed and retried ones.
    pub api_calls: u64,
    /// Distinct folders the crawl started processing.
    pub folders_processed: u64,
    /// Deepest level reached, the root being 0.
    pub max_depth_reached: usize,
    /// File nodes in the final tree.
    pub total_files: u64,
    /// Sum of reported file sizes in bytes.
    pub total_bytes: u64,
    /// Folders whose subfolders were not descended because of the depth limit.
    pub truncated_folders: u64,
    /// Folders returned with incomplete contents, cancelled ones included.
    pub partial_folders: u64,
}

impl RunSummary {
    pub fn compute(state: &CrawlState, root: &FolderNode, elapsed: Duration) -> Self {
        let registry = state.registry().values();
        let count = |pred: fn(&RegisteredFolder) -> bool| {
            registry.clone().filter(|&folder| pred(folder)).count() as u64
        };
        Self {
            elapsed,
            api_calls: state.api_calls(),
            folders_processed: state.folders_visited() as u64,
            max_depth_reached: registry.clone().map(|folder| folder.depth).max().unwrap_or(0),
            total_files: root.file_count(),
            total_bytes: total_bytes(root),
            truncated_folders: count(|folder| folder.depth_limited),
            partial_folders: count(|folder| folder.partial),
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} folders, {} files ({}) in {:.1?} using {} API calls",
            format_count(self.folders_processed),
            format_count(self.total_files),
            format_size(self.total_bytes),
            self.elapsed,
            format_count(self.api_calls),
        )?;
        if self.partial_folders > 0 {
            write!(f, ", {} partial", self.partial_folders)?;
        }
        if self.truncated_folders > 0 {
            write!(f, ", {} at depth limit", self.truncated_folders)?;
        }
        Ok(())
    }
}

fn total_bytes(folder: &FolderNode) -> u64 {
    folder
        .children
        .iter()
        .map(|child| match child {
            Node::File(file) => file.size,
            Node::Folder(sub) => total_bytes(sub),
        })
        .sum()
}

/// Companion record persisted next to the tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildInfo {
    pub build_time: DateTime<Utc>,
    pub api_calls: u64,
    pub folders_processed: u64,
    pub total_files: u64,
    pub root_folder_id: String,
    pub root_folder_name: String,
}

/// Human-readable byte count using binary units.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];

    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    // Two decimals from GB upward, where one is too coarse.
    if unit >= 2 {
        format!("{value:.2} {}", UNITS[unit])
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

/// Count with thousands separators.
pub fn format_count(count: u64) -> String {
    let digits = count.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FileNode;
    use compact_str::CompactString;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(1_048_576), "1.0 MB");
        assert_eq!(format_size(1_073_741_824), "1.00 GB");
        assert_eq!(format_size(1_099_511_627_776), "1.00 TB");
    }

    #[test]
    fn test_format_count() {
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1_000), "1,000");
        assert_eq!(format_count(1_234_567), "1,234,567");
    }

    #[test]
    fn test_compute_counts_files_recursively() {
        let file = |name: &str, size| {
            Node::File(FileNode {
                id: name.to_string(),
                name: CompactString::new(name),
                path: format!("/{name}"),
                mime_type: CompactString::new("image/png"),
                size,
                modified_time: None,
            })
        };
        let mut sub = FolderNode::new("d", "Sub", "/Sub".into());
        sub.children.push(file("b.png", 300));
        let mut root = FolderNode::new("root", "root", "/".into());
        root.children.push(file("a.png", 200));
        root.children.push(Node::Folder(sub));

        let mut state = CrawlState::new();
        state.mark_visited("root");
        state.mark_visited("d");
        state.record_call();
        state.record_call();
        if let Node::Folder(sub) = &root.children[1] {
            state.register(sub, 1, false);
        }
        state.register(&root, 0, false);

        let summary = RunSummary::compute(&state, &root, Duration::from_millis(5));
        assert_eq!(summary.total_files, 2);
        assert_eq!(summary.total_bytes, 500);
        assert_eq!(summary.folders_processed, 2);
        assert_eq!(summary.max_depth_reached, 1);
        assert_eq!(summary.api_calls, 2);
        assert_eq!(summary.partial_folders, 0);
        assert_eq!(summary.truncated_folders, 0);
    }

    #[test]
    fn test_compute_reads_partial_and_truncated_from_registry() {
        let mut partial = FolderNode::new("p", "Partial", "/Partial".into());
        partial.error = Some("listing truncated: HTTP 500".into());
        let deep = FolderNode::new("q", "Deep", "/Deep".into());
        let root = FolderNode::new("root", "root", "/".into());

        let mut state = CrawlState::new();
        state.register(&partial, 1, false);
        state.register(&deep, 1, true);
        state.register(&root, 0, false);

        let summary = RunSummary::compute(&state, &root, Duration::ZERO);
        assert_eq!(summary.partial_folders, 1);
        assert_eq!(summary.truncated_folders, 1);
    }

    #[test]
    fn test_build_info_field_names() {
        let info = BuildInfo {
            build_time: DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
            api_calls: 12,
            folders_processed: 5,
            total_files: 6,
            root_folder_id: "root".into(),
            root_folder_name: "root".into(),
        };
        let json = serde_json::to_value(&info).unwrap();
        for key in [
            "buildTime",
            "apiCalls",
            "foldersProcessed",
            "totalFiles",
            "rootFolderId",
            "rootFolderName",
        ] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
    }
}
