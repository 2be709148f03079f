/// Internal node representation produced by the crawler.
///
/// Nodes own their children directly: a folder's subtree is fully built
/// before it is handed to its parent, so there is never a partially linked
/// node visible to anyone but the crawler frame that owns it.
use chrono::{DateTime, Utc};
use compact_str::CompactString;

/// Path of the crawl root.
pub const ROOT_PATH: &str = "/";

/// A file or folder in the crawled tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Folder(FolderNode),
    File(FileNode),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FolderNode {
    pub id: String,
    pub name: CompactString,
    /// Root-relative logical path, `/` for the root.
    pub path: String,
    /// Direct files first (listing order), then resolved subfolders (listing order).
    pub children: Vec<Node>,
    /// Set when the folder could only be partially read.
    /// Internal only: never part of the formatted output.
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileNode {
    pub id: String,
    pub name: CompactString,
    pub path: String,
    pub mime_type: CompactString,
    /// Size in bytes, 0 when the provider does not report one.
    pub size: u64,
    pub modified_time: Option<DateTime<Utc>>,
}

impl FolderNode {
    pub fn new(id: &str, name: &str, path: String) -> Self {
        Self {
            id: id.to_string(),
            name: CompactString::new(name),
            path,
            children: Vec::new(),
            error: None,
        }
    }

    /// Number of `File` nodes anywhere below this folder.
    pub fn file_count(&self) -> u64 {
        self.children
            .iter()
            .map(|child| match child {
                Node::File(_) => 1,
                Node::Folder(folder) => folder.file_count(),
            })
            .sum()
    }
}

impl Node {
    pub fn name(&self) -> &str {
        match self {
            Node::Folder(f) => &f.name,
            Node::File(f) => &f.name,
        }
    }

    pub fn is_folder(&self) -> bool {
        matches!(self, Node::Folder(_))
    }
}

/// Join a child name onto a parent's logical path.
///
/// Children of the root get `/name`; everything else `parent/name`.
pub fn child_path(parent: &str, name: &str) -> String {
    if parent == ROOT_PATH || parent.is_empty() {
        format!("/{name}")
    } else {
        format!("{parent}/{name}")
    }
}
