/// External tree shape: what gets serialised and consumed by browsing clients.
///
/// [`format`] is a pure projection of the crawler's [`Node`] tree: internal
/// fields are dropped, empty `children` arrays and absent file attributes are
/// omitted, and ordering is preserved exactly.
use super::node::{FileNode, FolderNode, Node};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TreeNode {
    Folder {
        id: String,
        name: String,
        path: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        children: Vec<TreeNode>,
    },
    File {
        id: String,
        name: String,
        path: String,
        #[serde(
            rename = "mimeType",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        mime_type: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        size: Option<u64>,
        #[serde(
            rename = "modifiedTime",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        modified_time: Option<DateTime<Utc>>,
    },
}

/// Project an internal node into its external shape.
pub fn format(node: &Node) -> TreeNode {
    match node {
        Node::Folder(folder) => format_folder(folder),
        Node::File(file) => format_file(file),
    }
}

/// Project a folder and its whole subtree.
pub fn format_folder(folder: &FolderNode) -> TreeNode {
    TreeNode::Folder {
        id: folder.id.clone(),
        name: folder.name.to_string(),
        path: folder.path.clone(),
        children: folder.children.iter().map(format).collect(),
    }
}

fn format_file(file: &FileNode) -> TreeNode {
    TreeNode::File {
        id: file.id.clone(),
        name: file.name.to_string(),
        path: file.path.clone(),
        mime_type: (!file.mime_type.is_empty()).then(|| file.mime_type.to_string()),
        size: (file.size > 0).then_some(file.size),
        modified_time: file.modified_time,
    }
}

/// The subset of a file entry a download sequencer needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadEntry<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub mime_type: Option<&'a str>,
    pub size: Option<u64>,
}

impl TreeNode {
    pub fn name(&self) -> &str {
        match self {
            TreeNode::Folder { name, .. } | TreeNode::File { name, .. } => name,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            TreeNode::Folder { id, .. } | TreeNode::File { id, .. } => id,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            TreeNode::Folder { path, .. } | TreeNode::File { path, .. } => path,
        }
    }

    pub fn is_folder(&self) -> bool {
        matches!(self, TreeNode::Folder { .. })
    }

    /// Direct children; always empty for files.
    pub fn children(&self) -> &[TreeNode] {
        match self {
            TreeNode::Folder { children, .. } => children,
            TreeNode::File { .. } => &[],
        }
    }

    /// Resolve a `/`-separated folder path relative to this node.
    ///
    /// Segments match folder names exactly (case-sensitive); empty segments
    /// are ignored, so `""`, `"/"` and `"//"` all resolve to `self`.
    pub fn find(&self, path: &str) -> Option<&TreeNode> {
        let mut current = self;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            current = current
                .children()
                .iter()
                .find(|child| child.is_folder() && child.name() == segment)?;
        }
        Some(current)
    }

    /// Like [`TreeNode::find`], falling back to `self` when the path does not resolve.
    pub fn resolve_or_root(&self, path: &str) -> &TreeNode {
        self.find(path).unwrap_or(self)
    }

    /// Depth-first iterator over every file entry, in tree order.
    pub fn files(&self) -> Files<'_> {
        Files { stack: vec![self] }
    }

    /// Recursive number of file entries.
    pub fn file_count(&self) -> u64 {
        self.files().count() as u64
    }
}

/// Iterator returned by [`TreeNode::files`].
pub struct Files<'a> {
    stack: Vec<&'a TreeNode>,
}

impl<'a> Iterator for Files<'a> {
    type Item = DownloadEntry<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(node) = self.stack.pop() {
            match node {
                TreeNode::Folder { children, .. } => {
                    self.stack.extend(children.iter().rev());
                }
                TreeNode::File {
                    id,
                    name,
                    mime_type,
                    size,
                    ..
                } => {
                    return Some(DownloadEntry {
                        id,
                        name,
                        mime_type: mime_type.as_deref(),
                        size: *size,
                    });
                }
            }
        }
        None
    }
}
