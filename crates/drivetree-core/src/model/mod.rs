//! Data model for the crawled drive tree.
//!
//! [`node`] holds what the crawler builds; [`tree`] holds the externally
//! consumed projection and the queries browsing clients run against it.

pub mod node;
pub mod tree;

pub use node::{child_path, FileNode, FolderNode, Node, ROOT_PATH};
pub use tree::{format, format_folder, DownloadEntry, TreeNode};
