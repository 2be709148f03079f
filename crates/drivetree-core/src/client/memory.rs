/// In-memory drive used for offline crawls and tests.
///
/// A `MemoryDrive` is a flat table of items keyed by id plus an ordered
/// child list per folder. Listings are served in insertion order and split
/// into pages of `page_size` items; page tokens are the stringified offset.
///
/// Failures can be scripted per folder and per page, which is how the
/// crawler's retry and truncation paths are exercised without a network.
use super::{ItemMetadata, ListPage, ListingClient, RawItem, FOLDER_MIME_TYPE};
use crate::error::{FixtureError, ListingError, MetadataError};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Deserialize;
use std::collections::{HashMap, VecDeque};
use std::path::Path;

/// Scripted failures, consumed in order as matching calls arrive.
#[derive(Debug, Default)]
pub struct FailureScript {
    /// `(folder_id, page_index)` → errors returned by successive calls for that page.
    pub listing: HashMap<(String, usize), VecDeque<ListingError>>,
    /// `item_id` → error returned by every metadata call for it.
    pub metadata: HashMap<String, MetadataError>,
}

#[derive(Debug, Clone)]
struct Entry {
    item: RawItem,
    /// Child ids in listing order. Empty for files.
    children: Vec<String>,
}

/// An in-memory remote drive.
#[derive(Debug)]
pub struct MemoryDrive {
    root_id: String,
    entries: HashMap<String, Entry>,
    page_size: usize,
    failures: Mutex<FailureScript>,
}

impl MemoryDrive {
    /// Create an empty drive whose root folder has the given id.
    pub fn new(root_id: &str) -> Self {
        let root = RawItem {
            id: root_id.to_string(),
            name: root_id.to_string(),
            mime_type: FOLDER_MIME_TYPE.to_string(),
            size: None,
            modified_time: None,
        };
        let mut entries = HashMap::new();
        entries.insert(
            root_id.to_string(),
            Entry {
                item: root,
                children: Vec::new(),
            },
        );
        Self {
            root_id: root_id.to_string(),
            entries,
            page_size: 100,
            failures: Mutex::new(FailureScript::default()),
        }
    }

    pub fn root_id(&self) -> &str {
        &self.root_id
    }

    /// Set the number of items served per listing page (minimum 1).
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Add a folder under `parent`. Returns `&mut self` for chaining.
    pub fn add_folder(&mut self, parent: &str, id: &str, name: &str) -> &mut Self {
        self.insert(
            parent,
            RawItem {
                id: id.to_string(),
                name: name.to_string(),
                mime_type: FOLDER_MIME_TYPE.to_string(),
                size: None,
                modified_time: None,
            },
        )
    }

    /// Add a file under `parent`.
    pub fn add_file(
        &mut self,
        parent: &str,
        id: &str,
        name: &str,
        mime_type: &str,
        size: Option<u64>,
    ) -> &mut Self {
        self.insert(
            parent,
            RawItem {
                id: id.to_string(),
                name: name.to_string(),
                mime_type: mime_type.to_string(),
                size,
                modified_time: None,
            },
        )
    }

    /// List an existing item under an additional parent.
    ///
    /// Drives allow one item to have several parents; linking a folder under
    /// one of its own descendants produces a cycle.
    pub fn link(&mut self, parent: &str, child: &str) -> &mut Self {
        if self.entries.contains_key(child) {
            if let Some(entry) = self.entries.get_mut(parent) {
                entry.children.push(child.to_string());
            }
        }
        self
    }

    /// Queue a listing failure for page `page_index` (0-based) of `folder_id`.
    pub fn fail_listing(&self, folder_id: &str, page_index: usize, error: ListingError) {
        self.failures
            .lock()
            .listing
            .entry((folder_id.to_string(), page_index))
            .or_default()
            .push_back(error);
    }

    /// Make every metadata call for `id` fail.
    pub fn fail_metadata(&self, id: &str, error: MetadataError) {
        self.failures.lock().metadata.insert(id.to_string(), error);
    }

    fn insert(&mut self, parent: &str, item: RawItem) -> &mut Self {
        let id = item.id.clone();
        self.entries.insert(
            id.clone(),
            Entry {
                item,
                children: Vec::new(),
            },
        );
        if let Some(entry) = self.entries.get_mut(parent) {
            entry.children.push(id);
        }
        self
    }

    /// Build a drive from a nested JSON fixture.
    ///
    /// ```json
    /// { "id": "root", "name": "root", "children": [
    ///     { "id": "f1", "name": "README.pdf", "mimeType": "application/pdf", "size": 1024 },
    ///     { "id": "d1", "name": "Brands", "children": [] }
    /// ] }
    /// ```
    ///
    /// An entry with a `children` array is a folder; anything else is a file.
    pub fn from_fixture_str(json: &str) -> Result<Self, FixtureError> {
        let root: FixtureNode = serde_json::from_str(json)?;
        let mut drive = MemoryDrive::new(&root.id);
        if let Some(entry) = drive.entries.get_mut(&root.id) {
            entry.item.name = root.name.clone();
        }
        for child in root.children.unwrap_or_default() {
            drive.load_fixture_node(&root.id, child)?;
        }
        Ok(drive)
    }

    /// Read and parse a fixture file. See [`MemoryDrive::from_fixture_str`].
    pub fn from_fixture_file(path: &Path) -> Result<Self, FixtureError> {
        let json = std::fs::read_to_string(path).map_err(|source| FixtureError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_fixture_str(&json)
    }

    fn load_fixture_node(&mut self, parent: &str, node: FixtureNode) -> Result<(), FixtureError> {
        if self.entries.contains_key(&node.id) {
            return Err(FixtureError::DuplicateId(node.id));
        }
        match node.children {
            Some(children) => {
                self.add_folder(parent, &node.id, &node.name);
                for child in children {
                    self.load_fixture_node(&node.id, child)?;
                }
            }
            None => {
                let mime = node
                    .mime_type
                    .unwrap_or_else(|| "application/octet-stream".to_string());
                self.add_file(parent, &node.id, &node.name, &mime, node.size);
                if let Some(entry) = self.entries.get_mut(&node.id) {
                    entry.item.modified_time = node.modified_time;
                }
            }
        }
        Ok(())
    }
}

impl ListingClient for MemoryDrive {
    fn get_metadata(&self, id: &str) -> Result<ItemMetadata, MetadataError> {
        if let Some(err) = self.failures.lock().metadata.get(id) {
            return Err(err.clone());
        }
        self.entries
            .get(id)
            .map(|e| ItemMetadata {
                id: e.item.id.clone(),
                name: e.item.name.clone(),
            })
            .ok_or_else(|| MetadataError::NotFound(id.to_string()))
    }

    fn list_children(
        &self,
        folder_id: &str,
        page_token: Option<&str>,
    ) -> Result<ListPage, ListingError> {
        let offset = match page_token {
            Some(token) => token.parse::<usize>().map_err(|_| ListingError::Api {
                code: 400,
                message: format!("invalid page token {token:?}"),
            })?,
            None => 0,
        };
        let page_index = offset / self.page_size;

        {
            let mut failures = self.failures.lock();
            let key = (folder_id.to_string(), page_index);
            if let Some(queue) = failures.listing.get_mut(&key) {
                if let Some(err) = queue.pop_front() {
                    return Err(err);
                }
            }
        }

        let entry = self.entries.get(folder_id).ok_or_else(|| ListingError::Api {
            code: 404,
            message: format!("folder {folder_id} not found"),
        })?;

        let end = (offset + self.page_size).min(entry.children.len());
        let items = entry
            .children
            .get(offset..end)
            .unwrap_or_default()
            .iter()
            .filter_map(|id| self.entries.get(id))
            .map(|e| e.item.clone())
            .collect();
        let next_page_token = (end < entry.children.len()).then(|| end.to_string());

        Ok(ListPage {
            items,
            next_page_token,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FixtureNode {
    id: String,
    name: String,
    #[serde(default)]
    mime_type: Option<String>,
    #[serde(default)]
    size: Option<u64>,
    #[serde(default)]
    modified_time: Option<DateTime<Utc>>,
    #[serde(default)]
    children: Option<Vec<FixtureNode>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_files() -> MemoryDrive {
        let mut drive = MemoryDrive::new("root").with_page_size(2);
        drive
            .add_file("root", "a", "a.png", "image/png", Some(1))
            .add_file("root", "b", "b.png", "image/png", Some(2))
            .add_file("root", "c", "c.png", "image/png", None);
        drive
    }

    #[test]
    fn test_pages_follow_tokens() {
        let drive = three_files();
        let first = drive.list_children("root", None).unwrap();
        assert_eq!(first.items.len(), 2);
        assert_eq!(first.next_page_token.as_deref(), Some("2"));

        let second = drive.list_children("root", Some("2")).unwrap();
        assert_eq!(second.items.len(), 1);
        assert_eq!(second.items[0].id, "c");
        assert!(second.next_page_token.is_none());
    }

    #[test]
    fn test_scripted_failure_is_consumed_once() {
        let drive = three_files();
        drive.fail_listing("root", 1, ListingError::RateLimited);

        assert!(drive.list_children("root", None).is_ok());
        assert_eq!(
            drive.list_children("root", Some("2")),
            Err(ListingError::RateLimited)
        );
        assert!(drive.list_children("root", Some("2")).is_ok());
    }

    #[test]
    fn test_metadata_lookup_and_failure() {
        let mut drive = MemoryDrive::new("root");
        drive.add_folder("root", "d1", "Brands");
        assert_eq!(drive.get_metadata("d1").unwrap().name, "Brands");
        assert!(matches!(
            drive.get_metadata("missing"),
            Err(MetadataError::NotFound(_))
        ));

        drive.fail_metadata(
            "d1",
            MetadataError::Api {
                code: 403,
                message: "forbidden".into(),
            },
        );
        assert!(drive.get_metadata("d1").is_err());
    }

    #[test]
    fn test_fixture_parsing() {
        let drive = MemoryDrive::from_fixture_str(
            r#"{"id":"root","name":"root","children":[
                {"id":"f1","name":"README.pdf","mimeType":"application/pdf","size":10},
                {"id":"d1","name":"Archive","children":[]}
            ]}"#,
        )
        .unwrap();
        let page = drive.list_children("root", None).unwrap();
        assert_eq!(page.items.len(), 2);
        assert!(!page.items[0].is_folder());
        assert!(page.items[1].is_folder());
    }

    #[test]
    fn test_fixture_rejects_duplicate_ids() {
        let result = MemoryDrive::from_fixture_str(
            r#"{"id":"root","name":"root","children":[
                {"id":"x","name":"a","children":[]},
                {"id":"x","name":"b","children":[]}
            ]}"#,
        );
        assert!(matches!(result, Err(FixtureError::DuplicateId(id)) if id == "x"));
    }
}
