//! Listing client: the crawler's only view of the remote drive.
//!
//! A client knows how to fetch one item's metadata and one page of a
//! folder's children. It knows nothing about tree shape, recursion,
//! retries or call accounting; all of that lives in [`crate::crawler`].
//!
//! Two implementations ship with the crate:
//! - [`http::DriveClient`] talks to the Google Drive v3 REST API.
//! - [`memory::MemoryDrive`] serves a fixture from memory, with scripted failures.

pub mod http;
pub mod memory;

use crate::error::{ListingError, MetadataError};
use chrono::{DateTime, Utc};
use serde::Deserialize;

pub use http::{DriveAuth, DriveClient, DriveClientConfig};
pub use memory::{FailureScript, MemoryDrive};

/// mimeType the provider uses to mark an item as a folder.
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Display metadata for a single item.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ItemMetadata {
    pub id: String,
    pub name: String,
}

/// One child entry as returned by the listing API.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawItem {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    #[serde(default, deserialize_with = "de_size")]
    pub size: Option<u64>,
    #[serde(default)]
    pub modified_time: Option<DateTime<Utc>>,
}

impl RawItem {
    /// `true` when the item is itself a folder.
    pub fn is_folder(&self) -> bool {
        self.mime_type == FOLDER_MIME_TYPE
    }
}

/// A single page of a folder listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    pub items: Vec<RawItem>,
    /// Continuation token; `None` on the last page.
    pub next_page_token: Option<String>,
}

/// Access to a remote hierarchical store.
///
/// Implementations must be `Send` so a crawl can run on a background thread.
pub trait ListingClient: Send {
    /// Fetch the display metadata of an item.
    fn get_metadata(&self, id: &str) -> Result<ItemMetadata, MetadataError>;

    /// Fetch one page of `folder_id`'s direct children.
    fn list_children(
        &self,
        folder_id: &str,
        page_token: Option<&str>,
    ) -> Result<ListPage, ListingError>;
}

impl<C: ListingClient + Sync + ?Sized> ListingClient for &C {
    fn get_metadata(&self, id: &str) -> Result<ItemMetadata, MetadataError> {
        (**self).get_metadata(id)
    }

    fn list_children(
        &self,
        folder_id: &str,
        page_token: Option<&str>,
    ) -> Result<ListPage, ListingError> {
        (**self).list_children(folder_id, page_token)
    }
}

impl<C: ListingClient + ?Sized> ListingClient for Box<C> {
    fn get_metadata(&self, id: &str) -> Result<ItemMetadata, MetadataError> {
        (**self).get_metadata(id)
    }

    fn list_children(
        &self,
        folder_id: &str,
        page_token: Option<&str>,
    ) -> Result<ListPage, ListingError> {
        (**self).list_children(folder_id, page_token)
    }
}

/// The Drive API encodes `size` as a decimal string; fixtures may use a number.
fn de_size<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum SizeRepr {
        Num(u64),
        Text(String),
    }

    match Option::<SizeRepr>::deserialize(deserializer)? {
        None => Ok(None),
        Some(SizeRepr::Num(n)) => Ok(Some(n)),
        Some(SizeRepr::Text(s)) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_item_accepts_string_and_numeric_size() {
        let a: RawItem = serde_json::from_str(
            r#"{"id":"1","name":"a.mp4","mimeType":"video/mp4","size":"2048"}"#,
        )
        .unwrap();
        let b: RawItem =
            serde_json::from_str(r#"{"id":"2","name":"b.png","mimeType":"image/png","size":7}"#)
                .unwrap();
        assert_eq!(a.size, Some(2048));
        assert_eq!(b.size, Some(7));
    }

    #[test]
    fn test_raw_item_optional_fields() {
        let item: RawItem = serde_json::from_str(&format!(
            r#"{{"id":"f","name":"Brands","mimeType":"{FOLDER_MIME_TYPE}"}}"#
        ))
        .unwrap();
        assert!(item.is_folder());
        assert_eq!(item.size, None);
        assert_eq!(item.modified_time, None);
    }

    #[test]
    fn test_raw_item_parses_modified_time() {
        let item: RawItem = serde_json::from_str(
            r#"{"id":"1","name":"x.pdf","mimeType":"application/pdf","modifiedTime":"2024-03-01T10:15:00.000Z"}"#,
        )
        .unwrap();
        let ts = item.modified_time.unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-03-01T10:15:00+00:00");
    }
}
