//! drivetree core: crawls a remote drive into a single nested tree.
//!
//! This crate contains all crawl logic with no CLI dependencies.
//!
//! # Modules
//!
//! - [`client`]: Listing client trait plus HTTP and in-memory implementations.
//! - [`crawler`]: Depth-first crawler with pagination, retry, cycle guard and cancellation.
//! - [`model`]: Internal node tree and its external, serialisable projection.
//! - [`summary`]: Run statistics and the persisted build record.
//! - [`output`]: Writing the tree and build record to disk.

pub mod client;
pub mod crawler;
pub mod error;
pub mod model;
pub mod output;
pub mod summary;

pub use client::{ListingClient, FOLDER_MIME_TYPE};
pub use crawler::{crawl, start_crawl, CrawlConfig, CrawlHandle, CrawlReport};
pub use error::{CrawlError, ListingError, MetadataError};
pub use model::TreeNode;
pub use summary::{BuildInfo, RunSummary};
