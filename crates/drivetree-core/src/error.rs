/// Error taxonomy for the crawl engine.
///
/// Only [`CrawlError`] ever escapes a crawl. Metadata and listing failures
/// are recovered inside the crawler and turn into partially populated
/// folders (see [`crate::crawler::PartialReason`]).
use thiserror::Error;

/// Failure to resolve a single item's metadata (display name).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MetadataError {
    #[error("item {0} not found")]
    NotFound(String),

    #[error("metadata request failed with HTTP {code}: {message}")]
    Api { code: u16, message: String },

    #[error("connection failure: {0}")]
    Connection(String),
}

/// Failure of one "list children" page request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ListingError {
    /// Provider throttling. Carries no retry-after hint; the caller
    /// computes its own backoff.
    #[error("rate limited by provider")]
    RateLimited,

    #[error("listing failed with HTTP {code}: {message}")]
    Api { code: u16, message: String },

    #[error("connection failure: {0}")]
    Connection(String),
}

impl ListingError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ListingError::RateLimited)
    }

    pub fn is_connection(&self) -> bool {
        matches!(self, ListingError::Connection(_))
    }
}

/// Crawl-wide failures. A crawl that returns `Ok` always carries a tree.
#[derive(Debug, Error)]
pub enum CrawlError {
    /// The very first listing call for the root could not reach the API.
    #[error("root folder is unreachable: {0}")]
    RootUnreachable(String),

    /// The background crawl thread stopped without producing a result.
    #[error("crawl thread terminated unexpectedly")]
    Aborted,
}

/// Failure to persist the formatted tree or the build record.
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("i/o error writing {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialise {what}: {source}")]
    Json {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Failure to load an in-memory drive fixture.
#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("failed to read fixture {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid fixture: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("fixture item {0} appears more than once")]
    DuplicateId(String),
}
