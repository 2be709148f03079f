//! Crawl configuration.

use std::time::Duration;

/// Deepest level whose subfolders are still descended (root = 0).
pub const MAX_DEPTH: usize = 10;

/// Retries per page after a rate-limit response.
pub const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Base backoff; retry `n` waits `2^n * base`.
pub const BACKOFF_BASE: Duration = Duration::from_millis(1000);

/// Configuration for a single crawl.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Remote identifier of the folder the crawl starts from.
    pub root_id: String,
    /// Display name given to the root; no metadata call is made for it.
    pub root_name: String,
    /// Folders at this depth keep their files but are not descended.
    pub max_depth: usize,
    pub max_retries: u32,
    pub backoff_base: Duration,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            root_id: "root".to_string(),
            root_name: "root".to_string(),
            max_depth: MAX_DEPTH,
            max_retries: MAX_RATE_LIMIT_RETRIES,
            backoff_base: BACKOFF_BASE,
        }
    }
}

impl CrawlConfig {
    /// Default configuration rooted at `root_id`.
    pub fn for_root(root_id: impl Into<String>) -> Self {
        Self {
            root_id: root_id.into(),
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        // 2^16 seconds is already far past any sane provider window.
        let factor = 1u32 << attempt.min(16);
        self.backoff_base.saturating_mul(factor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_backoff_sequence() {
        let config = CrawlConfig::default();
        assert_eq!(config.backoff_delay(1), Duration::from_secs(2));
        assert_eq!(config.backoff_delay(2), Duration::from_secs(4));
        assert_eq!(config.backoff_delay(3), Duration::from_secs(8));
    }

    #[test]
    fn test_backoff_saturates() {
        let config = CrawlConfig {
            backoff_base: Duration::MAX,
            ..CrawlConfig::default()
        };
        assert_eq!(config.backoff_delay(40), Duration::MAX);
    }
}
