/// Pagination with bounded rate-limit retry.
///
/// A folder's children are accumulated page by page. Rate-limited pages are
/// retried in place with exponential backoff; any other failure, or running
/// out of retries, stops pagination for this folder only and keeps whatever
/// was already collected.
use super::folder::PartialReason;
use super::Crawler;
use crate::client::{ListingClient, RawItem};
use crate::error::CrawlError;
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Granularity at which a backoff wait notices cancellation.
const CANCEL_POLL: Duration = Duration::from_millis(50);

/// All items collected for one folder.
#[derive(Debug, Default)]
pub(crate) struct Listing {
    pub items: Vec<RawItem>,
    /// Why pagination stopped early, if it did.
    pub partial: Option<PartialReason>,
}

impl Listing {
    fn stopped(items: Vec<RawItem>, reason: PartialReason) -> Self {
        Self {
            items,
            partial: Some(reason),
        }
    }
}

impl<C: ListingClient + ?Sized> Crawler<'_, C> {
    /// Enumerate every child of `folder_id` across all pages.
    ///
    /// Only fails when `is_root` is set and the crawl's very first request
    /// cannot reach the API: with no root listing there is nothing to salvage.
    pub(crate) fn list_all_items(
        &mut self,
        folder_id: &str,
        is_root: bool,
    ) -> Result<Listing, CrawlError> {
        let mut items: Vec<RawItem> = Vec::new();
        let mut page_token: Option<String> = None;
        // Tokens already requested for this folder.
        let mut seen_tokens: HashSet<String> = HashSet::new();
        let mut first_request = is_root;
        let mut page_index = 0usize;

        loop {
            let mut attempt: u32 = 0;
            let page = loop {
                if self.is_cancelled() {
                    return Ok(Listing::stopped(items, PartialReason::Cancelled));
                }

                self.state.record_call();
                let result = self.client.list_children(folder_id, page_token.as_deref());
                let was_first = std::mem::replace(&mut first_request, false);

                match result {
                    Ok(page) => break page,
                    Err(err) if err.is_rate_limited() && attempt < self.config.max_retries => {
                        attempt += 1;
                        let delay = self.config.backoff_delay(attempt);
                        warn!(
                            "Rate limited listing {folder_id} page {page_index}; retry {attempt}/{} in {delay:?}",
                            self.config.max_retries
                        );
                        if !self.wait(delay) {
                            return Ok(Listing::stopped(items, PartialReason::Cancelled));
                        }
                    }
                    Err(err) if err.is_rate_limited() => {
                        warn!(
                            "Rate limit retries exhausted for {folder_id} page {page_index}; keeping {} items",
                            items.len()
                        );
                        return Ok(Listing::stopped(items, PartialReason::RateLimitExhausted));
                    }
                    Err(err) => {
                        if was_first && err.is_connection() {
                            return Err(CrawlError::RootUnreachable(err.to_string()));
                        }
                        warn!(
                            "Listing {folder_id} page {page_index} failed: {err}; keeping {} items",
                            items.len()
                        );
                        return Ok(Listing::stopped(
                            items,
                            PartialReason::ListingTruncated(err.to_string()),
                        ));
                    }
                }
            };

            debug!(
                "Listed {folder_id} page {page_index}: {} items",
                page.items.len()
            );
            items.extend(page.items);

            match page.next_page_token {
                None => break,
                Some(next) if seen_tokens.contains(&next) => {
                    warn!("Listing {folder_id} returned page token {next:?} again; stopping");
                    return Ok(Listing::stopped(
                        items,
                        PartialReason::ListingTruncated("page token repeated".into()),
                    ));
                }
                Some(next) => {
                    seen_tokens.insert(next.clone());
                    page_token = Some(next);
                    page_index += 1;
                }
            }
        }

        Ok(Listing {
            items,
            partial: None,
        })
    }

    /// Sleep for `delay`, waking early on cancellation.
    /// Returns `false` if the crawl was cancelled.
    fn wait(&self, delay: Duration) -> bool {
        let deadline = Instant::now() + delay;
        loop {
            if self.is_cancelled() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            std::thread::sleep(CANCEL_POLL.min(deadline - now));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ItemMetadata, ListPage, MemoryDrive};
    use crate::crawler::CrawlConfig;
    use crate::error::{ListingError, MetadataError};
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    fn config() -> CrawlConfig {
        CrawlConfig {
            backoff_base: Duration::ZERO,
            ..CrawlConfig::default()
        }
    }

    fn five_files() -> MemoryDrive {
        let mut drive = MemoryDrive::new("root").with_page_size(2);
        for i in 0..5 {
            drive.add_file("root", &format!("f{i}"), &format!("{i}.jpg"), "image/jpeg", None);
        }
        drive
    }

    #[test]
    fn test_collects_every_page() {
        let drive = five_files();
        let config = config();
        let mut crawler = Crawler::new(&drive, &config, Arc::new(AtomicBool::new(false)), None);

        let listing = crawler.list_all_items("root", true).unwrap();
        assert_eq!(listing.items.len(), 5);
        assert!(listing.partial.is_none());
        assert_eq!(crawler.state.api_calls(), 3);
    }

    #[test]
    fn test_retries_rate_limited_page() {
        let drive = five_files();
        drive.fail_listing("root", 1, ListingError::RateLimited);
        drive.fail_listing("root", 1, ListingError::RateLimited);
        let config = config();
        let mut crawler = Crawler::new(&drive, &config, Arc::new(AtomicBool::new(false)), None);

        let listing = crawler.list_all_items("root", true).unwrap();
        assert_eq!(listing.items.len(), 5);
        assert!(listing.partial.is_none());
        // 3 pages + 2 failed attempts.
        assert_eq!(crawler.state.api_calls(), 5);
    }

    #[test]
    fn test_gives_up_after_max_retries() {
        let drive = five_files();
        for _ in 0..4 {
            drive.fail_listing("root", 1, ListingError::RateLimited);
        }
        let config = config();
        let mut crawler = Crawler::new(&drive, &config, Arc::new(AtomicBool::new(false)), None);

        let listing = crawler.list_all_items("root", true).unwrap();
        assert_eq!(listing.items.len(), 2);
        assert_eq!(listing.partial, Some(PartialReason::RateLimitExhausted));
        // Page 0, then page 1 tried once plus three retries.
        assert_eq!(crawler.state.api_calls(), 5);
    }

    #[test]
    fn test_root_connection_failure_is_fatal() {
        let drive = five_files();
        drive.fail_listing("root", 0, ListingError::Connection("refused".into()));
        let config = config();
        let mut crawler = Crawler::new(&drive, &config, Arc::new(AtomicBool::new(false)), None);

        let result = crawler.list_all_items("root", true);
        assert!(matches!(result, Err(CrawlError::RootUnreachable(_))));
    }

    #[test]
    fn test_non_root_connection_failure_truncates() {
        let drive = five_files();
        drive.fail_listing("root", 0, ListingError::Connection("reset".into()));
        let config = config();
        let mut crawler = Crawler::new(&drive, &config, Arc::new(AtomicBool::new(false)), None);

        let listing = crawler.list_all_items("root", false).unwrap();
        assert!(listing.items.is_empty());
        assert!(matches!(
            listing.partial,
            Some(PartialReason::ListingTruncated(_))
        ));
    }

    #[test]
    fn test_cancelled_before_first_page() {
        let drive = five_files();
        let config = config();
        let mut crawler = Crawler::new(&drive, &config, Arc::new(AtomicBool::new(true)), None);

        let listing = crawler.list_all_items("root", true).unwrap();
        assert!(listing.items.is_empty());
        assert_eq!(listing.partial, Some(PartialReason::Cancelled));
        assert_eq!(crawler.state.api_calls(), 0);
    }

    /// Serves one file per page and hands out `tokens` in a ring, so the
    /// listing never reaches a last page on its own.
    struct RingPages {
        tokens: &'static [&'static str],
    }

    impl ListingClient for RingPages {
        fn get_metadata(&self, id: &str) -> Result<ItemMetadata, MetadataError> {
            Err(MetadataError::NotFound(id.to_string()))
        }

        fn list_children(
            &self,
            _folder_id: &str,
            page_token: Option<&str>,
        ) -> Result<ListPage, ListingError> {
            let next = match page_token {
                None => self.tokens[0],
                Some(token) => {
                    let at = self.tokens.iter().position(|t| *t == token).unwrap_or(0);
                    self.tokens[(at + 1) % self.tokens.len()]
                }
            };
            let id = format!("file-{}", page_token.unwrap_or("start"));
            let item: RawItem = serde_json::from_value(serde_json::json!({
                "id": id,
                "name": format!("{id}.jpg"),
                "mimeType": "image/jpeg",
            }))
            .unwrap();
            Ok(ListPage {
                items: vec![item],
                next_page_token: Some(next.to_string()),
            })
        }
    }

    #[test]
    fn test_stops_when_token_does_not_advance() {
        let client = RingPages { tokens: &["a"] };
        let config = config();
        let mut crawler = Crawler::new(&client, &config, Arc::new(AtomicBool::new(false)), None);

        let listing = crawler.list_all_items("root", true).unwrap();
        let ids: Vec<&str> = listing.items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, ["file-start", "file-a"]);
        assert_eq!(
            listing.partial,
            Some(PartialReason::ListingTruncated("page token repeated".into()))
        );
        assert_eq!(crawler.state.api_calls(), 2);
    }

    #[test]
    fn test_stops_when_tokens_cycle() {
        let client = RingPages {
            tokens: &["a", "b", "c"],
        };
        let config = config();
        let mut crawler = Crawler::new(&client, &config, Arc::new(AtomicBool::new(false)), None);

        let listing = crawler.list_all_items("root", true).unwrap();
        let ids: Vec<&str> = listing.items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, ["file-start", "file-a", "file-b", "file-c"]);
        assert!(matches!(
            listing.partial,
            Some(PartialReason::ListingTruncated(ref msg)) if msg == "page token repeated"
        ));
        assert_eq!(crawler.state.api_calls(), 4);
    }
}
