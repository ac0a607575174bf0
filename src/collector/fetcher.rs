//! Cursor-following fetcher for one time window
//!
//! Requests are paced with a fixed delay between pages so a window never
//! exceeds the feed's rate limit on its own.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::traits::{FeedQuery, TransferFeed};
use crate::domain::{FetchOutcome, IngestFailure, TimeWindow};

/// Fetches every page the feed reports for a window
pub struct PaginatedFetcher {
    feed: Arc<dyn TransferFeed>,
    min_value: u64,
    page_delay: Duration,
    max_pages: usize,
}

impl PaginatedFetcher {
    pub fn new(
        feed: Arc<dyn TransferFeed>,
        min_value: u64,
        page_delay: Duration,
        max_pages: usize,
    ) -> Self {
        Self {
            feed,
            min_value,
            page_delay,
            max_pages: max_pages.max(1),
        }
    }

    /// Fetch all records for `window`, following the cursor until it is
    /// absent or repeats. A failed page ends pagination but keeps the
    /// records gathered so far.
    pub async fn fetch_window(&self, window: &TimeWindow) -> FetchOutcome {
        info!("Fetching transactions from {}", window);

        let mut outcome = FetchOutcome::default();
        let mut cursor: Option<String> = None;
        let mut followed: HashSet<String> = HashSet::new();

        loop {
            if outcome.pages >= self.max_pages {
                warn!(
                    "Stopping pagination for {} after {} pages (cap reached)",
                    window, outcome.pages
                );
                break;
            }

            let query = FeedQuery::for_window(window, self.min_value, cursor.clone());
            outcome.pages += 1;

            let page = match self.feed.fetch_page(&query).await {
                Ok(page) => page,
                Err(e) => {
                    error!("Feed request for {} failed: {}", window, e);
                    outcome.failures.push(IngestFailure::transport(e.to_string()));
                    break;
                }
            };

            if !page.is_success() {
                let body = serde_json::to_string(&page).unwrap_or_else(|_| page.result.clone());
                error!("Feed returned {} for {}: {}", page.result, window, body);
                outcome.failures.push(IngestFailure::transport(format!(
                    "result={} message={}",
                    page.result,
                    page.message.as_deref().unwrap_or("")
                )));
                break;
            }

            debug!(
                "Page {} for {}: {} transactions",
                outcome.pages,
                window,
                page.transactions.len()
            );

            for rejected in &page.rejected {
                error!(
                    "Skipping malformed transaction in {}: {}; payload: {}",
                    window, rejected.error, rejected.raw
                );
                outcome.failures.push(IngestFailure::malformed(
                    rejected.hash.clone(),
                    rejected.error.clone(),
                ));
            }

            let next = page.next_cursor().map(str::to_string);
            outcome.records.extend(page.transactions);

            match next {
                Some(next) if cursor.as_deref() != Some(next.as_str()) => {
                    if !followed.insert(next.clone()) {
                        warn!("Cursor {} for {} was already followed", next, window);
                        break;
                    }
                    cursor = Some(next);
                    tokio::time::sleep(self.page_delay).await;
                }
                _ => break,
            }
        }

        info!("Got {} transactions", outcome.records.len());
        outcome
    }
}
