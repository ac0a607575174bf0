use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use whale_ingest::collector::{FeedPage, FeedQuery, TransferFeed};
use whale_ingest::config::ScheduleConfig;
use whale_ingest::domain::{Endpoint, FailureKind, TransferRecord};
use whale_ingest::error::Result;
use whale_ingest::services::{IngestionScheduler, Mode};
use whale_ingest::MemoryStore;

/// Serves pages keyed by (window start, cursor). Unknown keys return an empty page.
#[derive(Default)]
struct WindowedFeed {
    pages: Mutex<HashMap<(i64, Option<String>), FeedPage>>,
    queries: Mutex<Vec<FeedQuery>>,
}

impl WindowedFeed {
    fn page(self, start: DateTime<Utc>, cursor: Option<&str>, page: FeedPage) -> Self {
        self.pages
            .lock()
            .unwrap()
            .insert((start.timestamp(), cursor.map(str::to_string)), page);
        self
    }

    fn queries(&self) -> Vec<FeedQuery> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl TransferFeed for WindowedFeed {
    async fn fetch_page(&self, query: &FeedQuery) -> Result<FeedPage> {
        self.queries.lock().unwrap().push(query.clone());
        let key = (query.start, query.cursor.clone());
        Ok(self
            .pages
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .unwrap_or_else(|| FeedPage::success(Vec::new(), None)))
    }
}

fn transfer(hash: &str, at: DateTime<Utc>) -> TransferRecord {
    TransferRecord {
        hash: hash.to_string(),
        blockchain: "ethereum".to_string(),
        symbol: "usdc".to_string(),
        transaction_type: "transfer".to_string(),
        timestamp: at.timestamp(),
        amount: dec!(3000000),
        amount_usd: dec!(2999100.5),
        from: Endpoint::new("0x28c6c06298d514db089934071355e5743bf21d60")
            .with_owner("binance", "exchange"),
        to: Endpoint::new("0x21a31ee1afc51d94c2efccaa2092ad1028285549"),
    }
}

fn schedule() -> ScheduleConfig {
    ScheduleConfig {
        page_delay_secs: 0,
        catch_up_delay_secs: 0,
        ..ScheduleConfig::default()
    }
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 20, 9, 0, 0).unwrap()
}

#[tokio::test]
async fn fresh_start_first_window_is_lookback() {
    let feed = Arc::new(WindowedFeed::default());
    let store = Arc::new(MemoryStore::new());
    let mut scheduler = IngestionScheduler::new(&schedule(), 500_000, feed.clone(), store);

    assert_eq!(scheduler.frontier(), None);
    let outcome = scheduler.tick(now()).await;

    assert_eq!(outcome.mode, Mode::CatchUp);
    let window = outcome.window.unwrap();
    assert_eq!(window.start, now() - Duration::minutes(59));
    assert_eq!(window.end, now() - Duration::minutes(49));

    let queries = feed.queries();
    assert_eq!(queries.len(), 1);
    assert_eq!(queries[0].start, window.start.timestamp());
    assert_eq!(queries[0].end, window.end.timestamp());
    assert_eq!(queries[0].min_value, 500_000);
}

#[tokio::test]
async fn same_hash_in_two_windows_is_stored_once() {
    let first = now() - Duration::minutes(59);
    let second = first + Duration::minutes(10);

    let feed = Arc::new(
        WindowedFeed::default()
            .page(
                first,
                None,
                FeedPage::success(vec![transfer("abc", first), transfer("def", first)], None),
            )
            .page(
                second,
                None,
                FeedPage::success(vec![transfer("abc", first)], None),
            ),
    );
    let store = Arc::new(MemoryStore::new());
    let mut scheduler = IngestionScheduler::new(&schedule(), 500_000, feed, store.clone());

    let one = scheduler.tick(now()).await.report.unwrap();
    let two = scheduler.tick(now()).await.report.unwrap();

    assert_eq!(one.inserted, 2);
    assert_eq!(two.inserted, 0);
    assert_eq!(two.skipped, 1);
    assert_eq!(store.hashes().await, vec!["abc", "def"]);
}

#[tokio::test]
async fn failed_second_page_keeps_first_page_and_advances() {
    let start = now() - Duration::minutes(59);
    let feed = Arc::new(
        WindowedFeed::default()
            .page(
                start,
                None,
                FeedPage::success(
                    vec![
                        transfer("h1", start),
                        transfer("h2", start),
                        transfer("h3", start),
                    ],
                    Some("cursor-1"),
                ),
            )
            .page(start, Some("cursor-1"), FeedPage::error("internal error")),
    );
    let store = Arc::new(MemoryStore::new());
    let mut scheduler = IngestionScheduler::new(&schedule(), 500_000, feed.clone(), store.clone());

    let outcome = scheduler.tick(now()).await;
    let report = outcome.report.unwrap();

    assert_eq!(store.len().await, 3);
    assert_eq!(report.pages, 2);
    assert_eq!(report.failure_count(FailureKind::Transport), 1);
    assert_eq!(report.failure_count(FailureKind::Persistence), 0);
    assert_eq!(feed.queries().len(), 2);
    assert_eq!(outcome.frontier, start + Duration::minutes(10));
}

#[tokio::test]
async fn windows_are_processed_in_order() {
    let feed = Arc::new(WindowedFeed::default());
    let store = Arc::new(MemoryStore::new());
    let mut scheduler = IngestionScheduler::new(&schedule(), 500_000, feed.clone(), store);

    while scheduler.tick(now()).await.mode == Mode::CatchUp {}

    let starts: Vec<i64> = feed.queries().iter().map(|q| q.start).collect();
    assert_eq!(starts.len(), 4);
    assert!(starts.windows(2).all(|w| w[1] - w[0] == 600));
}
