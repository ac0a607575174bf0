//! Ingestion scheduler
//!
//! Owns the fetch frontier and decides each tick between two modes:
//! - Catch-up: more than two windows of backlog. Ingest one window, advance
//!   the frontier by one width, come back after a short delay.
//! - Steady-state: caught up. Do nothing, come back after the idle interval.
//!
//! Exactly one cycle runs at a time; the loop awaits each tick before sleeping.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tracing::{debug, info, warn};

use crate::collector::{ActivityStore, DedupPersister, PaginatedFetcher, TransferFeed};
use crate::config::ScheduleConfig;
use crate::domain::{CycleReport, FailureKind, TimeWindow, WindowCalculator};
use crate::error::Result;
use crate::persistence::FrontierCheckpoint;

/// Checkpoint component name for the Whale Alert frontier
pub const FRONTIER_COMPONENT: &str = "whale_alert";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    CatchUp,
    SteadyState,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CatchUp => "catch-up",
            Self::SteadyState => "steady-state",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Catch-up while the backlog is strictly greater than two window widths
pub fn select_mode(frontier: DateTime<Utc>, now: DateTime<Utc>, width: Duration) -> Mode {
    if now - frontier > width * 2 {
        Mode::CatchUp
    } else {
        Mode::SteadyState
    }
}

/// What a single tick did
#[derive(Debug, Clone)]
pub struct TickOutcome {
    pub mode: Mode,
    /// Window ingested, catch-up only
    pub window: Option<TimeWindow>,
    pub report: Option<CycleReport>,
    /// Frontier after the tick
    pub frontier: DateTime<Utc>,
    pub next_delay: StdDuration,
}

pub struct IngestionScheduler {
    windows: WindowCalculator,
    fetcher: PaginatedFetcher,
    persister: DedupPersister,
    checkpoint: Option<FrontierCheckpoint>,
    catch_up_delay: StdDuration,
    steady_delay: StdDuration,
    frontier: Option<DateTime<Utc>>,
}

impl IngestionScheduler {
    pub fn new(
        schedule: &ScheduleConfig,
        min_value: u64,
        feed: Arc<dyn TransferFeed>,
        store: Arc<dyn ActivityStore>,
    ) -> Self {
        Self {
            windows: WindowCalculator::new(schedule.window_width(), schedule.lookback()),
            fetcher: PaginatedFetcher::new(
                feed,
                min_value,
                schedule.page_delay(),
                schedule.max_pages_per_window,
            ),
            persister: DedupPersister::new(store),
            checkpoint: None,
            catch_up_delay: schedule.catch_up_delay(),
            steady_delay: schedule.steady_delay(),
            frontier: None,
        }
    }

    /// Save the frontier after every catch-up cycle
    pub fn with_checkpoint(mut self, checkpoint: FrontierCheckpoint) -> Self {
        self.checkpoint = Some(checkpoint);
        self
    }

    pub fn frontier(&self) -> Option<DateTime<Utc>> {
        self.frontier
    }

    /// Initialize the frontier from the stored checkpoint, clamped to the
    /// feed's lookback horizon. Store errors here are fatal to startup.
    pub async fn restore_frontier(&mut self, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let saved = match &self.checkpoint {
            Some(checkpoint) => checkpoint.restore().await?,
            None => None,
        };

        let frontier = self.windows.initial_frontier(now, saved);
        if saved.is_some_and(|s| s < frontier) {
            warn!(
                "Checkpoint is older than the feed horizon, resuming from {}",
                frontier
            );
        }

        self.frontier = Some(frontier);
        info!("Frontier initialized at {}", frontier);
        Ok(frontier)
    }

    /// Evaluate the mode once and run at most one cycle
    pub async fn tick(&mut self, now: DateTime<Utc>) -> TickOutcome {
        let frontier = match self.frontier {
            Some(f) => f,
            None => {
                let f = self.windows.initial_frontier(now, None);
                info!("Frontier initialized at {}", f);
                self.frontier = Some(f);
                f
            }
        };

        match select_mode(frontier, now, self.windows.width()) {
            Mode::SteadyState => {
                info!(
                    "Caught up (frontier {}), fetching again in {}s",
                    frontier.format("%H:%M"),
                    self.steady_delay.as_secs()
                );
                TickOutcome {
                    mode: Mode::SteadyState,
                    window: None,
                    report: None,
                    frontier,
                    next_delay: self.steady_delay,
                }
            }
            Mode::CatchUp => {
                let window = self.windows.next_window(frontier);
                let report = self.run_cycle(&window).await;

                // Only ever moves forward, by exactly one width
                self.frontier = Some(window.end);
                if let Some(checkpoint) = &self.checkpoint {
                    checkpoint.save(window.end).await;
                }

                info!(
                    "Window {} done: {} fetched, {} new, {} known, {} transport / {} persistence failures; fetching again in {}s",
                    window,
                    report.fetched,
                    report.inserted,
                    report.skipped,
                    report.failure_count(FailureKind::Transport),
                    report.failure_count(FailureKind::Persistence),
                    self.catch_up_delay.as_secs()
                );

                TickOutcome {
                    mode: Mode::CatchUp,
                    window: Some(window),
                    report: Some(report),
                    frontier: window.end,
                    next_delay: self.catch_up_delay,
                }
            }
        }
    }

    async fn run_cycle(&self, window: &TimeWindow) -> CycleReport {
        let fetched = self.fetcher.fetch_window(window).await;
        let persisted = self.persister.persist(&fetched.records).await;
        CycleReport::new(fetched, persisted)
    }

    /// Tick forever, sleeping between ticks as each outcome requests
    pub async fn run(mut self) {
        info!("Ingestion scheduler started");
        loop {
            let outcome = self.tick(Utc::now()).await;
            debug!("Next {} evaluation in {:?}", outcome.mode, outcome.next_delay);
            tokio::time::sleep(outcome.next_delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryStore;
    use crate::collector::{FeedPage, FeedQuery};
    use crate::domain::{Endpoint, TransferRecord};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use std::sync::Mutex;

    /// Answers every query with the same records and counts calls
    struct FixedFeed {
        hashes: Vec<&'static str>,
        calls: Mutex<Vec<FeedQuery>>,
    }

    impl FixedFeed {
        fn new(hashes: Vec<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                hashes,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl TransferFeed for FixedFeed {
        async fn fetch_page(&self, query: &FeedQuery) -> Result<FeedPage> {
            self.calls.lock().unwrap().push(query.clone());
            let records = self
                .hashes
                .iter()
                .map(|h| TransferRecord {
                    hash: h.to_string(),
                    blockchain: "ethereum".to_string(),
                    symbol: "eth".to_string(),
                    transaction_type: "transfer".to_string(),
                    timestamp: query.start,
                    amount: dec!(500),
                    amount_usd: dec!(1500000),
                    from: Endpoint::new("0xfrom"),
                    to: Endpoint::new("0xto"),
                })
                .collect();
            Ok(FeedPage::success(records, None))
        }
    }

    fn schedule() -> ScheduleConfig {
        ScheduleConfig {
            page_delay_secs: 0,
            ..ScheduleConfig::default()
        }
    }

    fn t(hour: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, hour, min, 0).unwrap()
    }

    #[test]
    fn test_mode_selection() {
        let width = Duration::minutes(10);
        assert_eq!(select_mode(t(12, 0), t(12, 25), width), Mode::CatchUp);
        assert_eq!(select_mode(t(12, 0), t(12, 15), width), Mode::SteadyState);
        // Exactly two widths is not enough backlog
        assert_eq!(select_mode(t(12, 0), t(12, 20), width), Mode::SteadyState);
    }

    #[tokio::test]
    async fn test_fresh_start_catches_up_from_lookback() {
        let feed = FixedFeed::new(vec!["a"]);
        let store = Arc::new(MemoryStore::new());
        let mut scheduler = IngestionScheduler::new(&schedule(), 500_000, feed.clone(), store);

        let outcome = scheduler.tick(t(13, 0)).await;

        assert_eq!(outcome.mode, Mode::CatchUp);
        let window = outcome.window.unwrap();
        assert_eq!(window.start, t(12, 1));
        assert_eq!(window.end, t(12, 11));
        assert_eq!(scheduler.frontier(), Some(t(12, 11)));
        assert_eq!(outcome.next_delay, StdDuration::from_secs(6));
        assert_eq!(feed.calls(), 1);
    }

    #[tokio::test]
    async fn test_steady_state_does_nothing() {
        let feed = FixedFeed::new(vec!["a"]);
        let store = Arc::new(MemoryStore::new());
        let mut scheduler =
            IngestionScheduler::new(&schedule(), 500_000, feed.clone(), store.clone());
        scheduler.frontier = Some(t(12, 45));

        let outcome = scheduler.tick(t(13, 0)).await;

        assert_eq!(outcome.mode, Mode::SteadyState);
        assert!(outcome.report.is_none());
        assert_eq!(outcome.next_delay, StdDuration::from_secs(20 * 60));
        assert_eq!(scheduler.frontier(), Some(t(12, 45)));
        assert_eq!(feed.calls(), 0);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_drains_backlog_then_goes_steady() {
        let feed = FixedFeed::new(vec!["a", "b"]);
        let store = Arc::new(MemoryStore::new());
        let mut scheduler =
            IngestionScheduler::new(&schedule(), 500_000, feed.clone(), store.clone());

        let now = t(13, 0);
        let mut modes = Vec::new();
        let mut last = None;
        for _ in 0..6 {
            let before = scheduler.frontier();
            let outcome = scheduler.tick(now).await;
            if let (Some(before), Mode::CatchUp) = (before, outcome.mode) {
                assert_eq!(outcome.frontier - before, Duration::minutes(10));
            }
            if let Some(before) = before {
                assert!(outcome.frontier >= before);
            }
            modes.push(outcome.mode);
            last = Some(outcome);
        }

        // 12:01 -> 12:11 -> 12:21 -> 12:31 -> 12:41, then backlog is 19 minutes
        assert_eq!(
            modes,
            vec![
                Mode::CatchUp,
                Mode::CatchUp,
                Mode::CatchUp,
                Mode::CatchUp,
                Mode::SteadyState,
                Mode::SteadyState,
            ]
        );
        assert_eq!(last.unwrap().frontier, t(12, 41));
        assert_eq!(feed.calls(), 4);
        // Same hashes every window, stored once
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_checkpoint_saved_and_restored() {
        let feed = FixedFeed::new(vec![]);
        let store = Arc::new(MemoryStore::new());
        let checkpoint = FrontierCheckpoint::new(store.clone(), FRONTIER_COMPONENT);

        let mut first = IngestionScheduler::new(&schedule(), 500_000, feed.clone(), store.clone())
            .with_checkpoint(checkpoint.clone());
        first.restore_frontier(t(13, 0)).await.unwrap();
        first.tick(t(13, 0)).await;
        first.tick(t(13, 0)).await;
        assert_eq!(first.frontier(), Some(t(12, 21)));

        // Restart five minutes later resumes where the last cycle ended
        let mut second = IngestionScheduler::new(&schedule(), 500_000, feed, store)
            .with_checkpoint(checkpoint);
        let resumed = second.restore_frontier(t(13, 5)).await.unwrap();
        assert_eq!(resumed, t(12, 21));
    }

    #[tokio::test]
    async fn test_stale_checkpoint_is_clamped() {
        let feed = FixedFeed::new(vec![]);
        let store = Arc::new(MemoryStore::new());
        let checkpoint = FrontierCheckpoint::new(store.clone(), FRONTIER_COMPONENT);
        checkpoint.save(t(8, 0)).await;

        let mut scheduler = IngestionScheduler::new(&schedule(), 500_000, feed, store)
            .with_checkpoint(checkpoint);
        let frontier = scheduler.restore_frontier(t(13, 0)).await.unwrap();

        assert_eq!(frontier, t(12, 1));
    }
}
