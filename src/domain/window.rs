use chrono::{DateTime, Duration, Utc};
use std::fmt;

/// Half-open time range `[start, end)` queried in one fetch pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn start_ts(&self) -> i64 {
        self.start.timestamp()
    }

    pub fn end_ts(&self) -> i64 {
        self.end.timestamp()
    }

    pub fn width(&self) -> Duration {
        self.end - self.start
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} to {}",
            self.start.format("%H:%M"),
            self.end.format("%H:%M")
        )
    }
}

/// Computes fetch windows from the frontier. The width should match the
/// longest span the feed accepts in a single query.
#[derive(Debug, Clone, Copy)]
pub struct WindowCalculator {
    width: Duration,
    lookback: Duration,
}

impl WindowCalculator {
    pub fn new(width: Duration, lookback: Duration) -> Self {
        Self { width, lookback }
    }

    pub fn width(&self) -> Duration {
        self.width
    }

    /// The window starting at `frontier`
    pub fn next_window(&self, frontier: DateTime<Utc>) -> TimeWindow {
        TimeWindow {
            start: frontier,
            end: frontier + self.width,
        }
    }

    /// Oldest point the feed still serves
    pub fn horizon(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.lookback
    }

    /// Frontier to start from: the checkpoint when one exists, never older than the horizon.
    pub fn initial_frontier(
        &self,
        now: DateTime<Utc>,
        checkpoint: Option<DateTime<Utc>>,
    ) -> DateTime<Utc> {
        let horizon = self.horizon(now);
        match checkpoint {
            Some(saved) => saved.max(horizon),
            None => horizon,
        }
    }
}
