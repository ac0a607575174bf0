pub mod adapters;
pub mod collector;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod services;

pub use adapters::{MemoryStore, PostgresStore, WhaleAlertClient};
pub use collector::{
    ActivityStore, DedupPersister, FeedPage, FeedQuery, PaginatedFetcher, TransferFeed,
};
pub use config::AppConfig;
pub use domain::{
    CycleReport, FailureKind, IngestFailure, PersistedActivity, TimeWindow, TransferRecord,
    WindowCalculator,
};
pub use error::{IngestError, Result};
pub use persistence::{FrontierCheckpoint, FrontierStore};
pub use services::{IngestionScheduler, Mode, RetentionTask, TickOutcome};
