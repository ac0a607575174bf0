pub mod retention;
pub mod scheduler;

pub use retention::RetentionTask;
pub use scheduler::{select_mode, IngestionScheduler, Mode, TickOutcome, FRONTIER_COMPONENT};
