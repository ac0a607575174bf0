//! Persistence of scheduler state for crash recovery

pub mod checkpoint;

pub use checkpoint::{FrontierCheckpoint, FrontierStore};
