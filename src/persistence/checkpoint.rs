//! Frontier checkpoints
//!
//! The scheduler's frontier lives in memory; after each completed cycle it is
//! also written here so a restart resumes from the last committed window
//! instead of re-fetching the whole lookback period.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::Result;

/// Storage for named frontier timestamps
#[async_trait]
pub trait FrontierStore: Send + Sync {
    async fn load_frontier(&self, component: &str) -> Result<Option<DateTime<Utc>>>;

    async fn save_frontier(&self, component: &str, frontier: DateTime<Utc>) -> Result<()>;
}

/// Checkpoint handle for one component's frontier
#[derive(Clone)]
pub struct FrontierCheckpoint {
    store: Arc<dyn FrontierStore>,
    component: String,
}

impl FrontierCheckpoint {
    pub fn new(store: Arc<dyn FrontierStore>, component: impl Into<String>) -> Self {
        Self {
            store,
            component: component.into(),
        }
    }

    /// Load the last saved frontier, if any
    pub async fn restore(&self) -> Result<Option<DateTime<Utc>>> {
        let frontier = self.store.load_frontier(&self.component).await?;
        match frontier {
            Some(ts) => info!("Restored frontier {} for {}", ts, self.component),
            None => debug!("No frontier checkpoint found for {}", self.component),
        }
        Ok(frontier)
    }

    /// Save the frontier. Failures are logged and reported as `false`;
    /// the next successful cycle overwrites the checkpoint anyway.
    pub async fn save(&self, frontier: DateTime<Utc>) -> bool {
        match self.store.save_frontier(&self.component, frontier).await {
            Ok(()) => {
                debug!("Checkpointed frontier {} for {}", frontier, self.component);
                true
            }
            Err(e) => {
                warn!(
                    "Failed to checkpoint frontier for {}: {}",
                    self.component, e
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryStore;
    use crate::error::IngestError;
    use chrono::TimeZone;

    struct BrokenStore;

    #[async_trait]
    impl FrontierStore for BrokenStore {
        async fn load_frontier(&self, _component: &str) -> Result<Option<DateTime<Utc>>> {
            Err(IngestError::Internal("store offline".into()))
        }

        async fn save_frontier(&self, _component: &str, _frontier: DateTime<Utc>) -> Result<()> {
            Err(IngestError::Internal("store offline".into()))
        }
    }

    #[tokio::test]
    async fn test_save_then_restore() {
        let checkpoint = FrontierCheckpoint::new(Arc::new(MemoryStore::new()), "whale_alert");
        assert_eq!(checkpoint.restore().await.unwrap(), None);

        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 12, 10, 0).unwrap();
        assert!(checkpoint.save(ts).await);
        assert_eq!(checkpoint.restore().await.unwrap(), Some(ts));
    }

    #[tokio::test]
    async fn test_components_are_isolated() {
        let store = Arc::new(MemoryStore::new());
        let a = FrontierCheckpoint::new(store.clone(), "a");
        let b = FrontierCheckpoint::new(store, "b");

        a.save(Utc::now()).await;
        assert_eq!(b.restore().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_save_failure_is_reported_not_raised() {
        let checkpoint = FrontierCheckpoint::new(Arc::new(BrokenStore), "whale_alert");
        assert!(!checkpoint.save(Utc::now()).await);
        tokio_test::assert_err!(checkpoint.restore().await);
    }
}
