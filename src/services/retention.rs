use chrono::{Duration, Utc};
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{error, info};

use crate::collector::ActivityStore;
use crate::error::Result;

/// Expires stored activities a fixed time after they were created.
/// Runs beside the scheduler and never touches the frontier.
pub struct RetentionTask {
    store: Arc<dyn ActivityStore>,
    retention: Duration,
    purge_interval: StdDuration,
}

impl RetentionTask {
    pub fn new(
        store: Arc<dyn ActivityStore>,
        retention: Duration,
        purge_interval: StdDuration,
    ) -> Self {
        Self {
            store,
            retention,
            purge_interval,
        }
    }

    /// Delete everything older than the retention period, once
    pub async fn purge_once(&self) -> Result<u64> {
        let cutoff = Utc::now() - self.retention;
        let removed = self.store.purge_created_before(cutoff).await?;
        if removed > 0 {
            info!("Expired {} activities created before {}", removed, cutoff);
        }
        Ok(removed)
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut timer = interval(self.purge_interval);
            info!(
                "Retention task started (keep {} days, every {}s)",
                self.retention.num_days(),
                self.purge_interval.as_secs()
            );

            loop {
                timer.tick().await;
                if let Err(e) = self.purge_once().await {
                    error!("Retention purge failed: {}", e);
                }
            }
        })
    }
}
