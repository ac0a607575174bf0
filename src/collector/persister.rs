use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, error, warn};

use super::traits::ActivityStore;
use crate::domain::{IngestFailure, PersistReport, PersistedActivity, TransferRecord};

/// Inserts records whose hash is not stored yet. Failures are per record;
/// one bad insert never aborts the rest of the batch.
pub struct DedupPersister {
    store: Arc<dyn ActivityStore>,
}

impl DedupPersister {
    pub fn new(store: Arc<dyn ActivityStore>) -> Self {
        Self { store }
    }

    pub async fn persist(&self, records: &[TransferRecord]) -> PersistReport {
        self.persist_at(records, Utc::now()).await
    }

    /// Persist with an explicit creation time for new rows
    pub async fn persist_at(
        &self,
        records: &[TransferRecord],
        created_at: DateTime<Utc>,
    ) -> PersistReport {
        let mut report = PersistReport::default();

        for record in records {
            match self.store.find_by_hash(&record.hash).await {
                Ok(Some(_)) => {
                    report.skipped += 1;
                    continue;
                }
                Ok(None) => {}
                Err(e) => {
                    error!("Failed to look up activity {}: {}", record.hash, e);
                    log_record(record);
                    report
                        .failures
                        .push(IngestFailure::persistence(&record.hash, e.to_string()));
                    continue;
                }
            }

            let activity = PersistedActivity::from_record(record, created_at);
            match self.store.insert(&activity).await {
                Ok(()) => {
                    debug!(
                        "Saved {} {} transfer {} (${})",
                        record.amount, record.symbol, record.hash, record.amount_usd
                    );
                    report.inserted += 1;
                }
                Err(e) => {
                    if e.is_duplicate() {
                        warn!("Activity {} was inserted concurrently: {}", record.hash, e);
                    } else {
                        error!("Error saving activity {}: {}", record.hash, e);
                    }
                    log_record(record);
                    report
                        .failures
                        .push(IngestFailure::persistence(&record.hash, e.to_string()));
                }
            }
        }

        report
    }
}

fn log_record(record: &TransferRecord) {
    match serde_json::to_string(record) {
        Ok(json) => error!("Offending record: {}", json),
        Err(_) => error!("Offending record: {:?}", record),
    }
}
