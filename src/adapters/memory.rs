use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

use crate::collector::ActivityStore;
use crate::domain::PersistedActivity;
use crate::error::{IngestError, Result};
use crate::persistence::FrontierStore;

/// In-process store for dry runs. Enforces the same hash uniqueness as the
/// PostgreSQL schema; contents are lost on exit.
#[derive(Default)]
pub struct MemoryStore {
    activities: RwLock<BTreeMap<String, PersistedActivity>>,
    frontiers: RwLock<HashMap<String, DateTime<Utc>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.activities.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.activities.read().await.is_empty()
    }

    /// Stored hashes in sorted order
    pub async fn hashes(&self) -> Vec<String> {
        self.activities.read().await.keys().cloned().collect()
    }
}

#[async_trait]
impl ActivityStore for MemoryStore {
    async fn find_by_hash(&self, hash: &str) -> Result<Option<PersistedActivity>> {
        Ok(self.activities.read().await.get(hash).cloned())
    }

    async fn insert(&self, activity: &PersistedActivity) -> Result<()> {
        let mut activities = self.activities.write().await;
        if activities.contains_key(&activity.hash) {
            return Err(IngestError::DuplicateHash(activity.hash.clone()));
        }
        activities.insert(activity.hash.clone(), activity.clone());
        Ok(())
    }

    async fn purge_created_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut activities = self.activities.write().await;
        let before = activities.len();
        activities.retain(|_, a| a.created_at >= cutoff);
        Ok((before - activities.len()) as u64)
    }
}

#[async_trait]
impl FrontierStore for MemoryStore {
    async fn load_frontier(&self, component: &str) -> Result<Option<DateTime<Utc>>> {
        Ok(self.frontiers.read().await.get(component).copied())
    }

    async fn save_frontier(&self, component: &str, frontier: DateTime<Utc>) -> Result<()> {
        self.frontiers
            .write()
            .await
            .insert(component.to_string(), frontier);
        Ok(())
    }
}
