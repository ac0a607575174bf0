use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{PersistedActivity, TimeWindow, TransferRecord};
use crate::error::Result;

/// Parameters of one feed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedQuery {
    pub min_value: u64,
    pub start: i64,
    pub end: i64,
    pub cursor: Option<String>,
}

impl FeedQuery {
    pub fn for_window(window: &TimeWindow, min_value: u64, cursor: Option<String>) -> Self {
        Self {
            min_value,
            start: window.start_ts(),
            end: window.end_ts(),
            cursor,
        }
    }
}

/// One page of the feed response. Transactions are decoded one by one:
/// entries that do not match `TransferRecord` land in `rejected` and the
/// rest of the page is kept.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawFeedPage")]
pub struct FeedPage {
    /// "success" or "error"
    pub result: String,
    pub cursor: Option<String>,
    pub count: Option<u64>,
    pub transactions: Vec<TransferRecord>,
    #[serde(skip)]
    pub rejected: Vec<RejectedTransaction>,
    pub message: Option<String>,
}

/// A transaction entry that could not be decoded
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedTransaction {
    pub hash: Option<String>,
    pub error: String,
    pub raw: Value,
}

#[derive(Deserialize)]
struct RawFeedPage {
    result: String,
    #[serde(default)]
    cursor: Option<String>,
    #[serde(default)]
    count: Option<u64>,
    #[serde(default)]
    transactions: Vec<Value>,
    #[serde(default)]
    message: Option<String>,
}

impl From<RawFeedPage> for FeedPage {
    fn from(raw: RawFeedPage) -> Self {
        let mut transactions = Vec::with_capacity(raw.transactions.len());
        let mut rejected = Vec::new();

        for value in raw.transactions {
            match TransferRecord::deserialize(&value) {
                Ok(record) => transactions.push(record),
                Err(e) => rejected.push(RejectedTransaction {
                    hash: value.get("hash").and_then(Value::as_str).map(str::to_string),
                    error: e.to_string(),
                    raw: value,
                }),
            }
        }

        Self {
            result: raw.result,
            cursor: raw.cursor,
            count: raw.count,
            transactions,
            rejected,
            message: raw.message,
        }
    }
}

impl FeedPage {
    pub fn success(transactions: Vec<TransferRecord>, cursor: Option<&str>) -> Self {
        Self {
            result: "success".to_string(),
            cursor: cursor.map(str::to_string),
            count: Some(transactions.len() as u64),
            transactions,
            rejected: Vec::new(),
            message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            result: "error".to_string(),
            message: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.result == "success"
    }

    /// The continuation cursor, ignoring empty strings
    pub fn next_cursor(&self) -> Option<&str> {
        self.cursor.as_deref().filter(|c| !c.is_empty())
    }
}

/// Source of paginated transfer records
#[async_trait]
pub trait TransferFeed: Send + Sync {
    /// Fetch a single page. `Ok` pages may still carry a non-success result.
    async fn fetch_page(&self, query: &FeedQuery) -> Result<FeedPage>;
}

/// Durable storage for ingested activities
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ActivityStore: Send + Sync {
    async fn find_by_hash(&self, hash: &str) -> Result<Option<PersistedActivity>>;

    /// Insert a new activity. Fails with `DuplicateHash` if the hash exists.
    async fn insert(&self, activity: &PersistedActivity) -> Result<()>;

    /// Delete activities created before `cutoff`, returning how many were removed
    async fn purge_created_before(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}
