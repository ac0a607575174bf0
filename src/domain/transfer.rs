use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One side of a transfer as reported by the feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub address: String,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub owner_type: Option<String>,
}

impl Endpoint {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            owner: None,
            owner_type: None,
        }
    }

    pub fn with_owner(mut self, owner: impl Into<String>, owner_type: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self.owner_type = Some(owner_type.into());
        self
    }
}

/// A large-value transfer as returned by the Whale Alert feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferRecord {
    /// Globally unique transaction hash, the dedup key
    pub hash: String,
    pub blockchain: String,
    pub symbol: String,
    pub transaction_type: String,
    /// Unix seconds
    pub timestamp: i64,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount_usd: Decimal,
    pub from: Endpoint,
    pub to: Endpoint,
}

/// A stored transfer. Rows are written once and never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedActivity {
    pub hash: String,
    pub blockchain: String,
    pub symbol: String,
    pub transaction_type: String,
    pub timestamp: i64,
    pub amount: Decimal,
    pub amount_usd: Decimal,

    pub from_address: String,
    pub from_owner: Option<String>,
    pub from_owner_type: Option<String>,

    pub to_address: String,
    pub to_owner: Option<String>,
    pub to_owner_type: Option<String>,

    /// Drives store-side retention
    pub created_at: DateTime<Utc>,
}

impl PersistedActivity {
    /// Flatten a feed record into its stored shape. Empty owner strings are stored as NULL.
    pub fn from_record(record: &TransferRecord, created_at: DateTime<Utc>) -> Self {
        Self {
            hash: record.hash.clone(),
            blockchain: record.blockchain.clone(),
            symbol: record.symbol.clone(),
            transaction_type: record.transaction_type.clone(),
            timestamp: record.timestamp,
            amount: record.amount,
            amount_usd: record.amount_usd,
            from_address: record.from.address.clone(),
            from_owner: non_empty(&record.from.owner),
            from_owner_type: non_empty(&record.from.owner_type),
            to_address: record.to.address.clone(),
            to_owner: non_empty(&record.to.owner),
            to_owner_type: non_empty(&record.to.owner_type),
            created_at,
        }
    }

    /// Transfer time as a UTC timestamp
    pub fn transferred_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.timestamp, 0)
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
