use serde::Serialize;
use std::fmt;

use super::TransferRecord;

/// Where a recovered failure happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Feed returned a non-success status or the request failed
    Transport,
    /// A record could not be decoded, looked up or inserted
    Persistence,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transport => "transport",
            Self::Persistence => "persistence",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A failure that was logged and skipped instead of stopping the loop
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestFailure {
    pub kind: FailureKind,
    /// Hash of the affected record, for persistence failures
    pub hash: Option<String>,
    pub detail: String,
}

impl IngestFailure {
    pub fn transport(detail: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Transport,
            hash: None,
            detail: detail.into(),
        }
    }

    pub fn persistence(hash: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Persistence,
            hash: Some(hash.into()),
            detail: detail.into(),
        }
    }

    /// A feed entry that did not decode into a record
    pub fn malformed(hash: Option<String>, detail: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Persistence,
            hash,
            detail: detail.into(),
        }
    }
}

/// Result of paging through one window
#[derive(Debug, Clone, Default)]
pub struct FetchOutcome {
    pub records: Vec<TransferRecord>,
    /// Requests issued, including failed ones
    pub pages: usize,
    pub failures: Vec<IngestFailure>,
}

/// Result of persisting one batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PersistReport {
    pub inserted: usize,
    /// Already stored, skipped silently
    pub skipped: usize,
    pub failures: Vec<IngestFailure>,
}

/// Everything that happened during one catch-up cycle
#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleReport {
    pub pages: usize,
    pub fetched: usize,
    pub inserted: usize,
    pub skipped: usize,
    pub failures: Vec<IngestFailure>,
}

impl CycleReport {
    pub fn new(fetch: FetchOutcome, persist: PersistReport) -> Self {
        let mut failures = fetch.failures;
        failures.extend(persist.failures);
        Self {
            pages: fetch.pages,
            fetched: fetch.records.len(),
            inserted: persist.inserted,
            skipped: persist.skipped,
            failures,
        }
    }

    pub fn failure_count(&self, kind: FailureKind) -> usize {
        self.failures.iter().filter(|f| f.kind == kind).count()
    }
}
