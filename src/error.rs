use thiserror::Error;

/// Main error type for the ingestion service
#[derive(Error, Debug)]
pub enum IngestError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {}", .0.join("; "))]
    InvalidConfig(Vec<String>),

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Duplicate activity hash: {0}")]
    DuplicateHash(String),

    // Network errors
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Feed request failed: status={status} body={body}")]
    Feed { status: u16, body: String },

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IngestError {
    /// True when the store rejected an insert because the hash already exists.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::DuplicateHash(_))
    }
}

/// Result type alias for IngestError
pub type Result<T> = std::result::Result<T, IngestError>;
