use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub feed: FeedConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub dry_run: DryRunConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    /// REST API base, without the `/transactions` suffix
    #[serde(default = "default_feed_base_url")]
    pub base_url: String,
    /// Whale Alert API key (set via WHALE__FEED__API_KEY)
    #[serde(default)]
    pub api_key: String,
    /// Minimum USD value of transfers to request
    #[serde(default = "default_min_value")]
    pub min_value: u64,
    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_feed_base_url() -> String {
    "https://api.whale-alert.io/v1".to_string()
}

fn default_min_value() -> u64 {
    500_000
}

fn default_request_timeout() -> u64 {
    30
}

fn default_user_agent() -> String {
    concat!("whale-ingest/", env!("CARGO_PKG_VERSION")).to_string()
}

impl FeedConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Upper bound for `schedule.window_minutes` (one day)
pub const MAX_WINDOW_MINUTES: u64 = 24 * 60;

/// Upper bound for `schedule.lookback_minutes` (thirty days)
pub const MAX_LOOKBACK_MINUTES: u64 = 30 * 24 * 60;

/// Timing of the ingestion loop. Defaults track the free Whale Alert plan:
/// one hour of history, 10 minute queries, 10 requests per minute.
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    /// Width of one fetch window
    #[serde(default = "default_window_minutes")]
    pub window_minutes: u64,
    /// How far back a fresh start begins (bounded by feed retention)
    #[serde(default = "default_lookback_minutes")]
    pub lookback_minutes: u64,
    /// Delay before the next tick after a catch-up cycle
    #[serde(default = "default_catch_up_delay")]
    pub catch_up_delay_secs: u64,
    /// Delay before the next tick once caught up
    #[serde(default = "default_steady_delay")]
    pub steady_delay_secs: u64,
    /// Pause between two pages of the same window
    #[serde(default = "default_page_delay")]
    pub page_delay_secs: u64,
    /// Hard cap on requests for a single window
    #[serde(default = "default_max_pages")]
    pub max_pages_per_window: usize,
    /// Resume from the stored frontier checkpoint on startup
    #[serde(default = "default_true")]
    pub resume_from_checkpoint: bool,
}

fn default_window_minutes() -> u64 {
    10
}

fn default_lookback_minutes() -> u64 {
    59
}

fn default_catch_up_delay() -> u64 {
    6
}

fn default_steady_delay() -> u64 {
    20 * 60
}

fn default_page_delay() -> u64 {
    6
}

fn default_max_pages() -> usize {
    500
}

fn default_true() -> bool {
    true
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            window_minutes: default_window_minutes(),
            lookback_minutes: default_lookback_minutes(),
            catch_up_delay_secs: default_catch_up_delay(),
            steady_delay_secs: default_steady_delay(),
            page_delay_secs: default_page_delay(),
            max_pages_per_window: default_max_pages(),
            resume_from_checkpoint: true,
        }
    }
}

impl ScheduleConfig {
    pub fn window_width(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.window_minutes.min(MAX_WINDOW_MINUTES) as i64)
    }

    pub fn lookback(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.lookback_minutes.min(MAX_LOOKBACK_MINUTES) as i64)
    }

    pub fn catch_up_delay(&self) -> Duration {
        Duration::from_secs(self.catch_up_delay_secs)
    }

    pub fn steady_delay(&self) -> Duration {
        Duration::from_secs(self.steady_delay_secs)
    }

    pub fn page_delay(&self) -> Duration {
        Duration::from_secs(self.page_delay_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    #[serde(default)]
    pub url: String,
    /// Maximum connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Days an activity is kept after it was first stored
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
    /// How often expired activities are purged
    #[serde(default = "default_purge_interval")]
    pub purge_interval_secs: u64,
}

fn default_max_connections() -> u32 {
    5
}

fn default_retention_days() -> u32 {
    15
}

fn default_purge_interval() -> u64 {
    3600
}

impl DatabaseConfig {
    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::days(self.retention_days as i64)
    }

    pub fn purge_interval(&self) -> Duration {
        Duration::from_secs(self.purge_interval_secs)
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct DryRunConfig {
    /// Keep activities in memory instead of PostgreSQL
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
    /// Directory for a daily rolling log file
    #[serde(default)]
    pub dir: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl LoggingConfig {
    /// Filter used when `RUST_LOG` is not set
    pub fn filter_directive(&self) -> String {
        let level = if self.level.trim().is_empty() {
            "info"
        } else {
            self.level.trim()
        };
        format!("{},whale_ingest=debug,sqlx=warn", level)
    }
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let env = std::env::var("WHALE_ENV").unwrap_or_else(|_| "development".to_string());
        Self::load_layered(config_dir.as_ref(), &env)
    }

    /// Defaults, then `default.toml`, then the `{env}` file, then `WHALE__*` variables
    fn load_layered(config_dir: &Path, env: &str) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            .set_default("database.max_connections", 5)?
            .set_default("dry_run.enabled", false)?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(File::from(config_dir.join(format!("{}.toml", env))).required(false))
            // Override with environment variables (WHALE__FEED__API_KEY, etc.)
            .add_source(
                Environment::with_prefix("WHALE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.feed.api_key.trim().is_empty() {
            errors.push("feed.api_key must be set".to_string());
        }

        if !self.feed.base_url.starts_with("http://") && !self.feed.base_url.starts_with("https://")
        {
            errors.push(format!(
                "feed.base_url must be an http(s) URL, got {:?}",
                self.feed.base_url
            ));
        }

        if self.schedule.window_minutes == 0 {
            errors.push("schedule.window_minutes must be positive".to_string());
        }

        if self.schedule.window_minutes > MAX_WINDOW_MINUTES {
            errors.push(format!(
                "schedule.window_minutes must be at most {}",
                MAX_WINDOW_MINUTES
            ));
        }

        if self.schedule.lookback_minutes > MAX_LOOKBACK_MINUTES {
            errors.push(format!(
                "schedule.lookback_minutes must be at most {}",
                MAX_LOOKBACK_MINUTES
            ));
        }

        if self.schedule.lookback_minutes <= self.schedule.window_minutes {
            errors.push("schedule.lookback_minutes must exceed schedule.window_minutes".to_string());
        }

        if self.schedule.max_pages_per_window == 0 {
            errors.push("schedule.max_pages_per_window must be positive".to_string());
        }

        if !self.dry_run.enabled && self.database.url.trim().is_empty() {
            errors.push("database.url is required unless dry_run.enabled is set".to_string());
        }

        if self.database.retention_days == 0 {
            errors.push("database.retention_days must be positive".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
