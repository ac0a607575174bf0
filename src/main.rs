use std::path::Path;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use whale_ingest::adapters::{MemoryStore, PostgresStore, WhaleAlertClient};
use whale_ingest::collector::{ActivityStore, TransferFeed};
use whale_ingest::config::{AppConfig, LoggingConfig};
use whale_ingest::error::{IngestError, Result};
use whale_ingest::persistence::{FrontierCheckpoint, FrontierStore};
use whale_ingest::services::{IngestionScheduler, RetentionTask, FRONTIER_COMPONENT};

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load()?;
    init_logging(&config.logging);

    if let Err(errors) = config.validate() {
        for e in &errors {
            error!("Config: {}", e);
        }
        return Err(IngestError::InvalidConfig(errors));
    }

    let feed: Arc<dyn TransferFeed> = Arc::new(WhaleAlertClient::from_config(&config.feed)?);

    let (store, frontiers): (Arc<dyn ActivityStore>, Arc<dyn FrontierStore>) =
        if config.dry_run.enabled {
            warn!("Dry run: activities are kept in memory only");
            let store = Arc::new(MemoryStore::new());
            (
                store.clone() as Arc<dyn ActivityStore>,
                store as Arc<dyn FrontierStore>,
            )
        } else {
            let store = Arc::new(
                PostgresStore::new(&config.database.url, config.database.max_connections).await?,
            );
            store.migrate().await?;
            (
                store.clone() as Arc<dyn ActivityStore>,
                store as Arc<dyn FrontierStore>,
            )
        };

    let mut scheduler =
        IngestionScheduler::new(&config.schedule, config.feed.min_value, feed, store.clone());
    if config.schedule.resume_from_checkpoint {
        scheduler =
            scheduler.with_checkpoint(FrontierCheckpoint::new(frontiers, FRONTIER_COMPONENT));
    }
    scheduler.restore_frontier(chrono::Utc::now()).await?;

    let retention = RetentionTask::new(
        store,
        config.database.retention(),
        config.database.purge_interval(),
    )
    .spawn();

    info!(
        "Ingesting Whale Alert transfers >= ${} from {}",
        config.feed.min_value, config.feed.base_url
    );

    tokio::select! {
        _ = scheduler.run() => {
            error!("Ingestion scheduler exited unexpectedly");
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    retention.abort();
    info!("Shutdown complete");
    Ok(())
}

fn init_logging(config: &LoggingConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.filter_directive()));

    // `rolling::daily` panics if it can't create the initial log file, so the
    // directory must be known writable first.
    let file_layer = config.dir.as_ref().and_then(|log_dir| {
        if let Err(e) = ensure_writable_dir(Path::new(log_dir)) {
            eprintln!(
                "Warning: Could not write to log directory {} ({}), file logging disabled",
                log_dir, e
            );
            return None;
        }

        let file_appender = tracing_appender::rolling::daily(log_dir, "whale-ingest.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        // The process runs until killed, so the guard lives for its whole lifetime
        Box::leak(Box::new(guard));

        Some(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true),
        )
    });

    let (json_layer, text_layer) = if config.json {
        (
            Some(tracing_subscriber::fmt::layer().json().with_target(true)),
            None,
        )
    } else {
        (
            None,
            Some(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            ),
        )
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .with(file_layer)
        .init();
}

fn ensure_writable_dir(dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    let test_path = dir.join(".whale_write_test");
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&test_path)?;
    let _ = std::fs::remove_file(&test_path);
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => error!("Failed to install SIGTERM handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
