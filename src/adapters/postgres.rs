use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tracing::{debug, info, instrument};

use crate::collector::ActivityStore;
use crate::domain::PersistedActivity;
use crate::error::{IngestError, Result};
use crate::persistence::FrontierStore;

/// PostgreSQL storage adapter
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new PostgreSQL store
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        info!("Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// Run migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations completed");
        Ok(())
    }

    fn activity_from_row(r: &PgRow) -> PersistedActivity {
        PersistedActivity {
            hash: r.get("hash"),
            blockchain: r.get("blockchain"),
            symbol: r.get("symbol"),
            transaction_type: r.get("transaction_type"),
            timestamp: r.get("timestamp"),
            amount: r.get("amount"),
            amount_usd: r.get("amount_usd"),
            from_address: r.get("from_address"),
            from_owner: r.get("from_owner"),
            from_owner_type: r.get("from_owner_type"),
            to_address: r.get("to_address"),
            to_owner: r.get("to_owner"),
            to_owner_type: r.get("to_owner_type"),
            created_at: r.get("created_at"),
        }
    }
}

#[async_trait]
impl ActivityStore for PostgresStore {
    async fn find_by_hash(&self, hash: &str) -> Result<Option<PersistedActivity>> {
        let row = sqlx::query(
            r#"
            SELECT hash, blockchain, symbol, transaction_type, timestamp, amount, amount_usd,
                   from_address, from_owner, from_owner_type,
                   to_address, to_owner, to_owner_type, created_at
            FROM whale_activities WHERE hash = $1
            "#,
        )
        .bind(hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(Self::activity_from_row))
    }

    #[instrument(skip(self, activity), fields(hash = %activity.hash))]
    async fn insert(&self, activity: &PersistedActivity) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO whale_activities
                (hash, blockchain, symbol, transaction_type, timestamp, amount, amount_usd,
                 from_address, from_owner, from_owner_type,
                 to_address, to_owner, to_owner_type, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(&activity.hash)
        .bind(&activity.blockchain)
        .bind(&activity.symbol)
        .bind(&activity.transaction_type)
        .bind(activity.timestamp)
        .bind(activity.amount)
        .bind(activity.amount_usd)
        .bind(&activity.from_address)
        .bind(&activity.from_owner)
        .bind(&activity.from_owner_type)
        .bind(&activity.to_address)
        .bind(&activity.to_owner)
        .bind(&activity.to_owner_type)
        .bind(activity.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            let duplicate =
                matches!(&e, sqlx::Error::Database(db) if db.is_unique_violation());
            if duplicate {
                IngestError::DuplicateHash(activity.hash.clone())
            } else {
                IngestError::Database(e)
            }
        })?;

        Ok(())
    }

    async fn purge_created_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM whale_activities WHERE created_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        debug!("Purged {} activities created before {}", result.rows_affected(), cutoff);
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl FrontierStore for PostgresStore {
    async fn load_frontier(&self, component: &str) -> Result<Option<DateTime<Utc>>> {
        let row = sqlx::query("SELECT frontier FROM ingest_checkpoints WHERE component = $1")
            .bind(component)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.get("frontier")))
    }

    async fn save_frontier(&self, component: &str, frontier: DateTime<Utc>) -> Result<()> {
        // GREATEST keeps the stored frontier monotonic if two processes race
        sqlx::query(
            r#"
            INSERT INTO ingest_checkpoints (component, frontier, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (component) DO UPDATE SET
                frontier = GREATEST(ingest_checkpoints.frontier, EXCLUDED.frontier),
                updated_at = NOW()
            "#,
        )
        .bind(component)
        .bind(frontier)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
