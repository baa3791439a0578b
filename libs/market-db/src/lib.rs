pub mod models;
pub mod schema;
pub mod trading;

use sqlx::{sqlite::SqliteConnectOptions, SqlitePool};
use std::str::FromStr;
use thiserror::Error;
use tracing::info;

// Re-export main types
pub use models::{DbArbCycle, DbFill, DbOrder, DbPosition, DbRebate, QuoteEventAction};
pub use schema::{get_schema_version, initialize_schema};

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database connection error: {0}")]
    ConnectionError(#[from] sqlx::Error),

    #[error("Schema error: {0}")]
    SchemaError(#[from] schema::SchemaError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DatabaseError>;

/// Durable store for the trading core: positions, orders, quote events,
/// fills, rebates, arb cycles, metrics, and the event log. See `trading.rs`
/// for the operations.
pub struct MarketDatabase {
    pool: SqlitePool,
}

impl MarketDatabase {
    /// Create new database connection and initialize schema
    pub async fn new(db_path: &str) -> Result<Self> {
        info!("Connecting to database: {}", db_path);

        let options = SqliteConnectOptions::from_str(db_path)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePool::connect_with(options).await?;

        schema::initialize_schema(&pool).await?;

        info!("Database initialized successfully");

        Ok(Self { pool })
    }

    /// Get database pool reference
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close database connection
    pub async fn close(self) {
        self.pool.close().await;
    }
}
