//! Database module providing PostgreSQL connection pooling and utilities.
//!
//! The engine's managers share one pool behind an `Arc`; [`Database`] owns
//! that pool and hands out the shared handle they are constructed with.

use sqlx::PgPool;
use std::sync::Arc;

pub mod config;

pub use config::DatabaseConfig;

/// Database connection pool wrapper
#[derive(Clone)]
pub struct Database {
    pool: Arc<PgPool>,
}

impl Database {
    /// Create a new database connection pool
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use tourney_engine::db::{Database, DatabaseConfig};
    /// use tourney_engine::ledger::LedgerManager;
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), sqlx::Error> {
    ///     let db = Database::new(&DatabaseConfig::from_env()).await?;
    ///     let ledger = LedgerManager::new(db.pool());
    ///     Ok(())
    /// }
    /// ```
    pub async fn new(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let pool = config
            .pool_options()
            .connect(&config.database_url)
            .await?;

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    /// Shared handle to the connection pool; the managers take this directly.
    pub fn pool(&self) -> Arc<PgPool> {
        self.pool.clone()
    }

    /// Check if the database connection is healthy
    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(self.pool.as_ref()).await?;
        Ok(())
    }

    /// Close the database connection pool
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
