//! Persistence for the engine.
//!
//! The engine reaches persistence only through the [`StandingsStore`] trait.
//! [`PgStandingsStore`] backs it with PostgreSQL; [`MemoryStore`] keeps the
//! same transactional semantics in process.

use sqlx::postgres::PgPool;

pub mod config;
pub mod memory;
pub mod repository;
pub mod timeouts;

pub use config::DatabaseConfig;
pub use memory::MemoryStore;
pub use repository::{PgStandingsStore, StandingsStore, StoreTransaction};
pub use timeouts::StoreTimeouts;

/// Schema for the standings store
pub const SCHEMA: &str = include_str!("../../migrations/001_initial_schema.sql");

/// Connected PostgreSQL pool and the deadlines its stores run under
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
    timeouts: StoreTimeouts,
}

impl Database {
    /// Open a pool as described by `config`
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::sync::Arc;
    /// use swiss_pairing::TournamentManager;
    /// use swiss_pairing::db::{Database, DatabaseConfig};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), sqlx::Error> {
    ///     let db = Database::connect(&DatabaseConfig::from_env()).await?;
    ///     db.migrate().await?;
    ///
    ///     let manager = TournamentManager::new(Arc::new(db.standings_store()));
    ///     let tournaments = manager.list_tournaments().await;
    ///     Ok(())
    /// }
    /// ```
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let pool = config
            .pool_options()
            .connect(&config.database_url)
            .await?;

        Ok(Self {
            pool,
            timeouts: config.store_timeouts(),
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Standings store sharing this pool
    pub fn standings_store(&self) -> PgStandingsStore {
        PgStandingsStore::with_timeouts(self.pool.clone(), self.timeouts)
    }

    /// Create the standings tables if they do not exist
    pub async fn migrate(&self) -> Result<(), sqlx::Error> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    /// Round-trip a trivial query
    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Wait for checked-out connections and shut the pool down
    pub async fn close(self) {
        self.pool.close().await;
    }
}
