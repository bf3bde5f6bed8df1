//! Deadlines for standings store round-trips.
//!
//! Every PostgreSQL call made by the standings store runs under one of the
//! [`StoreTimeouts`] deadlines, so a stalled connection surfaces as
//! `TournamentError::Timeout` instead of holding up a round.

use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

/// Default deadline for a single query
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Default deadline for beginning, committing or rolling back a transaction
pub const DEFAULT_TRANSACTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Error type for operations run under a deadline
#[derive(Debug, thiserror::Error)]
pub enum TimeoutError {
    #[error("Store operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type TimeoutResult<T> = Result<T, TimeoutError>;

/// Query and transaction deadlines of a store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreTimeouts {
    pub query: Duration,
    pub transaction: Duration,
}

impl StoreTimeouts {
    /// Run a single query under the query deadline
    ///
    /// # Example
    ///
    /// ```no_run
    /// use swiss_pairing::db::timeouts::StoreTimeouts;
    /// # use sqlx::PgPool;
    /// # async fn example(pool: &PgPool) -> Result<(), Box<dyn std::error::Error>> {
    ///
    /// let row = StoreTimeouts::default()
    ///     .query(
    ///         sqlx::query("SELECT name FROM competitors WHERE id = $1")
    ///             .bind(1_i64)
    ///             .fetch_one(pool),
    ///     )
    ///     .await?;
    ///
    /// # Ok(())
    /// # }
    /// ```
    pub async fn query<F, T>(&self, future: F) -> TimeoutResult<T>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        with_timeout(self.query, future).await
    }

    /// Run a transaction boundary under the transaction deadline
    pub async fn transaction<F, T>(&self, future: F) -> TimeoutResult<T>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        with_timeout(self.transaction, future).await
    }
}

impl Default for StoreTimeouts {
    fn default() -> Self {
        Self {
            query: DEFAULT_QUERY_TIMEOUT,
            transaction: DEFAULT_TRANSACTION_TIMEOUT,
        }
    }
}

/// Run a database future, failing with `TimeoutError::Timeout` once `duration` elapses
pub async fn with_timeout<F, T>(duration: Duration, future: F) -> TimeoutResult<T>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    match timeout(duration, future).await {
        Ok(result) => result.map_err(TimeoutError::Database),
        Err(_) => Err(TimeoutError::Timeout(duration)),
    }
}
