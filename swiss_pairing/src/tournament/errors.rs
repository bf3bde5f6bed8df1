//! Tournament error types.

use super::models::{CompetitorId, TournamentId};
use crate::db::timeouts::TimeoutError;
use std::time::Duration;
use thiserror::Error;

/// Tournament errors
#[derive(Debug, Error)]
pub enum TournamentError {
    /// Unknown tournament or entrant
    #[error("Not found: {0}")]
    NotFound(String),

    /// Competitor is not registered or not entered in the tournament
    #[error("Unknown competitor: {0}")]
    UnknownCompetitor(CompetitorId),

    /// Malformed request
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// No complete pairing exists without a rematch or a second bye
    #[error("No valid pairing for tournament {tournament_id} round {round}")]
    PairingExhausted {
        tournament_id: TournamentId,
        round: u32,
    },

    /// Store transaction failed and was rolled back
    #[error("Transaction failed: {0}")]
    TransactionFailure(String),

    /// Store operation exceeded its deadline
    #[error("Store operation timed out after {0:?}")]
    Timeout(Duration),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl TournamentError {
    pub fn tournament_not_found(tournament_id: TournamentId) -> Self {
        TournamentError::NotFound(format!("tournament {tournament_id}"))
    }

    /// Message safe to show an operator; database details stay in the log
    pub fn client_message(&self) -> String {
        match self {
            TournamentError::Database(_) => "Internal database error".to_string(),
            TournamentError::TransactionFailure(_) => {
                "Change was not applied, please retry".to_string()
            }
            _ => self.to_string(),
        }
    }

    /// Whether retrying the same request can succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TournamentError::TransactionFailure(_) | TournamentError::Timeout(_)
        )
    }
}

impl From<TimeoutError> for TournamentError {
    fn from(err: TimeoutError) -> Self {
        match err {
            TimeoutError::Timeout(duration) => TournamentError::Timeout(duration),
            TimeoutError::Database(e) => TournamentError::Database(e),
        }
    }
}

/// Result type for tournament operations
pub type TournamentResult<T> = Result<T, TournamentError>;
