//! Swiss-system tournaments.
//!
//! This module provides the tournament engine:
//! - Competitor registry and seed scores
//! - Tournament start, entrant administration and close
//! - Standings and opponents'-match-wins tie-breaks
//! - Round pairing without rematches and with at most one bye per competitor
//! - Atomic recording of round results
//!
//! ## Example
//!
//! ```no_run
//! use swiss_pairing::db::MemoryStore;
//! use swiss_pairing::tournament::{MatchResult, TournamentManager};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let manager = TournamentManager::new(Arc::new(MemoryStore::new()));
//!
//!     for name in ["Ada", "Grace", "Edsger", "Barbara"] {
//!         manager.register_competitor(name).await?;
//!     }
//!     let tournament_id = manager.start_tournament().await?;
//!
//!     let pairings = manager.pair_round(tournament_id).await?;
//!     let results: Vec<MatchResult> = pairings
//!         .iter()
//!         .map(|p| MatchResult::win(p.competitor_id, p.opponent_id))
//!         .collect();
//!     manager.record_round(tournament_id, 1, &results).await?;
//!
//!     for rank in manager.ranks(tournament_id).await? {
//!         println!("{}. {} {}", rank.rank, rank.name, rank.score);
//!     }
//!     manager.close_tournament(tournament_id).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod eligibility;
pub mod errors;
pub mod field;
pub mod manager;
pub mod models;
pub mod pairing;
pub mod ranking;
pub mod recorder;

pub use eligibility::Candidate;
pub use errors::{TournamentError, TournamentResult};
pub use field::{EntrantSnapshot, FieldSnapshot};
pub use manager::TournamentManager;
pub use models::{
    Competitor, CompetitorId, Entrant, MatchRecord, MatchResult, Pairing, RankEntry, ScoreDelta,
    ScoringRules, Standing, TournamentId, TournamentInfo, TournamentState, recommended_rounds,
    seed_score,
};
pub use recorder::RecordSummary;
