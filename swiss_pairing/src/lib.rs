//! # Swiss Pairing
//!
//! A Swiss-system tournament engine: competitors play a fixed number of rounds,
//! each round pairing competitors of similar standing who have not met yet.
//!
//! The first round is seed-split, pairing the top half of the field by seed
//! score against the bottom half. Every later round is found by a backtracking
//! search for a complete pairing that avoids rematches and gives no competitor
//! a second bye. When no such pairing exists the engine reports
//! [`TournamentError::PairingExhausted`] instead of allowing a rematch.
//!
//! ## Core Modules
//!
//! - [`tournament`]: Models, ranking, eligibility, pairing search, recording and lifecycle
//! - [`db`]: Standings store trait with PostgreSQL and in-memory implementations
//!
//! ## Example
//!
//! ```
//! use swiss_pairing::recommended_rounds;
//!
//! // Eight entrants need three rounds to produce a single unbeaten competitor
//! assert_eq!(recommended_rounds(8), 3);
//! ```

/// Persistence: standings store, connection pool and configuration.
pub mod db;

/// Tournament engine.
pub mod tournament;
pub use tournament::{
    CompetitorId, MatchResult, Pairing, ScoringRules, TournamentError, TournamentId,
    TournamentManager, TournamentResult, recommended_rounds,
};
