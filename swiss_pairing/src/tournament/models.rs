//! Tournament data models for Swiss-system events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Tournament ID type
pub type TournamentId = i64;

/// Competitor identifier.
///
/// Real competitors carry the positive id assigned by the store. The bye
/// sentinel uses a negative id so it can never collide with a stored row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CompetitorId(pub i64);

impl CompetitorId {
    /// Placeholder opponent awarded to one competitor when the field is odd
    pub const BYE: CompetitorId = CompetitorId(-1);

    pub fn is_bye(self) -> bool {
        self == Self::BYE
    }
}

impl fmt::Display for CompetitorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_bye() {
            write!(f, "BYE")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl From<i64> for CompetitorId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Registered competitor with cumulative totals across closed tournaments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Competitor {
    pub id: CompetitorId,
    pub name: String,
    /// Cumulative score over all closed tournaments
    pub score: f64,
    /// Cumulative matches played over all closed tournaments
    pub matches: i32,
}

impl Competitor {
    /// Seed score: cumulative score per match, 0 before any match
    pub fn seed(&self) -> f64 {
        seed_score(self.score, self.matches)
    }
}

/// Score per match, 0 when no match has been played
pub fn seed_score(score: f64, matches: i32) -> f64 {
    if matches == 0 {
        0.0
    } else {
        score / f64::from(matches)
    }
}

/// A competitor's participation in one tournament
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entrant {
    pub tournament_id: TournamentId,
    pub competitor_id: CompetitorId,
    /// Tournament-local score
    pub score: f64,
    /// Tournament-local match count
    pub matches: i32,
}

/// One side of a played match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub tournament_id: TournamentId,
    pub round: u32,
    pub competitor_id: CompetitorId,
    pub opponent_id: CompetitorId,
    /// Points this side earned from the match
    pub outcome: f64,
}

/// A produced pairing for the next round. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pairing {
    pub competitor_id: CompetitorId,
    pub opponent_id: CompetitorId,
    /// Absolute difference in tournament score
    pub diff: f64,
}

impl Pairing {
    pub fn new(competitor_id: CompetitorId, opponent_id: CompetitorId, diff: f64) -> Self {
        Self {
            competitor_id,
            opponent_id,
            diff,
        }
    }

    pub fn is_bye(&self) -> bool {
        self.competitor_id.is_bye() || self.opponent_id.is_bye()
    }

    pub fn involves(&self, id: CompetitorId) -> bool {
        self.competitor_id == id || self.opponent_id == id
    }
}

/// Change applied to an entrant's tournament-local totals
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreDelta {
    pub score: f64,
    pub matches: i32,
}

impl ScoreDelta {
    pub fn new(score: f64, matches: i32) -> Self {
        Self { score, matches }
    }
}

/// Result of a single match as reported by the operator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub winner: CompetitorId,
    pub loser: CompetitorId,
    pub is_draw: bool,
}

impl MatchResult {
    pub fn win(winner: CompetitorId, loser: CompetitorId) -> Self {
        Self {
            winner,
            loser,
            is_draw: false,
        }
    }

    pub fn draw(a: CompetitorId, b: CompetitorId) -> Self {
        Self {
            winner: a,
            loser: b,
            is_draw: true,
        }
    }

    /// The competitor receives the round's bye
    pub fn bye(competitor: CompetitorId) -> Self {
        Self::win(competitor, CompetitorId::BYE)
    }
}

/// Standings row: tournament score plus the seed used to break ties
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Standing {
    pub competitor_id: CompetitorId,
    pub score: f64,
    pub seed: f64,
}

/// Display rank row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankEntry {
    /// 1-indexed rank
    pub rank: usize,
    pub competitor_id: CompetitorId,
    pub name: String,
    pub score: f64,
    /// Opponents'-match-wins tie-break
    pub omw: f64,
    pub seed: f64,
    pub matches: i32,
}

/// Points awarded per match outcome
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringRules {
    pub win: f64,
    pub draw: f64,
    pub loss: f64,
    /// Points for the competitor receiving a bye
    pub bye: f64,
}

impl ScoringRules {
    /// Standard Swiss scoring: win 1, draw 0.5, loss 0
    pub fn standard() -> Self {
        Self {
            win: 1.0,
            draw: 0.5,
            loss: 0.0,
            bye: 0.0,
        }
    }

    /// Soccer-style scoring: win 3, draw 1, loss 0
    pub fn soccer() -> Self {
        Self {
            win: 3.0,
            draw: 1.0,
            loss: 0.0,
            bye: 0.0,
        }
    }

    /// Load scoring rules from the environment
    ///
    /// Expected environment variables:
    /// - `SWISS_SCORING`: `standard` or `soccer` (default: standard)
    /// - `SWISS_WIN_POINTS`, `SWISS_DRAW_POINTS`, `SWISS_BYE_POINTS`: per-value overrides
    pub fn from_env() -> Self {
        let mut rules = match std::env::var("SWISS_SCORING")
            .unwrap_or_default()
            .to_lowercase()
            .as_str()
        {
            "soccer" => Self::soccer(),
            _ => Self::standard(),
        };

        if let Some(win) = env_points("SWISS_WIN_POINTS") {
            rules.win = win;
        }
        if let Some(draw) = env_points("SWISS_DRAW_POINTS") {
            rules.draw = draw;
        }
        if let Some(bye) = env_points("SWISS_BYE_POINTS") {
            rules.bye = bye;
        }

        rules
    }
}

impl Default for ScoringRules {
    fn default() -> Self {
        Self::standard()
    }
}

fn env_points(var: &str) -> Option<f64> {
    std::env::var(var).ok().and_then(|v| v.parse().ok())
}

/// Tournament state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TournamentState {
    /// Rounds are being paired and played
    Running,
    /// Totals merged into competitors, entrants discarded
    Closed,
}

impl TournamentState {
    pub fn as_str(self) -> &'static str {
        match self {
            TournamentState::Running => "running",
            TournamentState::Closed => "closed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "closed" => TournamentState::Closed,
            _ => TournamentState::Running,
        }
    }
}

/// Tournament information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TournamentInfo {
    pub id: TournamentId,
    pub state: TournamentState,
    /// Active entrants (0 once closed)
    pub entrant_count: usize,
    /// Highest recorded round, 0 before any result
    pub current_round: u32,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

/// Safe number of rounds for a field of `entrants`: ceil(log2 n)
pub fn recommended_rounds(entrants: usize) -> u32 {
    if entrants <= 1 {
        0
    } else {
        (entrants - 1).ilog2() + 1
    }
}
