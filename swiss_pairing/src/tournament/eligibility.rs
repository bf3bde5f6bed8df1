//! Opponent eligibility: who a competitor may still be paired against.

use super::errors::TournamentResult;
use super::field::FieldSnapshot;
use super::models::CompetitorId;

/// A possible opponent and how far apart the two stand
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub opponent_id: CompetitorId,
    pub diff: f64,
}

/// Entrants the competitor has not yet faced this tournament, closest
/// standing first; ties go to the higher seed, then the lower id.
///
/// The bye sentinel is never a candidate here.
///
/// # Errors
///
/// * `TournamentError::NotFound` - competitor is not an active entrant
pub fn remaining_opponents(
    field: &FieldSnapshot,
    competitor_id: CompetitorId,
) -> TournamentResult<Vec<Candidate>> {
    let competitor = field.entrant(competitor_id)?;

    let mut eligible: Vec<(Candidate, f64)> = field
        .entrants()
        .iter()
        .filter(|other| other.id != competitor_id && !competitor.has_faced(other.id))
        .map(|other| {
            let candidate = Candidate {
                opponent_id: other.id,
                diff: (competitor.score - other.score).abs(),
            };
            (candidate, other.seed)
        })
        .collect();

    eligible.sort_by(|(a, a_seed), (b, b_seed)| {
        a.diff
            .total_cmp(&b.diff)
            .then(b_seed.total_cmp(a_seed))
            .then(a.opponent_id.cmp(&b.opponent_id))
    });

    Ok(eligible.into_iter().map(|(candidate, _)| candidate).collect())
}
