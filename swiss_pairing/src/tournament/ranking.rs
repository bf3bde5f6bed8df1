//! Standings and tie-break statistics.

use std::cmp::Ordering;

use super::errors::TournamentResult;
use super::field::{EntrantSnapshot, FieldSnapshot};
use super::models::{CompetitorId, Standing};

/// Standings order: score descending, seed descending, id ascending
pub fn standings_order(a: &EntrantSnapshot, b: &EntrantSnapshot) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then(b.seed.total_cmp(&a.seed))
        .then(a.id.cmp(&b.id))
}

/// Ordered standings of a field
pub fn standings(field: &FieldSnapshot) -> Vec<Standing> {
    let mut entrants: Vec<&EntrantSnapshot> = field.entrants().iter().collect();
    entrants.sort_by(|a, b| standings_order(a, b));

    entrants
        .into_iter()
        .map(|entrant| Standing {
            competitor_id: entrant.id,
            score: entrant.score,
            seed: entrant.seed,
        })
        .collect()
}

/// Opponents'-match-wins: total tournament score of every real opponent faced
pub fn tie_break_score(
    field: &FieldSnapshot,
    competitor_id: CompetitorId,
) -> TournamentResult<f64> {
    let entrant = field.entrant(competitor_id)?;
    Ok(entrant
        .opponents
        .iter()
        .filter(|id| !id.is_bye())
        .map(|id| field.score_of(*id))
        .sum())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entrant(id: i64, score: f64, seed: f64, opponents: &[i64]) -> EntrantSnapshot {
        let mut snapshot = EntrantSnapshot::new(CompetitorId(id), score, seed);
        snapshot
            .opponents
            .extend(opponents.iter().map(|&o| CompetitorId(o)));
        snapshot
    }

    #[test]
    fn test_standings_order_by_score_then_seed_then_id() {
        let field = FieldSnapshot::new(
            1,
            vec![
                entrant(4, 1.0, 0.2, &[]),
                entrant(3, 2.0, 0.1, &[]),
                entrant(2, 1.0, 0.9, &[]),
                entrant(1, 1.0, 0.2, &[]),
            ],
        );

        let order: Vec<i64> = standings(&field)
            .iter()
            .map(|s| s.competitor_id.0)
            .collect();
        assert_eq!(order, vec![3, 2, 1, 4]);
    }

    #[test]
    fn test_standings_of_empty_field() {
        assert!(standings(&FieldSnapshot::default()).is_empty());
    }

    #[test]
    fn test_tie_break_sums_opponent_scores() {
        let field = FieldSnapshot::new(
            1,
            vec![
                entrant(1, 2.0, 0.0, &[2, 3]),
                entrant(2, 1.0, 0.0, &[1]),
                entrant(3, 0.5, 0.0, &[1]),
            ],
        );

        assert_eq!(tie_break_score(&field, CompetitorId(1)).unwrap(), 1.5);
        assert_eq!(tie_break_score(&field, CompetitorId(2)).unwrap(), 2.0);
    }

    #[test]
    fn test_tie_break_ignores_bye() {
        let field = FieldSnapshot::new(
            1,
            vec![entrant(1, 1.0, 0.0, &[-1, 2]), entrant(2, 3.0, 0.0, &[1])],
        );
        assert_eq!(tie_break_score(&field, CompetitorId(1)).unwrap(), 3.0);
    }

    #[test]
    fn test_tie_break_unknown_competitor() {
        let field = FieldSnapshot::new(1, vec![entrant(1, 1.0, 0.0, &[])]);
        assert!(tie_break_score(&field, CompetitorId(5)).is_err());
    }
}
