//! Pairing search.
//!
//! Round 1 uses a seed split: the field sorted by seed is cut in half and the
//! i-th seed of the top half meets the i-th seed of the bottom half.
//!
//! Later rounds run a backtracking search for a perfect matching. The first
//! unpaired competitor in standings order tries its eligible opponents from
//! closest standing outwards; each choice recurses on the rest of the field,
//! and a branch that cannot be completed is abandoned for the next candidate.
//! Every branch receives its own copy of the unpaired set, so a failed branch
//! never leaves removals behind for its siblings.
//!
//! With an odd field the bye sentinel joins the search as the last entrant.
//! It is offered to each competitor without a previous bye as their final
//! candidate, which hands it to the lowest-standing competitor that can take it.

use std::collections::{HashMap, HashSet};

use super::eligibility::{Candidate, remaining_opponents};
use super::errors::{TournamentError, TournamentResult};
use super::field::{EntrantSnapshot, FieldSnapshot};
use super::models::{CompetitorId, Pairing};
use super::ranking::standings_order;

/// Counters describing one backtracking run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SearchStats {
    /// Search nodes visited
    pub nodes: u64,
    /// Candidates abandoned after their branch failed
    pub backtracks: u64,
    /// Deepest recursion level reached
    pub max_depth: usize,
}

/// Pair the next round of a field.
///
/// A field without match history is seed-split; otherwise the backtracking
/// search runs.
///
/// # Errors
///
/// * `TournamentError::PairingExhausted` - no pairing avoids every rematch and second bye
pub fn pair_field(field: &FieldSnapshot, round: u32) -> TournamentResult<Vec<Pairing>> {
    if !field.has_history() {
        let pairings = seed_split(field);
        log::debug!(
            "Seed-split {} entrants of tournament {} into {} pairings",
            field.len(),
            field.tournament_id,
            pairings.len()
        );
        return Ok(pairings);
    }

    let (pairings, stats) = backtrack(field)?;
    match pairings {
        Some(pairings) => {
            log::debug!(
                "Paired round {} of tournament {}: {} nodes, {} backtracks, depth {}",
                round,
                field.tournament_id,
                stats.nodes,
                stats.backtracks,
                stats.max_depth
            );
            Ok(pairings)
        }
        None => {
            log::warn!(
                "No pairing exists for round {} of tournament {} after {} nodes",
                round,
                field.tournament_id,
                stats.nodes
            );
            Err(TournamentError::PairingExhausted {
                tournament_id: field.tournament_id,
                round,
            })
        }
    }
}

/// First-round pairing: top half of the seed order against the bottom half.
///
/// An odd field gets the bye sentinel appended as the lowest seed.
pub fn seed_split(field: &FieldSnapshot) -> Vec<Pairing> {
    let mut seeded: Vec<&EntrantSnapshot> = field.entrants().iter().collect();
    seeded.sort_by(|a, b| b.seed.total_cmp(&a.seed).then(a.id.cmp(&b.id)));

    let mut order: Vec<CompetitorId> = seeded.iter().map(|entrant| entrant.id).collect();
    if order.len() % 2 == 1 {
        order.push(CompetitorId::BYE);
    }

    let half = order.len() / 2;
    let (top, bottom) = order.split_at(half);
    top.iter()
        .zip(bottom)
        .map(|(&a, &b)| Pairing::new(a, b, (field.score_of(a) - field.score_of(b)).abs()))
        .collect()
}

/// Run the backtracking search over a field.
///
/// Returns `None` when no complete pairing exists, together with the search counters.
pub fn backtrack(field: &FieldSnapshot) -> TournamentResult<(Option<Vec<Pairing>>, SearchStats)> {
    let search = PairingSearch::new(field)?;
    let mut stats = SearchStats::default();

    let pairings = search.solve(&search.order, 0, &mut stats).map(|mut pairs| {
        // Pairs accumulate while the recursion unwinds
        pairs.reverse();
        pairs
    });

    Ok((pairings, stats))
}

struct PairingSearch {
    /// Standings order, bye sentinel last
    order: Vec<CompetitorId>,
    /// Eligible opponents per node, preferred first
    candidates: HashMap<CompetitorId, Vec<Candidate>>,
    max_depth: usize,
}

impl PairingSearch {
    fn new(field: &FieldSnapshot) -> TournamentResult<Self> {
        let mut ranked: Vec<&EntrantSnapshot> = field.entrants().iter().collect();
        ranked.sort_by(|a, b| standings_order(a, b));

        let needs_bye = ranked.len() % 2 == 1;
        let mut order: Vec<CompetitorId> = ranked.iter().map(|entrant| entrant.id).collect();
        let mut candidates = HashMap::with_capacity(order.len() + 1);

        for entrant in &ranked {
            let mut eligible = remaining_opponents(field, entrant.id)?;
            if needs_bye && !entrant.had_bye() {
                eligible.push(Candidate {
                    opponent_id: CompetitorId::BYE,
                    diff: entrant.score,
                });
            }
            candidates.insert(entrant.id, eligible);
        }

        if needs_bye {
            let takers: Vec<Candidate> = ranked
                .iter()
                .rev()
                .filter(|entrant| !entrant.had_bye())
                .map(|entrant| Candidate {
                    opponent_id: entrant.id,
                    diff: entrant.score,
                })
                .collect();
            candidates.insert(CompetitorId::BYE, takers);
            order.push(CompetitorId::BYE);
        }

        let max_depth = order.len() / 2;
        Ok(Self {
            order,
            candidates,
            max_depth,
        })
    }

    fn candidates_of(&self, id: CompetitorId) -> &[Candidate] {
        self.candidates.get(&id).map_or(&[], Vec::as_slice)
    }

    /// Someone in `unpaired` has no eligible opponent left in it
    fn has_dead_end(&self, unpaired: &[CompetitorId]) -> bool {
        unpaired.iter().any(|&id| {
            !self
                .candidates_of(id)
                .iter()
                .any(|c| unpaired.contains(&c.opponent_id))
        })
    }

    fn solve(
        &self,
        unpaired: &[CompetitorId],
        depth: usize,
        stats: &mut SearchStats,
    ) -> Option<Vec<Pairing>> {
        stats.nodes += 1;
        stats.max_depth = stats.max_depth.max(depth);
        debug_assert!(depth <= self.max_depth);

        let Some((&first, rest)) = unpaired.split_first() else {
            return Some(Vec::new());
        };

        if self.has_dead_end(unpaired) {
            return None;
        }

        for candidate in self.candidates_of(first) {
            if !rest.contains(&candidate.opponent_id) {
                continue;
            }

            let remaining: Vec<CompetitorId> = rest
                .iter()
                .copied()
                .filter(|&id| id != candidate.opponent_id)
                .collect();

            if let Some(mut pairs) = self.solve(&remaining, depth + 1, stats) {
                pairs.push(Pairing::new(first, candidate.opponent_id, candidate.diff));
                return Some(pairs);
            }
            stats.backtracks += 1;
        }

        None
    }
}

/// Check a round pairing against the field: everyone paired exactly once,
/// no rematch, at most one bye and only for an odd field, no second bye.
pub fn verify_pairing(field: &FieldSnapshot, pairings: &[Pairing]) -> TournamentResult<()> {
    let mut seen = HashSet::with_capacity(field.len());
    let mut byes = 0;

    for pairing in pairings {
        let (a, b) = (pairing.competitor_id, pairing.opponent_id);
        if a == b {
            return Err(TournamentError::InvalidArgument(format!(
                "competitor {a} paired with itself"
            )));
        }

        for id in [a, b] {
            if id.is_bye() {
                byes += 1;
                continue;
            }
            field.entrant(id)?;
            if !seen.insert(id) {
                return Err(TournamentError::InvalidArgument(format!(
                    "competitor {id} paired more than once"
                )));
            }
        }

        let real = if a.is_bye() { b } else { a };
        let other = if a.is_bye() { a } else { b };
        if field.entrant(real)?.has_faced(other) {
            return Err(TournamentError::InvalidArgument(format!(
                "{a} and {b} have already met"
            )));
        }
    }

    if seen.len() != field.len() {
        return Err(TournamentError::InvalidArgument(format!(
            "{} of {} entrants paired",
            seen.len(),
            field.len()
        )));
    }

    let expected_byes = field.len() % 2;
    if byes != expected_byes {
        return Err(TournamentError::InvalidArgument(format!(
            "expected {expected_byes} byes, found {byes}"
        )));
    }

    Ok(())
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

    fn pairs(pairings: &[Pairing]) -> Vec<(i64, i64)> {
        pairings
            .iter()
            .map(|p| (p.competitor_id.0, p.opponent_id.0))
            .collect()
    }

    #[test]
    fn test_round_one_seed_split() {
        // A:1.0, B:0.75, C:0.5, D:0.25
        let field = FieldSnapshot::new(
            1,
            vec![
                entrant(3, 0.0, 0.5, &[]),
                entrant(1, 0.0, 1.0, &[]),
                entrant(4, 0.0, 0.25, &[]),
                entrant(2, 0.0, 0.75, &[]),
            ],
        );

        let pairings = pair_field(&field, 1).unwrap();
        assert_eq!(pairs(&pairings), vec![(1, 3), (2, 4)]);
        assert!(pairings.iter().all(|p| p.diff == 0.0));
        verify_pairing(&field, &pairings).unwrap();
    }

    #[test]
    fn test_round_one_odd_field_gives_bye_to_last_top_seed() {
        let field = FieldSnapshot::new(
            1,
            (1..=5)
                .map(|id| entrant(id, 0.0, 1.0 / id as f64, &[]))
                .collect(),
        );

        let pairings = pair_field(&field, 1).unwrap();
        assert_eq!(pairs(&pairings), vec![(1, 4), (2, 5), (3, -1)]);
        verify_pairing(&field, &pairings).unwrap();
    }

    #[test]
    fn test_round_one_seed_ties_use_id() {
        let field = FieldSnapshot::new(
            1,
            vec![
                entrant(4, 0.0, 0.0, &[]),
                entrant(2, 0.0, 0.0, &[]),
                entrant(3, 0.0, 0.0, &[]),
                entrant(1, 0.0, 0.0, &[]),
            ],
        );
        assert_eq!(pairs(&seed_split(&field)), vec![(1, 3), (2, 4)]);
    }

    #[test]
    fn test_backtracking_avoids_rematch() {
        // Scores [2, 2, 1, 1]; 1 has already played 2
        let field = FieldSnapshot::new(
            1,
            vec![
                entrant(1, 2.0, 0.0, &[2]),
                entrant(2, 2.0, 0.0, &[1]),
                entrant(3, 1.0, 0.0, &[]),
                entrant(4, 1.0, 0.0, &[]),
            ],
        );

        let pairings = pair_field(&field, 2).unwrap();
        verify_pairing(&field, &pairings).unwrap();

        let partner_of_1 = pairings
            .iter()
            .find(|p| p.involves(CompetitorId(1)))
            .map(|p| {
                if p.competitor_id == CompetitorId(1) {
                    p.opponent_id
                } else {
                    p.competitor_id
                }
            })
            .unwrap();
        assert!(partner_of_1 == CompetitorId(3) || partner_of_1 == CompetitorId(4));
        assert!(!pairings.iter().any(|p| p.involves(CompetitorId(1))
            && p.involves(CompetitorId(2))));
    }

    #[test]
    fn test_backtracking_recovers_from_greedy_dead_end() {
        // Greedy takes (1,2) leaving 3 and 4, who already met. The search must
        // back out and find (1,3), (2,4).
        let field = FieldSnapshot::new(
            1,
            vec![
                entrant(1, 2.0, 0.0, &[4]),
                entrant(2, 2.0, 0.0, &[3]),
                entrant(3, 1.0, 0.0, &[4, 2]),
                entrant(4, 1.0, 0.0, &[3, 1]),
            ],
        );

        let (pairings, stats) = backtrack(&field).unwrap();
        let pairings = pairings.unwrap();
        assert_eq!(pairs(&pairings), vec![(1, 3), (2, 4)]);
        verify_pairing(&field, &pairings).unwrap();
        assert!(stats.max_depth <= 2);
    }

    #[test]
    fn test_sibling_branches_see_untouched_unpaired_set() {
        // 2 and 3 can only meet 1 or each other, so the first two choices
        // for 1 fail and the third must still see the full field.
        let field = FieldSnapshot::new(
            1,
            vec![
                entrant(1, 3.0, 0.0, &[]),
                entrant(2, 3.0, 0.0, &[4, 5, 6]),
                entrant(3, 2.0, 0.0, &[4, 5, 6]),
                entrant(4, 2.0, 0.0, &[2, 3]),
                entrant(5, 1.0, 0.0, &[2, 3]),
                entrant(6, 1.0, 0.0, &[2, 3]),
            ],
        );

        let pairings = pair_field(&field, 3).unwrap();
        verify_pairing(&field, &pairings).unwrap();
        assert!(pairings.iter().any(|p| p.involves(CompetitorId(2))
            && p.involves(CompetitorId(3))));
    }

    #[test]
    fn test_exhausted_field_reports_failure() {
        let field = FieldSnapshot::new(
            7,
            vec![
                entrant(1, 3.0, 0.0, &[2, 3, 4]),
                entrant(2, 2.0, 0.0, &[1, 3, 4]),
                entrant(3, 1.0, 0.0, &[1, 2, 4]),
                entrant(4, 0.0, 0.0, &[1, 2, 3]),
            ],
        );

        let result = pair_field(&field, 4);
        assert!(matches!(
            result,
            Err(TournamentError::PairingExhausted {
                tournament_id: 7,
                round: 4
            })
        ));
    }

    #[test]
    fn test_bye_goes_to_lowest_without_previous_bye() {
        let field = FieldSnapshot::new(
            1,
            vec![
                entrant(1, 1.0, 0.0, &[4]),
                entrant(2, 1.0, 0.0, &[5]),
                entrant(3, 1.0, 0.0, &[-1]),
                entrant(4, 0.0, 0.0, &[1]),
                entrant(5, 0.0, 0.0, &[2]),
            ],
        );

        let pairings = pair_field(&field, 2).unwrap();
        verify_pairing(&field, &pairings).unwrap();

        let bye = pairings.iter().find(|p| p.is_bye()).unwrap();
        assert_eq!(bye.competitor_id, CompetitorId(5));
        assert!(!pairings.iter().any(|p| p.is_bye() && p.involves(CompetitorId(3))));
    }

    #[test]
    fn test_second_bye_is_never_awarded() {
        // Everyone has met; 2 and 3 already had a bye. Handing 1 the bye
        // would leave a 2-3 rematch.
        let field = FieldSnapshot::new(
            1,
            vec![
                entrant(1, 1.0, 0.0, &[2, 3]),
                entrant(2, 1.0, 0.0, &[1, 3, -1]),
                entrant(3, 0.0, 0.0, &[1, 2, -1]),
            ],
        );

        assert!(matches!(
            pair_field(&field, 3),
            Err(TournamentError::PairingExhausted { .. })
        ));
    }

    #[test]
    fn test_pairings_follow_standings_order() {
        let field = FieldSnapshot::new(
            1,
            vec![
                entrant(1, 0.0, 0.0, &[2]),
                entrant(2, 1.0, 0.0, &[1]),
                entrant(3, 0.0, 0.0, &[4]),
                entrant(4, 1.0, 0.0, &[3]),
            ],
        );

        let pairings = pair_field(&field, 2).unwrap();
        assert_eq!(pairs(&pairings), vec![(2, 4), (1, 3)]);
    }

    #[test]
    fn test_verify_rejects_rematch_and_omission() {
        let field = FieldSnapshot::new(
            1,
            vec![
                entrant(1, 1.0, 0.0, &[2]),
                entrant(2, 0.0, 0.0, &[1]),
                entrant(3, 0.0, 0.0, &[]),
                entrant(4, 1.0, 0.0, &[]),
            ],
        );

        let rematch = vec![
            Pairing::new(CompetitorId(1), CompetitorId(2), 1.0),
            Pairing::new(CompetitorId(3), CompetitorId(4), 1.0),
        ];
        assert!(verify_pairing(&field, &rematch).is_err());

        let partial = vec![Pairing::new(CompetitorId(1), CompetitorId(3), 1.0)];
        assert!(verify_pairing(&field, &partial).is_err());
    }

    #[test]
    fn test_empty_field_pairs_to_nothing() {
        let field = FieldSnapshot::new(1, Vec::new());
        assert!(pair_field(&field, 1).unwrap().is_empty());
    }
}
