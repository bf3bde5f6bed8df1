//! Match recording.
//!
//! Results are validated against the field and the tournament's match
//! history first, then every record and score update of the batch is written
//! inside one store transaction. A failure while writing rolls the whole batch
//! back.

use std::collections::HashSet;

use super::errors::{TournamentError, TournamentResult};
use super::models::{
    CompetitorId, MatchRecord, MatchResult, ScoreDelta, ScoringRules, TournamentId,
    TournamentInfo, TournamentState,
};
use crate::db::{StandingsStore, StoreTransaction};

/// What a call to [`record_round`] did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordSummary {
    /// Results written by this call
    pub recorded: usize,
    /// Results that were already on record and were skipped
    pub already_recorded: usize,
}

/// The match records a result produces, one per real competitor.
///
/// A decisive result yields the winner's and loser's records, a draw yields two
/// draw records and a bye yields a single record for the competitor taking it.
///
/// # Errors
///
/// * `TournamentError::InvalidArgument` - competitor against itself, the bye
///   winning, or a draw against the bye
pub fn match_sides(
    rules: &ScoringRules,
    tournament_id: TournamentId,
    round: u32,
    result: &MatchResult,
) -> TournamentResult<Vec<MatchRecord>> {
    let MatchResult {
        winner,
        loser,
        is_draw,
    } = *result;

    if winner == loser {
        return Err(TournamentError::InvalidArgument(format!(
            "competitor {winner} cannot play itself"
        )));
    }
    if winner.is_bye() {
        return Err(TournamentError::InvalidArgument(
            "the bye cannot win a match".to_string(),
        ));
    }

    let side = |competitor_id, opponent_id, outcome| MatchRecord {
        tournament_id,
        round,
        competitor_id,
        opponent_id,
        outcome,
    };

    if loser.is_bye() {
        if is_draw {
            return Err(TournamentError::InvalidArgument(format!(
                "competitor {winner} cannot draw against the bye"
            )));
        }
        return Ok(vec![side(winner, loser, rules.bye)]);
    }

    let (winner_points, loser_points) = if is_draw {
        (rules.draw, rules.draw)
    } else {
        (rules.win, rules.loss)
    };
    Ok(vec![
        side(winner, loser, winner_points),
        side(loser, winner, loser_points),
    ])
}

/// Tournament summary, failing for unknown and closed tournaments
pub(crate) async fn running_tournament(
    store: &dyn StandingsStore,
    tournament_id: TournamentId,
) -> TournamentResult<TournamentInfo> {
    store
        .get_tournament(tournament_id)
        .await?
        .filter(|info| info.state == TournamentState::Running)
        .ok_or_else(|| TournamentError::tournament_not_found(tournament_id))
}

/// Record a single match result
pub async fn record_match(
    store: &dyn StandingsStore,
    rules: &ScoringRules,
    tournament_id: TournamentId,
    round: u32,
    result: MatchResult,
) -> TournamentResult<RecordSummary> {
    record_round(store, rules, tournament_id, round, &[result]).await
}

/// Record a batch of results for one round atomically.
///
/// Re-reporting a result exactly as it was recorded is skipped. Results may be
/// reported for any round up to the one after the current round, and the
/// next round opens only once every entrant has a result in the current one.
///
/// # Errors
///
/// * `TournamentError::NotFound` - tournament unknown or closed
/// * `TournamentError::UnknownCompetitor` - competitor is not an entrant
/// * `TournamentError::InvalidArgument` - malformed result, a competitor
///   reported twice, a conflicting earlier result, a rematch, a second bye,
///   or a result for a round that is not open yet
/// * `TournamentError::TransactionFailure` - the store did not apply the batch
pub async fn record_round(
    store: &dyn StandingsStore,
    rules: &ScoringRules,
    tournament_id: TournamentId,
    round: u32,
    results: &[MatchResult],
) -> TournamentResult<RecordSummary> {
    let info = running_tournament(store, tournament_id).await?;
    if round == 0 || round > info.current_round + 1 {
        return Err(TournamentError::InvalidArgument(format!(
            "round {round} is not playable, current round is {}",
            info.current_round
        )));
    }

    let entrants: HashSet<CompetitorId> =
        store.list_entrants(tournament_id).await?.into_iter().collect();
    let history = store.list_match_records(tournament_id).await?;

    if info.current_round > 0 && round == info.current_round + 1 {
        let reported = history
            .iter()
            .filter(|r| r.round == info.current_round)
            .count();
        if reported < entrants.len() {
            return Err(TournamentError::InvalidArgument(format!(
                "round {} has {} of {} results reported",
                info.current_round,
                reported,
                entrants.len()
            )));
        }
    }

    let mut summary = RecordSummary::default();
    let mut pending = Vec::with_capacity(results.len() * 2);
    let mut reported = HashSet::with_capacity(results.len() * 2);

    for result in results {
        let sides = match_sides(rules, tournament_id, round, result)?;
        let mut duplicates = 0;

        for side in &sides {
            let competitor = side.competitor_id;
            if !entrants.contains(&competitor) {
                return Err(TournamentError::UnknownCompetitor(competitor));
            }
            if !reported.insert(competitor) {
                return Err(TournamentError::InvalidArgument(format!(
                    "competitor {competitor} reported twice in round {round}"
                )));
            }

            let earlier = history
                .iter()
                .find(|r| r.round == round && r.competitor_id == competitor);
            if let Some(earlier) = earlier {
                if earlier != side {
                    return Err(TournamentError::InvalidArgument(format!(
                        "competitor {competitor} already has a different result in round {round}"
                    )));
                }
                duplicates += 1;
                continue;
            }

            if side.opponent_id.is_bye() {
                if had_bye(&history, competitor) {
                    return Err(TournamentError::InvalidArgument(format!(
                        "competitor {competitor} already had a bye"
                    )));
                }
            } else if let Some(met) = earlier_meeting(&history, competitor, side.opponent_id) {
                return Err(TournamentError::InvalidArgument(format!(
                    "{competitor} and {} already met in round {met}",
                    side.opponent_id
                )));
            }
        }

        match duplicates {
            0 => {
                pending.extend(sides);
                summary.recorded += 1;
            }
            n if n == sides.len() => summary.already_recorded += 1,
            _ => {
                return Err(TournamentError::InvalidArgument(format!(
                    "result between {} and {} is only partly on record",
                    result.winner, result.loser
                )));
            }
        }
    }

    if pending.is_empty() {
        log::debug!(
            "Nothing new to record for round {} of tournament {}",
            round,
            tournament_id
        );
        return Ok(summary);
    }

    let mut tx = store.begin().await?;
    if let Err(err) = stage(tx.as_mut(), &pending).await {
        log::warn!(
            "Rolling back round {} of tournament {}: {}",
            round,
            tournament_id,
            err
        );
        tx.rollback().await?;
        return Err(TournamentError::TransactionFailure(err.to_string()));
    }
    if let Err(err) = tx.commit().await {
        log::warn!(
            "Round {} of tournament {} was not applied: {}",
            round,
            tournament_id,
            err
        );
        return Err(err);
    }

    log::info!(
        "Recorded {} results for round {} of tournament {}",
        summary.recorded,
        round,
        tournament_id
    );
    Ok(summary)
}

fn had_bye(history: &[MatchRecord], competitor_id: CompetitorId) -> bool {
    history
        .iter()
        .any(|r| r.competitor_id == competitor_id && r.opponent_id.is_bye())
}

fn earlier_meeting(
    history: &[MatchRecord],
    competitor_id: CompetitorId,
    opponent_id: CompetitorId,
) -> Option<u32> {
    history
        .iter()
        .find(|r| r.competitor_id == competitor_id && r.opponent_id == opponent_id)
        .map(|r| r.round)
}

async fn stage(tx: &mut dyn StoreTransaction, sides: &[MatchRecord]) -> TournamentResult<()> {
    for side in sides {
        tx.insert_match_record(side).await?;
        tx.update_entrant_score(
            side.tournament_id,
            side.competitor_id,
            ScoreDelta::new(side.outcome, 1),
        )
        .await?;
    }
    Ok(())
}
