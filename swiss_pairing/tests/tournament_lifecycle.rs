//! Integration tests for the tournament lifecycle
//!
//! These tests drive the manager through whole tournaments on the in-memory
//! store: seeding, later-round pairing, exhaustion, byes, rollback and close.

use std::collections::HashSet;
use std::sync::Arc;

use swiss_pairing::db::{MemoryStore, StandingsStore};
use swiss_pairing::tournament::{
    CompetitorId, MatchResult, Pairing, ScoringRules, TournamentError, TournamentManager,
    TournamentState, recommended_rounds,
};

/// Four competitors seeded A:1.0, B:0.75, C:0.5, D:0.25
async fn seeded_four() -> (TournamentManager, MemoryStore, [CompetitorId; 4]) {
    let store = MemoryStore::new();
    let a = store.insert_competitor("A", 4.0, 4).await;
    let b = store.insert_competitor("B", 3.0, 4).await;
    let c = store.insert_competitor("C", 2.0, 4).await;
    let d = store.insert_competitor("D", 1.0, 4).await;
    let manager = TournamentManager::new(Arc::new(store.clone()));
    (manager, store, [a, b, c, d])
}

fn as_pairs(pairings: &[Pairing]) -> Vec<(CompetitorId, CompetitorId)> {
    pairings
        .iter()
        .map(|p| (p.competitor_id, p.opponent_id))
        .collect()
}

fn first_named_wins(pairings: &[Pairing]) -> Vec<MatchResult> {
    pairings
        .iter()
        .map(|p| MatchResult::win(p.competitor_id, p.opponent_id))
        .collect()
}

#[tokio::test]
async fn test_round_one_splits_field_by_seed() {
    let (manager, _, [a, b, c, d]) = seeded_four().await;
    let tournament_id = manager.start_tournament().await.unwrap();

    let pairings = manager.pair_round(tournament_id).await.unwrap();
    assert_eq!(as_pairs(&pairings), vec![(a, c), (b, d)]);
}

#[tokio::test]
async fn test_four_player_tournament_until_exhausted() {
    let (manager, _, [a, b, c, d]) = seeded_four().await;
    let tournament_id = manager.start_tournament().await.unwrap();

    // Round 1: seeds hold
    let round1 = manager.pair_round(tournament_id).await.unwrap();
    manager
        .record_round(tournament_id, 1, &first_named_wins(&round1))
        .await
        .unwrap();

    // Round 2: winners meet, losers meet
    let round2 = manager.pair_round(tournament_id).await.unwrap();
    assert_eq!(as_pairs(&round2), vec![(a, b), (c, d)]);
    manager
        .record_round(tournament_id, 2, &first_named_wins(&round2))
        .await
        .unwrap();

    // Round 3: only unplayed pairs are left
    let round3 = manager.pair_round(tournament_id).await.unwrap();
    assert_eq!(as_pairs(&round3), vec![(a, d), (b, c)]);
    assert_eq!(round3[0].diff, 2.0);
    assert_eq!(round3[1].diff, 0.0);
    manager
        .record_round(
            tournament_id,
            3,
            &[MatchResult::win(a, d), MatchResult::draw(b, c)],
        )
        .await
        .unwrap();
    assert_eq!(manager.current_round(tournament_id).await.unwrap(), 3);

    // Everyone has met everyone
    let exhausted = manager.pair_round(tournament_id).await;
    assert!(matches!(
        exhausted,
        Err(TournamentError::PairingExhausted { round: 4, .. })
    ));

    let ranks = manager.ranks(tournament_id).await.unwrap();
    assert_eq!(ranks[0].competitor_id, a);
    assert_eq!(ranks[0].score, 3.0);
    assert!(ranks.iter().all(|r| r.matches == 3));
}

#[tokio::test]
async fn test_odd_field_rotates_the_bye() {
    let store = MemoryStore::new();
    for (i, name) in ["P1", "P2", "P3", "P4", "P5"].iter().enumerate() {
        store.insert_competitor(name, (5 - i) as f64, 5).await;
    }
    let manager = TournamentManager::new(Arc::new(store.clone()));
    let tournament_id = manager.start_tournament().await.unwrap();

    let mut bye_takers = HashSet::new();
    for round in 1..=recommended_rounds(5) {
        let pairings = manager.pair_round(tournament_id).await.unwrap();
        assert_eq!(pairings.len(), 3);

        let byes: Vec<&Pairing> = pairings.iter().filter(|p| p.is_bye()).collect();
        assert_eq!(byes.len(), 1);
        assert!(bye_takers.insert(byes[0].competitor_id));

        let results: Vec<MatchResult> = pairings
            .iter()
            .map(|p| {
                if p.is_bye() {
                    MatchResult::bye(p.competitor_id)
                } else {
                    MatchResult::win(p.competitor_id, p.opponent_id)
                }
            })
            .collect();
        manager
            .record_round(tournament_id, round, &results)
            .await
            .unwrap();
    }

    assert_eq!(bye_takers.len(), 3);
    let records = store.list_match_records(tournament_id).await.unwrap();
    let bye_records = records.iter().filter(|r| r.opponent_id.is_bye()).count();
    assert_eq!(bye_records, 3);
}

#[tokio::test]
async fn test_failed_round_can_be_retried() {
    let (manager, store, _) = seeded_four().await;
    let tournament_id = manager.start_tournament().await.unwrap();
    let pairings = manager.pair_round(tournament_id).await.unwrap();
    let results = first_named_wins(&pairings);

    store.fail_next_commit();
    let failed = manager.record_round(tournament_id, 1, &results).await;
    let err = failed.unwrap_err();
    assert!(matches!(err, TournamentError::TransactionFailure(_)));
    assert!(err.is_retryable());
    assert_eq!(manager.current_round(tournament_id).await.unwrap(), 0);

    // Nothing was applied, so the same pairing is produced again
    assert_eq!(manager.pair_round(tournament_id).await.unwrap(), pairings);
    manager
        .record_round(tournament_id, 1, &results)
        .await
        .unwrap();
    assert_eq!(manager.current_round(tournament_id).await.unwrap(), 1);
}

#[tokio::test]
async fn test_close_merges_into_seed_scores() {
    let store = MemoryStore::new();
    let manager = TournamentManager::with_rules(Arc::new(store.clone()), ScoringRules::standard());
    let mut ids = Vec::new();
    for name in ["Maria", "Harlan", "Ilse", "Tomasz"] {
        ids.push(manager.register_competitor(name).await.unwrap());
    }

    let tournament_id = manager.start_tournament().await.unwrap();
    for round in 1..=2 {
        let pairings = manager.pair_round(tournament_id).await.unwrap();
        manager
            .record_round(tournament_id, round, &first_named_wins(&pairings))
            .await
            .unwrap();
    }
    manager.close_tournament(tournament_id).await.unwrap();

    let competitors = manager.list_competitors().await.unwrap();
    let total_matches: i32 = competitors.iter().map(|c| c.matches).sum();
    let total_score: f64 = competitors.iter().map(|c| c.score).sum();
    assert_eq!(total_matches, 8);
    assert_eq!(total_score, 4.0);

    // The next tournament seeds from the merged totals
    let best = &competitors[0];
    assert_eq!(best.score, 2.0);
    let next = manager.start_tournament().await.unwrap();
    let opening = manager.pair_round(next).await.unwrap();
    assert_eq!(opening[0].competitor_id, best.id);

    let info = manager.tournament_info(tournament_id).await.unwrap();
    assert_eq!(info.state, TournamentState::Closed);
    assert!(matches!(
        manager.close_tournament(tournament_id).await,
        Err(TournamentError::NotFound(_))
    ));
    assert_eq!(manager.list_tournaments().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_unknown_tournament_and_competitor() {
    let (manager, _, [a, _, _, _]) = seeded_four().await;

    assert!(matches!(
        manager.pair_round(42).await,
        Err(TournamentError::NotFound(_))
    ));

    let tournament_id = manager.start_tournament().await.unwrap();
    assert!(matches!(
        manager
            .report_result(tournament_id, 1, a, CompetitorId(404), false)
            .await,
        Err(TournamentError::UnknownCompetitor(CompetitorId(404)))
    ));
    assert!(matches!(
        manager.remaining_opponents(tournament_id, CompetitorId(404)).await,
        Err(TournamentError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_remaining_opponents_shrink_each_round() {
    let (manager, _, [a, b, c, d]) = seeded_four().await;
    let tournament_id = manager.start_tournament().await.unwrap();

    let before: Vec<CompetitorId> = manager
        .remaining_opponents(tournament_id, a)
        .await
        .unwrap()
        .iter()
        .map(|c| c.opponent_id)
        .collect();
    assert_eq!(before, vec![b, c, d]);

    manager
        .report_result(tournament_id, 1, a, c, false)
        .await
        .unwrap();
    let after: Vec<CompetitorId> = manager
        .remaining_opponents(tournament_id, a)
        .await
        .unwrap()
        .iter()
        .map(|c| c.opponent_id)
        .collect();
    assert_eq!(after, vec![b, d]);
    assert_eq!(manager.tie_break_score(tournament_id, a).await.unwrap(), 0.0);
}
