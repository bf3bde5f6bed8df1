//! In-memory snapshot of a tournament field.
//!
//! Ranking, eligibility and the pairing search all run over a [`FieldSnapshot`]
//! loaded once from the store, so no I/O happens while a round is searched.

use std::collections::{HashMap, HashSet};

use super::errors::{TournamentError, TournamentResult};
use super::models::{CompetitorId, TournamentId};
use crate::db::StandingsStore;

/// One entrant's standing data
#[derive(Debug, Clone, PartialEq)]
pub struct EntrantSnapshot {
    pub id: CompetitorId,
    pub score: f64,
    pub seed: f64,
    /// Opponents faced this tournament, including the bye sentinel
    pub opponents: HashSet<CompetitorId>,
}

impl EntrantSnapshot {
    pub fn new(id: CompetitorId, score: f64, seed: f64) -> Self {
        Self {
            id,
            score,
            seed,
            opponents: HashSet::new(),
        }
    }

    pub fn has_faced(&self, opponent: CompetitorId) -> bool {
        self.opponents.contains(&opponent)
    }

    pub fn had_bye(&self) -> bool {
        self.has_faced(CompetitorId::BYE)
    }
}

/// Entrants of one tournament with their scores and match history
#[derive(Debug, Clone, Default)]
pub struct FieldSnapshot {
    pub tournament_id: TournamentId,
    entrants: Vec<EntrantSnapshot>,
    index: HashMap<CompetitorId, usize>,
}

impl FieldSnapshot {
    pub fn new(tournament_id: TournamentId, entrants: Vec<EntrantSnapshot>) -> Self {
        let index = entrants
            .iter()
            .enumerate()
            .map(|(i, entrant)| (entrant.id, i))
            .collect();
        Self {
            tournament_id,
            entrants,
            index,
        }
    }

    /// Load the field through the store's standings queries
    pub async fn load(
        store: &dyn StandingsStore,
        tournament_id: TournamentId,
    ) -> TournamentResult<Self> {
        let ids = store.list_entrants(tournament_id).await?;
        let mut entrants = Vec::with_capacity(ids.len());

        for id in ids {
            let (score, seed) = store.get_score_and_seed(tournament_id, id).await?;
            let opponents = store.list_opponents_faced(tournament_id, id).await?;
            entrants.push(EntrantSnapshot {
                id,
                score,
                seed,
                opponents,
            });
        }

        log::debug!(
            "Loaded field of {} entrants for tournament {}",
            entrants.len(),
            tournament_id
        );
        Ok(Self::new(tournament_id, entrants))
    }

    pub fn entrants(&self) -> &[EntrantSnapshot] {
        &self.entrants
    }

    pub fn len(&self) -> usize {
        self.entrants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entrants.is_empty()
    }

    pub fn get(&self, id: CompetitorId) -> Option<&EntrantSnapshot> {
        self.index.get(&id).map(|&i| &self.entrants[i])
    }

    /// Entrant lookup that fails with `NotFound` for non-entrants
    pub fn entrant(&self, id: CompetitorId) -> TournamentResult<&EntrantSnapshot> {
        self.get(id).ok_or_else(|| {
            TournamentError::NotFound(format!(
                "entrant {id} in tournament {}",
                self.tournament_id
            ))
        })
    }

    pub fn contains(&self, id: CompetitorId) -> bool {
        self.index.contains_key(&id)
    }

    /// Tournament score, 0 for the bye sentinel and unknown ids
    pub fn score_of(&self, id: CompetitorId) -> f64 {
        self.get(id).map_or(0.0, |entrant| entrant.score)
    }

    /// Whether any match has been played in this tournament
    pub fn has_history(&self) -> bool {
        self.entrants.iter().any(|entrant| !entrant.opponents.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MemoryStore, StandingsStore};
    use crate::tournament::models::{MatchRecord, ScoreDelta};

    #[test]
    fn test_lookup_and_history() {
        let mut played = EntrantSnapshot::new(CompetitorId(1), 1.0, 0.5);
        played.opponents.insert(CompetitorId(2));
        let field = FieldSnapshot::new(
            3,
            vec![played, EntrantSnapshot::new(CompetitorId(2), 0.0, 0.25)],
        );

        assert_eq!(field.len(), 2);
        assert!(field.has_history());
        assert_eq!(field.score_of(CompetitorId(1)), 1.0);
        assert_eq!(field.score_of(CompetitorId::BYE), 0.0);
        assert!(field.entrant(CompetitorId(2)).is_ok());
        assert!(matches!(
            field.entrant(CompetitorId(9)),
            Err(TournamentError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_load_from_store() {
        let store = MemoryStore::new();
        let a = store.insert_competitor("A", 3.0, 4).await;
        let b = store.insert_competitor("B", 1.0, 4).await;

        let mut tx = store.begin().await.unwrap();
        let tournament_id = tx.create_tournament().await.unwrap();
        tx.insert_entrant(tournament_id, a).await.unwrap();
        tx.insert_entrant(tournament_id, b).await.unwrap();
        tx.insert_match_record(&MatchRecord {
            tournament_id,
            round: 1,
            competitor_id: a,
            opponent_id: b,
            outcome: 1.0,
        })
        .await
        .unwrap();
        tx.update_entrant_score(tournament_id, a, ScoreDelta::new(1.0, 1))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let field = FieldSnapshot::load(&store, tournament_id).await.unwrap();
        let entrant = field.entrant(a).unwrap();
        assert_eq!(entrant.score, 1.0);
        assert_eq!(entrant.seed, 0.75);
        assert!(entrant.has_faced(b));
        assert!(!entrant.had_bye());
        assert!(field.entrant(b).unwrap().opponents.is_empty());
    }
}
