//! In-process standings store.
//!
//! A transaction works on a private copy of the store taken at `begin` and
//! records every write it makes. `commit` replays those writes onto a fresh
//! copy of the live state and swaps it in under the lock, so a commit either
//! lands completely or not at all. Dropping a transaction discards it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

use super::repository::{StandingsStore, StoreTransaction};
use crate::tournament::{
    Competitor, CompetitorId, Entrant, MatchRecord, ScoreDelta, TournamentError, TournamentId,
    TournamentInfo, TournamentResult, TournamentState,
};

#[derive(Debug, Clone)]
struct TournamentRow {
    state: TournamentState,
    created_at: DateTime<Utc>,
    closed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
enum Write {
    CreateTournament {
        id: TournamentId,
        at: DateTime<Utc>,
    },
    CloseTournament {
        id: TournamentId,
        at: DateTime<Utc>,
    },
    InsertEntrant(TournamentId, CompetitorId),
    DeleteEntrant(TournamentId, CompetitorId),
    InsertRecord(MatchRecord),
    UpdateEntrantScore(TournamentId, CompetitorId, ScoreDelta),
    CreditCompetitor(CompetitorId, ScoreDelta),
}

#[derive(Debug, Clone, Default)]
struct StoreState {
    competitors: BTreeMap<CompetitorId, Competitor>,
    last_competitor_id: i64,
    tournaments: BTreeMap<TournamentId, TournamentRow>,
    last_tournament_id: TournamentId,
    entrants: BTreeMap<(TournamentId, CompetitorId), Entrant>,
    records: Vec<MatchRecord>,
}

impl StoreState {
    fn apply(&mut self, write: &Write) -> TournamentResult<()> {
        match write {
            Write::CreateTournament { id, at } => {
                if self.tournaments.contains_key(id) {
                    return Err(TournamentError::TransactionFailure(format!(
                        "tournament {id} already exists"
                    )));
                }
                self.tournaments.insert(
                    *id,
                    TournamentRow {
                        state: TournamentState::Running,
                        created_at: *at,
                        closed_at: None,
                    },
                );
                self.last_tournament_id = self.last_tournament_id.max(*id);
            }
            Write::CloseTournament { id, at } => {
                let row = self
                    .tournaments
                    .get_mut(id)
                    .filter(|row| row.state == TournamentState::Running)
                    .ok_or_else(|| TournamentError::tournament_not_found(*id))?;
                row.state = TournamentState::Closed;
                row.closed_at = Some(*at);
            }
            Write::InsertEntrant(tournament_id, competitor_id) => {
                if !self.tournaments.contains_key(tournament_id) {
                    return Err(TournamentError::tournament_not_found(*tournament_id));
                }
                if !self.competitors.contains_key(competitor_id) {
                    return Err(TournamentError::UnknownCompetitor(*competitor_id));
                }
                let key = (*tournament_id, *competitor_id);
                if self.entrants.contains_key(&key) {
                    return Err(TournamentError::InvalidArgument(format!(
                        "competitor {competitor_id} already entered in tournament {tournament_id}"
                    )));
                }
                self.entrants.insert(
                    key,
                    Entrant {
                        tournament_id: *tournament_id,
                        competitor_id: *competitor_id,
                        score: 0.0,
                        matches: 0,
                    },
                );
            }
            Write::DeleteEntrant(tournament_id, competitor_id) => {
                if self
                    .entrants
                    .remove(&(*tournament_id, *competitor_id))
                    .is_none()
                {
                    return Err(TournamentError::NotFound(format!(
                        "entrant {competitor_id} in tournament {tournament_id}"
                    )));
                }
            }
            Write::InsertRecord(record) => {
                if !self.tournaments.contains_key(&record.tournament_id) {
                    return Err(TournamentError::tournament_not_found(record.tournament_id));
                }
                let duplicate = self.records.iter().any(|r| {
                    r.tournament_id == record.tournament_id
                        && r.round == record.round
                        && r.competitor_id == record.competitor_id
                });
                if duplicate {
                    return Err(TournamentError::InvalidArgument(format!(
                        "competitor {} already has a result in round {}",
                        record.competitor_id, record.round
                    )));
                }
                self.records.push(record.clone());
            }
            Write::UpdateEntrantScore(tournament_id, competitor_id, delta) => {
                let entrant = self
                    .entrants
                    .get_mut(&(*tournament_id, *competitor_id))
                    .ok_or(TournamentError::UnknownCompetitor(*competitor_id))?;
                entrant.score += delta.score;
                entrant.matches += delta.matches;
            }
            Write::CreditCompetitor(competitor_id, delta) => {
                let competitor = self
                    .competitors
                    .get_mut(competitor_id)
                    .ok_or(TournamentError::UnknownCompetitor(*competitor_id))?;
                competitor.score += delta.score;
                competitor.matches += delta.matches;
            }
        }
        Ok(())
    }

    fn tournament_info(&self, id: TournamentId, row: &TournamentRow) -> TournamentInfo {
        TournamentInfo {
            id,
            state: row.state,
            entrant_count: self
                .entrants
                .keys()
                .filter(|(tournament_id, _)| *tournament_id == id)
                .count(),
            current_round: self
                .records
                .iter()
                .filter(|r| r.tournament_id == id)
                .map(|r| r.round)
                .max()
                .unwrap_or(0),
            created_at: row.created_at,
            closed_at: row.closed_at,
        }
    }
}

/// In-memory implementation of `StandingsStore`
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<StoreState>>,
    fail_next_commit: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `commit` fail with `TransactionFailure` without applying anything
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    /// Seed a competitor with existing cumulative totals
    pub async fn insert_competitor(&self, name: &str, score: f64, matches: i32) -> CompetitorId {
        let mut state = self.state.lock().await;
        state.last_competitor_id += 1;
        let id = CompetitorId(state.last_competitor_id);
        state.competitors.insert(
            id,
            Competitor {
                id,
                name: name.to_string(),
                score,
                matches,
            },
        );
        id
    }
}

#[async_trait]
impl StandingsStore for MemoryStore {
    async fn register_competitor(&self, name: &str) -> TournamentResult<CompetitorId> {
        Ok(self.insert_competitor(name, 0.0, 0).await)
    }

    async fn delete_competitor(&self, id: CompetitorId) -> TournamentResult<()> {
        let mut state = self.state.lock().await;
        if state.entrants.keys().any(|(_, competitor_id)| *competitor_id == id) {
            return Err(TournamentError::InvalidArgument(format!(
                "competitor {id} is entered in a running tournament"
            )));
        }
        state
            .competitors
            .remove(&id)
            .map(|_| ())
            .ok_or(TournamentError::UnknownCompetitor(id))
    }

    async fn get_competitor(&self, id: CompetitorId) -> TournamentResult<Option<Competitor>> {
        Ok(self.state.lock().await.competitors.get(&id).cloned())
    }

    async fn list_competitors(&self) -> TournamentResult<Vec<Competitor>> {
        let mut competitors: Vec<Competitor> = self
            .state
            .lock()
            .await
            .competitors
            .values()
            .cloned()
            .collect();
        competitors.sort_by(|a, b| b.seed().total_cmp(&a.seed()).then(a.id.cmp(&b.id)));
        Ok(competitors)
    }

    async fn get_tournament(
        &self,
        tournament_id: TournamentId,
    ) -> TournamentResult<Option<TournamentInfo>> {
        let state = self.state.lock().await;
        Ok(state
            .tournaments
            .get(&tournament_id)
            .map(|row| state.tournament_info(tournament_id, row)))
    }

    async fn list_tournaments(&self) -> TournamentResult<Vec<TournamentInfo>> {
        let state = self.state.lock().await;
        Ok(state
            .tournaments
            .iter()
            .rev()
            .map(|(id, row)| state.tournament_info(*id, row))
            .collect())
    }

    async fn list_entrants(
        &self,
        tournament_id: TournamentId,
    ) -> TournamentResult<Vec<CompetitorId>> {
        Ok(self
            .state
            .lock()
            .await
            .entrants
            .keys()
            .filter(|(id, _)| *id == tournament_id)
            .map(|(_, competitor_id)| *competitor_id)
            .collect())
    }

    async fn get_entrant(
        &self,
        tournament_id: TournamentId,
        competitor_id: CompetitorId,
    ) -> TournamentResult<Option<Entrant>> {
        Ok(self
            .state
            .lock()
            .await
            .entrants
            .get(&(tournament_id, competitor_id))
            .cloned())
    }

    async fn get_score_and_seed(
        &self,
        tournament_id: TournamentId,
        competitor_id: CompetitorId,
    ) -> TournamentResult<(f64, f64)> {
        let state = self.state.lock().await;
        let entrant = state
            .entrants
            .get(&(tournament_id, competitor_id))
            .ok_or_else(|| {
                TournamentError::NotFound(format!(
                    "entrant {competitor_id} in tournament {tournament_id}"
                ))
            })?;
        let seed = state
            .competitors
            .get(&competitor_id)
            .map(Competitor::seed)
            .unwrap_or(0.0);

        Ok((entrant.score, seed))
    }

    async fn list_opponents_faced(
        &self,
        tournament_id: TournamentId,
        competitor_id: CompetitorId,
    ) -> TournamentResult<HashSet<CompetitorId>> {
        Ok(self
            .state
            .lock()
            .await
            .records
            .iter()
            .filter(|r| r.tournament_id == tournament_id && r.competitor_id == competitor_id)
            .map(|r| r.opponent_id)
            .collect())
    }

    async fn list_match_records(
        &self,
        tournament_id: TournamentId,
    ) -> TournamentResult<Vec<MatchRecord>> {
        let mut records: Vec<MatchRecord> = self
            .state
            .lock()
            .await
            .records
            .iter()
            .filter(|r| r.tournament_id == tournament_id)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.round);
        Ok(records)
    }

    async fn begin(&self) -> TournamentResult<Box<dyn StoreTransaction>> {
        let view = self.state.lock().await.clone();
        Ok(Box::new(MemoryTransaction {
            state: Arc::clone(&self.state),
            fail_next_commit: Arc::clone(&self.fail_next_commit),
            view,
            writes: Vec::new(),
        }))
    }
}

/// Write transaction over a [`MemoryStore`]
pub struct MemoryTransaction {
    state: Arc<Mutex<StoreState>>,
    fail_next_commit: Arc<AtomicBool>,
    view: StoreState,
    writes: Vec<Write>,
}

impl MemoryTransaction {
    fn stage(&mut self, write: Write) -> TournamentResult<()> {
        self.view.apply(&write)?;
        self.writes.push(write);
        Ok(())
    }
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn create_tournament(&mut self) -> TournamentResult<TournamentId> {
        let id = self.view.last_tournament_id + 1;
        self.stage(Write::CreateTournament { id, at: Utc::now() })?;
        Ok(id)
    }

    async fn close_tournament(&mut self, tournament_id: TournamentId) -> TournamentResult<()> {
        self.stage(Write::CloseTournament {
            id: tournament_id,
            at: Utc::now(),
        })
    }

    async fn insert_entrant(
        &mut self,
        tournament_id: TournamentId,
        competitor_id: CompetitorId,
    ) -> TournamentResult<()> {
        self.stage(Write::InsertEntrant(tournament_id, competitor_id))
    }

    async fn delete_entrant(
        &mut self,
        tournament_id: TournamentId,
        competitor_id: CompetitorId,
    ) -> TournamentResult<()> {
        self.stage(Write::DeleteEntrant(tournament_id, competitor_id))
    }

    async fn insert_match_record(&mut self, record: &MatchRecord) -> TournamentResult<()> {
        self.stage(Write::InsertRecord(record.clone()))
    }

    async fn update_entrant_score(
        &mut self,
        tournament_id: TournamentId,
        competitor_id: CompetitorId,
        delta: ScoreDelta,
    ) -> TournamentResult<()> {
        self.stage(Write::UpdateEntrantScore(tournament_id, competitor_id, delta))
    }

    async fn credit_competitor(
        &mut self,
        competitor_id: CompetitorId,
        delta: ScoreDelta,
    ) -> TournamentResult<()> {
        self.stage(Write::CreditCompetitor(competitor_id, delta))
    }

    async fn commit(self: Box<Self>) -> TournamentResult<()> {
        if self.fail_next_commit.swap(false, Ordering::SeqCst) {
            return Err(TournamentError::TransactionFailure(
                "commit rejected by store".to_string(),
            ));
        }

        let mut live = self.state.lock().await;
        let mut next = live.clone();
        for write in &self.writes {
            next.apply(write)
                .map_err(|e| TournamentError::TransactionFailure(e.to_string()))?;
        }
        *live = next;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> TournamentResult<()> {
        Ok(())
    }
}
