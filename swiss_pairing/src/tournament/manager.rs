//! Tournament manager: competitor registry, tournament lifecycle and rounds.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use super::eligibility::{Candidate, remaining_opponents};
use super::errors::{TournamentError, TournamentResult};
use super::field::FieldSnapshot;
use super::models::{
    Competitor, CompetitorId, Entrant, MatchResult, Pairing, RankEntry, ScoreDelta,
    ScoringRules, Standing, TournamentId, TournamentInfo,
};
use super::pairing::{pair_field, verify_pairing};
use super::ranking::{standings, tie_break_score};
use super::recorder::{RecordSummary, record_round, running_tournament};
use crate::db::{StandingsStore, StoreTransaction};

/// Tournament manager
#[derive(Clone)]
pub struct TournamentManager {
    store: Arc<dyn StandingsStore>,
    rules: ScoringRules,
}

impl TournamentManager {
    /// Create a manager with standard scoring
    pub fn new(store: Arc<dyn StandingsStore>) -> Self {
        Self::with_rules(store, ScoringRules::default())
    }

    pub fn with_rules(store: Arc<dyn StandingsStore>, rules: ScoringRules) -> Self {
        Self { store, rules }
    }

    pub fn rules(&self) -> &ScoringRules {
        &self.rules
    }

    pub fn store(&self) -> &dyn StandingsStore {
        self.store.as_ref()
    }

    /// Register a competitor under a display name
    ///
    /// # Errors
    ///
    /// * `TournamentError::InvalidArgument` - name is blank
    pub async fn register_competitor(&self, name: &str) -> TournamentResult<CompetitorId> {
        let name = name.trim();
        if name.is_empty() {
            return Err(TournamentError::InvalidArgument(
                "competitor name cannot be empty".to_string(),
            ));
        }

        let id = self.store.register_competitor(name).await?;
        log::info!("Registered competitor {} ({})", id, name);
        Ok(id)
    }

    /// Remove a competitor who is not entered in a running tournament
    pub async fn delete_competitor(&self, id: CompetitorId) -> TournamentResult<()> {
        self.store.delete_competitor(id).await?;
        log::info!("Deleted competitor {}", id);
        Ok(())
    }

    pub async fn get_competitor(&self, id: CompetitorId) -> TournamentResult<Competitor> {
        self.store
            .get_competitor(id)
            .await?
            .ok_or(TournamentError::UnknownCompetitor(id))
    }

    /// Registered competitors by seed score
    pub async fn list_competitors(&self) -> TournamentResult<Vec<Competitor>> {
        self.store.list_competitors().await
    }

    pub async fn count_competitors(&self) -> TournamentResult<usize> {
        Ok(self.store.list_competitors().await?.len())
    }

    /// Start a tournament with every registered competitor entered
    pub async fn start_tournament(&self) -> TournamentResult<TournamentId> {
        let ids: Vec<CompetitorId> = self
            .store
            .list_competitors()
            .await?
            .into_iter()
            .map(|c| c.id)
            .collect();
        self.start_tournament_with(&ids).await
    }

    /// Start a tournament with the given competitors entered at zero
    ///
    /// # Errors
    ///
    /// * `TournamentError::UnknownCompetitor` - competitor is not registered
    /// * `TournamentError::InvalidArgument` - competitor listed twice
    pub async fn start_tournament_with(
        &self,
        competitors: &[CompetitorId],
    ) -> TournamentResult<TournamentId> {
        let mut seen = HashSet::with_capacity(competitors.len());
        for &id in competitors {
            if !seen.insert(id) {
                return Err(TournamentError::InvalidArgument(format!(
                    "competitor {id} listed twice"
                )));
            }
            self.get_competitor(id).await?;
        }

        let mut tx = self.store.begin().await?;
        let tournament_id = tx.create_tournament().await?;
        for &id in competitors {
            tx.insert_entrant(tournament_id, id).await?;
        }
        tx.commit().await?;

        log::info!(
            "Started tournament {} with {} entrants",
            tournament_id,
            competitors.len()
        );
        Ok(tournament_id)
    }

    /// Enter a competitor before the first result is recorded
    pub async fn add_entrant(
        &self,
        tournament_id: TournamentId,
        competitor_id: CompetitorId,
    ) -> TournamentResult<()> {
        self.ensure_not_started(tournament_id).await?;
        self.get_competitor(competitor_id).await?;

        if self
            .store
            .get_entrant(tournament_id, competitor_id)
            .await?
            .is_some()
        {
            return Err(TournamentError::InvalidArgument(format!(
                "competitor {competitor_id} already entered in tournament {tournament_id}"
            )));
        }

        let mut tx = self.store.begin().await?;
        tx.insert_entrant(tournament_id, competitor_id).await?;
        tx.commit().await?;

        log::info!(
            "Entered competitor {} in tournament {}",
            competitor_id,
            tournament_id
        );
        Ok(())
    }

    /// Withdraw a competitor before the first result is recorded
    pub async fn remove_entrant(
        &self,
        tournament_id: TournamentId,
        competitor_id: CompetitorId,
    ) -> TournamentResult<()> {
        self.ensure_not_started(tournament_id).await?;
        self.entrant(tournament_id, competitor_id).await?;

        let mut tx = self.store.begin().await?;
        tx.delete_entrant(tournament_id, competitor_id).await?;
        tx.commit().await?;

        log::info!(
            "Withdrew competitor {} from tournament {}",
            competitor_id,
            tournament_id
        );
        Ok(())
    }

    pub async fn count_entrants(&self, tournament_id: TournamentId) -> TournamentResult<usize> {
        running_tournament(self.store.as_ref(), tournament_id).await?;
        Ok(self.store.list_entrants(tournament_id).await?.len())
    }

    /// Pair the next round.
    ///
    /// Nothing is written; the pairing only takes effect once its results are
    /// reported.
    ///
    /// # Errors
    ///
    /// * `TournamentError::NotFound` - tournament unknown or closed
    /// * `TournamentError::InvalidArgument` - the current round still has unreported results
    /// * `TournamentError::PairingExhausted` - every completion needs a rematch or a second bye
    pub async fn pair_round(&self, tournament_id: TournamentId) -> TournamentResult<Vec<Pairing>> {
        let info = running_tournament(self.store.as_ref(), tournament_id).await?;
        let field = FieldSnapshot::load(self.store.as_ref(), tournament_id).await?;

        if info.current_round > 0 {
            let reported = self
                .store
                .list_match_records(tournament_id)
                .await?
                .iter()
                .filter(|r| r.round == info.current_round)
                .count();
            if reported < field.len() {
                return Err(TournamentError::InvalidArgument(format!(
                    "round {} has {} of {} results reported",
                    info.current_round,
                    reported,
                    field.len()
                )));
            }
        }

        let round = info.current_round + 1;
        let pairings = pair_field(&field, round)?;
        debug_assert!(verify_pairing(&field, &pairings).is_ok());

        log::info!(
            "Paired round {} of tournament {}: {} pairings",
            round,
            tournament_id,
            pairings.len()
        );
        Ok(pairings)
    }

    /// Report one match result.
    ///
    /// # Errors
    ///
    /// * `TournamentError::InvalidArgument` - winner and loser are the same competitor
    /// * `TournamentError::UnknownCompetitor` - either side is not an entrant
    pub async fn report_result(
        &self,
        tournament_id: TournamentId,
        round: u32,
        winner: CompetitorId,
        loser: CompetitorId,
        is_draw: bool,
    ) -> TournamentResult<RecordSummary> {
        let result = if is_draw {
            MatchResult::draw(winner, loser)
        } else {
            MatchResult::win(winner, loser)
        };
        self.record_round(tournament_id, round, &[result]).await
    }

    /// Report every result of a round in one transaction
    pub async fn record_round(
        &self,
        tournament_id: TournamentId,
        round: u32,
        results: &[MatchResult],
    ) -> TournamentResult<RecordSummary> {
        record_round(self.store.as_ref(), &self.rules, tournament_id, round, results).await
    }

    /// Current standings
    pub async fn standings(&self, tournament_id: TournamentId) -> TournamentResult<Vec<Standing>> {
        Ok(standings(&self.running_field(tournament_id).await?))
    }

    /// Opponents'-match-wins of one entrant
    pub async fn tie_break_score(
        &self,
        tournament_id: TournamentId,
        competitor_id: CompetitorId,
    ) -> TournamentResult<f64> {
        tie_break_score(&self.running_field(tournament_id).await?, competitor_id)
    }

    /// Entrants the competitor may still be paired against
    pub async fn remaining_opponents(
        &self,
        tournament_id: TournamentId,
        competitor_id: CompetitorId,
    ) -> TournamentResult<Vec<Candidate>> {
        remaining_opponents(&self.running_field(tournament_id).await?, competitor_id)
    }

    /// Display ranks: score, then opponents'-match-wins, then seed, then id
    pub async fn ranks(&self, tournament_id: TournamentId) -> TournamentResult<Vec<RankEntry>> {
        let field = self.running_field(tournament_id).await?;

        let mut rows = Vec::with_capacity(field.len());
        for entrant in field.entrants() {
            let competitor = self.get_competitor(entrant.id).await?;
            let matches = self
                .store
                .get_entrant(tournament_id, entrant.id)
                .await?
                .map_or(0, |e| e.matches);

            rows.push(RankEntry {
                rank: 0,
                competitor_id: entrant.id,
                name: competitor.name,
                score: entrant.score,
                omw: tie_break_score(&field, entrant.id)?,
                seed: entrant.seed,
                matches,
            });
        }

        rows.sort_by(rank_order);
        for (i, row) in rows.iter_mut().enumerate() {
            row.rank = i + 1;
        }
        Ok(rows)
    }

    /// Highest round with a recorded result, 0 before play
    pub async fn current_round(&self, tournament_id: TournamentId) -> TournamentResult<u32> {
        Ok(self.tournament_info(tournament_id).await?.current_round)
    }

    pub async fn tournament_info(
        &self,
        tournament_id: TournamentId,
    ) -> TournamentResult<TournamentInfo> {
        self.store
            .get_tournament(tournament_id)
            .await?
            .ok_or_else(|| TournamentError::tournament_not_found(tournament_id))
    }

    pub async fn list_tournaments(&self) -> TournamentResult<Vec<TournamentInfo>> {
        self.store.list_tournaments().await
    }

    /// Close a tournament: credit every entrant's totals to the competitor,
    /// discard the entrants and mark the tournament closed, in one transaction.
    ///
    /// # Errors
    ///
    /// * `TournamentError::NotFound` - tournament unknown or already closed
    /// * `TournamentError::TransactionFailure` - nothing was merged
    pub async fn close_tournament(&self, tournament_id: TournamentId) -> TournamentResult<()> {
        running_tournament(self.store.as_ref(), tournament_id).await?;

        let mut entrants = Vec::new();
        for id in self.store.list_entrants(tournament_id).await? {
            entrants.push(self.entrant(tournament_id, id).await?);
        }

        let mut tx = self.store.begin().await?;
        if let Err(err) = merge_entrants(tx.as_mut(), tournament_id, &entrants).await {
            log::warn!("Rolling back close of tournament {}: {}", tournament_id, err);
            tx.rollback().await?;
            return Err(TournamentError::TransactionFailure(err.to_string()));
        }
        tx.commit().await?;

        log::info!(
            "Closed tournament {}, merged {} entrants",
            tournament_id,
            entrants.len()
        );
        Ok(())
    }

    async fn running_field(&self, tournament_id: TournamentId) -> TournamentResult<FieldSnapshot> {
        running_tournament(self.store.as_ref(), tournament_id).await?;
        FieldSnapshot::load(self.store.as_ref(), tournament_id).await
    }

    async fn entrant(
        &self,
        tournament_id: TournamentId,
        competitor_id: CompetitorId,
    ) -> TournamentResult<Entrant> {
        self.store
            .get_entrant(tournament_id, competitor_id)
            .await?
            .ok_or(TournamentError::UnknownCompetitor(competitor_id))
    }

    async fn ensure_not_started(&self, tournament_id: TournamentId) -> TournamentResult<()> {
        let info = running_tournament(self.store.as_ref(), tournament_id).await?;
        if info.current_round > 0 {
            return Err(TournamentError::InvalidArgument(format!(
                "tournament {tournament_id} is already in round {}",
                info.current_round
            )));
        }
        Ok(())
    }
}

fn rank_order(a: &RankEntry, b: &RankEntry) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then(b.omw.total_cmp(&a.omw))
        .then(b.seed.total_cmp(&a.seed))
        .then(a.competitor_id.cmp(&b.competitor_id))
}

async fn merge_entrants(
    tx: &mut dyn StoreTransaction,
    tournament_id: TournamentId,
    entrants: &[Entrant],
) -> TournamentResult<()> {
    for entrant in entrants {
        tx.credit_competitor(
            entrant.competitor_id,
            ScoreDelta::new(entrant.score, entrant.matches),
        )
        .await?;
        tx.delete_entrant(tournament_id, entrant.competitor_id)
            .await?;
    }
    tx.close_tournament(tournament_id).await
}
