//! Standings store trait definitions and the PostgreSQL implementation.
//!
//! The engine depends only on [`StandingsStore`] and [`StoreTransaction`],
//! which keeps the pairing logic testable against an in-memory store and
//! lets callers inject whichever backend they run.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::collections::HashSet;

use super::timeouts::StoreTimeouts;
use crate::tournament::{
    Competitor, CompetitorId, Entrant, MatchRecord, ScoreDelta, TournamentError, TournamentId,
    TournamentInfo, TournamentResult, TournamentState,
};

/// Read side of the standings store plus transaction acquisition
#[async_trait]
pub trait StandingsStore: Send + Sync {
    /// Register a new competitor with zeroed cumulative totals
    async fn register_competitor(&self, name: &str) -> TournamentResult<CompetitorId>;

    /// Delete a competitor
    async fn delete_competitor(&self, id: CompetitorId) -> TournamentResult<()>;

    /// Find competitor by ID
    async fn get_competitor(&self, id: CompetitorId) -> TournamentResult<Option<Competitor>>;

    /// All competitors, ordered by seed score descending then id
    async fn list_competitors(&self) -> TournamentResult<Vec<Competitor>>;

    /// Tournament summary
    async fn get_tournament(
        &self,
        tournament_id: TournamentId,
    ) -> TournamentResult<Option<TournamentInfo>>;

    /// All tournaments, newest first
    async fn list_tournaments(&self) -> TournamentResult<Vec<TournamentInfo>>;

    /// Active entrants of a tournament, ordered by competitor id
    async fn list_entrants(&self, tournament_id: TournamentId)
    -> TournamentResult<Vec<CompetitorId>>;

    /// Entrant row, `None` if the competitor is not entered
    async fn get_entrant(
        &self,
        tournament_id: TournamentId,
        competitor_id: CompetitorId,
    ) -> TournamentResult<Option<Entrant>>;

    /// Tournament score and seed score of an entrant
    ///
    /// # Errors
    ///
    /// * `TournamentError::NotFound` - competitor is not an active entrant
    async fn get_score_and_seed(
        &self,
        tournament_id: TournamentId,
        competitor_id: CompetitorId,
    ) -> TournamentResult<(f64, f64)>;

    /// Everyone the competitor has been paired against this tournament,
    /// including [`CompetitorId::BYE`] if the competitor had a bye
    async fn list_opponents_faced(
        &self,
        tournament_id: TournamentId,
        competitor_id: CompetitorId,
    ) -> TournamentResult<HashSet<CompetitorId>>;

    /// Every match record of the tournament, ordered by round
    async fn list_match_records(
        &self,
        tournament_id: TournamentId,
    ) -> TournamentResult<Vec<MatchRecord>>;

    /// Begin a write transaction
    ///
    /// Dropping the returned transaction without calling `commit` rolls it back.
    async fn begin(&self) -> TournamentResult<Box<dyn StoreTransaction>>;
}

/// Write side of the standings store. All writes are staged until `commit`.
#[async_trait]
pub trait StoreTransaction: Send {
    /// Create a running tournament and return its id
    async fn create_tournament(&mut self) -> TournamentResult<TournamentId>;

    /// Mark a running tournament closed
    async fn close_tournament(&mut self, tournament_id: TournamentId) -> TournamentResult<()>;

    /// Create a zeroed entrant row
    async fn insert_entrant(
        &mut self,
        tournament_id: TournamentId,
        competitor_id: CompetitorId,
    ) -> TournamentResult<()>;

    /// Discard an entrant row
    async fn delete_entrant(
        &mut self,
        tournament_id: TournamentId,
        competitor_id: CompetitorId,
    ) -> TournamentResult<()>;

    async fn insert_match_record(&mut self, record: &MatchRecord) -> TournamentResult<()>;

    /// Add to an entrant's tournament-local score and match count
    async fn update_entrant_score(
        &mut self,
        tournament_id: TournamentId,
        competitor_id: CompetitorId,
        delta: ScoreDelta,
    ) -> TournamentResult<()>;

    /// Add to a competitor's cumulative score and match count
    async fn credit_competitor(
        &mut self,
        competitor_id: CompetitorId,
        delta: ScoreDelta,
    ) -> TournamentResult<()>;

    /// Apply every staged write
    ///
    /// # Errors
    ///
    /// * `TournamentError::TransactionFailure` - nothing was applied
    async fn commit(self: Box<Self>) -> TournamentResult<()>;

    /// Discard every staged write
    async fn rollback(self: Box<Self>) -> TournamentResult<()>;
}

/// PostgreSQL implementation of `StandingsStore`
#[derive(Clone)]
pub struct PgStandingsStore {
    pool: PgPool,
    timeouts: StoreTimeouts,
}

impl PgStandingsStore {
    pub fn new(pool: PgPool) -> Self {
        Self::with_timeouts(pool, StoreTimeouts::default())
    }

    pub fn with_timeouts(pool: PgPool, timeouts: StoreTimeouts) -> Self {
        Self { pool, timeouts }
    }
}

const TOURNAMENT_COLUMNS: &str = r#"
    SELECT t.id, t.state, t.created_at, t.closed_at,
           (SELECT COUNT(*) FROM tournament_entrants e WHERE e.tournament_id = t.id) AS entrant_count,
           (SELECT COALESCE(MAX(m.round), 0) FROM match_records m WHERE m.tournament_id = t.id) AS current_round
    FROM tournaments t
"#;

fn competitor_from_row(row: &PgRow) -> Competitor {
    Competitor {
        id: CompetitorId(row.get("id")),
        name: row.get("name"),
        score: row.get("score"),
        matches: row.get("matches"),
    }
}

fn tournament_from_row(row: &PgRow) -> TournamentInfo {
    let state: String = row.get("state");
    let entrant_count: i64 = row.get("entrant_count");
    let current_round: i32 = row.get("current_round");

    TournamentInfo {
        id: row.get("id"),
        state: TournamentState::parse(&state),
        entrant_count: entrant_count as usize,
        current_round: current_round as u32,
        created_at: row.get::<chrono::NaiveDateTime, _>("created_at").and_utc(),
        closed_at: row
            .get::<Option<chrono::NaiveDateTime>, _>("closed_at")
            .map(|dt| dt.and_utc()),
    }
}

fn record_from_row(row: &PgRow) -> MatchRecord {
    let round: i32 = row.get("round");
    MatchRecord {
        tournament_id: row.get("tournament_id"),
        round: round as u32,
        competitor_id: CompetitorId(row.get("competitor_id")),
        opponent_id: CompetitorId(row.get("opponent_id")),
        outcome: row.get("outcome"),
    }
}

#[async_trait]
impl StandingsStore for PgStandingsStore {
    async fn register_competitor(&self, name: &str) -> TournamentResult<CompetitorId> {
        let row = self
            .timeouts
            .query(
                sqlx::query("INSERT INTO competitors (name) VALUES ($1) RETURNING id")
                    .bind(name)
                    .fetch_one(&self.pool),
            )
            .await?;

        Ok(CompetitorId(row.get("id")))
    }

    async fn delete_competitor(&self, id: CompetitorId) -> TournamentResult<()> {
        let entered = self
            .timeouts
            .query(
                sqlx::query("SELECT 1 FROM tournament_entrants WHERE competitor_id = $1 LIMIT 1")
                    .bind(id.0)
                    .fetch_optional(&self.pool),
            )
            .await?;
        if entered.is_some() {
            return Err(TournamentError::InvalidArgument(format!(
                "competitor {id} is entered in a running tournament"
            )));
        }

        let result = self
            .timeouts
            .query(
                sqlx::query("DELETE FROM competitors WHERE id = $1")
                    .bind(id.0)
                    .execute(&self.pool),
            )
            .await?;

        if result.rows_affected() == 0 {
            return Err(TournamentError::UnknownCompetitor(id));
        }
        Ok(())
    }

    async fn get_competitor(&self, id: CompetitorId) -> TournamentResult<Option<Competitor>> {
        let row = self
            .timeouts
            .query(
                sqlx::query("SELECT id, name, score, matches FROM competitors WHERE id = $1")
                    .bind(id.0)
                    .fetch_optional(&self.pool),
            )
            .await?;

        Ok(row.as_ref().map(competitor_from_row))
    }

    async fn list_competitors(&self) -> TournamentResult<Vec<Competitor>> {
        let rows = self
            .timeouts
            .query(
                sqlx::query(
                    r#"
                    SELECT id, name, score, matches
                    FROM competitors
                    ORDER BY CASE WHEN matches = 0 THEN 0.0::DOUBLE PRECISION
                                  ELSE score / matches END DESC, id
                    "#,
                )
                .fetch_all(&self.pool),
            )
            .await?;

        Ok(rows.iter().map(competitor_from_row).collect())
    }

    async fn get_tournament(
        &self,
        tournament_id: TournamentId,
    ) -> TournamentResult<Option<TournamentInfo>> {
        let sql = format!("{TOURNAMENT_COLUMNS} WHERE t.id = $1");
        let row = self
            .timeouts
            .query(
                sqlx::query(&sql)
                    .bind(tournament_id)
                    .fetch_optional(&self.pool),
            )
            .await?;

        Ok(row.as_ref().map(tournament_from_row))
    }

    async fn list_tournaments(&self) -> TournamentResult<Vec<TournamentInfo>> {
        let sql = format!("{TOURNAMENT_COLUMNS} ORDER BY t.id DESC");
        let rows = self.timeouts.query(sqlx::query(&sql).fetch_all(&self.pool)).await?;

        Ok(rows.iter().map(tournament_from_row).collect())
    }

    async fn list_entrants(
        &self,
        tournament_id: TournamentId,
    ) -> TournamentResult<Vec<CompetitorId>> {
        let rows = self
            .timeouts
            .query(
                sqlx::query(
                    "SELECT competitor_id FROM tournament_entrants WHERE tournament_id = $1 ORDER BY competitor_id",
                )
                .bind(tournament_id)
                .fetch_all(&self.pool),
            )
            .await?;

        Ok(rows
            .iter()
            .map(|row| CompetitorId(row.get("competitor_id")))
            .collect())
    }

    async fn get_entrant(
        &self,
        tournament_id: TournamentId,
        competitor_id: CompetitorId,
    ) -> TournamentResult<Option<Entrant>> {
        let row = self
            .timeouts
            .query(
                sqlx::query(
                    r#"
                    SELECT score, matches
                    FROM tournament_entrants
                    WHERE tournament_id = $1 AND competitor_id = $2
                    "#,
                )
                .bind(tournament_id)
                .bind(competitor_id.0)
                .fetch_optional(&self.pool),
            )
            .await?;

        Ok(row.map(|r| Entrant {
            tournament_id,
            competitor_id,
            score: r.get("score"),
            matches: r.get("matches"),
        }))
    }

    async fn get_score_and_seed(
        &self,
        tournament_id: TournamentId,
        competitor_id: CompetitorId,
    ) -> TournamentResult<(f64, f64)> {
        let row = self
            .timeouts
            .query(
                sqlx::query(
                    r#"
                    SELECT e.score,
                           CASE WHEN c.matches = 0 THEN 0.0::DOUBLE PRECISION
                                ELSE c.score / c.matches END AS seed
                    FROM tournament_entrants e
                    JOIN competitors c ON c.id = e.competitor_id
                    WHERE e.tournament_id = $1 AND e.competitor_id = $2
                    "#,
                )
                .bind(tournament_id)
                .bind(competitor_id.0)
                .fetch_optional(&self.pool),
            )
            .await?
            .ok_or_else(|| {
                TournamentError::NotFound(format!(
                    "entrant {competitor_id} in tournament {tournament_id}"
                ))
            })?;

        Ok((row.get("score"), row.get("seed")))
    }

    async fn list_opponents_faced(
        &self,
        tournament_id: TournamentId,
        competitor_id: CompetitorId,
    ) -> TournamentResult<HashSet<CompetitorId>> {
        let rows = self
            .timeouts
            .query(
                sqlx::query(
                    "SELECT opponent_id FROM match_records WHERE tournament_id = $1 AND competitor_id = $2",
                )
                .bind(tournament_id)
                .bind(competitor_id.0)
                .fetch_all(&self.pool),
            )
            .await?;

        Ok(rows
            .iter()
            .map(|row| CompetitorId(row.get("opponent_id")))
            .collect())
    }

    async fn list_match_records(
        &self,
        tournament_id: TournamentId,
    ) -> TournamentResult<Vec<MatchRecord>> {
        let rows = self
            .timeouts
            .query(
                sqlx::query(
                    r#"
                    SELECT tournament_id, round, competitor_id, opponent_id, outcome
                    FROM match_records
                    WHERE tournament_id = $1
                    ORDER BY round, id
                    "#,
                )
                .bind(tournament_id)
                .fetch_all(&self.pool),
            )
            .await?;

        Ok(rows.iter().map(record_from_row).collect())
    }

    async fn begin(&self) -> TournamentResult<Box<dyn StoreTransaction>> {
        let tx = self.timeouts.transaction(self.pool.begin()).await?;
        Ok(Box::new(PgStoreTransaction {
            tx,
            timeouts: self.timeouts,
        }))
    }
}

/// PostgreSQL write transaction. Rolled back by sqlx when dropped uncommitted.
pub struct PgStoreTransaction {
    tx: Transaction<'static, Postgres>,
    timeouts: StoreTimeouts,
}

#[async_trait]
impl StoreTransaction for PgStoreTransaction {
    async fn create_tournament(&mut self) -> TournamentResult<TournamentId> {
        let row = self
            .timeouts
            .query(
                sqlx::query("INSERT INTO tournaments (state) VALUES ('running') RETURNING id")
                    .fetch_one(&mut *self.tx),
            )
            .await?;

        Ok(row.get("id"))
    }

    async fn close_tournament(&mut self, tournament_id: TournamentId) -> TournamentResult<()> {
        let result = self
            .timeouts
            .query(
                sqlx::query(
                    "UPDATE tournaments SET state = 'closed', closed_at = NOW() WHERE id = $1 AND state = 'running'",
                )
                .bind(tournament_id)
                .execute(&mut *self.tx),
            )
            .await?;

        if result.rows_affected() == 0 {
            return Err(TournamentError::tournament_not_found(tournament_id));
        }
        Ok(())
    }

    async fn insert_entrant(
        &mut self,
        tournament_id: TournamentId,
        competitor_id: CompetitorId,
    ) -> TournamentResult<()> {
        self
            .timeouts
            .query(
                sqlx::query(
                    "INSERT INTO tournament_entrants (tournament_id, competitor_id) VALUES ($1, $2)",
                )
                .bind(tournament_id)
                .bind(competitor_id.0)
                .execute(&mut *self.tx),
            )
            .await?;
        Ok(())
    }

    async fn delete_entrant(
        &mut self,
        tournament_id: TournamentId,
        competitor_id: CompetitorId,
    ) -> TournamentResult<()> {
        let result = self
            .timeouts
            .query(
                sqlx::query(
                    "DELETE FROM tournament_entrants WHERE tournament_id = $1 AND competitor_id = $2",
                )
                .bind(tournament_id)
                .bind(competitor_id.0)
                .execute(&mut *self.tx),
            )
            .await?;

        if result.rows_affected() == 0 {
            return Err(TournamentError::NotFound(format!(
                "entrant {competitor_id} in tournament {tournament_id}"
            )));
        }
        Ok(())
    }

    async fn insert_match_record(&mut self, record: &MatchRecord) -> TournamentResult<()> {
        self
            .timeouts
            .query(
                sqlx::query(
                    r#"
                    INSERT INTO match_records (tournament_id, round, competitor_id, opponent_id, outcome)
                    VALUES ($1, $2, $3, $4, $5)
                    "#,
                )
                .bind(record.tournament_id)
                .bind(record.round as i32)
                .bind(record.competitor_id.0)
                .bind(record.opponent_id.0)
                .bind(record.outcome)
                .execute(&mut *self.tx),
            )
            .await?;
        Ok(())
    }

    async fn update_entrant_score(
        &mut self,
        tournament_id: TournamentId,
        competitor_id: CompetitorId,
        delta: ScoreDelta,
    ) -> TournamentResult<()> {
        let result = self
            .timeouts
            .query(
                sqlx::query(
                    r#"
                    UPDATE tournament_entrants
                    SET score = score + $1, matches = matches + $2
                    WHERE tournament_id = $3 AND competitor_id = $4
                    "#,
                )
                .bind(delta.score)
                .bind(delta.matches)
                .bind(tournament_id)
                .bind(competitor_id.0)
                .execute(&mut *self.tx),
            )
            .await?;

        if result.rows_affected() == 0 {
            return Err(TournamentError::UnknownCompetitor(competitor_id));
        }
        Ok(())
    }

    async fn credit_competitor(
        &mut self,
        competitor_id: CompetitorId,
        delta: ScoreDelta,
    ) -> TournamentResult<()> {
        let result = self
            .timeouts
            .query(
                sqlx::query(
                    "UPDATE competitors SET score = score + $1, matches = matches + $2 WHERE id = $3",
                )
                .bind(delta.score)
                .bind(delta.matches)
                .bind(competitor_id.0)
                .execute(&mut *self.tx),
            )
            .await?;

        if result.rows_affected() == 0 {
            return Err(TournamentError::UnknownCompetitor(competitor_id));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> TournamentResult<()> {
        let Self { tx, timeouts } = *self;
        timeouts
            .transaction(tx.commit())
            .await
            .map_err(|e| TournamentError::TransactionFailure(e.to_string()))
    }

    async fn rollback(self: Box<Self>) -> TournamentResult<()> {
        let Self { tx, timeouts } = *self;
        timeouts.transaction(tx.rollback()).await?;
        Ok(())
    }
}
