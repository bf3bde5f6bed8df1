//! Simulated tournaments for exercising the engine end to end.
//!
//! Every simulated competitor gets a hidden strength. A decisive match is won
//! by either side with probability proportional to its strength, so after a
//! first tournament the seed scores start to reflect those strengths.

use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::Serialize;
use std::collections::HashMap;
use swiss_pairing::tournament::{
    CompetitorId, MatchResult, Pairing, RankEntry, TournamentError, TournamentId,
    TournamentManager, TournamentResult, recommended_rounds,
};

/// Simulation settings
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    pub players: usize,
    pub tournaments: usize,
    /// Rounds per tournament, `recommended_rounds` when unset
    pub rounds: Option<u32>,
    /// Probability of a drawn match
    pub draw_rate: f64,
    /// RNG seed for reproducible runs
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            players: 16,
            tournaments: 1,
            rounds: None,
            draw_rate: 0.1,
            seed: None,
        }
    }
}

/// Outcome of one simulated tournament
#[derive(Debug, Clone, Serialize)]
pub struct TournamentSummary {
    pub tournament_id: TournamentId,
    pub rounds_played: u32,
    /// Stopped early because no further round could be paired
    pub exhausted: bool,
    pub ranks: Vec<RankEntry>,
}

/// Register the simulated field and play every configured tournament
pub async fn simulate(
    manager: &TournamentManager,
    config: &SimulationConfig,
) -> TournamentResult<Vec<TournamentSummary>> {
    if config.players < 2 {
        return Err(TournamentError::InvalidArgument(
            "a simulation needs at least two players".to_string(),
        ));
    }
    if !(0.0..=1.0).contains(&config.draw_rate) {
        return Err(TournamentError::InvalidArgument(format!(
            "draw rate {} is not a probability",
            config.draw_rate
        )));
    }

    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let mut ids = Vec::with_capacity(config.players);
    let mut strengths = HashMap::with_capacity(config.players);
    for i in 0..config.players {
        let id = manager
            .register_competitor(&format!("Player {}", i + 1))
            .await?;
        strengths.insert(id, rng.random_range(1.0..10.0));
        ids.push(id);
    }

    let rounds = config
        .rounds
        .unwrap_or_else(|| recommended_rounds(config.players));
    let mut summaries = Vec::with_capacity(config.tournaments);

    for _ in 0..config.tournaments {
        let tournament_id = manager.start_tournament_with(&ids).await?;
        let mut rounds_played = 0;
        let mut exhausted = false;

        for round in 1..=rounds {
            let pairings = match manager.pair_round(tournament_id).await {
                Ok(pairings) => pairings,
                Err(TournamentError::PairingExhausted { .. }) => {
                    log::warn!(
                        "Tournament {} stopped after round {}: no pairing left",
                        tournament_id,
                        rounds_played
                    );
                    exhausted = true;
                    break;
                }
                Err(e) => return Err(e),
            };

            for pairing in &pairings {
                log::debug!(
                    "Round {}: {} vs {} (diff {})",
                    round,
                    pairing.competitor_id,
                    pairing.opponent_id,
                    pairing.diff
                );
            }

            let results: Vec<MatchResult> = pairings
                .iter()
                .map(|p| play(p, &strengths, config.draw_rate, &mut rng))
                .collect();
            manager.record_round(tournament_id, round, &results).await?;
            rounds_played = round;
        }

        let ranks = manager.ranks(tournament_id).await?;
        manager.close_tournament(tournament_id).await?;

        summaries.push(TournamentSummary {
            tournament_id,
            rounds_played,
            exhausted,
            ranks,
        });
    }

    Ok(summaries)
}

fn play(
    pairing: &Pairing,
    strengths: &HashMap<CompetitorId, f64>,
    draw_rate: f64,
    rng: &mut impl Rng,
) -> MatchResult {
    let (a, b) = (pairing.competitor_id, pairing.opponent_id);
    if pairing.is_bye() {
        return MatchResult::bye(if a.is_bye() { b } else { a });
    }
    if rng.random_bool(draw_rate) {
        return MatchResult::draw(a, b);
    }

    let strength_a = strengths.get(&a).copied().unwrap_or(1.0);
    let strength_b = strengths.get(&b).copied().unwrap_or(1.0);
    if rng.random_bool(strength_a / (strength_a + strength_b)) {
        MatchResult::win(a, b)
    } else {
        MatchResult::win(b, a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use swiss_pairing::db::MemoryStore;

    fn manager() -> TournamentManager {
        TournamentManager::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_simulation_plays_every_round() {
        let manager = manager();
        let config = SimulationConfig {
            players: 8,
            tournaments: 2,
            seed: Some(7),
            ..Default::default()
        };

        let summaries = simulate(&manager, &config).await.unwrap();
        assert_eq!(summaries.len(), 2);
        for summary in &summaries {
            assert_eq!(summary.rounds_played, 3);
            assert!(!summary.exhausted);
            assert_eq!(summary.ranks.len(), 8);
        }

        let matches: i32 = manager
            .list_competitors()
            .await
            .unwrap()
            .iter()
            .map(|c| c.matches)
            .sum();
        assert_eq!(matches, 2 * 3 * 8);
    }

    #[tokio::test]
    async fn test_odd_field_simulation() {
        let config = SimulationConfig {
            players: 7,
            draw_rate: 0.0,
            seed: Some(11),
            ..Default::default()
        };

        let summaries = simulate(&manager(), &config).await.unwrap();
        assert_eq!(summaries[0].rounds_played, 3);
        assert!(summaries[0].ranks.iter().all(|r| r.matches == 3));
    }

    #[tokio::test]
    async fn test_same_seed_same_outcome() {
        let config = SimulationConfig {
            players: 10,
            seed: Some(42),
            ..Default::default()
        };

        let first = simulate(&manager(), &config).await.unwrap();
        let second = simulate(&manager(), &config).await.unwrap();
        assert_eq!(first[0].ranks, second[0].ranks);
    }

    #[tokio::test]
    async fn test_running_out_of_pairings_stops_early() {
        let config = SimulationConfig {
            players: 4,
            rounds: Some(5),
            seed: Some(1),
            ..Default::default()
        };

        let summaries = simulate(&manager(), &config).await.unwrap();
        assert!(summaries[0].exhausted);
        assert_eq!(summaries[0].rounds_played, 3);
    }

    #[tokio::test]
    async fn test_invalid_settings_rejected() {
        let too_small = SimulationConfig {
            players: 1,
            ..Default::default()
        };
        assert!(simulate(&manager(), &too_small).await.is_err());

        let bad_rate = SimulationConfig {
            draw_rate: 1.5,
            ..Default::default()
        };
        assert!(simulate(&manager(), &bad_rate).await.is_err());
    }
}
