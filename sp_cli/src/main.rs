//! Operator command line for the Swiss pairing engine.
//!
//! Commands run against the PostgreSQL standings store, except simulations,
//! which run in memory unless a database URL is given.

mod commands;
mod simulate;

use std::sync::Arc;

use anyhow::{Context, Result};
use log::info;
use pico_args::Arguments;
use swiss_pairing::{
    ScoringRules, TournamentManager,
    db::{Database, DatabaseConfig, MemoryStore, StandingsStore},
};

use commands::Command;

const HELP: &str = "\
Run and inspect Swiss-system tournaments

USAGE:
  sp_cli COMMAND [OPTIONS] [ARGS]

COMMANDS:
  simulate                          Play simulated tournaments with random results
  migrate                           Create the standings tables
  register NAME...                  Register competitors
  competitors                       List competitors by seed
  start [COMPETITOR...]             Start a tournament (all competitors when none given)
  pair TOURNAMENT                   Pair the next round
  report TOURNAMENT ROUND WINNER LOSER [--draw]
                                    Report a match result
  bye TOURNAMENT ROUND COMPETITOR   Record a bye
  standings TOURNAMENT              Show standings
  ranks TOURNAMENT                  Show ranks with tie-breaks
  close TOURNAMENT                  Merge results into seed scores and close
  tournaments                       List tournaments

OPTIONS:
  --db-url       URL       Database connection string  [default: env DATABASE_URL]
  --json                   Print JSON output

SIMULATE OPTIONS:
  --players      N         Number of competitors  [default: 16]
  --tournaments  N         Tournaments to play back to back  [default: 1]
  --rounds       N         Rounds per tournament  [default: ceil(log2 players)]
  --draw-rate    P         Probability of a draw  [default: 0.1]
  --seed         N         RNG seed for a reproducible run

FLAGS:
  -h, --help               Print help information

ENVIRONMENT:
  DATABASE_URL             PostgreSQL connection string
  SWISS_SCORING            standard (1 / 0.5 / 0) or soccer (3 / 1 / 0)
  SWISS_WIN_POINTS, SWISS_DRAW_POINTS, SWISS_BYE_POINTS
                           Per-outcome point overrides
  RUST_LOG                 Log filter (e.g., info, swiss_pairing=debug)
";

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let cli = commands::parse_args(pargs)?;

    env_logger::builder().format_target(false).init();

    let store: Arc<dyn StandingsStore> = if cli.uses_memory_store() {
        info!("Using in-memory standings store");
        Arc::new(MemoryStore::new())
    } else {
        let mut config = DatabaseConfig::from_env();
        if let Some(url) = &cli.database_url {
            config = config.with_url(url.as_str());
        }

        let db = Database::connect(&config)
            .await
            .context("Failed to connect to database")?;
        info!("Database connected successfully");

        if cli.command == Command::Migrate {
            db.migrate().await.context("Failed to create tables")?;
            info!("Standings tables ready");
            return Ok(());
        }
        Arc::new(db.standings_store())
    };

    let rules = ScoringRules::from_env();
    info!(
        "Scoring: win {} / draw {} / loss {} / bye {}",
        rules.win, rules.draw, rules.loss, rules.bye
    );

    let manager = TournamentManager::with_rules(store, rules);
    if let Err(err) = commands::run(&manager, cli.command, cli.json).await {
        log::debug!("Command failed: {err:?}");
        eprintln!("Error: {}", commands::error_message(&err));
        std::process::exit(1);
    }
    Ok(())
}
