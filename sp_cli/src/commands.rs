use pico_args::Arguments;
use std::fmt;
use std::str::FromStr;
use swiss_pairing::tournament::{
    CompetitorId, MatchResult, TournamentError, TournamentId, TournamentManager,
};

use crate::simulate::{SimulationConfig, TournamentSummary, simulate};

/// Errors that can occur during argument parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// No subcommand given.
    MissingCommand,
    /// Unrecognized subcommand.
    UnrecognizedCommand(String),
    /// Required positional argument absent.
    MissingArgument(&'static str),
    /// Argument present but not parseable.
    InvalidArgument { name: &'static str, reason: String },
    /// Arguments left over after parsing.
    UnexpectedArguments(Vec<String>),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingCommand => write!(f, "No command given. Run with --help to see commands"),
            Self::UnrecognizedCommand(cmd) => write!(
                f,
                "Unrecognized command '{}'. Run with --help to see commands",
                cmd
            ),
            Self::MissingArgument(name) => write!(f, "Missing argument {}", name),
            Self::InvalidArgument { name, reason } => {
                write!(f, "Invalid value for {}: {}", name, reason)
            }
            Self::UnexpectedArguments(args) => {
                write!(f, "Unexpected arguments: {}", args.join(" "))
            }
        }
    }
}

impl std::error::Error for ParseError {}

/// Operator commands
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Simulate(SimulationConfig),
    Migrate,
    Register {
        names: Vec<String>,
    },
    Competitors,
    Start {
        competitors: Vec<CompetitorId>,
    },
    Pair {
        tournament_id: TournamentId,
    },
    Report {
        tournament_id: TournamentId,
        round: u32,
        winner: CompetitorId,
        loser: CompetitorId,
        draw: bool,
    },
    Bye {
        tournament_id: TournamentId,
        round: u32,
        competitor: CompetitorId,
    },
    Standings {
        tournament_id: TournamentId,
    },
    Ranks {
        tournament_id: TournamentId,
    },
    Close {
        tournament_id: TournamentId,
    },
    Tournaments,
}

/// Parsed command line
#[derive(Debug, Clone, PartialEq)]
pub struct Cli {
    pub command: Command,
    /// Print JSON instead of text
    pub json: bool,
    pub database_url: Option<String>,
}

impl Cli {
    /// Simulations stay in memory unless a database is named explicitly
    pub fn uses_memory_store(&self) -> bool {
        matches!(self.command, Command::Simulate(_)) && self.database_url.is_none()
    }
}

/// Parse the subcommand, its flags and its positional arguments.
///
/// Flags must follow the subcommand; positional arguments are read last.
pub fn parse_args(mut pargs: Arguments) -> Result<Cli, ParseError> {
    let name = pargs
        .subcommand()
        .map_err(|e| invalid("command", e))?
        .ok_or(ParseError::MissingCommand)?;

    let json = pargs.contains("--json");
    let database_url: Option<String> = pargs
        .opt_value_from_str("--db-url")
        .map_err(|e| invalid("--db-url", e))?;

    let command = match name.as_str() {
        "simulate" => {
            let defaults = SimulationConfig::default();
            Command::Simulate(SimulationConfig {
                players: option(&mut pargs, "--players")?.unwrap_or(defaults.players),
                tournaments: option(&mut pargs, "--tournaments")?.unwrap_or(defaults.tournaments),
                rounds: option(&mut pargs, "--rounds")?,
                draw_rate: option(&mut pargs, "--draw-rate")?.unwrap_or(defaults.draw_rate),
                seed: option(&mut pargs, "--seed")?,
            })
        }
        "migrate" => Command::Migrate,
        "register" => {
            let mut names = Vec::new();
            while let Some(name) = pargs
                .opt_free_from_str::<String>()
                .map_err(|e| invalid("NAME", e))?
            {
                names.push(name);
            }
            if names.is_empty() {
                return Err(ParseError::MissingArgument("NAME"));
            }
            Command::Register { names }
        }
        "competitors" => Command::Competitors,
        "start" => {
            let mut competitors = Vec::new();
            while let Some(id) = pargs
                .opt_free_from_str::<i64>()
                .map_err(|e| invalid("COMPETITOR", e))?
            {
                competitors.push(CompetitorId(id));
            }
            Command::Start { competitors }
        }
        "pair" => Command::Pair {
            tournament_id: required(&mut pargs, "TOURNAMENT")?,
        },
        "report" => {
            let draw = pargs.contains("--draw");
            Command::Report {
                tournament_id: required(&mut pargs, "TOURNAMENT")?,
                round: required(&mut pargs, "ROUND")?,
                winner: CompetitorId(required(&mut pargs, "WINNER")?),
                loser: CompetitorId(required(&mut pargs, "LOSER")?),
                draw,
            }
        }
        "bye" => Command::Bye {
            tournament_id: required(&mut pargs, "TOURNAMENT")?,
            round: required(&mut pargs, "ROUND")?,
            competitor: CompetitorId(required(&mut pargs, "COMPETITOR")?),
        },
        "standings" => Command::Standings {
            tournament_id: required(&mut pargs, "TOURNAMENT")?,
        },
        "ranks" => Command::Ranks {
            tournament_id: required(&mut pargs, "TOURNAMENT")?,
        },
        "close" => Command::Close {
            tournament_id: required(&mut pargs, "TOURNAMENT")?,
        },
        "tournaments" => Command::Tournaments,
        _ => return Err(ParseError::UnrecognizedCommand(name)),
    };

    let rest = pargs.finish();
    if !rest.is_empty() {
        return Err(ParseError::UnexpectedArguments(
            rest.iter().map(|s| s.to_string_lossy().into_owned()).collect(),
        ));
    }

    Ok(Cli {
        command,
        json,
        database_url,
    })
}

fn invalid(name: &'static str, err: pico_args::Error) -> ParseError {
    ParseError::InvalidArgument {
        name,
        reason: err.to_string(),
    }
}

fn required<T>(pargs: &mut Arguments, name: &'static str) -> Result<T, ParseError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    pargs
        .opt_free_from_str()
        .map_err(|e| invalid(name, e))?
        .ok_or(ParseError::MissingArgument(name))
}

fn option<T>(pargs: &mut Arguments, flag: &'static str) -> Result<Option<T>, ParseError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    pargs.opt_value_from_str(flag).map_err(|e| invalid(flag, e))
}

/// Execute a command against the manager and print its output
pub async fn run(manager: &TournamentManager, command: Command, json: bool) -> anyhow::Result<()> {
    match command {
        Command::Simulate(config) => {
            let summaries = simulate(manager, &config).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&summaries)?);
            } else {
                for summary in &summaries {
                    print_summary(summary);
                }
            }
        }
        // Handled before a manager exists
        Command::Migrate => {}
        Command::Register { names } => {
            for name in names {
                let id = manager.register_competitor(&name).await?;
                println!("{id}\t{name}");
            }
        }
        Command::Competitors => {
            let competitors = manager.list_competitors().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&competitors)?);
            } else {
                println!("ID\tSEED\tSCORE\tMATCHES\tNAME");
                for c in competitors {
                    println!(
                        "{}\t{:.3}\t{}\t{}\t{}",
                        c.id,
                        c.seed(),
                        c.score,
                        c.matches,
                        c.name
                    );
                }
            }
        }
        Command::Start { competitors } => {
            let tournament_id = if competitors.is_empty() {
                manager.start_tournament().await?
            } else {
                manager.start_tournament_with(&competitors).await?
            };
            println!("{tournament_id}");
        }
        Command::Pair { tournament_id } => {
            let pairings = manager.pair_round(tournament_id).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&pairings)?);
            } else {
                for p in pairings {
                    println!("{}\t{}\t{}", p.competitor_id, p.opponent_id, p.diff);
                }
            }
        }
        Command::Report {
            tournament_id,
            round,
            winner,
            loser,
            draw,
        } => {
            let summary = manager
                .report_result(tournament_id, round, winner, loser, draw)
                .await?;
            if summary.already_recorded > 0 {
                println!("Result already recorded");
            }
        }
        Command::Bye {
            tournament_id,
            round,
            competitor,
        } => {
            manager
                .record_round(tournament_id, round, &[MatchResult::bye(competitor)])
                .await?;
        }
        Command::Standings { tournament_id } => {
            let standings = manager.standings(tournament_id).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&standings)?);
            } else {
                for s in standings {
                    println!("{}\t{}\t{:.3}", s.competitor_id, s.score, s.seed);
                }
            }
        }
        Command::Ranks { tournament_id } => {
            let ranks = manager.ranks(tournament_id).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&ranks)?);
            } else {
                print_ranks(&ranks);
            }
        }
        Command::Close { tournament_id } => {
            manager.close_tournament(tournament_id).await?;
        }
        Command::Tournaments => {
            let tournaments = manager.list_tournaments().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&tournaments)?);
            } else {
                println!("ID\tSTATE\tENTRANTS\tROUND\tCREATED");
                for t in tournaments {
                    println!(
                        "{}\t{}\t{}\t{}\t{}",
                        t.id,
                        t.state.as_str(),
                        t.entrant_count,
                        t.current_round,
                        t.created_at.format("%Y-%m-%d %H:%M")
                    );
                }
            }
        }
    }
    Ok(())
}

/// Operator-facing text for a failed command
pub fn error_message(err: &anyhow::Error) -> String {
    match err.downcast_ref::<TournamentError>() {
        Some(tournament_err) if tournament_err.is_retryable() => {
            format!("{} (retryable)", tournament_err.client_message())
        }
        Some(tournament_err) => tournament_err.client_message(),
        None => format!("{err:#}"),
    }
}

fn print_summary(summary: &TournamentSummary) {
    println!(
        "Tournament {}: {} rounds{}",
        summary.tournament_id,
        summary.rounds_played,
        if summary.exhausted {
            " (stopped, no pairing left)"
        } else {
            ""
        }
    );
    print_ranks(&summary.ranks);
    println!();
}

fn print_ranks(ranks: &[swiss_pairing::tournament::RankEntry]) {
    println!("RANK\tSCORE\tOMW\tSEED\tNAME");
    for r in ranks {
        println!(
            "{}\t{}\t{}\t{:.3}\t{}",
            r.rank, r.score, r.omw, r.seed, r.name
        );
    }
}
