//! Command line definition and dispatch.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use quote_core::{
    ComparisonRequest, Config, FetchQuotesRequest, IngestRequest, ListDatesRequest,
    ListSessionsRequest, ListSymbolsRequest, Lookback, SessionQuotesRequest, TimestampMs,
};
use quote_ingestion::Ingestor;
use quote_query::QueryEngine;
use quote_storage::Database;
use serde::Serialize;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "quotectl", version, about = "Bid/ask quote archive")]
pub struct Cli {
    /// Increase logging verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
    /// JSON configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Override storage.db_path
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create or migrate the store
    Init,
    /// Ingest one ZIP archive
    Ingest { archive: PathBuf },
    /// Ingest every archive in a folder
    IngestFolder { folder: PathBuf },
    /// List brokers
    Brokers,
    /// List every broker with its symbols
    BrokersSymbols,
    /// List symbols for a broker
    Symbols {
        #[arg(long)]
        broker: String,
    },
    /// List UTC dates with quotes for a broker/symbol
    Dates {
        #[arg(long)]
        broker: String,
        #[arg(long)]
        symbol: String,
    },
    /// List sessions for a broker/symbol on a date (YYYY-MM-DD)
    Sessions {
        #[arg(long)]
        broker: String,
        #[arg(long)]
        symbol: String,
        #[arg(long)]
        date: NaiveDate,
    },
    /// Fetch quotes by filter
    Quotes {
        #[arg(long)]
        broker: Option<String>,
        #[arg(long)]
        symbol: Option<String>,
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Inclusive lower bound, epoch milliseconds
        #[arg(long)]
        start: Option<TimestampMs>,
        /// Inclusive upper bound, epoch milliseconds
        #[arg(long)]
        end: Option<TimestampMs>,
    },
    /// Show one session and its quotes
    SessionQuotes { session_id: String },
    /// Compare recent quotes of two broker/symbol pairs
    Compare {
        #[arg(long)]
        broker_a: String,
        #[arg(long)]
        symbol_a: String,
        #[arg(long)]
        broker_b: String,
        #[arg(long)]
        symbol_b: String,
        /// Rows per pair
        #[arg(long)]
        limit: Option<usize>,
        /// "all" or a number of hours
        #[arg(long, default_value = "all")]
        lookback: Lookback,
    },
    /// Drop all sessions and quotes
    Reset {
        /// Required confirmation
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Serialize)]
struct SessionQuotesOutput {
    session: quote_core::Session,
    quotes: Vec<quote_core::QuoteRecord>,
}

/// Load configuration, applying command line overrides.
pub fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_json_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(db) = &cli.db {
        config.storage.db_path = db.clone();
    }
    config.validate()?;
    Ok(config)
}

pub fn run(cli: Cli) -> Result<ExitCode> {
    let config = load_config(&cli)?;
    let database = Database::new(config.storage.clone());

    if let Command::Reset { yes } = cli.command {
        if !yes {
            anyhow::bail!("reset drops every session and quote; pass --yes to confirm");
        }
        database.reset().context("reset failed")?;
        warn!(path = %database.path().display(), "Store reset");
        return Ok(ExitCode::SUCCESS);
    }

    database
        .migrate()
        .with_context(|| format!("cannot prepare store {}", database.path().display()))?;

    match cli.command {
        Command::Init => {
            info!(path = %database.path().display(), "Store initialized");
            Ok(ExitCode::SUCCESS)
        }
        Command::Ingest { archive } => {
            let ingestor = Ingestor::new(database, config.ingestion);
            let response = ingestor.ingest_one(&IngestRequest { archive_path: archive });
            print_json(&response)?;
            Ok(if response.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::IngestFolder { folder } => {
            let ingestor = Ingestor::new(database, config.ingestion);
            let outcome = ingestor.ingest_folder(&folder)?;
            print_json(&outcome)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Reset { .. } => Ok(ExitCode::SUCCESS),
        query => {
            let store = database.acquire()?;
            let engine = QueryEngine::new(&store, config.query);
            run_query(&engine, query)
        }
    }
}

fn run_query(engine: &QueryEngine<'_>, command: Command) -> Result<ExitCode> {
    match command {
        Command::Brokers => print_json(&engine.list_brokers()?)?,
        Command::BrokersSymbols => print_json(&engine.list_brokers_with_symbols()?)?,
        Command::Symbols { broker } => {
            print_json(&engine.list_symbols(&ListSymbolsRequest { broker })?)?
        }
        Command::Dates { broker, symbol } => {
            print_json(&engine.list_dates(&ListDatesRequest { broker, symbol })?)?
        }
        Command::Sessions {
            broker,
            symbol,
            date,
        } => print_json(&engine.list_sessions(&ListSessionsRequest {
            broker,
            symbol,
            date,
        })?)?,
        Command::Quotes {
            broker,
            symbol,
            date,
            start,
            end,
        } => print_json(&engine.fetch_quotes(&FetchQuotesRequest {
            broker,
            symbol,
            date,
            start_time: start,
            end_time: end,
        })?)?,
        Command::SessionQuotes { session_id } => {
            let Some(session) = engine.get_session(&session_id)? else {
                anyhow::bail!("session '{session_id}' not found");
            };
            let quotes = engine
                .get_session_quotes(&SessionQuotesRequest { session_id })?
                .quotes;
            print_json(&SessionQuotesOutput { session, quotes })?
        }
        Command::Compare {
            broker_a,
            symbol_a,
            broker_b,
            symbol_b,
            limit,
            lookback,
        } => print_json(&engine.fetch_comparison(&ComparisonRequest {
            broker_a,
            symbol_a,
            broker_b,
            symbol_b,
            limit,
            lookback,
        })?)?,
        Command::Init | Command::Ingest { .. } | Command::IngestFolder { .. } | Command::Reset { .. } => {}
    }
    Ok(ExitCode::SUCCESS)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_compare() {
        let cli = Cli::try_parse_from([
            "quotectl", "compare", "--broker-a", "alpha", "--symbol-a", "EURUSD", "--broker-b",
            "beta", "--symbol-b", "EURUSD", "--lookback", "24",
        ])
        .unwrap();
        match cli.command {
            Command::Compare { lookback, limit, .. } => {
                assert_eq!(lookback, Lookback::Hours(24));
                assert_eq!(limit, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_rejects_bad_lookback() {
        let parsed = Cli::try_parse_from([
            "quotectl", "compare", "--broker-a", "a", "--symbol-a", "s", "--broker-b", "b",
            "--symbol-b", "s", "--lookback", "0",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_parse_sessions_date() {
        let cli = Cli::try_parse_from([
            "quotectl", "sessions", "--broker", "b", "--symbol", "EURUSD", "--date", "2023-11-14",
        ])
        .unwrap();
        match cli.command {
            Command::Sessions { date, .. } => {
                assert_eq!(date, NaiveDate::from_ymd_opt(2023, 11, 14).unwrap());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_db_override() {
        let cli = Cli::try_parse_from(["quotectl", "--db", "/tmp/x/quotes.db", "brokers"]).unwrap();
        let config = load_config(&cli).unwrap();
        assert_eq!(config.storage.db_path, PathBuf::from("/tmp/x/quotes.db"));
    }

    #[test]
    fn test_missing_config_file() {
        let cli = Cli::try_parse_from(["quotectl", "--config", "/no/such.json", "init"]).unwrap();
        assert!(load_config(&cli).is_err());
    }
}
