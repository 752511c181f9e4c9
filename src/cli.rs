//! Command line interface.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Pull job listings into Postgres and draft cover letters for them.
#[derive(Debug, Parser)]
#[command(name = "vacancy-scribe", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file (defaults to ./vacancy-scribe.toml when present).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log at debug level.
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Fetch new listings and queue them for processing.
    Fetch(SearchArgs),

    /// Draft cover letters for queued listings.
    Process,

    /// Fetch, then process.
    Run(SearchArgs),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Args)]
pub struct SearchArgs {
    /// Search term; repeat to search several. Replaces the configured terms.
    #[arg(long = "query", short)]
    pub queries: Vec<String>,
}

impl Command {
    pub fn fetches(&self) -> bool {
        matches!(self, Command::Fetch(_) | Command::Run(_))
    }

    pub fn processes(&self) -> bool {
        matches!(self, Command::Process | Command::Run(_))
    }

    /// Search terms given on the command line, empty when none were.
    pub fn queries(&self) -> &[String] {
        match self {
            Command::Fetch(args) | Command::Run(args) => &args.queries,
            Command::Process => &[],
        }
    }
}
