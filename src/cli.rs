use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Reddit sentiment pipeline: collect posts, score them with FinBERT and
/// compare daily sentiment with stock returns.
#[derive(Debug, Parser)]
#[command(name = "stocksent", version, about)]
pub struct Cli {
    /// Configuration file (defaults to ./stocksent.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Score every raw entity file once
    Enrich,
    /// Fetch new Reddit posts for the configured companies
    Collect,
    /// Collect, then enrich
    Run,
    /// Collect and enrich every `reddit.interval_minutes` until ctrl-c
    Schedule,
    /// Join one entity's daily sentiment with a price file
    Analyze {
        /// Entity name as it appears in the result file name
        #[arg(long)]
        entity: String,
        /// CSV with `date`/`Date` and `close`/`Close` columns
        #[arg(long)]
        prices: PathBuf,
        /// Write the joined rows here
        #[arg(long)]
        out: Option<PathBuf>,
    },
}
