use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "pagewatch")]
#[command(about = "Tracks URLs for content changes and archives changed pages")]
#[command(version)]
pub struct Cli {
    /// Database path (defaults to the platform data directory)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Directory for archived page snapshots (defaults to the platform cache directory)
    #[arg(long, global = true)]
    pub archive_dir: Option<PathBuf>,

    /// Per-fetch timeout, e.g. "30s" or "2m"
    #[arg(long, global = true, value_parser = parse_duration)]
    pub timeout: Option<Duration>,

    /// Maximum number of entries fetched at once
    #[arg(long, global = true)]
    pub concurrency: Option<usize>,

    /// Show detailed output including unchanged entries
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Without a subcommand, one sweep over all tracked urls is run
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Track a new url
    Add(AddArgs),

    /// Stop tracking an entry
    #[command(visible_aliases = ["d", "r"])]
    Delete(DeleteArgs),

    /// Print all tracked entries
    #[command(visible_alias = "l")]
    List(ListArgs),
}

#[derive(Parser)]
pub struct AddArgs {
    /// Url to track
    pub url: String,
}

#[derive(Parser)]
pub struct DeleteArgs {
    /// Entry id as shown by list
    pub id: i64,
}

#[derive(Parser)]
pub struct ListArgs {
    /// Output as JSON instead of a table
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

fn parse_duration(text: &str) -> Result<Duration, humantime::DurationError> {
    humantime::parse_duration(text)
}
