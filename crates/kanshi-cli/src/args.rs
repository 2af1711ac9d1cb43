use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "kanshi",
    version,
    about = "Playback-aware downloader speed limiter and ranking-feed subscriber"
)]
pub struct Cli {
    /// Config file to use instead of the platform default
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the limiter loop, the daily rank refresh and the HTTP API
    Serve {
        /// Do not start the rank subscriber
        #[arg(long)]
        no_rank: bool,
        /// Do not start the speed limiter
        #[arg(long)]
        no_limiter: bool,
    },
    /// Speed limiter operations
    #[command(subcommand)]
    Limiter(LimiterCmd),
    /// Ranking feed operations
    #[command(subcommand)]
    Rank(RankCmd),
    /// Subscription history
    #[command(subcommand)]
    History(HistoryCmd),
    /// Configuration file
    #[command(subcommand)]
    Config(ConfigCmd),
}

#[derive(Subcommand)]
pub enum LimiterCmd {
    /// Run a single tick and print what was applied
    Tick {
        /// Tick even when the limiter is disabled in config
        #[arg(long)]
        force: bool,
    },
    /// Print the current playback sessions of every media server
    Sessions,
}

#[derive(Subcommand)]
pub enum RankCmd {
    /// Show which feed entries pass the filter, without subscribing
    Preview,
    /// Run one full refresh now
    Refresh,
}

#[derive(Subcommand)]
pub enum HistoryCmd {
    /// Print the subscription history as JSON
    List,
    /// Remove history records by key
    Delete {
        /// Record key, e.g. `doubanrank: Title (DB:123)`
        key: String,
    },
}

#[derive(Subcommand)]
pub enum ConfigCmd {
    /// Print the config file location
    Path,
    /// Print the effective configuration
    Show,
}
