pub mod app;
pub mod config;
pub mod data;
pub mod domain;
pub mod engine;
pub mod utils;

pub use app::run_app;
pub use config::{FeederConfig, FeederSettings};
pub use domain::{Candle, FeedError, Timeframe};
pub use engine::{Feeder, Shutdown};

// CLI argument parsing
use {
    clap::{Parser, Subcommand},
    std::path::PathBuf,
};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// JSON configuration file
    #[arg(short, long, default_value = "feeder.json")]
    pub config: PathBuf,

    /// Override the SQLite database path from the config
    #[arg(long)]
    pub db: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Backfill, then follow the market until interrupted (default)
    Run,
    /// Print the symbols that would be ingested
    Symbols,
    /// Print the most recent stored candles of a symbol
    Tail {
        symbol: String,
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: u32,
    },
}
