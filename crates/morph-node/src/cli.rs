//! CLI argument parsing for morph

use clap::{Parser, Subcommand};
use morph_scheduler::ExecutionMode;
use std::path::PathBuf;

/// Deterministic parallel transaction engine
#[derive(Parser, Debug, Clone)]
#[command(name = "morph")]
#[command(about = "Deterministic parallel transaction engine")]
#[command(version)]
pub struct Cli {
    /// Config file (TOML)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Traversal mode (dfs, dfs-notify)
    #[arg(long, global = true)]
    pub mode: Option<ExecutionMode>,

    /// Stack length below which idle workers are notified
    #[arg(long, global = true)]
    pub threshold: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Workloads
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Deposit into A, then transfer A->B and B->A
    Banker,
    /// Execute a JSON batch file
    Run {
        /// Batch file path
        #[arg(long)]
        batch: PathBuf,
    },
    /// Execute a seeded random batch of deposits and transfers
    Random {
        /// Number of transactions
        #[arg(long, default_value = "1000")]
        txns: usize,
        /// Number of accounts (defaults to the config value)
        #[arg(long)]
        accounts: Option<usize>,
        /// RNG seed
        #[arg(long, default_value = "42")]
        seed: u64,
    },
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
