//! Morph engine binary
//!
//! Builds a bank workload, executes it on the task precedence graph
//! scheduler and prints the committed state.

mod bank;
mod cli;
mod config;
mod error;
mod output;

use anyhow::{Context, Result};
use bank::{banker_demo, random_batch, Workload};
use cli::{Cli, Command};
use config::NodeConfig;
use morph_scheduler::Scheduler;
use output::Output;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> Result<()> {
    let cli = Cli::parse_args();

    let mut config = match &cli.config {
        Some(path) => NodeConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => NodeConfig::default(),
    };
    config.apply_cli(&cli);

    // Logs go to stderr so the dump stays parseable
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let scheduler = Scheduler::new(config.scheduler.clone())?;

    let workload = match &cli.command {
        Command::Banker => Workload::new(Vec::new(), &banker_demo(&mut rand::thread_rng()))?,
        Command::Run { batch } => Workload::from_file(batch)
            .with_context(|| format!("loading batch {}", batch.display()))?,
        Command::Random {
            txns,
            accounts,
            seed,
        } => {
            let mut bank = config.bank.clone();
            if let Some(accounts) = accounts {
                bank.accounts = *accounts;
            }
            let instructions = random_batch(*txns, &bank, *seed)?;
            Workload::new(vec![bank.initial_balance; bank.accounts], &instructions)?
        }
    };

    tracing::info!(
        mode = %config.scheduler.mode,
        transactions = workload.transactions.len(),
        accounts = workload.store.len(),
        "morph starting"
    );

    let report = scheduler.execute(&workload.store, workload.transactions)?;
    let values = workload.store.dump();
    Output::new(cli.json).print(&values, &report, &scheduler.snapshot())?;

    Ok(())
}
