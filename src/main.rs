//! `dedup-sim` binary entry point.

use anyhow::{Context, Result};
use clap::Parser;

use dedup_sim::cli::{Cli, Command};
use dedup_sim::{logging, run_generate, run_perfect, run_simulate};

fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init_logging(cli.verbose, cli.log_file.as_deref())
        .context("failed to initialize logging")?;

    match &cli.command {
        Command::Generate(args) => run_generate(args).context("generate failed"),
        Command::Simulate(args) => run_simulate(args).context("simulate failed"),
        Command::Perfect(args) => run_perfect(args).context("perfect failed"),
    }
}
