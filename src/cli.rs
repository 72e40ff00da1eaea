//! Command-line surface: `generate`, `simulate`, `perfect`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use dedup_gen::TemporalDistribution;

#[derive(Parser, Debug)]
#[command(
    name = "dedup-sim",
    version,
    about = "Discrete-event simulator for a client-assisted deduplication protocol"
)]
pub struct Cli {
    /// Raise the log level to debug.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Write structured JSON logs to this file instead of stdout.
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Convert a popularity table into a packed upload stream.
    Generate(GenerateArgs),
    /// Run the protocol simulation engine over a packed upload stream.
    Simulate(SimulateArgs),
    /// Run the perfect (set-membership) reference simulator.
    Perfect(PerfectArgs),
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum DistributionArg {
    Uniform,
    Normal,
    Lognormal,
}

impl From<DistributionArg> for TemporalDistribution {
    fn from(value: DistributionArg) -> Self {
        match value {
            DistributionArg::Uniform => TemporalDistribution::Uniform,
            DistributionArg::Normal => TemporalDistribution::Normal,
            DistributionArg::Lognormal => TemporalDistribution::LogNormal,
        }
    }
}

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Popularity table to read (defaults to stdin).
    #[arg(long, value_name = "PATH")]
    pub input: Option<PathBuf>,

    /// Packed upload stream to write (defaults to stdout).
    #[arg(long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Temporal distribution spreading each file's copies across ticks.
    #[arg(long, value_enum, default_value = "uniform")]
    pub distribution: DistributionArg,

    /// RNG seed; a time-derived seed is used and logged if omitted.
    #[arg(long)]
    pub seed: Option<u64>,
}

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Packed upload stream to read (defaults to stdin).
    #[arg(long, value_name = "PATH")]
    pub input: Option<PathBuf>,

    /// CSV/summary output to write (defaults to stdout).
    #[arg(long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Short-hash bit length (S).
    #[arg(long, default_value_t = 13)]
    pub short_hash_length: u32,

    /// Full hash bit length (H).
    #[arg(long, default_value_t = 160)]
    pub hash_length: u32,

    /// Check budget issued to each new checker (RL_c).
    #[arg(long, default_value_t = 70)]
    pub check_limit: u32,

    /// Max files probed per upload (RL_u).
    #[arg(long, default_value_t = 30)]
    pub pake_runs: usize,

    /// Upper bound (inclusive) of the per-file random threshold.
    #[arg(long, default_value_t = 20)]
    pub max_threshold: u32,

    /// Per-checker independent offline probability, in [0,1).
    #[arg(long, default_value_t = 0.0)]
    pub offline_rate: f64,

    /// Incorporate file size into the bucket key.
    #[arg(long)]
    pub with_sizes: bool,

    /// Replace the consumed checker in place on a successful dedup rather
    /// than appending a new one.
    #[arg(long)]
    pub one_successful_check: bool,

    /// Ignore the popularity threshold gate; dedup on first match.
    #[arg(long)]
    pub deduplicate_below_threshold: bool,

    /// Suppress per-event CSV output; print only the final summary line.
    #[arg(long)]
    pub only_final: bool,

    /// RNG seed; a time-derived seed is used and logged if omitted.
    #[arg(long)]
    pub seed: Option<u64>,
}

#[derive(Args, Debug)]
pub struct PerfectArgs {
    /// Packed upload stream to read (defaults to stdin).
    #[arg(long, value_name = "PATH")]
    pub input: Option<PathBuf>,

    /// CSV/summary output to write (defaults to stdout).
    #[arg(long, value_name = "PATH")]
    pub output: Option<PathBuf>,
}
