//! `dedup-sim`: a discrete-event simulator for a client-assisted
//! deduplication protocol.
//!
//! The CLI surface (`src/cli.rs`, `src/main.rs`) is a thin shell over the
//! three run functions in this module, which is also what the integration
//! tests under `tests/` drive directly.

pub mod cli;
pub mod error;
pub mod logging;
pub mod popularity;
pub mod rng;

use std::io::{self, Write};

use cli::{GenerateArgs, PerfectArgs, SimulateArgs};
use dedup_engine::{Engine, EngineConfig, PerfectSimulator};
use error::Result;

/// Library version, exposed the way the teacher's `dedup-sim` predecessor
/// exposed its own `VERSION` constant.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

fn open_writer(path: Option<&std::path::Path>) -> Result<Box<dyn Write>> {
    match path {
        Some(p) => Ok(Box::new(io::BufWriter::new(std::fs::File::create(p)?))),
        None => Ok(Box::new(io::BufWriter::new(io::stdout()))),
    }
}

/// Runs the `generate` subcommand: popularity table in, packed upload
/// stream out.
pub fn run_generate(args: &GenerateArgs) -> Result<()> {
    let reader = popularity::open_reader(args.input.as_deref())?;
    let entries = popularity::read_all(reader)?;

    let seed = rng::resolve_seed(args.seed);
    let config = dedup_gen::GeneratorConfig {
        distribution: args.distribution.into(),
        seed,
    };

    let mut writer = open_writer(args.output.as_deref())?;
    let report = dedup_gen::generate(entries, &config, &mut writer)?;
    writer.flush()?;

    tracing::info!(
        events = report.event_count,
        bytes = report.byte_count,
        sha256 = %report.sha256_hex,
        "generation complete"
    );

    Ok(())
}

fn engine_config_from_args(args: &SimulateArgs) -> EngineConfig {
    EngineConfig {
        shlen: args.short_hash_length,
        hashlen: args.hash_length,
        rlc: args.check_limit,
        rlu: args.pake_runs,
        max_threshold: args.max_threshold,
        offline_rate: args.offline_rate,
        with_sizes: args.with_sizes,
        one_successful_check: args.one_successful_check,
        deduplicate_below_threshold: args.deduplicate_below_threshold,
        only_final: args.only_final,
    }
}

/// Runs the `simulate` subcommand: packed upload stream in, protocol
/// engine statistics out.
pub fn run_simulate(args: &SimulateArgs) -> Result<()> {
    let config = engine_config_from_args(args);
    let seed = rng::resolve_seed(args.seed);
    let mut engine = Engine::with_seed(config, seed)?;

    let reader = popularity::open_reader(args.input.as_deref())?;
    let mut writer = open_writer(args.output.as_deref())?;

    for record in dedup_codec::decode_stream(reader) {
        let record = record?;
        let counters = engine.process_event(record.hash, record.size);
        if !args.only_final {
            writeln!(
                writer,
                "{},{},{},{}",
                counters.files_in_storage,
                counters.files_uploaded,
                counters.data_in_storage,
                counters.data_uploaded
            )?;
        }
    }

    if args.only_final {
        let summary = engine.summary()?;
        writeln!(
            writer,
            "{},{},{},{},{},{}",
            summary.rlc,
            summary.rlu,
            summary.max_threshold,
            summary.offline_rate,
            summary.ddp_files,
            summary.ddp_bytes
        )?;
    }

    writer.flush()?;
    Ok(())
}

/// Runs the `perfect` subcommand: packed upload stream in, set-membership
/// dedup statistics out.
pub fn run_perfect(args: &PerfectArgs) -> Result<()> {
    let mut sim = PerfectSimulator::new();

    let reader = popularity::open_reader(args.input.as_deref())?;
    let mut writer = open_writer(args.output.as_deref())?;

    for record in dedup_codec::decode_stream(reader) {
        let record = record?;
        let counters = sim.process_event(record.hash, record.size);
        writeln!(
            writer,
            "{},{},{},{}",
            counters.files_in_storage,
            counters.files_uploaded,
            counters.data_in_storage,
            counters.data_uploaded
        )?;
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cli::{DistributionArg, PerfectArgs, SimulateArgs};
    use dedup_codec::Hash160;
    use std::io::Write as _;

    fn write_stream(records: &[(Hash160, u64)]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for (hash, size) in records {
            file.write_all(&dedup_codec::encode(*hash, *size).unwrap())
                .unwrap();
        }
        file.flush().unwrap();
        file
    }

    #[test]
    fn generate_then_simulate_round_trips_through_the_cli_surface() {
        let mut table = tempfile::NamedTempFile::new().unwrap();
        writeln!(table, "{}  3  10", "07".repeat(20)).unwrap();

        let stream_out = tempfile::NamedTempFile::new().unwrap();
        let generate_args = GenerateArgs {
            input: Some(table.path().to_path_buf()),
            output: Some(stream_out.path().to_path_buf()),
            distribution: DistributionArg::Uniform,
            seed: Some(1),
        };
        run_generate(&generate_args).unwrap();

        let csv_out = tempfile::NamedTempFile::new().unwrap();
        let simulate_args = SimulateArgs {
            input: Some(stream_out.path().to_path_buf()),
            output: Some(csv_out.path().to_path_buf()),
            short_hash_length: 13,
            hash_length: 160,
            check_limit: 70,
            pake_runs: 30,
            max_threshold: 20,
            offline_rate: 0.0,
            with_sizes: false,
            one_successful_check: false,
            deduplicate_below_threshold: false,
            only_final: false,
            seed: Some(2),
        };
        run_simulate(&simulate_args).unwrap();

        let csv = std::fs::read_to_string(csv_out.path()).unwrap();
        assert_eq!(csv.lines().count(), 3);
        let last_line = csv.lines().last().unwrap();
        assert_eq!(last_line.split(',').count(), 4);
    }

    #[test]
    fn perfect_simulator_runs_end_to_end() {
        let hash = Hash160::from_be_bytes([9; 20]);
        let stream = write_stream(&[(hash, 10), (hash, 10)]);

        let out = tempfile::NamedTempFile::new().unwrap();
        let args = PerfectArgs {
            input: Some(stream.path().to_path_buf()),
            output: Some(out.path().to_path_buf()),
        };
        run_perfect(&args).unwrap();

        let csv = std::fs::read_to_string(out.path()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines, vec!["1,1,10,10", "1,2,10,10"]);
    }
}
