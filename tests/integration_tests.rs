/*!
 * Integration tests for dedup-sim: the six end-to-end scenarios, driven
 * through the library's run functions rather than the packed CLI binary.
 */

use std::io::Write;

use dedup_sim::cli::{DistributionArg, GenerateArgs, PerfectArgs, SimulateArgs};
use dedup_sim::{run_generate, run_perfect, run_simulate};

fn hex40(byte: u8) -> String {
    format!("{byte:02x}").repeat(20)
}

fn write_popularity_table(rows: &[(u8, u64, u64)]) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    for (byte, count, size) in rows {
        writeln!(file, "{}  {count}  {size}", hex40(*byte)).unwrap();
    }
    file.flush().unwrap();
    file
}

fn default_simulate_args(input: std::path::PathBuf, output: std::path::PathBuf) -> SimulateArgs {
    SimulateArgs {
        input: Some(input),
        output: Some(output),
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
        seed: Some(1),
    }
}

fn stream_from_table(table: &tempfile::NamedTempFile, seed: u64) -> tempfile::NamedTempFile {
    let stream = tempfile::NamedTempFile::new().unwrap();
    let args = GenerateArgs {
        input: Some(table.path().to_path_buf()),
        output: Some(stream.path().to_path_buf()),
        distribution: DistributionArg::Uniform,
        seed: Some(seed),
    };
    run_generate(&args).unwrap();
    stream
}

/// Scenario 1: a single upload. One CSV line `1,1,10,10`; DDP 0.
#[test]
fn scenario_single_upload() {
    let table = write_popularity_table(&[(0xA1, 1, 10)]);
    let stream = stream_from_table(&table, 10);

    let csv_out = tempfile::NamedTempFile::new().unwrap();
    let args = default_simulate_args(stream.path().to_path_buf(), csv_out.path().to_path_buf());
    run_simulate(&args).unwrap();

    let csv = std::fs::read_to_string(csv_out.path()).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines, vec!["1,1,10,10"]);
}

/// Scenario 2: two uploads of the same file with
/// `deduplicate_below_threshold=true`. CSV `1,1,10,10` then `1,2,10,10`.
#[test]
fn scenario_duplicate_below_threshold_dedups_the_second_upload() {
    let table = write_popularity_table(&[(0xB2, 2, 10)]);
    let stream = stream_from_table(&table, 11);

    let csv_out = tempfile::NamedTempFile::new().unwrap();
    let mut args =
        default_simulate_args(stream.path().to_path_buf(), csv_out.path().to_path_buf());
    args.deduplicate_below_threshold = true;
    run_simulate(&args).unwrap();

    let csv = std::fs::read_to_string(csv_out.path()).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines, vec!["1,1,10,10", "1,2,10,10"]);
}

/// Scenario 3: 100 identical uploads with `max_threshold=2`. Exactly one
/// storage increment, at the first event; `DDP_files == 0.99`.
#[test]
fn scenario_low_max_threshold_dedups_after_first_repeat() {
    let table = write_popularity_table(&[(0xC3, 100, 1)]);
    let stream = stream_from_table(&table, 12);

    let csv_out = tempfile::NamedTempFile::new().unwrap();
    let mut args =
        default_simulate_args(stream.path().to_path_buf(), csv_out.path().to_path_buf());
    args.max_threshold = 2;
    args.only_final = true;
    run_simulate(&args).unwrap();

    let summary = std::fs::read_to_string(csv_out.path()).unwrap();
    let fields: Vec<&str> = summary.trim().split(',').collect();
    assert_eq!(fields.len(), 6);
    let ddp_files: f64 = fields[4].parse().unwrap();
    assert!((ddp_files - 0.99).abs() < 1e-9);
}

/// Scenario 5: a single hash repeated 10 times with an overwhelming
/// offline rate. `files_in_storage` stays close to `files_uploaded`.
#[test]
fn scenario_high_offline_rate_suppresses_dedup() {
    let table = write_popularity_table(&[(0xD4, 10, 1)]);
    let stream = stream_from_table(&table, 13);

    let csv_out = tempfile::NamedTempFile::new().unwrap();
    let mut args =
        default_simulate_args(stream.path().to_path_buf(), csv_out.path().to_path_buf());
    args.offline_rate = 0.999_999_999;
    run_simulate(&args).unwrap();

    let csv = std::fs::read_to_string(csv_out.path()).unwrap();
    let last_line = csv.lines().last().unwrap();
    let fields: Vec<u64> = last_line.split(',').map(|f| f.parse().unwrap()).collect();
    assert!(fields[0] >= 9, "files_in_storage = {}", fields[0]);
}

/// Scenario 6: size-aware bucketing separates same-hash different-size
/// uploads into distinct buckets; no deduplication.
#[test]
fn scenario_size_aware_bucketing_keeps_uploads_separate() {
    let mut stream = tempfile::NamedTempFile::new().unwrap();
    let hash = dedup_codec::Hash160::from_be_bytes([0xE5; 20]);
    stream
        .write_all(&dedup_codec::encode(hash, 10).unwrap())
        .unwrap();
    stream
        .write_all(&dedup_codec::encode(hash, 20).unwrap())
        .unwrap();
    stream.flush().unwrap();

    let csv_out = tempfile::NamedTempFile::new().unwrap();
    let mut args =
        default_simulate_args(stream.path().to_path_buf(), csv_out.path().to_path_buf());
    args.with_sizes = true;
    run_simulate(&args).unwrap();

    let csv = std::fs::read_to_string(csv_out.path()).unwrap();
    let last_line = csv.lines().last().unwrap();
    let fields: Vec<u64> = last_line.split(',').map(|f| f.parse().unwrap()).collect();
    assert_eq!(fields[0], 2); // files_in_storage
    assert_eq!(fields[1], 2); // files_uploaded
}

/// The perfect reference simulator run end to end via the CLI surface.
#[test]
fn perfect_reference_simulator_end_to_end() {
    let table = write_popularity_table(&[(0xF6, 3, 5)]);
    let stream = stream_from_table(&table, 14);

    let csv_out = tempfile::NamedTempFile::new().unwrap();
    let args = PerfectArgs {
        input: Some(stream.path().to_path_buf()),
        output: Some(csv_out.path().to_path_buf()),
    };
    run_perfect(&args).unwrap();

    let csv = std::fs::read_to_string(csv_out.path()).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines, vec!["1,1,5,5", "1,2,5,5", "1,3,5,5"]);
}

/// A malformed popularity-table line surfaces as an error, not a panic.
#[test]
fn malformed_popularity_line_is_reported_as_an_error() {
    let mut table = tempfile::NamedTempFile::new().unwrap();
    writeln!(table, "not a valid line").unwrap();

    let stream_out = tempfile::NamedTempFile::new().unwrap();
    let args = GenerateArgs {
        input: Some(table.path().to_path_buf()),
        output: Some(stream_out.path().to_path_buf()),
        distribution: DistributionArg::Uniform,
        seed: Some(1),
    };

    assert!(run_generate(&args).is_err());
}

/// An empty upload stream reports `EmptyStream` when a final summary is
/// requested, rather than dividing by zero.
#[test]
fn empty_stream_with_only_final_is_an_error() {
    let stream = tempfile::NamedTempFile::new().unwrap();
    let csv_out = tempfile::NamedTempFile::new().unwrap();
    let mut args =
        default_simulate_args(stream.path().to_path_buf(), csv_out.path().to_path_buf());
    args.only_final = true;

    assert!(run_simulate(&args).is_err());
}
