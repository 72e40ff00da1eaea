//! Upload-stream generator for `dedup-sim`.
//!
//! Converts a popularity table (`hash -> (count, size)`) into a randomized
//! upload stream under a selectable temporal distribution, matching the
//! reference `generate-upload-stream.py`'s distribution draws and its
//! `sha256`-over-the-output verification digest.

use std::io::{self, BufRead, Write};

use dedup_codec::{fisher_yates_shuffle, Hash160};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution as RandDistribution, LogNormal, Normal};
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GenError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("codec error: {0}")]
    Codec(#[from] dedup_codec::CodecError),

    #[error("malformed popularity-table line: {0:?}")]
    MalformedLine(String),
}

pub type Result<T> = std::result::Result<T, GenError>;

/// One line of the popularity table: a file's hash, how many clients have
/// it (`count >= 1`), and its size in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PopularityEntry {
    pub hash: Hash160,
    pub count: u64,
    pub size: u64,
}

/// The temporal distribution that spreads a file's copies across ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemporalDistribution {
    /// All events occur at tick 0.
    Uniform,
    /// Per file, draw `mu in [1,20000]`, `sigma in [20,2000]` and place each
    /// copy at `round(Gaussian(mu, sigma))`.
    Normal,
    /// As `Normal` but with `mu = ln(uniform[1,20000])`, `sigma =
    /// ln(uniform[20,2000])` and log-normal draws.
    LogNormal,
}

#[derive(Debug, Clone, Copy)]
pub struct GeneratorConfig {
    pub distribution: TemporalDistribution,
    pub seed: u64,
}

/// Summary of a completed generation run, mirroring the reference script's
/// end-of-run stderr report (uploads emitted, SHA-256 digest of the bytes).
#[derive(Debug, Clone)]
pub struct GenerationReport {
    pub event_count: u64,
    pub byte_count: u64,
    pub sha256_hex: String,
}

/// Parses one popularity-table line (`<hex_hash>  <decimal_count>  <decimal_size>`).
///
/// Returns `Ok(None)` for lines the "-" skip rule silently drops (a count or
/// size token containing `-`), `Err` for lines that are not exactly three
/// two-space-separated tokens or whose hash/count/size tokens don't parse,
/// and `Ok(Some(..))` otherwise.
pub fn parse_popularity_line(line: &str) -> Result<Option<PopularityEntry>> {
    let tokens: Vec<&str> = line.split("  ").collect();
    if tokens.len() != 3 {
        return Err(GenError::MalformedLine(line.to_string()));
    }
    let (hash_tok, count_tok, size_tok) = (tokens[0], tokens[1], tokens[2]);

    if count_tok.contains('-') || size_tok.contains('-') {
        return Ok(None);
    }

    let hash_bytes =
        hex::decode(hash_tok).map_err(|_| GenError::MalformedLine(line.to_string()))?;
    if hash_bytes.len() != 20 {
        return Err(GenError::MalformedLine(line.to_string()));
    }
    let mut hash_arr = [0u8; 20];
    hash_arr.copy_from_slice(&hash_bytes);

    let count: u64 = count_tok
        .parse()
        .map_err(|_| GenError::MalformedLine(line.to_string()))?;
    let size: u64 = size_tok
        .parse()
        .map_err(|_| GenError::MalformedLine(line.to_string()))?;

    Ok(Some(PopularityEntry {
        hash: Hash160::from_be_bytes(hash_arr),
        count,
        size,
    }))
}

/// Parses a whole popularity table, one [`PopularityEntry`] per non-skipped
/// line. Lines are read lazily; malformed lines (not the silent "-" rule)
/// surface as an error on the item they came from.
pub fn parse_popularity_table<R: BufRead>(
    reader: R,
) -> impl Iterator<Item = Result<Option<PopularityEntry>>> {
    reader.lines().map(|line_res| {
        let line = line_res.map_err(GenError::Io)?;
        if line.is_empty() {
            return Ok(None);
        }
        parse_popularity_line(&line)
    })
}

/// Draws ticks for every copy of every popularity entry, sorts the full
/// event sequence into nondecreasing tick order, shuffles within each tick
/// via Fisher-Yates, encodes each `(hash, size)` into the packed wire
/// format, and writes the result to `writer`.
///
/// The tick-sort requirement (spec: "the full event sequence is emitted in
/// nondecreasing tick order") means the event list must be materialized in
/// full before any byte is written, regardless of distribution - a fully
/// lazy generator cannot know the global tick order in advance. Once
/// materialized and ordered, bytes are written one record at a time rather
/// than buffered into a second copy.
pub fn generate<I, W>(entries: I, config: &GeneratorConfig, writer: &mut W) -> Result<GenerationReport>
where
    I: IntoIterator<Item = PopularityEntry>,
    W: Write,
{
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut events: Vec<(i64, Hash160, u64)> = Vec::new();

    for entry in entries {
        match config.distribution {
            TemporalDistribution::Uniform => {
                for _ in 0..entry.count {
                    events.push((0, entry.hash, entry.size));
                }
            }
            TemporalDistribution::Normal => {
                let mu = rng.random_range(1u32..=20000u32) as f64;
                let sigma = rng.random_range(20u32..=2000u32) as f64;
                let normal = Normal::new(mu, sigma).expect("mu/sigma drawn from valid ranges");
                for _ in 0..entry.count {
                    let tick = normal.sample(&mut rng).round() as i64;
                    events.push((tick, entry.hash, entry.size));
                }
            }
            TemporalDistribution::LogNormal => {
                let mu = (rng.random_range(1u32..=20000u32) as f64).ln();
                let sigma = (rng.random_range(20u32..=2000u32) as f64).ln();
                let lognormal =
                    LogNormal::new(mu, sigma).expect("mu/sigma drawn from valid ranges");
                for _ in 0..entry.count {
                    let tick = lognormal.sample(&mut rng).round() as i64;
                    events.push((tick, entry.hash, entry.size));
                }
            }
        }
    }

    events.sort_by_key(|(tick, _, _)| *tick);

    let mut start = 0;
    while start < events.len() {
        let mut end = start + 1;
        while end < events.len() && events[end].0 == events[start].0 {
            end += 1;
        }
        fisher_yates_shuffle(&mut events[start..end], |i| rng.random_range(0..=i));
        start = end;
    }

    let mut digest = Sha256::new();
    let mut byte_count = 0u64;
    for (_, hash, size) in &events {
        let bytes = dedup_codec::encode(*hash, *size)?;
        writer.write_all(&bytes)?;
        digest.update(bytes);
        byte_count += bytes.len() as u64;
    }

    Ok(GenerationReport {
        event_count: events.len() as u64,
        byte_count,
        sha256_hex: hex::encode(digest.finalize()),
    })
}
