//! Protocol simulation engine and perfect reference simulator for `dedup-sim`.
//!
//! The engine is the core of the system: a per-upload state machine over a
//! bucket map of popularity-ordered file records, each carrying a dynamic
//! collection of per-client "checker" budgets and a randomized
//! deduplication threshold.

use std::collections::{HashMap, HashSet};

use dedup_codec::Hash160;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use smallvec::SmallVec;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("invalid engine configuration: {0}")]
    BadConfig(String),

    #[error("no events were consumed; cannot compute summary statistics")]
    EmptyStream,
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// Engine configuration (spec.md section 4.4's parameter table).
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// Short-hash bit length (S).
    pub shlen: u32,
    /// Full-hash bit length (H).
    pub hashlen: u32,
    /// Check budget issued to each new checker (RL_c).
    pub rlc: u32,
    /// Max files probed per upload (RL_u).
    pub rlu: usize,
    /// Upper bound (inclusive) of the per-file random threshold.
    pub max_threshold: u32,
    /// Per-checker independent offline probability, in `[0,1)`.
    pub offline_rate: f64,
    /// Whether bucket keys incorporate file size.
    pub with_sizes: bool,
    /// Whether a successful dedup replaces the consumed checker in place
    /// rather than appending a new one.
    pub one_successful_check: bool,
    /// Whether to ignore the popularity threshold gate entirely.
    pub deduplicate_below_threshold: bool,
    /// Whether to suppress per-event output.
    pub only_final: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            shlen: 13,
            hashlen: 160,
            rlc: 70,
            rlu: 30,
            max_threshold: 20,
            offline_rate: 0.0,
            with_sizes: false,
            one_successful_check: false,
            deduplicate_below_threshold: false,
            only_final: false,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.rlc == 0 && self.rlu == 0 {
            return Err(EngineError::BadConfig(
                "RL_c and RL_u cannot both be zero".into(),
            ));
        }
        if self.shlen > self.hashlen {
            return Err(EngineError::BadConfig(
                "short-hash length cannot exceed full hash length".into(),
            ));
        }
        if !(0.0..1.0).contains(&self.offline_rate) {
            return Err(EngineError::BadConfig(
                "offline_rate must be in [0, 1)".into(),
            ));
        }
        if self.max_threshold < 2 {
            return Err(EngineError::BadConfig(
                "max_threshold must be at least 2".into(),
            ));
        }
        Ok(())
    }
}

/// Events between periodic `trace!` progress lines, mirroring
/// `original_source/simulator/utils.py`'s `REPORT_FREQUENCY` reporting
/// cadence. Off by default (trace level); not a substitute for the
/// out-of-scope progress-reporting collaborator (spec.md section 2).
const REPORT_FREQUENCY: u64 = 100_000;

/// One entry in a bucket: a file's hash, its checker budgets (nondecreasing,
/// smallest at the front), its popularity, and its dedup threshold.
///
/// The checker collection uses a small-vector since typical length stays
/// well below RL_u (spec.md section 9's design note).
#[derive(Debug, Clone)]
pub struct FileRecord {
    pub hash: Hash160,
    pub checkers: SmallVec<[u32; 8]>,
    pub copies: u64,
    pub threshold: u32,
}

impl FileRecord {
    fn is_expired(&self) -> bool {
        self.checkers.is_empty()
    }
}

/// Appends a fresh checker budget, unless `rlc` is zero. A zero-budget
/// checker can never answer a single check, so it is dropped instead of
/// stored - keeping every live entry in `checkers` positive, per the data
/// model's invariant, and the new entry born already expired (spec.md
/// section 8: "RL_c = 0 => ... checker immediately expires").
fn push_checker(checkers: &mut SmallVec<[u32; 8]>, rlc: u32) {
    if rlc > 0 {
        checkers.push(rlc);
    }
}

/// The four engine-wide counters, reported after every event unless
/// `only_final` is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Counters {
    pub files_in_storage: u64,
    pub files_uploaded: u64,
    pub data_in_storage: u64,
    pub data_uploaded: u64,
}

/// The final summary line's payload.
#[derive(Debug, Clone, Copy)]
pub struct Summary {
    pub rlc: u32,
    pub rlu: usize,
    pub max_threshold: u32,
    pub offline_rate: f64,
    pub ddp_files: f64,
    pub ddp_bytes: f64,
}

/// The protocol simulation engine.
pub struct Engine<R: Rng> {
    config: EngineConfig,
    buckets: HashMap<u64, Vec<FileRecord>>,
    rng: R,
    counters: Counters,
}

impl Engine<StdRng> {
    /// Convenience constructor seeding a `StdRng` from an explicit seed, so
    /// runs are reproducible (spec.md section 5's "single process-wide RNG
    /// whose seed must be configurable").
    pub fn with_seed(config: EngineConfig, seed: u64) -> Result<Self> {
        Engine::new(config, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> Engine<R> {
    pub fn new(config: EngineConfig, rng: R) -> Result<Self> {
        config.validate()?;
        Ok(Engine {
            config,
            buckets: HashMap::new(),
            rng,
            counters: Counters {
                files_in_storage: 0,
                files_uploaded: 0,
                data_in_storage: 0,
                data_uploaded: 0,
            },
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn counters(&self) -> Counters {
        self.counters
    }

    /// Returns the bucket a given `(hash, size)` maps to, for tests and
    /// diagnostics. `None` if nothing has been uploaded into that bucket yet.
    pub fn bucket(&self, hash: Hash160, size: u64) -> Option<&[FileRecord]> {
        let id = self.bucket_id(hash, size);
        self.buckets.get(&id).map(Vec::as_slice)
    }

    fn bucket_id(&self, hash: Hash160, size: u64) -> u64 {
        let short = hash.shr64(self.config.hashlen - self.config.shlen);
        if self.config.with_sizes {
            short | (size << self.config.shlen)
        } else {
            short
        }
    }

    /// Runs one upload through the per-upload algorithm (spec.md section
    /// 4.4, steps 1-7) and returns the updated engine-wide counters.
    pub fn process_event(&mut self, hash: Hash160, size: u64) -> Counters {
        self.counters.files_uploaded += 1;
        self.counters.data_uploaded += size;

        if self.counters.files_uploaded % REPORT_FREQUENCY == 0 {
            tracing::trace!(
                files_uploaded = self.counters.files_uploaded,
                buckets = self.buckets.len(),
                "progress"
            );
        }

        let bucket_id = self.bucket_id(hash, size);
        let bucket = self.buckets.entry(bucket_id).or_default();

        let mut files_considered = 0usize;
        let mut match_found = false;
        let mut match_index: Option<usize> = None;
        let mut file_deduplicated = false;

        for idx in 0..bucket.len() {
            if files_considered >= self.config.rlu {
                break;
            }

            if bucket[idx].is_expired() {
                continue;
            }

            if self.config.offline_rate > 0.0 {
                let n = bucket[idx].checkers.len() as f64;
                let draw: f64 = self.rng.random();
                if draw < self.config.offline_rate.powf(n) {
                    continue;
                }
            }

            files_considered += 1;
            bucket[idx].checkers[0] -= 1;

            let mut front_replaced = false;
            if bucket[idx].hash == hash && !match_found {
                match_found = true;
                match_index = Some(idx);

                bucket[idx].copies += 1;
                if self.config.deduplicate_below_threshold
                    || bucket[idx].copies >= bucket[idx].threshold as u64
                {
                    file_deduplicated = true;
                }

                if self.config.one_successful_check && file_deduplicated {
                    // RL_c = 0 means the replacement checker has no budget
                    // to give; rather than store a zero entry (which would
                    // underflow on its next decrement), the checker expires
                    // immediately instead of being replaced.
                    if self.config.rlc == 0 {
                        bucket[idx].checkers.remove(0);
                    } else {
                        bucket[idx].checkers[0] = self.config.rlc;
                    }
                    front_replaced = true;
                } else {
                    push_checker(&mut bucket[idx].checkers, self.config.rlc);
                }
            }

            match bucket[idx].checkers.first().copied() {
                Some(0) => {
                    bucket[idx].checkers.remove(0);
                    tracing::debug!(
                        bucket_id,
                        hash = ?bucket[idx].hash,
                        remaining_checkers = bucket[idx].checkers.len(),
                        "checker expired"
                    );
                }
                Some(_) if !front_replaced && bucket[idx].checkers.len() > 1 => {
                    let checkers = &mut bucket[idx].checkers;
                    let mut i = 0;
                    while i + 1 < checkers.len() && checkers[i] > checkers[i + 1] {
                        checkers.swap(i, i + 1);
                        i += 1;
                    }
                }
                _ => {}
            }
        }

        if !file_deduplicated {
            self.counters.files_in_storage += 1;
            self.counters.data_in_storage += size;
        }

        if !match_found {
            let threshold = self.rng.random_range(2..=self.config.max_threshold);
            tracing::debug!(bucket_id, hash = ?hash, threshold, "bucket record created");
            let mut checkers = SmallVec::new();
            push_checker(&mut checkers, self.config.rlc);
            bucket.push(FileRecord {
                hash,
                checkers,
                copies: 1,
                threshold,
            });
        } else if let Some(mut idx) = match_index {
            while idx > 0 && bucket[idx].copies > bucket[idx - 1].copies {
                bucket.swap(idx, idx - 1);
                idx -= 1;
            }
        }

        self.counters
    }

    pub fn summary(&self) -> Result<Summary> {
        if self.counters.files_uploaded == 0 {
            return Err(EngineError::EmptyStream);
        }
        Ok(Summary {
            rlc: self.config.rlc,
            rlu: self.config.rlu,
            max_threshold: self.config.max_threshold,
            offline_rate: self.config.offline_rate,
            ddp_files: 1.0
                - (self.counters.files_in_storage as f64 / self.counters.files_uploaded as f64),
            ddp_bytes: 1.0
                - (self.counters.data_in_storage as f64 / self.counters.data_uploaded as f64),
        })
    }
}

/// The perfect (set-membership-only) reference simulator: the theoretical
/// maximum deduplication any protocol configuration can achieve.
pub struct PerfectSimulator {
    seen: HashSet<Hash160>,
    counters: Counters,
}

impl Default for PerfectSimulator {
    fn default() -> Self {
        Self::new()
    }
}

impl PerfectSimulator {
    pub fn new() -> Self {
        PerfectSimulator {
            seen: HashSet::new(),
            counters: Counters {
                files_in_storage: 0,
                files_uploaded: 0,
                data_in_storage: 0,
                data_uploaded: 0,
            },
        }
    }

    pub fn counters(&self) -> Counters {
        self.counters
    }

    pub fn process_event(&mut self, hash: Hash160, size: u64) -> Counters {
        self.counters.files_uploaded += 1;
        self.counters.data_uploaded += size;
        if self.seen.insert(hash) {
            self.counters.files_in_storage += 1;
            self.counters.data_in_storage += size;
        }
        self.counters
    }

    pub fn ddp_files(&self) -> Result<f64> {
        if self.counters.files_uploaded == 0 {
            return Err(EngineError::EmptyStream);
        }
        Ok(1.0 - (self.counters.files_in_storage as f64 / self.counters.files_uploaded as f64))
    }

    pub fn ddp_bytes(&self) -> Result<f64> {
        if self.counters.data_uploaded == 0 {
            return Err(EngineError::EmptyStream);
        }
        Ok(1.0 - (self.counters.data_in_storage as f64 / self.counters.data_uploaded as f64))
    }
}
