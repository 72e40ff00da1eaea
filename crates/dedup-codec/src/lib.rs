//! Packed upload-record codec and shuffle primitive for `dedup-sim`.
//!
//! The wire format is a fixed 25-byte record: 5 bytes of big-endian file
//! size followed by 20 bytes of big-endian file hash, with no header,
//! delimiter, or trailer. Records are concatenated back to back.

use std::io::{self, Read};
use thiserror::Error;

/// Bytes occupied by one packed upload record: 20 for the hash, 5 for the size.
pub const RECORD_LEN: usize = 25;

const HASH_BYTES: usize = 20;
const SIZE_BYTES: usize = 5;
const MAX_SIZE: u64 = (1u64 << 40) - 1;

/// Errors that can occur while encoding or decoding the packed upload stream.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("value does not fit the 25-byte record layout (hash must be < 2^160, size < 2^40)")]
    Overflow,

    #[error("upload stream ended mid-record ({partial_bytes} of {RECORD_LEN} bytes read)")]
    TruncatedRecord { partial_bytes: usize },
}

pub type Result<T> = std::result::Result<T, CodecError>;

/// A 160-bit file hash, stored as its big-endian byte representation.
///
/// Kept as raw bytes rather than a `u128`/`u256` integer type since 160 bits
/// does not fit any native integer; the only arithmetic the protocol needs
/// is extracting the top bits for short-hash bucketing, provided by [`Hash160::shr64`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hash160(pub [u8; HASH_BYTES]);

impl Hash160 {
    pub const ZERO: Hash160 = Hash160([0u8; HASH_BYTES]);

    pub fn from_be_bytes(bytes: [u8; HASH_BYTES]) -> Self {
        Hash160(bytes)
    }

    pub fn as_be_bytes(&self) -> &[u8; HASH_BYTES] {
        &self.0
    }

    /// Computes `self >> shift`, truncated to the low 64 bits of the result.
    ///
    /// Mirrors the reference simulator's `upload_hash >> (hashlen - shlen)`:
    /// it shifts the literal 160-bit integer decoded from the wire format: it
    /// does not first truncate the value to a `hashlen`-bit view. Callers
    /// must keep `shift` such that the retained bits (`160 - shift`, floored
    /// at 64) fit in a `u64`; the short-hash length `S` used throughout this
    /// crate's callers is always small enough in practice (default 13).
    pub fn shr64(&self, shift: u32) -> u64 {
        if shift >= 160 {
            return 0;
        }
        let byte_shift = (shift / 8) as usize;
        let bit_shift = shift % 8;
        let mut shifted = [0u8; HASH_BYTES];
        for i in (0..HASH_BYTES).rev() {
            let src = i as isize - byte_shift as isize;
            if src < 0 {
                continue;
            }
            let hi = self.0[src as usize];
            let lo = if bit_shift > 0 && src - 1 >= 0 {
                self.0[(src - 1) as usize]
            } else {
                0
            };
            shifted[i] = if bit_shift == 0 {
                hi
            } else {
                (hi >> bit_shift) | (lo << (8 - bit_shift))
            };
        }
        let mut low8 = [0u8; 8];
        low8.copy_from_slice(&shifted[HASH_BYTES - 8..]);
        u64::from_be_bytes(low8)
    }
}

/// One upload event: a file's hash and size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record {
    pub hash: Hash160,
    pub size: u64,
}

impl Record {
    pub fn new(hash: Hash160, size: u64) -> Result<Self> {
        if size > MAX_SIZE {
            return Err(CodecError::Overflow);
        }
        Ok(Record { hash, size })
    }

    /// Encodes this record into its 25-byte wire representation.
    pub fn encode(&self) -> [u8; RECORD_LEN] {
        let mut out = [0u8; RECORD_LEN];
        out[..SIZE_BYTES].copy_from_slice(&self.size.to_be_bytes()[3..]);
        out[SIZE_BYTES..].copy_from_slice(&self.hash.0);
        out
    }

    /// Decodes a 25-byte wire record.
    pub fn decode(bytes: &[u8; RECORD_LEN]) -> Self {
        let mut size_buf = [0u8; 8];
        size_buf[3..].copy_from_slice(&bytes[..SIZE_BYTES]);
        let size = u64::from_be_bytes(size_buf);

        let mut hash_buf = [0u8; HASH_BYTES];
        hash_buf.copy_from_slice(&bytes[SIZE_BYTES..]);

        Record {
            hash: Hash160(hash_buf),
            size,
        }
    }
}

/// Encodes a single `(hash, size)` pair into 25 bytes.
pub fn encode(hash: Hash160, size: u64) -> Result<[u8; RECORD_LEN]> {
    Record::new(hash, size).map(|r| r.encode())
}

/// A lazy, single-pass reader over a packed upload stream.
///
/// Reads exactly [`RECORD_LEN`] bytes per item; a partial trailing record is
/// reported as [`CodecError::TruncatedRecord`]. Does not buffer the whole
/// input - each call to `next()` performs one bounded read.
pub struct RecordStream<R: Read> {
    reader: R,
    done: bool,
}

impl<R: Read> RecordStream<R> {
    pub fn new(reader: R) -> Self {
        RecordStream { reader, done: false }
    }
}

impl<R: Read> Iterator for RecordStream<R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let mut buf = [0u8; RECORD_LEN];
        let mut filled = 0;
        while filled < RECORD_LEN {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.done = true;
                    return Some(Err(CodecError::Io(e)));
                }
            }
        }

        if filled == 0 {
            self.done = true;
            return None;
        }
        if filled < RECORD_LEN {
            self.done = true;
            return Some(Err(CodecError::TruncatedRecord { partial_bytes: filled }));
        }

        Some(Ok(Record::decode(&buf)))
    }
}

/// Decodes a packed byte stream into a lazy sequence of records.
pub fn decode_stream<R: Read>(reader: R) -> RecordStream<R> {
    RecordStream::new(reader)
}

/// Fisher-Yates shuffle, in place, with uniform index draws supplied by the
/// caller (so callers can thread a seeded RNG through for reproducibility).
///
/// `next_index(i)` must return a uniformly distributed value in `[0, i]`.
pub fn fisher_yates_shuffle<T>(items: &mut [T], mut next_index: impl FnMut(usize) -> usize) {
    if items.is_empty() {
        return;
    }
    for i in (1..items.len()).rev() {
        let j = next_index(i);
        items.swap(i, j);
    }
}
