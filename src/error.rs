//! Top-level error type for the `dedup-sim` binary.

use thiserror::Error;

/// Result type for the binary crate's own operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Errors surfaced at the CLI boundary, wrapping each collaborator crate's
/// own error type plus the popularity-table parsing concerns that belong
/// to this crate.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O error reading/writing a stream or popularity table.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Packed-record codec error (overflow, truncated record).
    #[error("stream codec error: {0}")]
    Codec(#[from] dedup_codec::CodecError),

    /// Upload-stream generation error.
    #[error("generator error: {0}")]
    Generator(#[from] dedup_gen::GenError),

    /// Protocol engine configuration or summary error.
    #[error("engine error: {0}")]
    Engine(#[from] dedup_engine::EngineError),

    /// The `tracing` env-filter directive built from `--verbose` (or
    /// `RUST_LOG`) did not parse.
    #[error("invalid log filter: {0}")]
    InvalidLogFilter(String),
}
