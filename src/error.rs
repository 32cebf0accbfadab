//! Error types for delta encoding and decoding.
//!
//! Every failure aborts the pass that raised it: the encoder never hands out a
//! partially built artifact, and the decoder stops at the first inconsistency.

use std::io;

/// Primary error type of the crate.
#[derive(Debug, thiserror::Error)]
pub enum DeltaError {
    /// Underlying reader or writer failed.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    /// The MatrixMarket size line is not exactly `rows cols nonzeros`.
    #[error("invalid matrix market header: {0}")]
    InvalidHeader(String),

    /// An entry line could not be parsed.
    #[error("invalid entry at line {line}: {reason}")]
    InvalidEntry {
        /// 1-based line number in the source text.
        line: usize,
        /// Human-readable explanation.
        reason: String,
    },

    /// A column index went backwards inside a row.
    #[error("column {column} follows column {previous} in row {row}; input must be sorted")]
    UnsortedColumns {
        /// Row being encoded.
        row: usize,
        /// Column origin the new column was compared against.
        previous: usize,
        /// Offending column.
        column: usize,
    },

    /// A row index went backwards.
    #[error("row {row} follows row {previous}; input must be sorted")]
    UnsortedRows {
        /// Row of the previous entry.
        previous: usize,
        /// Offending row.
        row: usize,
    },

    /// The run cap was hit while the classifier had not yet seen a second element.
    #[error("unit size cap reached in unknown state; ctl_size_max is misconfigured")]
    MaxSizeInUnknown,

    /// Configuration rejected by `DeltaConfig::validate`.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// An encoded artifact is truncated or inconsistent.
    #[error("corrupt delta artifact: {0}")]
    Corrupt(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, DeltaError>;
