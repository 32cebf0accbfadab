//! Centralized constants for the delta sparse matrix format
//!
//! This module contains all hardcoded constants used throughout the codebase.
//! All new constants should be added here rather than scattered throughout the code.
//! Constants are organized by category for easy reference and maintenance.

// ============================================================================
// CLASSIFIER DEFAULTS
// ============================================================================

/// Largest number of elements a single unit may hold (the size byte of a unit header)
pub const CTL_SIZE_MAX: usize = (1 << 8) - 1;

/// Number of consecutive +1 column steps required before a run is committed as dense
pub const DEFAULT_SEQ_LIMIT: usize = 8;

/// Environment variable overriding the dense-run threshold
pub const SEQ_LIMIT_ENV: &str = "SPM_DELTA_SEQ_LIMIT";

/// Rows between two progress trace events of the classifier
pub const PROGRESS_ROW_INTERVAL: usize = 1024;

// ============================================================================
// UNIT HEADER FLAGS
// ============================================================================

/// Flag bit: the unit starts a new row
pub const FL_NR_SHIFT: u8 = 7;

/// Flag bit: the unit is sparse (explicit column deltas follow)
pub const FL_SP_SHIFT: u8 = 6;

/// Flag bit: the new row directly follows the previous one (no row delta stored)
pub const FL_NRSEQ_SHIFT: u8 = 5;

/// Mask of the column index width bits of a sparse unit
pub const FL_CISIZE_MASK: u8 = 3;

// ============================================================================
// VARINT
// ============================================================================

/// Payload bits per varint group
pub const VARINT_GROUP_BITS: u32 = 7;

/// Continuation bit of a varint group
pub const VARINT_CONTINUATION: u8 = 1 << VARINT_GROUP_BITS;

/// Longest varint accepted when decoding a 64-bit value
pub const VARINT_MAX_BYTES: usize = 10;

// ============================================================================
// INDEX DICTIONARY
// ============================================================================

/// Length of the k-gram keying the dictionary reverse index
pub const DEFAULT_KGRAM_LEN: usize = 2;

// ============================================================================
// ARTIFACT FRAMING
// ============================================================================

/// Magic bytes opening a serialized delta matrix
pub const ARTIFACT_MAGIC: &[u8; 4] = b"SPMD";

/// Current framing version
pub const ARTIFACT_VERSION: u8 = 1;

/// Bytes per row pointer / column index of the CSR baseline used by size reports
pub const CSR_INDEX_BYTES: usize = 4;
