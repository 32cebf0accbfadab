//! # spm-delta: delta encoding of sparse matrices
//!
//! Compresses the index structure of a sparse matrix by cutting every row into
//! *units*: runs of strictly consecutive columns are stored as a single offset
//! (dense units), everything else as variable-width column deltas (sparse
//! units). Values are stored alongside, optionally deduplicated.
//!
//! ## Components
//!
//! 1. **Row classification**: a streaming state machine decides, entry by
//!    entry, where units begin and end and whether they are dense.
//!
//! 2. **Unit encoding**: units are laid out in a byte control stream using
//!    varints and the smallest fixed width that fits their column deltas.
//!
//! 3. **Index dictionary**: repeated column-delta sequences are replaced by
//!    back-references into a per-width dictionary.
//!
//! 4. **Size model**: the encoded size of every strategy is predicted in one
//!    pass and compared to plain CSR.
//!
//! ## Usage
//!
//! ```
//! use spm_delta::{encode_csr, DeltaConfig, EncodingStrategy, SparseMatrixCSR};
//!
//! let a = SparseMatrixCSR::<f64>::identity(4);
//! let config = DeltaConfig::for_strategy(EncodingStrategy::ColumnDictionary);
//!
//! let encoded = encode_csr(&a, &config).unwrap();
//! assert_eq!(encoded.to_csr().unwrap(), a);
//! ```
//!
//! Predicting sizes without encoding:
//!
//! ```
//! use spm_delta::{estimate_csr, DeltaConfig, SparseMatrixCSR};
//!
//! let a = SparseMatrixCSR::<f64>::identity(100);
//! let report = estimate_csr(&a, &DeltaConfig::default()).unwrap();
//! println!("{report}");
//! ```

pub mod constants;
pub mod delta;
pub mod error;
pub mod io;
pub mod matrix;
pub mod parallel;
pub mod utils;

// Re-export primary components
pub use delta::{
    encode_csr, encode_entries, estimate_csr, estimate_entries, CiSize, ClassifierState,
    ColumnSpan, DeltaMatrix, DeltaValue, IndexDictionary, PlacedUnit, RowClassifier, SizeModel,
    SizeReport, Unit, UnitSink,
};
pub use error::{DeltaError, Result};
pub use io::{write_matrix_market, MatrixMarketReader};
pub use matrix::{DeltaConfig, EncodingStrategy, Entry, SparseMatrixCSR};
pub use parallel::{decode_partitioned, encode_partitioned, partition_rows};
pub use utils::{decode_to_sprs, from_sprs_csr, to_sprs_csr};

/// Version information for the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
