//! # Parallel Delta Encoding
//!
//! This module splits a matrix into row ranges holding roughly the same number
//! of stored elements and encodes every range independently using Rayon.
//! Each partition owns its dictionaries and starts decoding at its own first
//! row, so partitions can also be decoded (or multiplied) independently.

use std::ops::Range;

use num_traits::Num;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::debug;

use crate::delta::classifier::classify;
use crate::delta::encoder::DeltaEncoder;
use crate::delta::format::DeltaMatrix;
use crate::delta::sink::PassInfo;
use crate::delta::value::DeltaValue;
use crate::error::{DeltaError, Result};
use crate::matrix::config::DeltaConfig;
use crate::matrix::SparseMatrixCSR;

/// Splits the rows of `matrix` into at most `parts` contiguous ranges with
/// balanced element counts
///
/// A range is closed at the first row boundary after it reaches its share of
/// the remaining elements, so rows are never split. The ranges cover every
/// row of the matrix in order; fewer than `parts` ranges are returned when
/// there are not enough elements to go around.
///
/// # Examples
///
/// ```
/// use spm_delta::{partition_rows, SparseMatrixCSR};
///
/// let m = SparseMatrixCSR::<f64>::identity(8);
/// let ranges = partition_rows(&m, 4);
/// assert_eq!(ranges, vec![0..2, 2..4, 4..6, 6..8]);
/// ```
pub fn partition_rows<T>(matrix: &SparseMatrixCSR<T>, parts: usize) -> Vec<Range<usize>>
where
    T: Copy + Num,
{
    let parts = parts.max(1);
    let nnz = matrix.nnz();
    let mut ranges = Vec::with_capacity(parts);

    let mut start = 0;
    let mut assigned = 0;
    let mut limit = nnz / parts;

    for row in 0..matrix.n_rows {
        if ranges.len() + 1 == parts {
            break;
        }
        let elements = matrix.nnz_in(start..row);
        if row > start && elements > 0 && elements >= limit {
            ranges.push(start..row);
            assigned += elements;
            start = row;
            limit = (nnz - assigned) / (parts - ranges.len());
        }
    }

    ranges.push(start..matrix.n_rows);
    ranges
}

/// Dedicated pool running partition work on exactly `n_threads` threads
fn encoder_pool(n_threads: usize) -> Result<ThreadPool> {
    ThreadPoolBuilder::new()
        .num_threads(n_threads)
        .thread_name(|i| format!("spm-delta-{i}"))
        .build()
        .map_err(|e| {
            DeltaError::InvalidConfig(format!("cannot start {n_threads} encoder threads: {e}"))
        })
}

/// Encodes the partitions of `matrix` in parallel
///
/// `config.n_threads` sets both the number of partitions ([`partition_rows`])
/// and the size of the thread pool they are encoded on. Every partition
/// records the full matrix dimensions and its own `row_start`.
pub fn encode_partitioned<T: DeltaValue>(
    matrix: &SparseMatrixCSR<T>,
    config: &DeltaConfig,
) -> Result<Vec<DeltaMatrix<T>>> {
    config.validate()?;
    let ranges = partition_rows(matrix, config.n_threads);
    debug!(
        parts = ranges.len(),
        threads = config.n_threads,
        nnz = matrix.nnz(),
        "encoding row partitions in parallel"
    );

    encoder_pool(config.n_threads)?.install(|| {
        ranges
            .into_par_iter()
            .map(|rows| {
                let info = PassInfo::new(matrix.n_rows, matrix.n_cols).starting_at(rows.start);
                classify(
                    matrix.entries_in(rows).map(Ok),
                    info,
                    config,
                    DeltaEncoder::new(config),
                )
            })
            .collect()
    })
}

/// Decodes partitions produced by [`encode_partitioned`] back into one matrix
pub fn decode_partitioned<T: DeltaValue>(parts: &[DeltaMatrix<T>]) -> Result<SparseMatrixCSR<T>> {
    let first = parts
        .first()
        .ok_or_else(|| DeltaError::Corrupt("no partitions".into()))?;
    let (n_rows, n_cols) = (first.n_rows, first.n_cols);
    if parts.iter().any(|p| p.n_rows != n_rows || p.n_cols != n_cols) {
        return Err(DeltaError::Corrupt("partitions disagree on dimensions".into()));
    }

    let decoded = parts
        .par_iter()
        .map(DeltaMatrix::entries)
        .collect::<Result<Vec<_>>>()?;
    let entries: Vec<_> = decoded.into_iter().flatten().collect();
    SparseMatrixCSR::from_entries(n_rows, n_cols, &entries)
}
