//! Consumers of the unit stream
//!
//! The classifier hands every finalized unit to a [`UnitSink`]. The byte
//! encoder, the size model and the unit collector used by tests and
//! diagnostics are all sinks.

use crate::delta::unit::{DenseUnit, SparseUnit, Unit};
use crate::error::{DeltaError, Result};
use crate::matrix::Entry;

/// Dimensions and bookkeeping of one encoding pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassInfo {
    /// Number of rows of the matrix
    pub n_rows: usize,
    /// Number of columns of the matrix
    pub n_cols: usize,
    /// Entries consumed by the pass (filled in by the classifier)
    pub nnz: usize,
    /// Row decoding starts from
    pub row_start: usize,
}

impl PassInfo {
    /// A pass over a whole `n_rows × n_cols` matrix
    pub fn new(n_rows: usize, n_cols: usize) -> Self {
        Self {
            n_rows,
            n_cols,
            nnz: 0,
            row_start: 0,
        }
    }

    /// A pass over the rows starting at `row_start`
    pub fn starting_at(mut self, row_start: usize) -> Self {
        self.row_start = row_start;
        self
    }

    /// Rejects an entry outside the matrix; `position` is its 1-based index
    /// in the stream
    pub fn check_bounds<T>(&self, entry: &Entry<T>, position: usize) -> Result<()> {
        if entry.row >= self.n_rows || entry.col >= self.n_cols {
            return Err(DeltaError::InvalidEntry {
                line: position,
                reason: format!(
                    "({}, {}) outside {} × {}",
                    entry.row, entry.col, self.n_rows, self.n_cols
                ),
            });
        }
        Ok(())
    }
}

/// Trait for consumers of classified units
///
/// Units arrive in emission order. `finalize_all` is called exactly once,
/// after the last unit, and produces the sink's result.
pub trait UnitSink<T> {
    /// Result of the pass
    type Output;

    /// Accepts a sparse unit
    fn finalize_sparse(&mut self, unit: SparseUnit<T>) -> Result<()>;

    /// Accepts a dense unit
    fn finalize_dense(&mut self, unit: DenseUnit<T>) -> Result<()>;

    /// Ends the pass
    fn finalize_all(self, info: PassInfo) -> Result<Self::Output>;
}

/// Sink that keeps every unit in memory
#[derive(Debug, Clone, Default)]
pub struct CollectUnits<T> {
    units: Vec<Unit<T>>,
}

impl<T> CollectUnits<T> {
    pub fn new() -> Self {
        Self { units: Vec::new() }
    }

    /// Units received so far
    pub fn units(&self) -> &[Unit<T>] {
        &self.units
    }
}

impl<T> UnitSink<T> for CollectUnits<T> {
    type Output = Vec<Unit<T>>;

    fn finalize_sparse(&mut self, unit: SparseUnit<T>) -> Result<()> {
        self.units.push(Unit::Sparse(unit));
        Ok(())
    }

    fn finalize_dense(&mut self, unit: DenseUnit<T>) -> Result<()> {
        self.units.push(Unit::Dense(unit));
        Ok(())
    }

    fn finalize_all(self, _info: PassInfo) -> Result<Self::Output> {
        Ok(self.units)
    }
}
