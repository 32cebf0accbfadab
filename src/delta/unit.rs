//! Units and the delta computation that produces them
//!
//! A unit is the atomic record of the delta format: a run of elements of one
//! row that is either stored with explicit column deltas (sparse) or as a
//! single starting offset (dense, strictly consecutive columns).

use crate::delta::classifier::ParseState;
use crate::delta::varint::CiSize;
use crate::error::{DeltaError, Result};

/// A run with explicit column deltas
#[derive(Debug, Clone, PartialEq)]
pub struct SparseUnit<T> {
    /// Rows advanced since the previous unit (0 inside a row)
    pub row_delta: usize,
    /// Distance from the column origin to the first column
    pub col_jump: usize,
    /// Differences between consecutive columns (one fewer than values)
    pub col_deltas: Vec<usize>,
    /// Element values in column order
    pub values: Vec<T>,
}

/// A run of strictly consecutive columns
#[derive(Debug, Clone, PartialEq)]
pub struct DenseUnit<T> {
    /// Rows advanced since the previous unit (0 inside a row)
    pub row_delta: usize,
    /// Distance from the column origin to the first column
    pub col_delta: usize,
    /// Element values in column order
    pub values: Vec<T>,
}

/// One emitted unit
#[derive(Debug, Clone, PartialEq)]
pub enum Unit<T> {
    Sparse(SparseUnit<T>),
    Dense(DenseUnit<T>),
}

impl<T> SparseUnit<T> {
    /// Largest column delta (0 for a single element unit)
    pub fn col_delta_max(&self) -> usize {
        self.col_deltas.iter().copied().max().unwrap_or(0)
    }

    /// Width of the inline delta array of this unit
    pub fn cisize(&self) -> CiSize {
        CiSize::for_delta(self.col_delta_max() as u64)
    }

    /// Width needed when the jump is stored in the delta array as well
    pub fn raw_cisize(&self) -> CiSize {
        CiSize::for_delta(self.col_jump.max(self.col_delta_max()) as u64)
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the unit holds no elements
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<T> DenseUnit<T> {
    /// Number of elements
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the unit holds no elements
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<T> Unit<T> {
    /// Number of elements
    pub fn len(&self) -> usize {
        match self {
            Unit::Sparse(u) => u.len(),
            Unit::Dense(u) => u.len(),
        }
    }

    /// Whether the unit holds no elements
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rows advanced before this unit
    pub fn row_delta(&self) -> usize {
        match self {
            Unit::Sparse(u) => u.row_delta,
            Unit::Dense(u) => u.row_delta,
        }
    }

    /// Element values
    pub fn values(&self) -> &[T] {
        match self {
            Unit::Sparse(u) => &u.values,
            Unit::Dense(u) => &u.values,
        }
    }

    /// Whether this is a sparse unit
    pub fn is_sparse(&self) -> bool {
        matches!(self, Unit::Sparse(_))
    }
}

impl<T: Copy> ParseState<T> {
    fn take_row_delta(&mut self) -> usize {
        if self.flag_nr {
            self.flag_nr = false;
            self.y_cur - self.y_old
        } else {
            0
        }
    }

    fn jump_from_origin(&self, first: usize) -> Result<usize> {
        first
            .checked_sub(self.x_old)
            .ok_or(DeltaError::UnsortedColumns {
                row: self.y_cur,
                previous: self.x_old,
                column: first,
            })
    }

    /// Cuts the first `n` buffered elements into a sparse unit.
    ///
    /// Returns `None` when `n` is zero.
    pub(crate) fn finalize_sparse_prefix(&mut self, n: usize) -> Result<Option<SparseUnit<T>>> {
        if n == 0 {
            return Ok(None);
        }

        let (cols, values) = self.buf.drain(n);
        let col_jump = self.jump_from_origin(cols[0])?;

        let mut col_deltas = Vec::with_capacity(n - 1);
        for pair in cols.windows(2) {
            let delta = pair[1].checked_sub(pair[0]).ok_or(DeltaError::UnsortedColumns {
                row: self.y_cur,
                previous: pair[0],
                column: pair[1],
            })?;
            col_deltas.push(delta);
        }

        self.x_old = cols[n - 1];
        let row_delta = self.take_row_delta();

        Ok(Some(SparseUnit {
            row_delta,
            col_jump,
            col_deltas,
            values,
        }))
    }

    /// Cuts the whole buffer into a dense unit
    pub(crate) fn finalize_dense_run(&mut self) -> Result<DenseUnit<T>> {
        let (cols, values) = self.buf.drain_all();
        assert!(!cols.is_empty(), "dense finalize on an empty run");

        let col_delta = self.jump_from_origin(cols[0])?;
        debug_assert!(
            cols.windows(2).all(|w| w[1] == w[0] + 1),
            "dense run is not consecutive: {cols:?}"
        );

        self.x_old = cols[0] + cols.len();
        let row_delta = self.take_row_delta();

        Ok(DenseUnit {
            row_delta,
            col_delta,
            values,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delta::classifier::ParseState;
    use crate::matrix::Entry;

    fn state_with(cols: &[usize]) -> ParseState<f64> {
        let mut state = ParseState::primed(Entry::new(0, cols[0], 0.0), 0, 3, 16);
        for (i, &c) in cols.iter().enumerate().skip(1) {
            state.buf.push(c, i as f64);
        }
        state
    }

    #[test]
    fn test_sparse_prefix_deltas() {
        let mut state = state_with(&[3, 5, 9, 20]);
        let unit = state.finalize_sparse_prefix(3).unwrap().unwrap();

        assert_eq!(unit.col_jump, 3);
        assert_eq!(unit.col_deltas, vec![2, 4]);
        assert_eq!(unit.values, vec![0.0, 1.0, 2.0]);
        assert_eq!(unit.col_delta_max(), 4);
        assert_eq!(state.x_old, 9);
        assert_eq!(state.buf.len(), 1);

        let rest = state.finalize_sparse_prefix(1).unwrap().unwrap();
        assert_eq!(rest.col_jump, 11);
        assert!(rest.col_deltas.is_empty());
        assert_eq!(rest.col_delta_max(), 0);
    }

    #[test]
    fn test_zero_length_prefix() {
        let mut state = state_with(&[1, 2]);
        assert!(state.finalize_sparse_prefix(0).unwrap().is_none());
        assert_eq!(state.buf.len(), 2);
    }

    #[test]
    fn test_dense_advances_origin_past_run() {
        let mut state = state_with(&[4, 5, 6]);
        let unit = state.finalize_dense_run().unwrap();
        assert_eq!(unit.col_delta, 4);
        assert_eq!(unit.len(), 3);
        assert_eq!(state.x_old, 7);
        assert!(state.buf.is_empty());
    }

    #[test]
    fn test_row_delta_consumed_once() {
        let mut state = state_with(&[0, 7]);
        state.flag_nr = true;
        state.y_old = 2;
        state.y_cur = 5;

        let first = state.finalize_sparse_prefix(1).unwrap().unwrap();
        let second = state.finalize_sparse_prefix(1).unwrap().unwrap();
        assert_eq!(first.row_delta, 3);
        assert_eq!(second.row_delta, 0);
    }

    #[test]
    fn test_decreasing_columns_rejected() {
        let mut state = state_with(&[5, 3]);
        let err = state.finalize_sparse_prefix(2).unwrap_err();
        assert!(matches!(
            err,
            DeltaError::UnsortedColumns { previous: 5, column: 3, .. }
        ));
    }

    #[test]
    fn test_raw_cisize_includes_jump() {
        let unit = SparseUnit {
            row_delta: 0,
            col_jump: 1000,
            col_deltas: vec![1, 2],
            values: vec![1.0f64, 2.0, 3.0],
        };
        assert_eq!(unit.cisize(), CiSize::U8);
        assert_eq!(unit.raw_cisize(), CiSize::U16);
    }
}
