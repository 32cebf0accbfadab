//! Compressed Sparse Row (CSR) matrix format implementation

use std::fmt;
use num_traits::Num;

use crate::error::{DeltaError, Result};
use crate::matrix::Entry;

/// A sparse matrix in Compressed Sparse Row (CSR) format
///
/// The CSR format stores a sparse matrix using three arrays:
/// - row_ptr: Array of size n_rows + 1 containing indices into col_idx and values arrays
/// - col_idx: Array of size nnz containing column indices of non-zero elements
/// - values: Array of size nnz containing the non-zero values
///
/// Column indices are expected to be non-decreasing within each row, which is
/// the order the delta encoder consumes.
#[derive(Clone, PartialEq)]
pub struct SparseMatrixCSR<T> {
    /// Number of rows in the matrix
    pub n_rows: usize,

    /// Number of columns in the matrix
    pub n_cols: usize,

    /// Row pointers (size: n_rows + 1)
    /// row_ptr[i] is the index in col_idx and values where row i starts
    /// row_ptr[n_rows] is equal to nnz
    pub row_ptr: Vec<usize>,

    /// Column indices (size: nnz)
    pub col_idx: Vec<usize>,

    /// Non-zero values (size: nnz)
    pub values: Vec<T>,
}

impl<T> SparseMatrixCSR<T>
where
    T: Copy + Num,
{
    /// Creates a new CSR matrix with the given dimensions and data
    ///
    /// # Panics
    ///
    /// Panics if the input arrays are inconsistent:
    /// - row_ptr.len() must be n_rows + 1
    /// - col_idx.len() must equal values.len()
    /// - row_ptr[n_rows] must equal col_idx.len()
    pub fn new(
        n_rows: usize,
        n_cols: usize,
        row_ptr: Vec<usize>,
        col_idx: Vec<usize>,
        values: Vec<T>,
    ) -> Self {
        assert_eq!(row_ptr.len(), n_rows + 1, "row_ptr.len() must be n_rows + 1");
        assert_eq!(col_idx.len(), values.len(), "col_idx.len() must equal values.len()");
        assert_eq!(
            row_ptr[n_rows], col_idx.len(),
            "row_ptr[n_rows] must equal col_idx.len()"
        );

        // Check that column indices are within bounds
        for &col in &col_idx {
            assert!(col < n_cols, "Column index {} out of bounds (n_cols = {})", col, n_cols);
        }

        Self {
            n_rows,
            n_cols,
            row_ptr,
            col_idx,
            values,
        }
    }

    /// Builds a matrix from entries sorted by row, then column
    ///
    /// Unsorted or out of bounds entries are rejected instead of reordered.
    pub fn from_entries(n_rows: usize, n_cols: usize, entries: &[Entry<T>]) -> Result<Self> {
        let mut row_ptr = Vec::with_capacity(n_rows + 1);
        let mut col_idx = Vec::with_capacity(entries.len());
        let mut values = Vec::with_capacity(entries.len());
        row_ptr.push(0);

        let mut current_row = 0;
        for (i, e) in entries.iter().enumerate() {
            if e.row >= n_rows || e.col >= n_cols {
                return Err(DeltaError::InvalidEntry {
                    line: i + 1,
                    reason: format!("({}, {}) outside {} × {}", e.row, e.col, n_rows, n_cols),
                });
            }
            if e.row < current_row {
                return Err(DeltaError::UnsortedRows {
                    previous: current_row,
                    row: e.row,
                });
            }
            // Fill empty rows
            while current_row < e.row {
                row_ptr.push(col_idx.len());
                current_row += 1;
            }
            if let Some(&previous) = col_idx[row_ptr[current_row]..].last() {
                if e.col < previous {
                    return Err(DeltaError::UnsortedColumns {
                        row: e.row,
                        previous,
                        column: e.col,
                    });
                }
            }
            col_idx.push(e.col);
            values.push(e.value);
        }

        // Fill remaining empty rows
        while current_row < n_rows {
            row_ptr.push(col_idx.len());
            current_row += 1;
        }

        Ok(Self {
            n_rows,
            n_cols,
            row_ptr,
            col_idx,
            values,
        })
    }

    /// Returns the number of non-zero elements in the matrix
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Returns an iterator over the non-zero elements in row i
    ///
    /// Each item is a tuple (col_idx, value) representing a non-zero element
    pub fn row_iter(&self, i: usize) -> impl Iterator<Item = (usize, &T)> {
        assert!(i < self.n_rows, "Row index out of bounds");

        let start = self.row_ptr[i];
        let end = self.row_ptr[i + 1];

        self.col_idx[start..end]
            .iter()
            .zip(&self.values[start..end])
            .map(|(&col, val)| (col, val))
    }

    /// Number of stored elements in rows `rows`
    pub fn nnz_in(&self, rows: std::ops::Range<usize>) -> usize {
        self.row_ptr[rows.end] - self.row_ptr[rows.start]
    }

    /// All stored elements in row-major order
    pub fn entries(&self) -> impl Iterator<Item = Entry<T>> + '_ {
        self.entries_in(0..self.n_rows)
    }

    /// Stored elements of rows `rows` in row-major order
    pub fn entries_in(&self, rows: std::ops::Range<usize>) -> impl Iterator<Item = Entry<T>> + '_ {
        rows.flat_map(move |i| {
            self.row_iter(i)
                .map(move |(col, &value)| Entry::new(i, col, value))
        })
    }

    /// Creates an empty matrix with the given dimensions
    pub fn zeros(n_rows: usize, n_cols: usize) -> Self {
        Self {
            n_rows,
            n_cols,
            row_ptr: vec![0; n_rows + 1],
            col_idx: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Creates an identity matrix of the given size
    pub fn identity(n: usize) -> Self {
        Self {
            n_rows: n,
            n_cols: n,
            row_ptr: (0..=n).collect(),
            col_idx: (0..n).collect(),
            values: vec![T::one(); n],
        }
    }
}

/// Rows shown by the `Debug` output
const DEBUG_ROWS: usize = 4;

/// Leading rows of a matrix, each as a list of `(column, value)` pairs
struct RowPreview<'a, T>(&'a SparseMatrixCSR<T>);

impl<T: fmt::Debug + Copy + Num> fmt::Debug for RowPreview<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shown = DEBUG_ROWS.min(self.0.n_rows);
        let mut rows = f.debug_map();
        for i in 0..shown {
            rows.entry(&i, &self.0.row_iter(i).collect::<Vec<_>>());
        }
        if shown < self.0.n_rows {
            rows.entry(&"..", &(self.0.n_rows - shown));
        }
        rows.finish()
    }
}

impl<T: fmt::Debug + Copy + Num> fmt::Debug for SparseMatrixCSR<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SparseMatrixCSR")
            .field("shape", &(self.n_rows, self.n_cols))
            .field("nnz", &self.nnz())
            .field("rows", &RowPreview(self))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SparseMatrixCSR<f64> {
        let row_ptr = vec![0, 2, 3, 5];
        let col_idx = vec![0, 1, 1, 0, 2];
        SparseMatrixCSR::new(3, 3, row_ptr, col_idx, vec![1.0, 2.0, 3.0, 4.0, 5.0])
    }

    #[test]
    fn test_row_iter() {
        let m = sample();
        assert_eq!(m.row_iter(0).collect::<Vec<_>>(), vec![(0, &1.0), (1, &2.0)]);
        assert_eq!(m.row_iter(2).collect::<Vec<_>>(), vec![(0, &4.0), (2, &5.0)]);
    }

    #[test]
    fn test_entries_roundtrip() {
        let matrix = sample();
        let entries: Vec<_> = matrix.entries().collect();
        assert_eq!(entries.len(), 5);
        assert_eq!(entries[2], Entry::new(1, 1, 3.0));

        let rebuilt = SparseMatrixCSR::from_entries(3, 3, &entries).unwrap();
        assert_eq!(rebuilt, matrix);
    }

    #[test]
    fn test_from_entries_keeps_empty_rows() {
        let entries = [Entry::new(2, 1, 7.0f64)];
        let m = SparseMatrixCSR::from_entries(4, 2, &entries).unwrap();
        assert_eq!(m.row_ptr, vec![0, 0, 0, 1, 1]);
        assert_eq!(m.nnz_in(0..2), 0);
        assert_eq!(m.nnz_in(2..4), 1);
    }

    #[test]
    fn test_from_entries_rejects_unsorted() {
        let rows = [Entry::new(1, 0, 1.0f64), Entry::new(0, 0, 1.0)];
        assert!(matches!(
            SparseMatrixCSR::from_entries(2, 2, &rows),
            Err(DeltaError::UnsortedRows { previous: 1, row: 0 })
        ));

        let cols = [Entry::new(0, 1, 1.0f64), Entry::new(0, 0, 1.0)];
        assert!(matches!(
            SparseMatrixCSR::from_entries(2, 2, &cols),
            Err(DeltaError::UnsortedColumns { row: 0, previous: 1, column: 0 })
        ));

        let outside = [Entry::new(0, 5, 1.0f64)];
        assert!(SparseMatrixCSR::from_entries(2, 2, &outside).is_err());
    }

    #[test]
    fn test_identity_is_one_dense_run_per_row() {
        let m = SparseMatrixCSR::<i32>::identity(4);
        for (i, e) in m.entries().enumerate() {
            assert_eq!(e, Entry::new(i, i, 1));
        }
        assert_eq!(m.nnz_in(1..3), 2);
    }

    #[test]
    fn test_debug_previews_leading_rows() {
        let text = format!("{:?}", SparseMatrixCSR::<i32>::identity(6));
        assert!(text.contains("shape: (6, 6)"));
        assert!(text.contains("0: [(0, 1)]"));
        assert!(text.contains("\"..\": 2"));
    }

    #[test]
    #[should_panic(expected = "row_ptr[n_rows] must equal col_idx.len()")]
    fn test_row_ptr_must_cover_columns() {
        SparseMatrixCSR::new(2, 3, vec![0, 1, 3], vec![0, 2], vec![1, 2]);
    }
}
