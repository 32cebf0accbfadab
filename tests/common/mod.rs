//! Shared helpers for the integration tests.
//!
//! Provides a deterministic generator for matrices that mix dense runs,
//! scattered columns and repeated row patterns, so that every unit kind and
//! both dictionaries get exercised.

use spm_delta::{Entry, SparseMatrixCSR};

// ---------------------------------------------------------------------------
// Random number generator (simple LCG for deterministic reproducibility)
// ---------------------------------------------------------------------------

/// A minimal linear congruential generator for deterministic test data.
pub struct Lcg {
    state: u64,
}

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    pub fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.state
    }

    /// Uniform integer in `0..bound`
    pub fn below(&mut self, bound: usize) -> usize {
        ((self.next_u64() >> 33) as usize) % bound.max(1)
    }
}

// ---------------------------------------------------------------------------
// Matrix generators
// ---------------------------------------------------------------------------

/// Generates an `n_rows × n_cols` matrix whose rows are built from dense runs,
/// single scattered columns and, every few rows, a copy of an earlier row's
/// pattern shifted in place. Values come from a small palette.
pub fn structured_matrix(n_rows: usize, n_cols: usize, seed: u64) -> SparseMatrixCSR<f64> {
    let mut rng = Lcg::new(seed);
    let palette = [0.5, 1.0, -2.0, 3.25, 1e-3];
    let mut patterns: Vec<Vec<usize>> = Vec::new();
    let mut entries = Vec::new();

    for row in 0..n_rows {
        let cols = if !patterns.is_empty() && rng.below(3) == 0 {
            patterns[rng.below(patterns.len())].clone()
        } else {
            let mut cols = Vec::new();
            let mut col = rng.below(8);
            while col < n_cols && cols.len() < 300 {
                if rng.below(4) == 0 {
                    let run = 2 + rng.below(20);
                    for c in col..(col + run).min(n_cols) {
                        cols.push(c);
                    }
                    col += run;
                } else {
                    cols.push(col);
                }
                let far = rng.below(10) == 0;
                col += 1 + rng.below(if far { 5000 } else { 6 });
            }
            patterns.push(cols.clone());
            cols
        };

        for c in cols {
            entries.push(Entry::new(row, c, palette[rng.below(palette.len())]));
        }
    }

    SparseMatrixCSR::from_entries(n_rows, n_cols, &entries).expect("generated entries are sorted")
}
