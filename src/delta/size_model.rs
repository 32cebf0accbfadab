//! # Size Model
//!
//! Predicts the encoded size of a matrix under several strategies in a single
//! classification pass, without materializing any artifact. Each strategy is
//! tracked by its own counting [`UnitEmitter`], so dictionary-based strategies
//! keep their own dictionaries and value tables.
//!
//! Reports compare against a CSR layout with 4-byte indices and pointers.

use std::fmt;

use tracing::info;

use crate::constants::CSR_INDEX_BYTES;
use crate::delta::classifier::classify;
use crate::delta::emit::{ByteCount, UnitEmitter};
use crate::delta::sink::{PassInfo, UnitSink};
use crate::delta::unit::{DenseUnit, SparseUnit};
use crate::delta::value::DeltaValue;
use crate::error::Result;
use crate::matrix::config::{DeltaConfig, EncodingStrategy};
use crate::matrix::{Entry, SparseMatrixCSR};

/// Predicted size of one strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrategySize {
    pub strategy: EncodingStrategy,
    /// Control stream bytes
    pub ctl_bytes: usize,
    /// Column dictionary bytes
    pub dict_bytes: usize,
    /// Value section bytes
    pub value_bytes: usize,
}

impl StrategySize {
    pub fn total(&self) -> usize {
        self.ctl_bytes + self.dict_bytes + self.value_bytes
    }
}

/// Sizes of every tracked strategy next to the CSR baseline
#[derive(Debug, Clone, PartialEq)]
pub struct SizeReport {
    pub n_rows: usize,
    pub nnz: usize,
    /// CSR value array bytes
    pub csr_value_bytes: usize,
    /// CSR row pointer and column index bytes
    pub csr_index_bytes: usize,
    pub strategies: Vec<StrategySize>,
}

impl SizeReport {
    pub fn csr_bytes(&self) -> usize {
        self.csr_value_bytes + self.csr_index_bytes
    }

    /// Share of the CSR size taken by indices, in percent
    pub fn index_percentage(&self) -> f64 {
        percent(self.csr_index_bytes as f64, self.csr_bytes() as f64)
    }

    /// Size reduction of `size` against CSR, in percent (negative when larger)
    pub fn reduction(&self, size: &StrategySize) -> f64 {
        let csr = self.csr_bytes() as f64;
        percent(csr - size.total() as f64, csr)
    }

    /// Entry of `strategy`, if it was tracked
    pub fn get(&self, strategy: EncodingStrategy) -> Option<&StrategySize> {
        self.strategies.iter().find(|s| s.strategy == strategy)
    }

    /// Smallest tracked strategy
    pub fn best(&self) -> Option<&StrategySize> {
        self.strategies.iter().min_by_key(|s| s.total())
    }
}

fn percent(part: f64, whole: f64) -> f64 {
    if whole == 0.0 {
        0.0
    } else {
        part / whole * 100.0
    }
}

impl fmt::Display for SizeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "csr size: {} index percentage: {:.2}",
            self.csr_bytes(),
            self.index_percentage()
        )?;
        for s in &self.strategies {
            writeln!(
                f,
                "{} size {} reduction {:.2}",
                s.strategy.name(),
                s.total(),
                self.reduction(s)
            )?;
        }
        Ok(())
    }
}

/// Sink tracking the encoded size of several strategies at once
pub struct SizeModel<T> {
    keepers: Vec<UnitEmitter<T, ByteCount>>,
}

impl<T: DeltaValue> SizeModel<T> {
    /// Tracks `strategies`, with dictionary parameters from `config`
    pub fn new(strategies: &[EncodingStrategy], config: &DeltaConfig) -> Self {
        let keepers = strategies
            .iter()
            .map(|&s| UnitEmitter::new(s, config, ByteCount::default()))
            .collect();
        Self { keepers }
    }

    /// Tracks every strategy
    pub fn all(config: &DeltaConfig) -> Self {
        Self::new(&EncodingStrategy::ALL, config)
    }
}

impl<T: DeltaValue> UnitSink<T> for SizeModel<T> {
    type Output = SizeReport;

    fn finalize_sparse(&mut self, unit: SparseUnit<T>) -> Result<()> {
        for k in &mut self.keepers {
            k.emit_sparse(&unit);
        }
        Ok(())
    }

    fn finalize_dense(&mut self, unit: DenseUnit<T>) -> Result<()> {
        for k in &mut self.keepers {
            k.emit_dense(&unit);
        }
        Ok(())
    }

    fn finalize_all(self, info: PassInfo) -> Result<SizeReport> {
        let strategies = self
            .keepers
            .iter()
            .map(|k| StrategySize {
                strategy: k.strategy(),
                ctl_bytes: k.output().ctl,
                dict_bytes: k.dictionary_bytes(),
                value_bytes: k.output().values,
            })
            .collect();

        let report = SizeReport {
            n_rows: info.n_rows,
            nnz: info.nnz,
            csr_value_bytes: info.nnz * T::WIDTH,
            csr_index_bytes: info.nnz * CSR_INDEX_BYTES + (info.n_rows + 1) * CSR_INDEX_BYTES,
            strategies,
        };

        info!(
            csr_bytes = report.csr_bytes(),
            index_percentage = report.index_percentage(),
            "csr baseline"
        );
        for s in &report.strategies {
            info!(
                strategy = s.strategy.name(),
                bytes = s.total(),
                reduction = report.reduction(s),
                "predicted size"
            );
        }
        Ok(report)
    }
}

/// Predicts the size of every strategy for a row-major entry stream
pub fn estimate_entries<T, I>(
    entries: I,
    n_rows: usize,
    n_cols: usize,
    config: &DeltaConfig,
) -> Result<SizeReport>
where
    T: DeltaValue,
    I: IntoIterator<Item = Result<Entry<T>>>,
{
    classify(
        entries.into_iter(),
        PassInfo::new(n_rows, n_cols),
        config,
        SizeModel::all(config),
    )
}

/// Predicts the size of every strategy for a CSR matrix
pub fn estimate_csr<T: DeltaValue>(
    matrix: &SparseMatrixCSR<T>,
    config: &DeltaConfig,
) -> Result<SizeReport> {
    estimate_entries(matrix.entries().map(Ok), matrix.n_rows, matrix.n_cols, config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csr_baseline() {
        let m = SparseMatrixCSR::<f64>::identity(10);
        let report = estimate_csr(&m, &DeltaConfig::default()).unwrap();
        assert_eq!(report.csr_value_bytes, 80);
        assert_eq!(report.csr_index_bytes, 40 + 44);
        assert_eq!(report.strategies.len(), EncodingStrategy::ALL.len());
        assert!((report.index_percentage() - 84.0 / 164.0 * 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_dense_rows_beat_csr() {
        let n = 64;
        let entries: Vec<_> = (0..n)
            .flat_map(|r| (0..n).map(move |c| Entry::new(r, c, 1.0f64)))
            .collect();
        let m = SparseMatrixCSR::from_entries(n, n, &entries).unwrap();
        let report = estimate_csr(&m, &DeltaConfig::default()).unwrap();

        let jump = report.get(EncodingStrategy::Jump).unwrap();
        assert!(report.reduction(jump) > 0.0);
        // a single distinct value collapses the value section
        let cv = report.get(EncodingStrategy::ValueDictionary).unwrap();
        assert_eq!(cv.value_bytes, 8);
        assert!(report.best().unwrap().strategy.uses_value_dictionary());
    }

    #[test]
    fn test_empty_matrix_report() {
        let m = SparseMatrixCSR::<f64>::zeros(3, 3);
        let report = estimate_csr(&m, &DeltaConfig::default()).unwrap();
        assert_eq!(report.nnz, 0);
        assert!(report.strategies.iter().all(|s| s.total() == 0));
        assert!(report.to_string().contains("delta_jmp_cvi size 0"));
    }
}
