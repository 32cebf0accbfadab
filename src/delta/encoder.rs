//! Byte encoder: the sink that materializes a [`DeltaMatrix`]

use tracing::debug;

use crate::delta::classifier::classify;
use crate::delta::emit::{ArtifactBuffers, UnitEmitter};
use crate::delta::format::DeltaMatrix;
use crate::delta::sink::{PassInfo, UnitSink};
use crate::delta::unit::{DenseUnit, SparseUnit};
use crate::delta::value::DeltaValue;
use crate::error::Result;
use crate::matrix::config::DeltaConfig;
use crate::matrix::{Entry, SparseMatrixCSR};

/// Writes units into the control stream, dictionaries and value section
pub struct DeltaEncoder<T> {
    emitter: UnitEmitter<T, ArtifactBuffers<T>>,
}

impl<T: DeltaValue> DeltaEncoder<T> {
    /// Creates an encoder laying units out per `config.strategy`
    pub fn new(config: &DeltaConfig) -> Self {
        Self {
            emitter: UnitEmitter::new(config.strategy, config, ArtifactBuffers::default()),
        }
    }
}

impl<T: DeltaValue> UnitSink<T> for DeltaEncoder<T> {
    type Output = DeltaMatrix<T>;

    fn finalize_sparse(&mut self, unit: SparseUnit<T>) -> Result<()> {
        self.emitter.emit_sparse(&unit);
        Ok(())
    }

    fn finalize_dense(&mut self, unit: DenseUnit<T>) -> Result<()> {
        self.emitter.emit_dense(&unit);
        Ok(())
    }

    fn finalize_all(self, info: PassInfo) -> Result<DeltaMatrix<T>> {
        let strategy = self.emitter.strategy();
        let (buffers, col_dicts) = self.emitter.finish();
        let matrix = DeltaMatrix {
            n_rows: info.n_rows,
            n_cols: info.n_cols,
            nnz: info.nnz,
            row_start: info.row_start,
            strategy,
            ctl: buffers.ctl,
            col_dicts,
            values: buffers.values,
        };
        debug!(
            strategy = strategy.name(),
            ctl_bytes = matrix.ctl.len(),
            dict_bytes = matrix.dict_bytes(),
            value_bytes = matrix.value_bytes(),
            "encoded delta matrix"
        );
        Ok(matrix)
    }
}

/// Encodes a row-major entry stream of an `n_rows × n_cols` matrix
pub fn encode_entries<T, I>(
    entries: I,
    n_rows: usize,
    n_cols: usize,
    config: &DeltaConfig,
) -> Result<DeltaMatrix<T>>
where
    T: DeltaValue,
    I: IntoIterator<Item = Result<Entry<T>>>,
{
    classify(
        entries.into_iter(),
        PassInfo::new(n_rows, n_cols),
        config,
        DeltaEncoder::new(config),
    )
}

/// Encodes a CSR matrix
pub fn encode_csr<T: DeltaValue>(
    matrix: &SparseMatrixCSR<T>,
    config: &DeltaConfig,
) -> Result<DeltaMatrix<T>> {
    encode_entries(
        matrix.entries().map(Ok),
        matrix.n_rows,
        matrix.n_cols,
        config,
    )
}
