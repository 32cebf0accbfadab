//! Conversions between our CSR container, encoded artifacts and sprs

use crate::delta::format::DeltaMatrix;
use crate::delta::value::DeltaValue;
use crate::error::Result;
use crate::matrix::SparseMatrixCSR;
use num_traits::Num;
use sprs::{CsMat, TriMat};

/// Converts our CSR matrix format to sprs CsMat format
///
/// # Panics
///
/// Panics if a row holds duplicate column indices, which sprs does not accept.
pub fn to_sprs_csr<T>(matrix: &SparseMatrixCSR<T>) -> CsMat<T>
where
    T: Copy + Num + Default,
{
    CsMat::new(
        (matrix.n_rows, matrix.n_cols),
        matrix.row_ptr.clone(),
        matrix.col_idx.clone(),
        matrix.values.clone(),
    )
}

/// Converts sprs CsMat to our SparseMatrixCSR format, converting CSC input first
pub fn from_sprs_csr<T>(matrix: CsMat<T>) -> SparseMatrixCSR<T>
where
    T: Copy + Num + Default,
{
    let matrix = if matrix.is_csr() {
        matrix
    } else {
        matrix.to_csr()
    };

    let shape = matrix.shape();
    let (indptr, indices, data) = matrix.into_raw_storage();

    SparseMatrixCSR::new(shape.0, shape.1, indptr, indices, data)
}

/// Decodes an artifact straight into sprs, unit by unit
///
/// Goes through a triplet matrix, so duplicate entries are summed rather than
/// rejected.
pub fn decode_to_sprs<T>(matrix: &DeltaMatrix<T>) -> Result<CsMat<T>>
where
    T: DeltaValue + Default + std::ops::AddAssign,
{
    let mut triplets = TriMat::with_capacity((matrix.n_rows, matrix.n_cols), matrix.nnz);
    for unit in matrix.units().placed() {
        for e in unit?.entries() {
            triplets.add_triplet(e.row, e.col, e.value);
        }
    }
    Ok(triplets.to_csr())
}
