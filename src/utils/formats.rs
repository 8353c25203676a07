//! Utilities for exporting the assembled system to external matrix libraries

use sprs::{CsMat, TriMat};

use crate::matrix::SparseMatrix;

/// Builds a triplet matrix from the row-major storage. Duplicate slots in a
/// row become duplicate triplets; sprs sums them on compression, which is the
/// correct contribution to `A·x`.
fn to_triplets(matrix: &SparseMatrix) -> TriMat<f64> {
    let mut triplets = TriMat::with_capacity(
        (matrix.n_rows(), matrix.n_cols()),
        matrix.entry_count() as usize,
    );
    for (row, entries) in matrix.rows().iter().enumerate() {
        for &(col, value) in entries {
            triplets.add_triplet(row, col, value);
        }
    }
    triplets
}

/// Exports the assembled matrix as a sprs CSR matrix.
pub fn to_csr(matrix: &SparseMatrix) -> CsMat<f64> {
    to_triplets(matrix).to_csr()
}

/// Exports the assembled matrix as a sprs CSC matrix.
pub fn to_csc(matrix: &SparseMatrix) -> CsMat<f64> {
    to_triplets(matrix).to_csc()
}
