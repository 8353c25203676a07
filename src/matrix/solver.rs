//! Boundary to the external least-squares solver
//!
//! The engine assembles a consistent `(row-major, column-major, rhs)` triple
//! and receives back two dense arrays aligned to column index. It never
//! inspects solver internals or iteration state.

use crate::error::MatrixError;

/// An opaque iterative least-squares routine.
///
/// `rows` is the row-major storage, `cols` its column-major mirror, and
/// `rhs` the target vector; `solution` and `solution_error` are
/// caller-allocated output slices with one slot per matrix column.
pub trait LeastSquaresSolver {
    fn solve(
        &mut self,
        rows: &[Vec<(usize, f64)>],
        cols: &[Vec<(usize, f64)>],
        rhs: &[f64],
        solution: &mut [f64],
        solution_error: &mut [f64],
    ) -> Result<(), MatrixError>;
}
