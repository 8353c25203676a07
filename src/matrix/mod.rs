// Matrix orchestrator and the external solver boundary

pub mod solver;
pub mod sparse;

pub use solver::LeastSquaresSolver;
pub use sparse::{MatrixBuilder, SparseMatrix};
