//! # tomolsq: sectioned sparse-matrix assembly for tomographic inversion
//!
//! This library assembles large sparse linear systems (millions of rows) for
//! geophysical inversion and hands them to an external least-squares solver.
//!
//! ## Overview
//!
//! The matrix is built through a strict, order-sensitive protocol that maps
//! domain-level identifiers (grid-node ids, site ids, event ids, row tags)
//! onto dense contiguous indices:
//!
//! - **Sections**: each semantic row category (observations, damping,
//!   smoothing) and column category (grid nodes, site terms, event terms)
//!   owns one contiguous block of indices, assigned in first-use order.
//! - **Build protocol**: open a column category and a row category, append
//!   `(column id, value)` entries, commit each row with its right-hand-side
//!   target. Only the newest section on an axis accepts new entry IDs;
//!   violations fail fast instead of misfiling entries.
//! - **Normalization**: one RMS scale factor per column section, applied in
//!   place and undone transparently when reading the solution back.
//! - **Persistence**: the whole structure round-trips through a multi-file
//!   big-endian binary format.
//!
//! ## Usage
//!
//! ```
//! use tomolsq::{ColumnKind, RowKind, SparseMatrix};
//!
//! let mut matrix = SparseMatrix::new();
//! let mut builder = matrix.builder();
//! builder.open_columns(ColumnKind::GridNode);
//! builder.open_rows(RowKind::PrimaryObservation);
//!
//! builder.append(3, 2.0).unwrap();
//! builder.commit_row(1001, 10.0, None).unwrap();
//!
//! builder.append(3, 1.0).unwrap();
//! builder.append(5, 4.0).unwrap();
//! builder.commit_row(1002, 20.0, None).unwrap();
//! drop(builder);
//!
//! assert_eq!(matrix.n_rows(), 2);
//! assert_eq!(matrix.n_cols(), 2);
//! assert_eq!(matrix.entry_count(), 3);
//! ```

pub mod error;
pub mod io;
pub mod matrix;
pub mod section;
pub mod utils;

// Re-export primary components
pub use error::MatrixError;
pub use io::{read_matrix, read_vectors, write_matrix};
pub use matrix::{LeastSquaresSolver, MatrixBuilder, SparseMatrix};
pub use section::{
    ColumnKind, ColumnSection, MatrixSection, RowAccumulator, RowKind, RowSection,
    SectionContainer, SectionCore, SectionStats,
};
pub use utils::{to_csc, to_csr};

/// Version information for the tomolsq library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
