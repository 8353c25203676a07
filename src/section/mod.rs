// Section layer: per-category index ranges, statistics, and the axis registry

pub mod base;
pub mod column;
pub mod container;
pub mod row;
pub mod stats;

pub use base::SectionCore;
pub use column::{ColumnKind, ColumnSection};
pub use container::{MatrixSection, SectionContainer};
pub use row::{RowAccumulator, RowKind, RowSection};
pub use stats::SectionStats;
