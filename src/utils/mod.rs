//! Utility functions and helpers

pub mod formats;

pub use formats::{to_csc, to_csr};
