//! Error taxonomy for the assembly engine
//!
//! Protocol violations are fatal: silently absorbing them would desynchronize
//! the index-contiguity invariant that every later index-to-section lookup
//! relies on. Lookups of unregistered entry IDs are *not* errors; they return
//! `None` so the hot path stays cheap. The uncertainty file being absent on
//! disk is the one tolerated missing resource and is normalized to `None`
//! rather than surfacing here.

use thiserror::Error;

/// Errors raised by the build protocol, the solver boundary, and persistence.
#[derive(Debug, Error)]
pub enum MatrixError {
    /// A never-seen column ID was inserted while an older, sealed column
    /// section was current.
    #[error("column id {id} is new, but '{section}' is no longer the newest column section")]
    SealedColumnSection { id: i32, section: &'static str },

    /// A never-seen row ID was committed while an older, sealed row section
    /// was current.
    #[error("row id {id} is new, but '{section}' is no longer the newest row section")]
    SealedRowSection { id: i64, section: &'static str },

    /// A row-retarget operation named a row that was never registered in the
    /// current row section.
    #[error("row id {id} is not registered in section '{section}'")]
    RowNotRegistered { id: i64, section: &'static str },

    /// An append or commit was issued before any section was opened on the
    /// named axis.
    #[error("no current {axis} section; open a category first")]
    NoCurrentSection { axis: &'static str },

    /// A current-section position does not match the section actually stored
    /// at that position in the container.
    #[error("section position {position} does not belong to this container")]
    ForeignSection { position: usize },

    /// A persistence file is corrupt, truncated, or carries an unknown
    /// section name.
    #[error("format error: {0}")]
    Format(String),

    /// The external least-squares solver reported a failure.
    #[error("solver failed: {0}")]
    Solver(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl MatrixError {
    /// True for the protocol-violation class of errors (sequencing mistakes
    /// by the upstream model builder, as opposed to I/O or solver trouble).
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            MatrixError::SealedColumnSection { .. }
                | MatrixError::SealedRowSection { .. }
                | MatrixError::RowNotRegistered { .. }
                | MatrixError::NoCurrentSection { .. }
                | MatrixError::ForeignSection { .. }
        )
    }
}
