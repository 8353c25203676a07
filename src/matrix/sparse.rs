//! Sparse matrix orchestrator and append-only build protocol
//!
//! The matrix moves through four phases: Empty, Building, optionally
//! Normalized, optionally Solved; [`SparseMatrix::clear`] returns it to
//! Empty. During the build phase all mutation goes through a
//! [`MatrixBuilder`], which holds the current section on each axis and the
//! pending-row buffer explicitly instead of hiding them in matrix state.
//!
//! The engine is single-threaded and synchronous; the full matrix stays
//! resident. The column-major transpose is a point-in-time snapshot: any
//! mutation of the row-major storage after [`SparseMatrix::build_transpose`]
//! leaves it stale until the caller rebuilds it.

use tracing::debug;

use crate::error::MatrixError;
use crate::matrix::solver::LeastSquaresSolver;
use crate::section::{
    ColumnKind, ColumnSection, MatrixSection, RowAccumulator, RowKind, RowSection,
    SectionContainer,
};

/// A sectioned sparse linear system under assembly.
///
/// Rows are stored as ordered `(column index, value)` lists. Duplicate
/// insertions into the same (row, column) slot are kept as separate entries,
/// never merged.
#[derive(Debug, Clone)]
pub struct SparseMatrix {
    rows: Vec<Vec<(usize, f64)>>,
    rhs: Vec<f64>,
    /// Parallel to `rhs`; allocated lazily when the first row supplies an
    /// uncertainty.
    uncertainty: Option<Vec<f64>>,
    row_sections: SectionContainer<RowSection>,
    col_sections: SectionContainer<ColumnSection>,
    /// Total number of value insertions, duplicates counted.
    entry_count: u64,
    /// One scale factor per column, shared per column section; present only
    /// after normalization.
    col_norm: Option<Vec<f64>>,
    transpose: Option<Vec<Vec<(usize, f64)>>>,
    solution: Option<Vec<f64>>,
    solution_error: Option<Vec<f64>>,
}

impl Default for SparseMatrix {
    fn default() -> Self {
        Self::new()
    }
}

impl SparseMatrix {
    pub fn new() -> Self {
        Self {
            rows: Vec::new(),
            rhs: Vec::new(),
            uncertainty: None,
            row_sections: SectionContainer::new(),
            col_sections: SectionContainer::new(),
            entry_count: 0,
            col_norm: None,
            transpose: None,
            solution: None,
            solution_error: None,
        }
    }

    /// Pre-sizes the row-aligned containers. Production inversions reach
    /// millions of rows, so reserving up front avoids repeated regrowth.
    pub fn with_row_capacity(rows: usize) -> Self {
        let mut matrix = Self::new();
        matrix.rows = Vec::with_capacity(rows);
        matrix.rhs = Vec::with_capacity(rows);
        matrix
    }

    /// Starts (or resumes) the append-only build protocol.
    pub fn builder(&mut self) -> MatrixBuilder<'_> {
        MatrixBuilder {
            matrix: self,
            current_row: None,
            current_col: None,
            pending: RowAccumulator::new(),
        }
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_cols(&self) -> usize {
        self.col_sections.total_indexes()
    }

    /// Total value insertions so far, duplicates counted.
    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    pub fn row(&self, index: usize) -> &[(usize, f64)] {
        &self.rows[index]
    }

    pub fn rows(&self) -> &[Vec<(usize, f64)>] {
        &self.rows
    }

    pub fn rhs(&self) -> &[f64] {
        &self.rhs
    }

    pub fn uncertainty(&self) -> Option<&[f64]> {
        self.uncertainty.as_deref()
    }

    pub fn col_norm(&self) -> Option<&[f64]> {
        self.col_norm.as_deref()
    }

    pub fn transpose(&self) -> Option<&[Vec<(usize, f64)>]> {
        self.transpose.as_deref()
    }

    pub fn row_sections(&self) -> &SectionContainer<RowSection> {
        &self.row_sections
    }

    pub fn col_sections(&self) -> &SectionContainer<ColumnSection> {
        &self.col_sections
    }

    pub fn is_normalized(&self) -> bool {
        self.col_norm.is_some()
    }

    pub fn is_solved(&self) -> bool {
        self.solution.is_some()
    }

    /// Number of columns in the grid-node section, zero when absent.
    /// Persisted in the size file alongside the global counts.
    pub fn grid_node_column_count(&self) -> usize {
        self.col_sections
            .find(ColumnKind::GridNode)
            .map(|s| s.core().index_count())
            .unwrap_or(0)
    }

    /// Total rows minus regularization rows. Regularization sections are
    /// appended after all observation rows; any regularization section
    /// starting before the running estimate is subtracted from it.
    pub fn observation_count(&self) -> usize {
        let mut count = self.rows.len();
        // Newest first, so each regularization block is peeled off the
        // running estimate in turn.
        for section in self.row_sections.iter().rev() {
            if section.kind().is_regularization() && section.core().start() < count {
                count = count.saturating_sub(section.core().index_count());
            }
        }
        count
    }

    /// Scales every stored nonzero by the RMS coefficient of its column's
    /// section and trims each row vector to exact size. One scalar is shared
    /// by all columns of a section; normalization is never per-column.
    /// Statistics are left untouched. A second call is a no-op.
    pub fn normalize_columns(&mut self) {
        if self.col_norm.is_some() {
            return;
        }
        let mut norm = vec![0.0; self.n_cols()];
        for section in self.col_sections.iter() {
            let scale = section.core().rms_norm();
            let start = section.core().start();
            let count = section.core().index_count();
            norm[start..start + count].fill(scale);
        }
        for row in &mut self.rows {
            for (col, value) in row.iter_mut() {
                // A zero coefficient means the section holds no data; its
                // values stay untouched.
                if norm[*col] != 0.0 {
                    *value /= norm[*col];
                }
            }
            row.shrink_to_fit();
        }
        debug!(cols = norm.len(), "normalized columns per section");
        self.col_norm = Some(norm);
    }

    fn transposed(&self) -> Vec<Vec<(usize, f64)>> {
        let mut counts = vec![0usize; self.n_cols()];
        for row in &self.rows {
            for &(col, _) in row {
                counts[col] += 1;
            }
        }
        let mut cols: Vec<Vec<(usize, f64)>> =
            counts.iter().map(|&n| Vec::with_capacity(n)).collect();
        for (r, row) in self.rows.iter().enumerate() {
            for &(col, value) in row {
                cols[col].push((r, value));
            }
        }
        cols
    }

    /// Derives the column-major mirror of the row-major storage. The result
    /// is a snapshot: later row mutation leaves it stale until this is
    /// called again.
    pub fn build_transpose(&mut self) {
        self.transpose = Some(self.transposed());
        debug!(cols = self.n_cols(), "built transpose snapshot");
    }

    /// Hands `(rows, transpose, rhs)` to the external solver, building the
    /// transpose first if absent, and stores the returned solution and
    /// solution-error arrays.
    pub fn solve(&mut self, solver: &mut dyn LeastSquaresSolver) -> Result<(), MatrixError> {
        if self.transpose.is_none() {
            self.build_transpose();
        }
        let transpose = match self.transpose.as_deref() {
            Some(t) => t,
            None => unreachable!("transpose was just built"),
        };
        let mut solution = vec![0.0; self.n_cols()];
        let mut solution_error = vec![0.0; self.n_cols()];
        debug!(
            rows = self.rows.len(),
            cols = solution.len(),
            "delegating to least-squares solver"
        );
        solver.solve(
            &self.rows,
            transpose,
            &self.rhs,
            &mut solution,
            &mut solution_error,
        )?;
        self.solution = Some(solution);
        self.solution_error = Some(solution_error);
        Ok(())
    }

    fn unnormalized(&self, col: usize, raw: f64) -> f64 {
        match self.col_norm.as_deref() {
            Some(norm) if norm[col] != 0.0 => raw / norm[col],
            _ => raw,
        }
    }

    /// Solution at a column index, with the column's section scalar undone
    /// when normalization was applied. `None` before solving.
    pub fn solution(&self, col: usize) -> Option<f64> {
        let raw = *self.solution.as_ref()?.get(col)?;
        Some(self.unnormalized(col, raw))
    }

    /// Solution error at a column index, denormalized the same way as
    /// [`SparseMatrix::solution`]. `None` before solving.
    pub fn solution_error(&self, col: usize) -> Option<f64> {
        let raw = *self.solution_error.as_ref()?.get(col)?;
        Some(self.unnormalized(col, raw))
    }

    /// Multiplies every nonzero in one row by `factor`. When the transpose
    /// exists its mirrored entries are located by linear scan over each
    /// affected column and scaled too; when it does not exist it stays
    /// unbuilt and the caller owns the staleness.
    pub fn scale_row(&mut self, row: usize, factor: f64) {
        assert!(
            row < self.rows.len(),
            "Row index {} out of bounds ({} rows)",
            row,
            self.rows.len()
        );
        let mut touched = Vec::with_capacity(self.rows[row].len());
        for (col, value) in self.rows[row].iter_mut() {
            *value *= factor;
            touched.push(*col);
        }
        if let Some(cols) = self.transpose.as_mut() {
            // Duplicate slots in the row must scale each mirrored entry once.
            touched.sort_unstable();
            touched.dedup();
            for col in touched {
                for (r, value) in cols[col].iter_mut() {
                    if *r == row {
                        *value *= factor;
                    }
                }
            }
        }
    }

    /// `(A·x)[i] − rhs[i]` for every row of one row section. `None` when the
    /// matrix is unsolved or the section was never opened.
    pub fn section_residuals(&self, kind: RowKind) -> Option<Vec<f64>> {
        let solution = self.solution.as_ref()?;
        let section = self.row_sections.find(kind)?;
        let start = section.core().start();
        let count = section.core().index_count();
        let mut residuals = Vec::with_capacity(count);
        for i in start..start + count {
            let predicted: f64 = self.rows[i].iter().map(|&(c, v)| v * solution[c]).sum();
            residuals.push(predicted - self.rhs[i]);
        }
        Some(residuals)
    }

    /// Recursive estimate of resident bytes across the matrix and all nested
    /// sections, containers, and vectors. Used for capacity planning.
    pub fn memory_estimate(&self) -> usize {
        fn vectors(rows: &[Vec<(usize, f64)>]) -> usize {
            rows.len() * std::mem::size_of::<Vec<(usize, f64)>>()
                + rows
                    .iter()
                    .map(|r| r.capacity() * std::mem::size_of::<(usize, f64)>())
                    .sum::<usize>()
        }
        fn dense(v: &Option<Vec<f64>>) -> usize {
            v.as_ref()
                .map(|v| v.capacity() * std::mem::size_of::<f64>())
                .unwrap_or(0)
        }

        std::mem::size_of::<Self>()
            + vectors(&self.rows)
            + self.transpose.as_deref().map(vectors).unwrap_or(0)
            + self.rhs.capacity() * std::mem::size_of::<f64>()
            + dense(&self.uncertainty)
            + dense(&self.col_norm)
            + dense(&self.solution)
            + dense(&self.solution_error)
            + self.row_sections.memory_estimate(RowSection::memory_estimate)
            + self
                .col_sections
                .memory_estimate(ColumnSection::memory_estimate)
    }

    /// Discards everything, returning the matrix to the empty build phase.
    pub fn clear(&mut self) {
        self.rows.clear();
        self.rhs.clear();
        self.uncertainty = None;
        self.row_sections = SectionContainer::new();
        self.col_sections = SectionContainer::new();
        self.entry_count = 0;
        self.col_norm = None;
        self.transpose = None;
        self.solution = None;
        self.solution_error = None;
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        rows: Vec<Vec<(usize, f64)>>,
        rhs: Vec<f64>,
        uncertainty: Option<Vec<f64>>,
        row_sections: SectionContainer<RowSection>,
        col_sections: SectionContainer<ColumnSection>,
        entry_count: u64,
        col_norm: Option<Vec<f64>>,
        transpose: Option<Vec<Vec<(usize, f64)>>>,
    ) -> Self {
        Self {
            rows,
            rhs,
            uncertainty,
            row_sections,
            col_sections,
            entry_count,
            col_norm,
            transpose,
            solution: None,
            solution_error: None,
        }
    }
}

/// Build-protocol handle over a [`SparseMatrix`].
///
/// The builder owns the two "current section" cursors and the pending-row
/// accumulator; dropping it abandons any uncommitted pending entries. All
/// sequencing rules are enforced here: only the newest section on an axis
/// accepts new entry IDs, and violations fail fast rather than misfiling the
/// entry.
#[derive(Debug)]
pub struct MatrixBuilder<'m> {
    matrix: &'m mut SparseMatrix,
    current_row: Option<usize>,
    current_col: Option<usize>,
    pending: RowAccumulator,
}

impl MatrixBuilder<'_> {
    /// Opens (or re-activates) a row section as current.
    pub fn open_rows(&mut self, kind: RowKind) {
        let before = self.matrix.row_sections.len();
        let position = self.matrix.row_sections.open(kind);
        if self.matrix.row_sections.len() > before {
            debug!(section = kind.name(), "opened row section");
        }
        self.current_row = Some(position);
    }

    /// Opens (or re-activates) a column section as current.
    pub fn open_columns(&mut self, kind: ColumnKind) {
        let before = self.matrix.col_sections.len();
        let position = self.matrix.col_sections.open(kind);
        if self.matrix.col_sections.len() > before {
            debug!(section = kind.name(), "opened column section");
        }
        self.current_col = Some(position);
    }

    /// The row currently being assembled, as buffered so far.
    pub fn pending(&self) -> &RowAccumulator {
        &self.pending
    }

    fn current_row(&self) -> Result<usize, MatrixError> {
        self.current_row
            .ok_or(MatrixError::NoCurrentSection { axis: "row" })
    }

    fn current_col(&self) -> Result<usize, MatrixError> {
        self.current_col
            .ok_or(MatrixError::NoCurrentSection { axis: "column" })
    }

    /// Resolves a column ID in the current column section, registering it
    /// when new. New IDs are only legal while the current section is the
    /// newest on the axis; anything else would break index contiguity.
    fn resolve_column(&mut self, col_id: i32, value: f64) -> Result<usize, MatrixError> {
        let position = self.current_col()?;
        let newest = self.matrix.col_sections.is_newest(position);
        let section = self.matrix.col_sections.validate_position_mut(position)?;
        if !newest && section.lookup(col_id).is_none() {
            return Err(MatrixError::SealedColumnSection {
                id: col_id,
                section: section.name(),
            });
        }
        Ok(section.register_column(col_id, value))
    }

    /// Appends one `(column, value)` entry to the pending row: resolves or
    /// creates the column index, buffers the entry, folds the value into the
    /// current row section's statistics, and counts the insertion.
    pub fn append(&mut self, col_id: i32, value: f64) -> Result<usize, MatrixError> {
        let row_position = self.current_row()?;
        let col_index = self.resolve_column(col_id, value)?;
        self.pending.push(col_index, value);
        self.matrix
            .row_sections
            .validate_position_mut(row_position)?
            .core_mut()
            .observe(value);
        self.matrix.entry_count += 1;
        Ok(col_index)
    }

    /// Seals the pending row under `row_id` and returns its global index.
    ///
    /// A new row ID turns the pending entries into that row's permanent
    /// sparse vector and appends `rhs` (plus `uncertainty`, lazily allocating
    /// that array on first use). An already-registered row ID appends the
    /// pending entries onto the existing stored vector instead, ignoring the
    /// supplied rhs; re-inserted column IDs then occupy separate slots. The
    /// buffered hit count and weight are flushed exactly once either way and
    /// the pending buffer is reset.
    pub fn commit_row(
        &mut self,
        row_id: i64,
        rhs: f64,
        uncertainty: Option<f64>,
    ) -> Result<usize, MatrixError> {
        let position = self.current_row()?;
        let newest = self.matrix.row_sections.is_newest(position);
        let existing = self
            .matrix
            .row_sections
            .validate_position(position)?
            .lookup(row_id);

        let hits = self.pending.hits();
        let weight = self.pending.weight();

        match existing {
            Some(global) => {
                let entries = self.pending.take();
                self.matrix.rows[global].extend(entries);
                let section = self.matrix.row_sections.validate_position_mut(position)?;
                let local = global - section.core().start();
                section.core_mut().record_hits(local, hits, weight);
                Ok(global)
            }
            None => {
                if !newest {
                    let section = self.matrix.row_sections.validate_position(position)?;
                    return Err(MatrixError::SealedRowSection {
                        id: row_id,
                        section: section.name(),
                    });
                }
                let entries = self.pending.take();
                let section = self.matrix.row_sections.validate_position_mut(position)?;
                let (global, _new) = section.register_row(row_id);
                let local = global - section.core().start();
                section.core_mut().record_hits(local, hits, weight);
                debug_assert_eq!(global, self.matrix.rows.len());
                self.matrix.rows.push(entries);
                self.matrix.rhs.push(rhs);
                match (&mut self.matrix.uncertainty, uncertainty) {
                    (Some(values), unc) => values.push(unc.unwrap_or(0.0)),
                    (slot @ None, Some(unc)) => {
                        let mut values = vec![0.0; self.matrix.rhs.len() - 1];
                        values.push(unc);
                        *slot = Some(values);
                    }
                    (None, None) => {}
                }
                Ok(global)
            }
        }
    }

    /// Reopens an already-committed row and appends one entry in place,
    /// typically layering a newer column category onto observation rows. The
    /// row must exist in the current row section. The row is already sealed,
    /// so hit bookkeeping is applied immediately, not buffered.
    pub fn append_to_row(
        &mut self,
        row_id: i64,
        col_id: i32,
        value: f64,
    ) -> Result<usize, MatrixError> {
        let position = self.current_row()?;
        let (global, local) = {
            let section = self.matrix.row_sections.validate_position(position)?;
            match section.lookup(row_id) {
                Some(global) => (global, global - section.core().start()),
                None => {
                    return Err(MatrixError::RowNotRegistered {
                        id: row_id,
                        section: section.name(),
                    })
                }
            }
        };
        let col_index = self.resolve_column(col_id, value)?;
        self.matrix.rows[global].push((col_index, value));
        let section = self.matrix.row_sections.validate_position_mut(position)?;
        section.core_mut().observe(value);
        section.core_mut().record_hits(local, 1, value);
        self.matrix.entry_count += 1;
        Ok(col_index)
    }
}
