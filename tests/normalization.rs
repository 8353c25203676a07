//! Tests for column normalization, transpose, solve readback, and residuals

use tomolsq::{ColumnKind, LeastSquaresSolver, MatrixError, MatrixSection, RowKind, SparseMatrix};

/// Stand-in for the external iterative solver: writes fixed values into the
/// output arrays.
struct FixedSolver {
    solution: Vec<f64>,
    solution_error: Vec<f64>,
}

impl LeastSquaresSolver for FixedSolver {
    fn solve(
        &mut self,
        rows: &[Vec<(usize, f64)>],
        cols: &[Vec<(usize, f64)>],
        rhs: &[f64],
        solution: &mut [f64],
        solution_error: &mut [f64],
    ) -> Result<(), MatrixError> {
        assert_eq!(rows.len(), rhs.len());
        assert_eq!(cols.len(), solution.len());
        solution.copy_from_slice(&self.solution);
        solution_error.copy_from_slice(&self.solution_error);
        Ok(())
    }
}

fn two_column_matrix() -> SparseMatrix {
    let mut matrix = SparseMatrix::new();
    let mut b = matrix.builder();
    b.open_columns(ColumnKind::GridNode);
    b.open_rows(RowKind::PrimaryObservation);
    b.append(1, 3.0).unwrap();
    b.commit_row(10, 9.0, None).unwrap();
    b.append(1, 4.0).unwrap();
    b.append(2, 2.0).unwrap();
    b.commit_row(11, 6.0, None).unwrap();
    drop(b);
    matrix
}

#[test]
fn normalization_is_section_granular() {
    let mut matrix = two_column_matrix();
    matrix.normalize_columns();

    // One shared scalar for the whole grid-node section:
    // sqrt((9 + 16 + 4) / 2 columns).
    let scale = (29.0f64 / 2.0).sqrt();
    let norm = matrix.col_norm().unwrap();
    assert_eq!(norm.len(), 2);
    assert!((norm[0] - scale).abs() < 1e-12);
    assert!((norm[1] - scale).abs() < 1e-12);

    assert!((matrix.row(0)[0].1 - 3.0 / scale).abs() < 1e-12);
    assert!((matrix.row(1)[1].1 - 2.0 / scale).abs() < 1e-12);
}

#[test]
fn normalization_leaves_statistics_untouched() {
    let mut matrix = two_column_matrix();
    let before = matrix
        .col_sections()
        .find(ColumnKind::GridNode)
        .unwrap()
        .core()
        .stats()
        .clone();

    matrix.normalize_columns();

    let after = matrix
        .col_sections()
        .find(ColumnKind::GridNode)
        .unwrap()
        .core()
        .stats()
        .clone();
    assert_eq!(before, after);
}

#[test]
fn solution_readback_undoes_section_scalar() {
    let mut matrix = two_column_matrix();
    matrix.normalize_columns();

    let mut solver = FixedSolver {
        solution: vec![10.0, 20.0],
        solution_error: vec![1.0, 2.0],
    };
    matrix.solve(&mut solver).unwrap();

    let scale = (29.0f64 / 2.0).sqrt();
    assert!((matrix.solution(0).unwrap() - 10.0 / scale).abs() < 1e-12);
    assert!((matrix.solution(1).unwrap() - 20.0 / scale).abs() < 1e-12);
    assert!((matrix.solution_error(1).unwrap() - 2.0 / scale).abs() < 1e-12);
}

#[test]
fn unnormalized_solve_returns_raw_values() {
    let mut matrix = two_column_matrix();
    let mut solver = FixedSolver {
        solution: vec![3.0, -6.0],
        solution_error: vec![0.5, 0.25],
    };
    matrix.solve(&mut solver).unwrap();

    assert_eq!(matrix.solution(0), Some(3.0));
    assert_eq!(matrix.solution(1), Some(-6.0));
    assert_eq!(matrix.solution_error(0), Some(0.5));
    // Out of range is absent, not zero.
    assert_eq!(matrix.solution(2), None);
}

#[test]
fn solve_builds_transpose_when_absent() {
    let mut matrix = two_column_matrix();
    assert!(matrix.transpose().is_none());

    let mut solver = FixedSolver {
        solution: vec![0.0, 0.0],
        solution_error: vec![0.0, 0.0],
    };
    matrix.solve(&mut solver).unwrap();

    let cols = matrix.transpose().unwrap();
    assert_eq!(cols[0], vec![(0, 3.0), (1, 4.0)]);
    assert_eq!(cols[1], vec![(1, 2.0)]);
}

#[test]
fn transpose_is_a_stale_snapshot() {
    let mut matrix = two_column_matrix();
    matrix.build_transpose();

    {
        let mut b = matrix.builder();
        b.open_columns(ColumnKind::GridNode);
        b.open_rows(RowKind::PrimaryObservation);
        b.append_to_row(10, 2, 7.0).unwrap();
    }

    // The row grew; the snapshot did not.
    assert_eq!(matrix.row(0).len(), 2);
    assert_eq!(matrix.transpose().unwrap()[1], vec![(1, 2.0)]);

    matrix.build_transpose();
    assert_eq!(matrix.transpose().unwrap()[1], vec![(0, 7.0), (1, 2.0)]);
}

#[test]
fn section_residuals_for_solved_matrix() {
    let mut matrix = two_column_matrix();
    // rows: [3x0] = 9, [4x0 + 2x1] = 6; pick x = (3, -3).
    let mut solver = FixedSolver {
        solution: vec![3.0, -3.0],
        solution_error: vec![0.0, 0.0],
    };
    matrix.solve(&mut solver).unwrap();

    let residuals = matrix
        .section_residuals(RowKind::PrimaryObservation)
        .unwrap();
    assert_eq!(residuals.len(), 2);
    assert!((residuals[0] - 0.0).abs() < 1e-12);
    assert!((residuals[1] - 0.0).abs() < 1e-12);

    // Unsolved matrix or absent section: unavailable.
    assert!(matrix.section_residuals(RowKind::Damping).is_none());
    assert!(two_column_matrix()
        .section_residuals(RowKind::PrimaryObservation)
        .is_none());
}

#[test]
fn scale_row_updates_transpose_when_present() {
    let mut matrix = two_column_matrix();
    matrix.build_transpose();

    matrix.scale_row(1, 2.0);
    assert_eq!(matrix.row(1), &[(0, 8.0), (1, 4.0)]);
    assert_eq!(matrix.transpose().unwrap()[0], vec![(0, 3.0), (1, 8.0)]);
    assert_eq!(matrix.transpose().unwrap()[1], vec![(1, 4.0)]);
}

#[test]
fn scale_row_leaves_missing_transpose_unbuilt() {
    let mut matrix = two_column_matrix();
    matrix.scale_row(0, 0.5);
    assert_eq!(matrix.row(0), &[(0, 1.5)]);
    assert!(matrix.transpose().is_none());
}

#[test]
fn reopened_row_keeps_duplicate_slots() {
    // Re-inserting the same column into a committed row yields two separate
    // nonzero slots; whether that is accumulation semantics or a latent
    // defect is undetermined, so the behavior is pinned here.
    let mut matrix = SparseMatrix::new();
    {
        let mut b = matrix.builder();
        b.open_columns(ColumnKind::GridNode);
        b.open_rows(RowKind::PrimaryObservation);
        b.append(3, 2.0).unwrap();
        b.commit_row(1, 10.0, None).unwrap();

        let index = b.append_to_row(1, 3, 5.0).unwrap();
        assert_eq!(index, 0, "column keeps its assigned index");
    }

    assert_eq!(matrix.entry_count(), 2);
    assert_eq!(matrix.row(0), &[(0, 2.0), (0, 5.0)]);
}

#[test]
fn scale_row_with_duplicate_slots_scales_each_once() {
    let mut matrix = SparseMatrix::new();
    {
        let mut b = matrix.builder();
        b.open_columns(ColumnKind::GridNode);
        b.open_rows(RowKind::PrimaryObservation);
        b.append(3, 2.0).unwrap();
        b.append(3, 5.0).unwrap();
        b.commit_row(1, 10.0, None).unwrap();
    }
    matrix.build_transpose();

    matrix.scale_row(0, 10.0);
    assert_eq!(matrix.row(0), &[(0, 20.0), (0, 50.0)]);
    assert_eq!(matrix.transpose().unwrap()[0], vec![(0, 20.0), (0, 50.0)]);
}
