//! Tests for the append/commit build protocol and its sequencing rules

use proptest::prelude::*;
use tomolsq::{ColumnKind, MatrixSection, RowKind, SparseMatrix};

#[test]
fn two_row_build_scenario() {
    // Open column category A, open row category B; r1 = {col 3 -> 2.0},
    // rhs 10.0; r2 = {col 3 -> 1.0, col 5 -> 4.0}, rhs 20.0.
    let mut matrix = SparseMatrix::new();
    {
        let mut b = matrix.builder();
        b.open_columns(ColumnKind::GridNode);
        b.open_rows(RowKind::PrimaryObservation);

        assert_eq!(b.append(3, 2.0).unwrap(), 0);
        assert_eq!(b.commit_row(1, 10.0, None).unwrap(), 0);

        assert_eq!(b.append(3, 1.0).unwrap(), 0);
        assert_eq!(b.append(5, 4.0).unwrap(), 1);
        assert_eq!(b.commit_row(2, 20.0, None).unwrap(), 1);
    }

    assert_eq!(matrix.n_cols(), 2);
    assert_eq!(matrix.n_rows(), 2);
    assert_eq!(matrix.entry_count(), 3);
    assert_eq!(matrix.row(0), &[(0, 2.0)]);
    assert_eq!(matrix.row(1), &[(0, 1.0), (1, 4.0)]);
    assert_eq!(matrix.rhs(), &[10.0, 20.0]);
    assert!(matrix.uncertainty().is_none());
}

#[test]
fn fresh_id_lookup_lifecycle() {
    let mut matrix = SparseMatrix::new();
    {
        let mut b = matrix.builder();
        b.open_columns(ColumnKind::GridNode);
        b.open_rows(RowKind::PrimaryObservation);
        b.append(17, 1.0).unwrap();
        b.commit_row(5, 0.0, None).unwrap();
    }

    let grid = matrix.col_sections().find(ColumnKind::GridNode).unwrap();
    assert_eq!(grid.lookup(99), None);
    assert_eq!(grid.lookup(17), Some(0));

    let rows = matrix.row_sections().find(RowKind::PrimaryObservation).unwrap();
    assert_eq!(rows.lookup(99), None);
    assert_eq!(rows.lookup(5), Some(0));
}

#[test]
fn new_column_id_in_sealed_section_fails_fast() {
    let mut matrix = SparseMatrix::new();
    let mut b = matrix.builder();
    b.open_columns(ColumnKind::GridNode);
    b.open_rows(RowKind::PrimaryObservation);
    b.append(1, 1.0).unwrap();
    b.commit_row(10, 1.0, None).unwrap();

    // A newer column section seals the grid-node section against new IDs.
    b.open_columns(ColumnKind::SiteTerm);
    b.append(900, 1.0).unwrap();
    b.open_columns(ColumnKind::GridNode);

    // Existing grid-node ID is still fine.
    b.append(1, 2.0).unwrap();
    // A never-seen grid-node ID is a protocol violation.
    let err = b.append(2, 1.0).unwrap_err();
    assert!(err.is_protocol_violation());
}

#[test]
fn new_row_id_in_sealed_section_fails_fast() {
    let mut matrix = SparseMatrix::new();
    let mut b = matrix.builder();
    b.open_columns(ColumnKind::GridNode);
    b.open_rows(RowKind::PrimaryObservation);
    b.append(1, 1.0).unwrap();
    b.commit_row(10, 1.0, None).unwrap();

    b.open_rows(RowKind::Damping);
    b.append(1, 0.5).unwrap();
    b.commit_row(-10, 0.0, None).unwrap();

    b.open_rows(RowKind::PrimaryObservation);
    // Committing a never-seen row ID into the sealed section must fail.
    b.append(1, 1.0).unwrap();
    let err = b.commit_row(11, 1.0, None).unwrap_err();
    assert!(err.is_protocol_violation());
}

#[test]
fn commit_to_existing_row_appends_without_new_rhs() {
    let mut matrix = SparseMatrix::new();
    {
        let mut b = matrix.builder();
        b.open_columns(ColumnKind::GridNode);
        b.open_rows(RowKind::PrimaryObservation);
        b.append(1, 1.0).unwrap();
        b.commit_row(10, 5.0, None).unwrap();

        b.append(2, 3.0).unwrap();
        let index = b.commit_row(10, 99.0, None).unwrap();
        assert_eq!(index, 0);
    }

    assert_eq!(matrix.n_rows(), 1);
    assert_eq!(matrix.rhs(), &[5.0]);
    assert_eq!(matrix.row(0), &[(0, 1.0), (1, 3.0)]);
    assert_eq!(matrix.entry_count(), 2);
}

#[test]
fn retarget_requires_registered_row() {
    let mut matrix = SparseMatrix::new();
    let mut b = matrix.builder();
    b.open_columns(ColumnKind::GridNode);
    b.open_rows(RowKind::PrimaryObservation);
    b.append(1, 1.0).unwrap();
    b.commit_row(10, 1.0, None).unwrap();

    b.open_columns(ColumnKind::EventTerm);
    let err = b.append_to_row(11, 7, 1.0).unwrap_err();
    assert!(err.is_protocol_violation());

    // The registered row accepts the layered entry.
    b.append_to_row(10, 7, 1.0).unwrap();
    assert_eq!(matrix.row(0), &[(0, 1.0), (1, 1.0)]);
}

#[test]
fn uncertainty_allocates_lazily_and_stays_parallel() {
    let mut matrix = SparseMatrix::new();
    {
        let mut b = matrix.builder();
        b.open_columns(ColumnKind::GridNode);
        b.open_rows(RowKind::PrimaryObservation);
        b.append(1, 1.0).unwrap();
        b.commit_row(10, 1.0, None).unwrap();

        b.append(1, 1.0).unwrap();
        b.commit_row(11, 2.0, Some(0.25)).unwrap();

        b.append(1, 1.0).unwrap();
        b.commit_row(12, 3.0, None).unwrap();
    }

    // Backfilled with zeros for rows committed before the first uncertainty.
    assert_eq!(matrix.uncertainty(), Some(&[0.0, 0.25, 0.0][..]));
}

#[test]
fn observation_count_excludes_regularization_rows() {
    let mut matrix = SparseMatrix::new();
    {
        let mut b = matrix.builder();
        b.open_columns(ColumnKind::GridNode);
        b.open_rows(RowKind::PrimaryObservation);
        for row in 0..5 {
            b.append(row, 1.0).unwrap();
            b.commit_row(row as i64, 1.0, None).unwrap();
        }
        b.open_rows(RowKind::Damping);
        for row in 0..3 {
            b.append(row, 0.1).unwrap();
            b.commit_row(1000 + row as i64, 0.0, None).unwrap();
        }
        b.open_rows(RowKind::Smoothing);
        for row in 0..2 {
            b.append(row, 0.1).unwrap();
            b.commit_row(2000 + row as i64, 0.0, None).unwrap();
        }
    }

    assert_eq!(matrix.n_rows(), 10);
    assert_eq!(matrix.observation_count(), 5);
}

#[test]
fn row_section_contiguity_across_categories() {
    let mut matrix = SparseMatrix::new();
    {
        let mut b = matrix.builder();
        b.open_columns(ColumnKind::GridNode);
        b.open_rows(RowKind::PrimaryObservation);
        b.append(1, 1.0).unwrap();
        b.commit_row(10, 1.0, None).unwrap();
        b.append(1, 1.0).unwrap();
        b.commit_row(11, 1.0, None).unwrap();

        b.open_rows(RowKind::Damping);
        b.append(1, 0.1).unwrap();
        b.commit_row(50, 0.0, None).unwrap();
    }

    let sections: Vec<_> = matrix.row_sections().iter().collect();
    assert_eq!(sections.len(), 2);
    assert_eq!(sections[0].core().start(), 0);
    assert_eq!(sections[0].core().end(), Some(1));
    assert_eq!(sections[1].core().start(), 2);
}

proptest! {
    /// For any protocol-respecting sequence: committed rows == rhs length,
    /// and the entry counter equals the number of append calls.
    #[test]
    fn count_invariants_hold(
        rows in prop::collection::vec(
            prop::collection::vec((0i32..40, -100.0f64..100.0), 0..8),
            1..25,
        )
    ) {
        let mut matrix = SparseMatrix::new();
        let mut appended = 0u64;
        {
            let mut b = matrix.builder();
            b.open_columns(ColumnKind::GridNode);
            b.open_rows(RowKind::PrimaryObservation);
            for (row, entries) in rows.iter().enumerate() {
                for &(col, value) in entries {
                    b.append(col, value).unwrap();
                    appended += 1;
                }
                b.commit_row(row as i64, 1.0, None).unwrap();
            }
        }

        prop_assert_eq!(matrix.n_rows(), rows.len());
        prop_assert_eq!(matrix.rhs().len(), rows.len());
        prop_assert_eq!(matrix.entry_count(), appended);

        let distinct_cols: std::collections::HashSet<i32> =
            rows.iter().flatten().map(|&(col, _)| col).collect();
        prop_assert_eq!(matrix.n_cols(), distinct_cols.len());
    }
}
