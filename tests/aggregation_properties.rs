use forecast_grid::aggregation::{check_invariant, recalculate_all_aggregates};
use forecast_grid::changes::detect_changes;
use forecast_grid::codec::{MAX_CELL_VALUE, parse_number, strip_separators};
use forecast_grid::grid::{Grid, Hierarchy, generate_initial_grid};
use forecast_grid::layout::{self, Category, Field, column_of, is_value_column};
use forecast_grid::validator::{EditOutcome, EditRejection, apply_edit, validate_and_apply_edit};

fn base() -> Grid {
    generate_initial_grid(&Hierarchy::default())
}

/// A spread of leaf edits touching every country, model and a few months.
fn edited() -> Grid {
    let mut grid = base();
    let editable: Vec<usize> = (0..grid.len()).filter(|&r| grid.is_editable_row(r)).collect();
    for (i, &row) in editable.iter().enumerate() {
        let month = (i * 5) % layout::MONTH_COUNT;
        let qty = column_of(month, Category::Forecast, Field::Quantity);
        let amt = column_of(month, Category::Plan, Field::Amount);
        apply_edit(&mut grid, row, qty, &format!("{}", 100 + i * 17));
        apply_edit(&mut grid, row, amt, &format!("{}", 12_000 + i * 250));
    }
    grid
}

#[test]
fn initial_grid_satisfies_the_rollup_invariant() {
    assert!(check_invariant(&base()).is_empty());
}

#[test]
fn recalculation_is_idempotent() {
    for grid in [base(), edited()] {
        let once = recalculate_all_aggregates(&grid);
        let twice = recalculate_all_aggregates(&once);
        assert_eq!(once, twice);
    }
}

#[test]
fn every_ancestor_equals_the_sum_of_its_leaves() {
    let grid = recalculate_all_aggregates(&edited());
    assert!(check_invariant(&grid).is_empty());

    let total = grid.find("Grand Total").unwrap();
    let leaves: Vec<usize> = (0..grid.len()).filter(|&r| grid.is_editable_row(r)).collect();
    for col in layout::value_columns() {
        let sum: i64 = leaves
            .iter()
            .map(|&r| parse_number(grid.cell(r, col).unwrap(), 0))
            .sum();
        assert_eq!(parse_number(grid.cell(total, col).unwrap(), 0), sum, "column {col}");
    }
}

#[test]
fn unrecalculated_edits_break_the_invariant() {
    let grid = edited();
    assert!(!check_invariant(&grid).is_empty());
}

#[test]
fn detected_changes_are_exactly_the_differing_cells() {
    let original = base();
    let current = recalculate_all_aggregates(&edited());
    let changes = detect_changes(&original, &current);

    for change in &changes {
        let before = original.cell(change.row, change.col).unwrap();
        let after = current.cell(change.row, change.col).unwrap();
        assert_ne!(strip_separators(before), strip_separators(after));
        assert_eq!(change.old_value, before);
        assert_eq!(change.new_value, after);
        assert_eq!(change.is_direct_change, current.is_editable_row(change.row));
    }

    let mut differing = 0;
    for row in 0..current.len() {
        for col in 1..layout::COLUMN_COUNT {
            let before = original.cell(row, col).unwrap();
            let after = current.cell(row, col).unwrap();
            if strip_separators(before) != strip_separators(after) {
                differing += 1;
            }
        }
    }
    assert_eq!(changes.len(), differing);
}

#[test]
fn a_grid_has_no_changes_against_itself() {
    for grid in [base(), edited()] {
        assert!(detect_changes(&grid, &grid).is_empty());
    }
}

#[test]
fn remark_edits_never_move_aggregates() {
    let original = base();
    let row = original.find_model("UK", "Model2").unwrap();
    let remark = (1..layout::COLUMN_COUNT)
        .find(|&c| layout::is_remark_column(c) && layout::month_of(c) == Some(4))
        .unwrap();

    let edited = validate_and_apply_edit(&original, row, remark, "promo moved to June");
    let recalculated = recalculate_all_aggregates(&edited);
    let changes = detect_changes(&original, &recalculated);

    assert_eq!(changes.len(), 1);
    assert_eq!((changes[0].row, changes[0].col), (row, remark));
    assert!(changes[0].is_direct_change);
    assert_eq!(changes[0].category.as_deref(), Some("Remarks"));
    assert!(changes.iter().all(|c| !is_value_column(c.col)));
}

#[test]
fn edits_to_aggregate_rows_leave_the_grid_untouched() {
    let original = base();
    let usa = original.find("USA").unwrap();
    let qty = column_of(0, Category::Forecast, Field::Quantity);
    let edited = validate_and_apply_edit(&original, usa, qty, "5");
    assert_eq!(edited, original);
    assert_eq!(edited.to_rows(), original.to_rows());
}

#[test]
fn leaves_at_the_ceiling_roll_up_exactly() {
    let mut grid = base();
    let qty = column_of(7, Category::Forecast, Field::Quantity);
    let amt = column_of(7, Category::Forecast, Field::Amount);
    let leaves: Vec<usize> = (0..grid.len()).filter(|&r| grid.is_editable_row(r)).collect();
    for &row in &leaves {
        assert!(apply_edit(&mut grid, row, qty, &MAX_CELL_VALUE.to_string()).is_applied());
        assert!(apply_edit(&mut grid, row, amt, &MAX_CELL_VALUE.to_string()).is_applied());
    }

    let grid = recalculate_all_aggregates(&grid);
    assert!(check_invariant(&grid).is_empty());
    let total = grid.find("Grand Total").unwrap();
    let expected = MAX_CELL_VALUE * leaves.len() as i64;
    assert_eq!(grid.cell(total, qty), Some(expected.to_string().as_str()));
    assert_eq!(parse_number(grid.cell(total, amt).unwrap(), 0), expected);
}

#[test]
fn oversized_input_never_reaches_the_grid() {
    let original = base();
    let row = original.find_model("USA", "Model1").unwrap();
    let qty = column_of(0, Category::PriorYear, Field::Quantity);
    for raw in ["1e30", "12345678901234567", "99999999999999999999"] {
        let mut grid = original.clone();
        let outcome = apply_edit(&mut grid, row, qty, raw);
        assert_eq!(
            outcome,
            EditOutcome::Rejected {
                restored: "75".into(),
                reason: EditRejection::TooLarge,
            },
            "input {raw}"
        );
        assert_eq!(grid, original);
    }
}
