//! Cell-level diff between the snapshot taken when editing started and the
//! current grid.
//!
//! Values are compared after stripping thousands separators, so `1,000`
//! and `1000` are the same value. Every differing cell is reported; only
//! cells in editable leaf rows are flagged as direct changes; the rest moved
//! because an aggregate was recalculated.
//!
//! The `category` of a change is the label of the column's own category,
//! not a fixed "forecast" tag: forecast columns report `Forecast`, remark
//! columns report `Remarks`, and a plan or actual edit reports `Plan` or
//! `Actual`. All five categories accept edits, so history keeps them apart.

use crate::codec::strip_separators;
use crate::grid::{Grid, RowRole};
use crate::layout;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One differing cell, with its position in the hierarchy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellChange {
    pub row: usize,
    pub col: usize,
    pub old_value: String,
    pub new_value: String,
    pub country: Option<String>,
    pub model: Option<String>,
    pub month: Option<String>,
    pub category: Option<String>,
    pub is_direct_change: bool,
}

fn same_value(a: &str, b: &str) -> bool {
    strip_separators(a) == strip_separators(b)
}

/// Cells of editable rows whose value changed: the user's own edits.
fn direct_edits(original: &Grid, current: &Grid) -> HashSet<(usize, usize)> {
    let mut marked = HashSet::new();
    for (row, current_row) in current.rows().iter().enumerate() {
        if !current_row.role().is_editable() {
            continue;
        }
        let Some(original_row) = original.row(row) else {
            continue;
        };
        for (col, (before, after)) in original_row
            .cells()
            .iter()
            .zip(current_row.cells())
            .enumerate()
            .skip(1)
        {
            if !same_value(before, after) {
                marked.insert((row, col));
            }
        }
    }
    marked
}

/// Diffs two snapshots of the same grid, in row-major order.
pub fn detect_changes(original: &Grid, current: &Grid) -> Vec<CellChange> {
    let direct = direct_edits(original, current);
    let mut changes = Vec::new();

    for (row, current_row) in current.rows().iter().enumerate() {
        let Some(original_row) = original.row(row) else {
            continue;
        };
        let model = match current_row.role() {
            RowRole::Model { name, .. } => Some(name.clone()),
            _ => None,
        };
        let country = current.owner_label(row).map(str::to_string);

        for (col, (before, after)) in original_row
            .cells()
            .iter()
            .zip(current_row.cells())
            .enumerate()
            .skip(1)
        {
            if same_value(before, after) {
                continue;
            }
            changes.push(CellChange {
                row,
                col,
                old_value: before.clone(),
                new_value: after.clone(),
                country: country.clone(),
                model: model.clone(),
                month: layout::month_label(col).map(str::to_string),
                category: layout::category_label(col).map(str::to_string),
                is_direct_change: direct.contains(&(row, col)),
            });
        }
    }

    changes
}

/// Keeps only the user's own edits.
pub fn direct_changes_only(changes: &[CellChange]) -> Vec<CellChange> {
    changes
        .iter()
        .filter(|c| c.is_direct_change)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::recalculate_in_place;
    use crate::grid::{Hierarchy, generate_initial_grid};
    use crate::validator::apply_edit;

    #[test]
    fn identical_grids_have_no_changes() {
        let grid = generate_initial_grid(&Hierarchy::default());
        assert!(detect_changes(&grid, &grid).is_empty());
    }

    #[test]
    fn separators_do_not_count_as_changes() {
        let hierarchy = Hierarchy::default();
        let grid = generate_initial_grid(&hierarchy);
        let mut rows = grid.to_rows();
        for row in rows.iter_mut() {
            for cell in row.iter_mut().skip(1) {
                *cell = strip_separators(cell);
            }
        }
        let regrouped = Grid::from_rows(&hierarchy, rows).unwrap();
        assert!(detect_changes(&grid, &regrouped).is_empty());
    }

    #[test]
    fn leaf_edit_is_direct_and_aggregates_are_derived() {
        let original = generate_initial_grid(&Hierarchy::default());
        let mut current = original.clone();
        let row = current.find_model("Italy", "Model1").unwrap();
        let col = layout::column_of(5, layout::Category::Forecast, layout::Field::Quantity);
        apply_edit(&mut current, row, col, "77");
        recalculate_in_place(&mut current);

        let changes = detect_changes(&original, &current);
        let direct = direct_changes_only(&changes);
        assert_eq!(direct.len(), 1);
        assert_eq!((direct[0].row, direct[0].col), (row, col));
        assert_eq!(direct[0].country.as_deref(), Some("Italy"));
        assert_eq!(direct[0].model.as_deref(), Some("Model1"));
        assert_eq!(direct[0].month.as_deref(), Some("Jun"));
        assert_eq!(direct[0].category.as_deref(), Some("Forecast"));

        let derived: Vec<_> = changes.iter().filter(|c| !c.is_direct_change).collect();
        let labels: Vec<_> = derived
            .iter()
            .map(|c| (c.country.as_deref(), c.model.as_deref()))
            .collect();
        assert_eq!(
            labels,
            vec![
                (Some("Grand Total"), None),
                (Some("Grand Total"), Some("Model1")),
                (Some("Europe"), None),
                (Some("Europe"), Some("Model1")),
                (Some("Italy"), None),
            ]
        );
    }

    #[test]
    fn changes_come_out_row_major() {
        let original = generate_initial_grid(&Hierarchy::default());
        let mut current = original.clone();
        apply_edit(&mut current, 20, 5, "1");
        apply_edit(&mut current, 7, 30, "1");
        apply_edit(&mut current, 7, 3, "1");
        let changes = detect_changes(&original, &current);
        let positions: Vec<_> = changes.iter().map(|c| (c.row, c.col)).collect();
        let mut sorted = positions.clone();
        sorted.sort();
        assert_eq!(positions, sorted);
    }

    #[test]
    fn category_follows_the_edited_column() {
        let original = generate_initial_grid(&Hierarchy::default());
        let mut current = original.clone();
        let row = current.find_model("USA", "Model2").unwrap();
        let plan = layout::column_of(1, layout::Category::Plan, layout::Field::Amount);
        let actual = layout::column_of(1, layout::Category::Actual, layout::Field::Quantity);
        apply_edit(&mut current, row, plan, "4000");
        apply_edit(&mut current, row, actual, "3");

        let changes = detect_changes(&original, &current);
        let categories: Vec<_> = changes.iter().map(|c| c.category.as_deref()).collect();
        assert_eq!(categories, vec![Some("Plan"), Some("Actual")]);
    }
}
