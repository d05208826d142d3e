//! Recalculation of every aggregate row from the editable leaves.
//!
//! Three passes run in a fixed order, each reading what the previous one
//! wrote:
//!
//! 1. every country row becomes the sum of its model rows;
//! 2. every region's model rows become the sum of the matching model rows of
//!    its countries, then the region row the sum of its own model rows;
//! 3. the same shape one level up for the grand total.
//!
//! Remark columns are never touched. A cell that does not parse counts as 0.

use crate::codec;
use crate::grid::{Grid, Level, RowRole};
use crate::layout;
use serde::Serialize;

/// Returns a copy of `grid` with every aggregate recalculated.
pub fn recalculate_all_aggregates(grid: &Grid) -> Grid {
    let mut next = grid.clone();
    recalculate_in_place(&mut next);
    next
}

/// Recalculates every aggregate of `grid` in place.
pub fn recalculate_in_place(grid: &mut Grid) {
    country_pass(grid);
    rollup_pass(grid, Level::Region);
    rollup_pass(grid, Level::Total);
}

fn country_pass(grid: &mut Grid) {
    let countries: Vec<usize> = grid.rows_at(Level::Country).collect();
    for country in countries {
        let children = grid.model_rows_of(country).to_vec();
        write_sum(grid, country, &children);
    }
}

/// Region and total passes share one shape: model subtotals first, then
/// the parent row from its own model rows.
fn rollup_pass(grid: &mut Grid, level: Level) {
    let parents: Vec<usize> = grid.rows_at(level).collect();
    for parent in parents {
        let sources: Vec<usize> = match level {
            Level::Region => grid.countries_of(parent).collect(),
            Level::Total => grid.rows_at(Level::Region).collect(),
            Level::Country => return,
        };

        for &subtotal in grid.model_rows_of(parent).to_vec().iter() {
            let Some(RowRole::Model { model, .. }) = grid.role(subtotal) else {
                continue;
            };
            let model = *model;
            let matching: Vec<usize> = sources
                .iter()
                .filter_map(|&source| grid.model_row(source, model))
                .collect();
            write_sum(grid, subtotal, &matching);
        }

        let own_models = grid.model_rows_of(parent).to_vec();
        write_sum(grid, parent, &own_models);
    }
}

/// Saturates instead of overflowing when stored cells hold extreme values.
fn column_sum(grid: &Grid, col: usize, rows: &[usize]) -> i64 {
    rows.iter()
        .map(|&row| codec::parse_number(grid.cell(row, col).unwrap_or(""), 0))
        .fold(0i64, i64::saturating_add)
}

fn write_sum(grid: &mut Grid, target: usize, children: &[usize]) {
    for col in layout::value_columns() {
        let Some(field) = layout::field_of(col) else {
            continue;
        };
        let total = column_sum(grid, col, children);
        grid.set_cell(target, col, codec::format_field(field, total));
    }
}

/// An aggregate cell that disagrees with the sum of its children.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AggregateMismatch {
    pub row: usize,
    pub col: usize,
    pub actual: i64,
    pub expected: i64,
}

/// Rows whose values an aggregate row is the sum of.
fn children_of(grid: &Grid, row: usize) -> Option<Vec<usize>> {
    match grid.role(row)? {
        RowRole::Total | RowRole::Region { .. } | RowRole::Country { .. } => {
            Some(grid.model_rows_of(row).to_vec())
        }
        RowRole::Model {
            model,
            parent,
            level,
            ..
        } => {
            let sources: Vec<usize> = match level {
                Level::Country => return None,
                Level::Region => grid.countries_of(*parent).collect(),
                Level::Total => grid.rows_at(Level::Region).collect(),
            };
            Some(
                sources
                    .into_iter()
                    .filter_map(|source| grid.model_row(source, *model))
                    .collect(),
            )
        }
    }
}

/// Lists every aggregate cell that does not equal its children's sum.
///
/// Empty for any grid produced by [`recalculate_all_aggregates`].
pub fn check_invariant(grid: &Grid) -> Vec<AggregateMismatch> {
    let mut mismatches = Vec::new();
    for row in 0..grid.len() {
        let Some(children) = children_of(grid, row) else {
            continue;
        };
        for col in layout::value_columns() {
            let actual = codec::parse_number(grid.cell(row, col).unwrap_or(""), 0);
            let expected = column_sum(grid, col, &children);
            if actual != expected {
                mismatches.push(AggregateMismatch {
                    row,
                    col,
                    actual,
                    expected,
                });
            }
        }
    }
    mismatches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{Hierarchy, generate_initial_grid};
    use crate::layout::{Category, Field, column_of};

    #[test]
    fn generated_grid_satisfies_invariant() {
        let grid = generate_initial_grid(&Hierarchy::default());
        assert!(check_invariant(&grid).is_empty());
    }

    #[test]
    fn leaf_change_reaches_total() {
        let mut grid = generate_initial_grid(&Hierarchy::default());
        let col = column_of(2, Category::Plan, Field::Amount);
        let leaf = grid.find_model("UK", "Model2").unwrap();
        let before_total = codec::parse_number(grid.cell(0, col).unwrap(), 0);
        let before_leaf = codec::parse_number(grid.cell(leaf, col).unwrap(), 0);

        grid.set_cell(leaf, col, codec::format_amount(before_leaf + 5_000));
        assert_eq!(check_invariant(&grid).len(), 5);

        recalculate_in_place(&mut grid);
        assert_eq!(
            codec::parse_number(grid.cell(0, col).unwrap(), 0),
            before_total + 5_000
        );
        assert!(check_invariant(&grid).is_empty());
    }

    #[test]
    fn remark_columns_are_left_alone() {
        let mut grid = generate_initial_grid(&Hierarchy::default());
        grid.set_cell(0, 11, "keep me".into());
        grid.set_cell(3, 22, "region note".into());
        recalculate_in_place(&mut grid);
        assert_eq!(grid.cell(0, 11), Some("keep me"));
        assert_eq!(grid.cell(3, 22), Some("region note"));
    }

    #[test]
    fn unparseable_children_count_as_zero() {
        let mut grid = generate_initial_grid(&Hierarchy::default());
        let usa = grid.find("USA").unwrap();
        let m1 = grid.find_model("USA", "Model1").unwrap();
        let m2 = grid.find_model("USA", "Model2").unwrap();
        grid.set_cell(m1, 1, "n/a".into());
        recalculate_in_place(&mut grid);
        assert_eq!(grid.cell(usa, 1), grid.cell(m2, 1));
    }

    #[test]
    fn value_two_is_summed_like_any_other() {
        let mut grid = generate_initial_grid(&Hierarchy::default());
        for label in ["USA", "Canada", "UK", "Italy"] {
            for model in ["Model1", "Model2"] {
                let row = grid.find_model(label, model).unwrap();
                grid.set_cell(row, 1, "2".into());
            }
        }
        recalculate_in_place(&mut grid);
        assert_eq!(grid.cell(0, 1), Some("16"));
        assert_eq!(grid.cell(1, 1), Some("8"));
    }

    #[test]
    fn extreme_stored_values_saturate() {
        let mut grid = generate_initial_grid(&Hierarchy::default());
        let usa = grid.find("USA").unwrap();
        for model in ["Model1", "Model2"] {
            let row = grid.find_model("USA", model).unwrap();
            grid.set_cell(row, 1, i64::MAX.to_string());
        }
        recalculate_in_place(&mut grid);
        assert_eq!(grid.cell(usa, 1), Some(i64::MAX.to_string().as_str()));
        assert_eq!(grid.cell(0, 1), Some(i64::MAX.to_string().as_str()));
    }
}
