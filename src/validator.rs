//! Gatekeeping of raw cell edits before they reach the grid.

use crate::codec;
use crate::grid::Grid;
use crate::layout::{self, ColumnKind};
use log::debug;
use serde::Serialize;
use std::fmt;

/// Why an edit was refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EditRejection {
    OutOfBounds,
    LabelColumn,
    ReadOnlyRow,
    NotNumeric,
    Negative,
    TooLarge,
}

impl fmt::Display for EditRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            EditRejection::OutOfBounds => "cell is outside the grid",
            EditRejection::LabelColumn => "row labels cannot be edited",
            EditRejection::ReadOnlyRow => "only model rows under a country can be edited",
            EditRejection::NotNumeric => "value is not a number",
            EditRejection::Negative => "value must not be negative",
            EditRejection::TooLarge => {
                return write!(f, "value exceeds the maximum of {}", codec::MAX_CELL_VALUE);
            }
        };
        f.write_str(text)
    }
}

/// Result of one attempted edit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EditOutcome {
    /// The cell now holds `value` (normalised for numeric columns).
    Applied { value: String },
    /// The cell holds `restored`, its value before the edit.
    Rejected {
        restored: String,
        reason: EditRejection,
    },
}

impl EditOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, EditOutcome::Applied { .. })
    }
}

/// Decides what a cell would hold after the edit, without touching the grid.
pub fn check_edit(grid: &Grid, row: usize, col: usize, raw: &str) -> Result<String, EditRejection> {
    if grid.cell(row, col).is_none() {
        return Err(EditRejection::OutOfBounds);
    }
    let kind = layout::column_kind(col).ok_or(EditRejection::OutOfBounds)?;
    if kind == ColumnKind::Label {
        return Err(EditRejection::LabelColumn);
    }
    if !grid.is_editable_row(row) {
        return Err(EditRejection::ReadOnlyRow);
    }
    match kind {
        ColumnKind::Remark { .. } => Ok(raw.to_string()),
        _ => {
            let approx = codec::try_parse_number(raw).ok_or(EditRejection::NotNumeric)?;
            if approx < 0.0 {
                return Err(EditRejection::Negative);
            }
            match codec::parse_integer(raw) {
                Some(value) if value <= codec::MAX_CELL_VALUE => {
                    codec::normalize(col, raw).ok_or(EditRejection::NotNumeric)
                }
                _ => Err(EditRejection::TooLarge),
            }
        }
    }
}

/// Applies one edit in place, restoring `previous` if it is refused.
///
/// `previous` is the value the presentation layer showed before the
/// keystroke. It is only written back when it would itself pass
/// [`check_edit`]; otherwise the grid's current value is kept.
pub fn apply_edit_with_previous(
    grid: &mut Grid,
    row: usize,
    col: usize,
    raw: &str,
    previous: Option<&str>,
) -> EditOutcome {
    match check_edit(grid, row, col, raw) {
        Ok(value) => {
            grid.set_cell(row, col, value.clone());
            EditOutcome::Applied { value }
        }
        Err(reason) => {
            debug!("rejected edit at ({row}, {col}) {raw:?}: {reason}");
            let restored = match previous.map(|prev| check_edit(grid, row, col, prev)) {
                Some(Ok(prev)) => {
                    grid.set_cell(row, col, prev.clone());
                    prev
                }
                _ => grid.cell(row, col).unwrap_or_default().to_string(),
            };
            EditOutcome::Rejected { restored, reason }
        }
    }
}

/// Applies one edit in place; a refused edit leaves the cell as it was.
pub fn apply_edit(grid: &mut Grid, row: usize, col: usize, raw: &str) -> EditOutcome {
    apply_edit_with_previous(grid, row, col, raw, None)
}

/// Pure form of [`apply_edit`]: returns the edited copy.
pub fn validate_and_apply_edit(grid: &Grid, row: usize, col: usize, raw: &str) -> Grid {
    let mut next = grid.clone();
    apply_edit(&mut next, row, col, raw);
    next
}

/// One `(row, col, old, new)` change reported by the presentation layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawChange {
    pub row: usize,
    pub col: usize,
    pub old_value: String,
    pub new_value: String,
}

impl RawChange {
    pub fn new(row: usize, col: usize, old: impl Into<String>, new: impl Into<String>) -> Self {
        Self {
            row,
            col,
            old_value: old.into(),
            new_value: new.into(),
        }
    }
}

/// Applies a batch of raw changes in order; each rejected one restores
/// its old value when that value is itself valid for the cell.
pub fn apply_changes(grid: &mut Grid, changes: &[RawChange]) -> Vec<EditOutcome> {
    changes
        .iter()
        .map(|c| {
            apply_edit_with_previous(grid, c.row, c.col, &c.new_value, Some(&c.old_value))
        })
        .collect()
}
