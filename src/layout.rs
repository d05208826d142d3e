//! Column layout of the forecast grid.
//!
//! Column 0 holds the row label. It is followed by twelve month blocks of
//! [`MONTH_BLOCK_WIDTH`] columns each: five reporting categories with a
//! quantity and an amount column apiece, then a free-text remark column.
//!
//! Everything in here is plain index arithmetic with no state.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of months covered by one grid.
pub const MONTH_COUNT: usize = 12;

/// Number of numeric reporting categories inside a month block.
pub const CATEGORY_COUNT: usize = 5;

/// Columns per category (quantity, amount).
pub const FIELDS_PER_CATEGORY: usize = 2;

/// Columns per month: 5 categories x 2 fields + 1 remark.
pub const MONTH_BLOCK_WIDTH: usize = CATEGORY_COUNT * FIELDS_PER_CATEGORY + 1;

/// Index of the label column.
pub const LABEL_COLUMN: usize = 0;

/// Total number of columns in every row.
pub const COLUMN_COUNT: usize = 1 + MONTH_COUNT * MONTH_BLOCK_WIDTH;

/// Display labels for the twelve months.
pub const MONTH_LABELS: [&str; MONTH_COUNT] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Header label of the remark column.
pub const REMARK_LABEL: &str = "Remarks";

/// Reporting category of a numeric column pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    PriorYear,
    Plan,
    Actual,
    Flash,
    Forecast,
}

impl Category {
    pub const ALL: [Category; CATEGORY_COUNT] = [
        Category::PriorYear,
        Category::Plan,
        Category::Actual,
        Category::Flash,
        Category::Forecast,
    ];

    /// Position of the category inside a month block.
    pub fn index(self) -> usize {
        match self {
            Category::PriorYear => 0,
            Category::Plan => 1,
            Category::Actual => 2,
            Category::Flash => 3,
            Category::Forecast => 4,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn label(self) -> &'static str {
        match self {
            Category::PriorYear => "Prior Year",
            Category::Plan => "Plan",
            Category::Actual => "Actual",
            Category::Flash => "Flash",
            Category::Forecast => "Forecast",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which half of a category pair a column holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Field {
    Quantity,
    Amount,
}

impl Field {
    pub fn offset(self) -> usize {
        match self {
            Field::Quantity => 0,
            Field::Amount => 1,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Field::Quantity => "Qty",
            Field::Amount => "Amt",
        }
    }
}

/// What a column contains.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnKind {
    Label,
    Value {
        month: usize,
        category: Category,
        field: Field,
    },
    Remark {
        month: usize,
    },
}

/// Column index for a month / category / field triple.
///
/// `month` and `category` are 0-based. Passing an index outside the layout
/// is a caller bug and panics.
pub fn column_for(month: usize, category: usize, field: Field) -> usize {
    assert!(month < MONTH_COUNT, "month index {month} out of range");
    assert!(category < CATEGORY_COUNT, "category index {category} out of range");
    1 + month * MONTH_BLOCK_WIDTH + category * FIELDS_PER_CATEGORY + field.offset()
}

/// Same as [`column_for`] with typed arguments.
pub fn column_of(month: usize, category: Category, field: Field) -> usize {
    column_for(month, category.index(), field)
}

/// Classifies a column index. Returns `None` past the last column.
pub fn column_kind(col: usize) -> Option<ColumnKind> {
    if col == LABEL_COLUMN {
        return Some(ColumnKind::Label);
    }
    if col >= COLUMN_COUNT {
        return None;
    }
    let offset = col - 1;
    let month = offset / MONTH_BLOCK_WIDTH;
    let within = offset % MONTH_BLOCK_WIDTH;
    if within == MONTH_BLOCK_WIDTH - 1 {
        return Some(ColumnKind::Remark { month });
    }
    let category = Category::from_index(within / FIELDS_PER_CATEGORY)?;
    let field = if within % FIELDS_PER_CATEGORY == 0 {
        Field::Quantity
    } else {
        Field::Amount
    };
    Some(ColumnKind::Value {
        month,
        category,
        field,
    })
}

pub fn is_remark_column(col: usize) -> bool {
    matches!(column_kind(col), Some(ColumnKind::Remark { .. }))
}

pub fn is_quantity_column(col: usize) -> bool {
    field_of(col) == Some(Field::Quantity)
}

pub fn is_amount_column(col: usize) -> bool {
    field_of(col) == Some(Field::Amount)
}

/// True for every quantity or amount column.
pub fn is_value_column(col: usize) -> bool {
    field_of(col).is_some()
}

/// 0-based month of a column, `None` for the label column.
pub fn month_of(col: usize) -> Option<usize> {
    match column_kind(col)? {
        ColumnKind::Label => None,
        ColumnKind::Value { month, .. } | ColumnKind::Remark { month } => Some(month),
    }
}

pub fn category_of(col: usize) -> Option<Category> {
    match column_kind(col)? {
        ColumnKind::Value { category, .. } => Some(category),
        _ => None,
    }
}

pub fn field_of(col: usize) -> Option<Field> {
    match column_kind(col)? {
        ColumnKind::Value { field, .. } => Some(field),
        _ => None,
    }
}

/// Iterator over every quantity/amount column, left to right.
pub fn value_columns() -> impl Iterator<Item = usize> {
    (1..COLUMN_COUNT).filter(|&col| is_value_column(col))
}

/// Month label of a column (`Jan`..`Dec`).
pub fn month_label(col: usize) -> Option<&'static str> {
    month_of(col).map(|m| MONTH_LABELS[m])
}

/// Category label of a column; remark columns report [`REMARK_LABEL`].
pub fn category_label(col: usize) -> Option<&'static str> {
    match column_kind(col)? {
        ColumnKind::Value { category, .. } => Some(category.label()),
        ColumnKind::Remark { .. } => Some(REMARK_LABEL),
        ColumnKind::Label => None,
    }
}

/// Flat, human readable title of a column, e.g. `Mar Forecast Amt`.
pub fn column_title(col: usize) -> String {
    match column_kind(col) {
        Some(ColumnKind::Label) => "Label".to_string(),
        Some(ColumnKind::Value {
            month,
            category,
            field,
        }) => format!("{} {} {}", MONTH_LABELS[month], category.label(), field.label()),
        Some(ColumnKind::Remark { month }) => format!("{} {}", MONTH_LABELS[month], REMARK_LABEL),
        None => String::new(),
    }
}

/// One cell of a grouped header row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderCell {
    pub label: String,
    pub colspan: usize,
}

impl HeaderCell {
    fn new(label: impl Into<String>, colspan: usize) -> Self {
        Self {
            label: label.into(),
            colspan,
        }
    }
}

/// Three-tier header: months, categories, then Qty/Amt.
///
/// Every tier spans exactly [`COLUMN_COUNT`] columns.
pub fn column_headers() -> Vec<Vec<HeaderCell>> {
    let mut months = vec![HeaderCell::new("", 1)];
    let mut categories = vec![HeaderCell::new("", 1)];
    let mut fields = vec![HeaderCell::new("", 1)];

    for label in MONTH_LABELS {
        months.push(HeaderCell::new(label, MONTH_BLOCK_WIDTH));
        for category in Category::ALL {
            categories.push(HeaderCell::new(category.label(), FIELDS_PER_CATEGORY));
            fields.push(HeaderCell::new(Field::Quantity.label(), 1));
            fields.push(HeaderCell::new(Field::Amount.label(), 1));
        }
        categories.push(HeaderCell::new(REMARK_LABEL, 1));
        fields.push(HeaderCell::new("", 1));
    }

    vec![months, categories, fields]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_block_layout() {
        assert_eq!(column_for(0, 0, Field::Quantity), 1);
        assert_eq!(column_for(0, 0, Field::Amount), 2);
        assert_eq!(column_of(0, Category::Forecast, Field::Quantity), 9);
        assert_eq!(column_of(0, Category::Forecast, Field::Amount), 10);
        assert!(is_remark_column(11));
        assert_eq!(column_for(1, 0, Field::Quantity), 12);
    }

    #[test]
    fn last_column_is_december_remark() {
        assert_eq!(COLUMN_COUNT, 133);
        assert!(is_remark_column(COLUMN_COUNT - 1));
        assert_eq!(month_of(COLUMN_COUNT - 1), Some(11));
        assert_eq!(column_kind(COLUMN_COUNT), None);
    }

    #[test]
    fn classification_is_exclusive() {
        for col in 1..COLUMN_COUNT {
            let kinds = [
                is_remark_column(col),
                is_quantity_column(col),
                is_amount_column(col),
            ];
            assert_eq!(kinds.iter().filter(|k| **k).count(), 1, "column {col}");
        }
        assert!(!is_value_column(LABEL_COLUMN));
        assert_eq!(month_of(LABEL_COLUMN), None);
        assert_eq!(value_columns().count(), MONTH_COUNT * CATEGORY_COUNT * 2);
    }

    #[test]
    fn column_for_round_trips_through_kind() {
        for month in 0..MONTH_COUNT {
            for category in Category::ALL {
                for field in [Field::Quantity, Field::Amount] {
                    let col = column_of(month, category, field);
                    assert_eq!(
                        column_kind(col),
                        Some(ColumnKind::Value {
                            month,
                            category,
                            field
                        })
                    );
                }
            }
        }
    }

    #[test]
    #[should_panic]
    fn month_out_of_range_panics() {
        column_for(12, 0, Field::Quantity);
    }

    #[test]
    fn headers_span_every_column() {
        for tier in column_headers() {
            let span: usize = tier.iter().map(|c| c.colspan).sum();
            assert_eq!(span, COLUMN_COUNT);
        }
        assert_eq!(column_title(10), "Jan Forecast Amt");
        assert_eq!(column_title(11), "Jan Remarks");
    }
}
