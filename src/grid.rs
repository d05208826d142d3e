use crate::aggregation;
use crate::codec;
use crate::error::{ForecastError, Result};
use crate::layout::{self, COLUMN_COUNT, Category, Field, LABEL_COLUMN, MONTH_COUNT};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A geographic grouping of countries.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionDef {
    pub name: String,
    pub countries: Vec<String>,
}

/// Labels of every hierarchy level, in display order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hierarchy {
    pub total_label: String,
    pub regions: Vec<RegionDef>,
    pub models: Vec<String>,
}

impl Default for Hierarchy {
    fn default() -> Self {
        Self {
            total_label: "Grand Total".to_string(),
            regions: vec![
                RegionDef {
                    name: "Americas".to_string(),
                    countries: vec!["USA".to_string(), "Canada".to_string()],
                },
                RegionDef {
                    name: "Europe".to_string(),
                    countries: vec!["UK".to_string(), "Italy".to_string()],
                },
            ],
            models: vec!["Model1".to_string(), "Model2".to_string()],
        }
    }
}

impl Hierarchy {
    /// Checks that every label is non-empty and used exactly once.
    pub fn validate(&self) -> Result<()> {
        if self.models.is_empty() {
            return Err(ForecastError::Config("hierarchy needs at least one model".into()));
        }
        let mut seen = HashSet::new();
        let labels = std::iter::once(&self.total_label)
            .chain(self.models.iter())
            .chain(self.regions.iter().map(|r| &r.name))
            .chain(self.regions.iter().flat_map(|r| r.countries.iter()));
        for label in labels {
            if label.trim().is_empty() {
                return Err(ForecastError::Config("hierarchy labels must not be empty".into()));
            }
            if !seen.insert(label.as_str()) {
                return Err(ForecastError::Config(format!(
                    "hierarchy label {label:?} is used more than once"
                )));
            }
        }
        Ok(())
    }

    pub fn model_index(&self, label: &str) -> Option<usize> {
        self.models.iter().position(|m| m == label)
    }

    pub fn is_region(&self, label: &str) -> bool {
        self.regions.iter().any(|r| r.name == label)
    }

    /// Region a country belongs to.
    pub fn region_of(&self, country: &str) -> Option<&str> {
        self.regions
            .iter()
            .find(|r| r.countries.iter().any(|c| c == country))
            .map(|r| r.name.as_str())
    }

    pub fn countries(&self) -> impl Iterator<Item = &str> {
        self.regions
            .iter()
            .flat_map(|r| r.countries.iter().map(String::as_str))
    }
}

/// Level of a non-model row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Total,
    Region,
    Country,
}

/// Hierarchy role of a row, resolved once when the grid is built.
///
/// `region` and `parent` are row indices into the same grid.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RowRole {
    Total,
    Region {
        name: String,
    },
    Country {
        name: String,
        region: usize,
    },
    Model {
        name: String,
        model: usize,
        parent: usize,
        level: Level,
    },
}

impl RowRole {
    pub fn level(&self) -> Option<Level> {
        match self {
            RowRole::Total => Some(Level::Total),
            RowRole::Region { .. } => Some(Level::Region),
            RowRole::Country { .. } => Some(Level::Country),
            RowRole::Model { .. } => None,
        }
    }

    pub fn is_model(&self) -> bool {
        matches!(self, RowRole::Model { .. })
    }

    /// Leaf rows: a model directly under a country.
    pub fn is_editable(&self) -> bool {
        matches!(
            self,
            RowRole::Model {
                level: Level::Country,
                ..
            }
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Row {
    role: RowRole,
    cells: Vec<String>,
}

impl Row {
    pub fn role(&self) -> &RowRole {
        &self.role
    }

    pub fn cells(&self) -> &[String] {
        &self.cells
    }

    pub fn label(&self) -> &str {
        &self.cells[LABEL_COLUMN]
    }
}

/// The forecast sheet: rows of string cells plus their resolved roles.
///
/// Roles never change after construction; edits only touch value and
/// remark cells.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Grid {
    rows: Vec<Row>,
    #[serde(skip)]
    model_rows: Vec<Vec<usize>>,
}

impl Grid {
    /// Builds a grid from raw rows, resolving every row's role.
    ///
    /// Anything that does not match the hierarchy layout is refused with
    /// [`ForecastError::MalformedSnapshot`]; nothing is repaired.
    pub fn from_rows(hierarchy: &Hierarchy, rows: Vec<Vec<String>>) -> Result<Self> {
        let malformed = |msg: String| ForecastError::MalformedSnapshot(msg);

        if rows.is_empty() {
            return Err(malformed("grid has no rows".into()));
        }
        for (i, row) in rows.iter().enumerate() {
            if row.len() != COLUMN_COUNT {
                return Err(malformed(format!(
                    "row {i} has {} cells, expected {COLUMN_COUNT}",
                    row.len()
                )));
            }
        }
        if rows[0][LABEL_COLUMN] != hierarchy.total_label {
            return Err(malformed(format!(
                "row 0 must be the {:?} row, found {:?}",
                hierarchy.total_label, rows[0][LABEL_COLUMN]
            )));
        }

        let mut roles: Vec<RowRole> = Vec::with_capacity(rows.len());
        let mut seen = HashSet::new();
        let mut current_region: Option<usize> = None;
        let mut parent: Option<(usize, Level)> = None;

        for (i, row) in rows.iter().enumerate() {
            let label = row[LABEL_COLUMN].as_str();
            let role = if let Some(model) = hierarchy.model_index(label) {
                let (parent_row, level) =
                    parent.ok_or_else(|| malformed(format!("model row {i} has no parent")))?;
                RowRole::Model {
                    name: label.to_string(),
                    model,
                    parent: parent_row,
                    level,
                }
            } else if label == hierarchy.total_label {
                if i != 0 {
                    return Err(malformed(format!("second total row at {i}")));
                }
                parent = Some((i, Level::Total));
                RowRole::Total
            } else if hierarchy.is_region(label) {
                if !seen.insert(label) {
                    return Err(malformed(format!("region {label:?} appears twice")));
                }
                current_region = Some(i);
                parent = Some((i, Level::Region));
                RowRole::Region {
                    name: label.to_string(),
                }
            } else if let Some(region_name) = hierarchy.region_of(label) {
                if !seen.insert(label) {
                    return Err(malformed(format!("country {label:?} appears twice")));
                }
                let region = current_region
                    .filter(|&r| rows[r][LABEL_COLUMN] == region_name)
                    .ok_or_else(|| {
                        malformed(format!(
                            "country {label:?} at row {i} is not under region {region_name:?}"
                        ))
                    })?;
                parent = Some((i, Level::Country));
                RowRole::Country {
                    name: label.to_string(),
                    region,
                }
            } else {
                return Err(malformed(format!("unknown row label {label:?} at row {i}")));
            };
            roles.push(role);
        }

        let grid = Self::assemble(rows, roles);

        for (i, row) in grid.rows.iter().enumerate() {
            if row.role.is_model() {
                continue;
            }
            let children = &grid.model_rows[i];
            let in_order = children.len() == hierarchy.models.len()
                && children.iter().enumerate().all(|(k, &child)| {
                    matches!(&grid.rows[child].role, RowRole::Model { model, .. } if *model == k)
                });
            if !in_order {
                return Err(malformed(format!(
                    "row {i} ({}) must be followed by the {} model rows in order",
                    row.label(),
                    hierarchy.models.len()
                )));
            }
        }

        Ok(grid)
    }

    fn assemble(rows: Vec<Vec<String>>, roles: Vec<RowRole>) -> Self {
        let mut model_rows = vec![Vec::new(); rows.len()];
        for (i, role) in roles.iter().enumerate() {
            if let RowRole::Model { parent, .. } = role {
                model_rows[*parent].push(i);
            }
        }
        let rows = rows
            .into_iter()
            .zip(roles)
            .map(|(cells, role)| Row { role, cells })
            .collect();
        Self { rows, model_rows }
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row(&self, row: usize) -> Option<&Row> {
        self.rows.get(row)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&str> {
        self.rows.get(row)?.cells.get(col).map(String::as_str)
    }

    pub fn role(&self, row: usize) -> Option<&RowRole> {
        self.rows.get(row).map(|r| &r.role)
    }

    pub fn is_editable_row(&self, row: usize) -> bool {
        self.role(row).is_some_and(RowRole::is_editable)
    }

    /// Writes a value or remark cell. The label column is never written.
    pub(crate) fn set_cell(&mut self, row: usize, col: usize, value: String) -> bool {
        if col == LABEL_COLUMN {
            return false;
        }
        match self.rows.get_mut(row).and_then(|r| r.cells.get_mut(col)) {
            Some(cell) => {
                *cell = value;
                true
            }
            None => false,
        }
    }

    /// Model rows directly beneath a total, region or country row.
    pub fn model_rows_of(&self, parent: usize) -> &[usize] {
        self.model_rows.get(parent).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The child row of `parent` for model `model`.
    pub fn model_row(&self, parent: usize, model: usize) -> Option<usize> {
        self.model_rows_of(parent).iter().copied().find(|&child| {
            matches!(&self.rows[child].role, RowRole::Model { model: m, .. } if *m == model)
        })
    }

    pub fn rows_at(&self, level: Level) -> impl Iterator<Item = usize> + '_ {
        self.rows
            .iter()
            .enumerate()
            .filter(move |(_, r)| r.role.level() == Some(level))
            .map(|(i, _)| i)
    }

    /// Country rows that belong to the region row `region`.
    pub fn countries_of(&self, region: usize) -> impl Iterator<Item = usize> + '_ {
        self.rows
            .iter()
            .enumerate()
            .filter(move |(_, r)| matches!(r.role, RowRole::Country { region: g, .. } if g == region))
            .map(|(i, _)| i)
    }

    /// Row index of the total, region or country row with this label.
    pub fn find(&self, label: &str) -> Option<usize> {
        self.rows
            .iter()
            .position(|r| !r.role.is_model() && r.label() == label)
    }

    /// Row index of model `model_label` under the row labelled `parent_label`.
    pub fn find_model(&self, parent_label: &str, model_label: &str) -> Option<usize> {
        let parent = self.find(parent_label)?;
        self.model_rows_of(parent)
            .iter()
            .copied()
            .find(|&child| self.rows[child].label() == model_label)
    }

    /// Label of the nearest total/region/country row at or above `row`.
    pub fn owner_label(&self, row: usize) -> Option<&str> {
        match self.role(row)? {
            RowRole::Model { parent, .. } => self.row(*parent).map(Row::label),
            _ => self.row(row).map(Row::label),
        }
    }

    /// Raw cell matrix, the form used for storage and export.
    pub fn to_rows(&self) -> Vec<Vec<String>> {
        self.rows.iter().map(|r| r.cells.clone()).collect()
    }
}

/// Deep copy used to snapshot a grid before editing or branching.
pub fn clone_grid(grid: &Grid) -> Grid {
    grid.clone()
}

const UNIT_PRICES: [i64; 2] = [23, 31];

fn placeholder_quantity(country: usize, model: usize, month: usize, category: usize) -> i64 {
    let spread = (country * 13 + model * 7 + month * 5 + category * 3 + 65) % 90;
    10 + spread as i64
}

fn blank_row(label: &str) -> Vec<String> {
    (0..COLUMN_COUNT)
        .map(|col| {
            if col == LABEL_COLUMN {
                label.to_string()
            } else if layout::is_value_column(col) {
                "0".to_string()
            } else {
                String::new()
            }
        })
        .collect()
}

fn leaf_row(label: &str, country: usize, model: usize) -> Vec<String> {
    let mut row = blank_row(label);
    let price = UNIT_PRICES[model % UNIT_PRICES.len()];
    for month in 0..MONTH_COUNT {
        for category in Category::ALL {
            let qty = placeholder_quantity(country, model, month, category.index());
            row[layout::column_of(month, category, Field::Quantity)] = codec::format_quantity(qty);
            row[layout::column_of(month, category, Field::Amount)] =
                codec::format_amount(qty * price);
        }
    }
    row
}

/// Starting grid with deterministic placeholder leaves and every aggregate
/// already recalculated.
pub fn generate_initial_grid(hierarchy: &Hierarchy) -> Grid {
    let mut rows = Vec::new();
    let mut roles = Vec::new();

    let push_models = |rows: &mut Vec<Vec<String>>,
                       roles: &mut Vec<RowRole>,
                       parent: usize,
                       level: Level,
                       leaf_country: Option<usize>| {
        for (model, name) in hierarchy.models.iter().enumerate() {
            let cells = match leaf_country {
                Some(country) => leaf_row(name, country, model),
                None => blank_row(name),
            };
            rows.push(cells);
            roles.push(RowRole::Model {
                name: name.clone(),
                model,
                parent,
                level,
            });
        }
    };

    rows.push(blank_row(&hierarchy.total_label));
    roles.push(RowRole::Total);
    push_models(&mut rows, &mut roles, 0, Level::Total, None);

    let mut country_index = 0;
    for region in &hierarchy.regions {
        let region_row = rows.len();
        rows.push(blank_row(&region.name));
        roles.push(RowRole::Region {
            name: region.name.clone(),
        });
        push_models(&mut rows, &mut roles, region_row, Level::Region, None);

        for country in &region.countries {
            let country_row = rows.len();
            rows.push(blank_row(country));
            roles.push(RowRole::Country {
                name: country.clone(),
                region: region_row,
            });
            push_models(
                &mut rows,
                &mut roles,
                country_row,
                Level::Country,
                Some(country_index),
            );
            country_index += 1;
        }
    }

    let mut grid = Grid::assemble(rows, roles);
    aggregation::recalculate_in_place(&mut grid);
    grid
}
