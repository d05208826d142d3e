//! Forecast roll-ups for dashboards and charts.

use crate::codec::parse_number;
use crate::grid::{Grid, Level, RowRole};
use crate::layout::{Category, Field, MONTH_COUNT, MONTH_LABELS, column_of};
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RegionForecast {
    pub name: String,
    pub qty: i64,
    pub amt: i64,
}

/// Forecast totals for one month.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MonthlyForecast {
    pub month: String,
    pub total_qty: i64,
    pub total_amt: i64,
    pub regions: Vec<RegionForecast>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CountryForecast {
    pub name: String,
    pub region: String,
    pub amt: i64,
}

fn forecast_pair(grid: &Grid, row: usize, month: usize) -> (i64, i64) {
    let qty_col = column_of(month, Category::Forecast, Field::Quantity);
    let amt_col = column_of(month, Category::Forecast, Field::Amount);
    let read = |col| grid.cell(row, col).map_or(0, |v| parse_number(v, 0));
    (read(qty_col), read(amt_col))
}

/// Per month, the forecast quantity and amount of the total and each region.
pub fn monthly_forecast(grid: &Grid) -> Vec<MonthlyForecast> {
    let total = grid.rows_at(Level::Total).next();
    let regions: Vec<usize> = grid.rows_at(Level::Region).collect();

    (0..MONTH_COUNT)
        .map(|month| {
            let (total_qty, total_amt) = total.map_or((0, 0), |row| forecast_pair(grid, row, month));
            let regions = regions
                .iter()
                .map(|&row| {
                    let (qty, amt) = forecast_pair(grid, row, month);
                    RegionForecast {
                        name: grid.rows()[row].label().to_string(),
                        qty,
                        amt,
                    }
                })
                .collect();
            MonthlyForecast {
                month: MONTH_LABELS[month].to_string(),
                total_qty,
                total_amt,
                regions,
            }
        })
        .collect()
}

/// Forecast amount of every country for `month` (0-based). Empty when the
/// month is out of range.
pub fn country_forecast(grid: &Grid, month: usize) -> Vec<CountryForecast> {
    if month >= MONTH_COUNT {
        return Vec::new();
    }
    grid.rows_at(Level::Country)
        .filter_map(|row| {
            let RowRole::Country { name, region } = grid.role(row)? else {
                return None;
            };
            let region = grid.row(*region)?.label().to_string();
            let (_, amt) = forecast_pair(grid, row, month);
            Some(CountryForecast {
                name: name.clone(),
                region,
                amt,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{Hierarchy, generate_initial_grid};

    #[test]
    fn regions_add_up_to_total() {
        let grid = generate_initial_grid(&Hierarchy::default());
        let months = monthly_forecast(&grid);
        assert_eq!(months.len(), 12);
        for m in &months {
            assert_eq!(m.regions.len(), 2);
            assert_eq!(m.regions.iter().map(|r| r.qty).sum::<i64>(), m.total_qty);
            assert_eq!(m.regions.iter().map(|r| r.amt).sum::<i64>(), m.total_amt);
        }
        assert_eq!(months[0].month, "Jan");
        assert_eq!(months[0].regions[1].name, "Europe");
    }

    #[test]
    fn countries_carry_their_region() {
        let grid = generate_initial_grid(&Hierarchy::default());
        let countries = country_forecast(&grid, 3);
        let names: Vec<_> = countries
            .iter()
            .map(|c| (c.name.as_str(), c.region.as_str()))
            .collect();
        assert_eq!(
            names,
            vec![
                ("USA", "Americas"),
                ("Canada", "Americas"),
                ("UK", "Europe"),
                ("Italy", "Europe"),
            ]
        );
        assert!(countries.iter().all(|c| c.amt > 0));
        assert!(country_forecast(&grid, 12).is_empty());
    }
}
