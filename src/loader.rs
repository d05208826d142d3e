use crate::error::{ForecastError, Result};
use crate::grid::{Grid, Hierarchy};
use log::debug;
use std::fs;
use std::path::Path;

/// Load a grid from a CSV file written by [`crate::downloader::to_csv`].
///
/// The first record is the column-title header and is skipped. The rest
/// must describe a complete grid for `hierarchy`.
///
/// # Examples
/// ```no_run
/// use forecast_grid::grid::Hierarchy;
/// use forecast_grid::loader::from_csv;
///
/// match from_csv("forecast.csv", &Hierarchy::default()) {
///     Ok(grid) => println!("loaded {} rows", grid.len()),
///     Err(e) => eprintln!("Error loading CSV: {}", e),
/// }
/// ```
pub fn from_csv(filepath: impl AsRef<Path>, hierarchy: &Hierarchy) -> Result<Grid> {
    let text = fs::read_to_string(filepath)?;
    parse_csv(&text, hierarchy)
}

/// Parse CSV text into a grid. See [`from_csv`].
pub fn parse_csv(text: &str, hierarchy: &Hierarchy) -> Result<Grid> {
    let mut records = parse_records(text)?;
    if records.is_empty() {
        return Err(ForecastError::MalformedSnapshot("CSV file is empty".into()));
    }
    records.remove(0);
    debug!("parsed {} CSV data rows", records.len());
    Grid::from_rows(hierarchy, records)
}

// Split CSV text into records; quoted fields may hold commas, quotes and newlines
fn parse_records(text: &str) -> Result<Vec<Vec<String>>> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    // Doubled quote inside a quoted field
                    field.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            }
            '"' if field.is_empty() => in_quotes = true,
            ',' if !in_quotes => record.push(std::mem::take(&mut field)),
            '\r' if !in_quotes && chars.peek() == Some(&'\n') => {}
            '\n' if !in_quotes => {
                record.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut record));
            }
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err(ForecastError::MalformedSnapshot(
            "unterminated quoted field".into(),
        ));
    }
    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }

    Ok(records)
}
