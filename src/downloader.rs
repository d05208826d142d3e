use crate::grid::Grid;
use crate::layout::{self, COLUMN_COUNT};

fn push_field(out: &mut String, value: &str) {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        let escaped = value.replace('"', "\"\"");
        out.push_str(&format!("\"{}\"", escaped));
    } else {
        out.push_str(value);
    }
}

/// Convert a grid to CSV.
///
/// The first line carries one title per column (`Jan Forecast Qty`, ...);
/// every grid row follows as displayed, so amounts keep their separators
/// and are quoted.
///
/// # Examples
/// ```
/// use forecast_grid::downloader::to_csv;
/// use forecast_grid::grid::{Hierarchy, generate_initial_grid};
///
/// let grid = generate_initial_grid(&Hierarchy::default());
/// let csv = to_csv(&grid);
/// assert!(csv.starts_with("Label,Jan Prior Year Qty,"));
/// ```
pub fn to_csv(grid: &Grid) -> String {
    let mut csv_content = String::new();

    for col in 0..COLUMN_COUNT {
        if col > 0 {
            csv_content.push(',');
        }
        push_field(&mut csv_content, &layout::column_title(col));
    }
    csv_content.push('\n');

    for row in grid.rows() {
        for (col, value) in row.cells().iter().enumerate() {
            if col > 0 {
                csv_content.push(',');
            }
            push_field(&mut csv_content, value);
        }
        csv_content.push('\n');
    }

    csv_content
}

/// Convert a grid to an XLSX workbook.
///
/// Quantities and amounts are written as numbers; labels, remarks and
/// anything unparseable as text. The three header tiers are merged the
/// way they are shown on screen.
#[cfg(feature = "web")]
pub fn to_xlsx(grid: &Grid) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    use crate::codec::try_parse_number;
    use rust_xlsxwriter::{Format, Workbook, Worksheet};

    let mut workbook = Workbook::new();
    let mut worksheet = Worksheet::new();
    let bold = Format::new().set_bold();
    let amount_format = Format::new().set_num_format("#,##0");

    let headers = layout::column_headers();
    for (tier, cells) in headers.iter().enumerate() {
        let mut col: u16 = 0;
        for header in cells {
            let span = header.colspan as u16;
            if span > 1 {
                worksheet.merge_range(
                    tier as u32,
                    col,
                    tier as u32,
                    col + span - 1,
                    &header.label,
                    &bold,
                )?;
            } else {
                worksheet.write_string_with_format(tier as u32, col, &header.label, &bold)?;
            }
            col += span;
        }
    }

    let first_row = headers.len() as u32;
    for (r, row) in grid.rows().iter().enumerate() {
        let xr = first_row + r as u32;
        for (c, value) in row.cells().iter().enumerate() {
            let xc = c as u16;
            match try_parse_number(value) {
                Some(n) if layout::is_amount_column(c) => {
                    worksheet.write_number_with_format(xr, xc, n, &amount_format)?;
                }
                Some(n) if layout::is_quantity_column(c) => {
                    worksheet.write_number(xr, xc, n)?;
                }
                _ => {
                    worksheet.write_string(xr, xc, value)?;
                }
            }
        }
    }

    workbook.push_worksheet(worksheet);
    let buffer = workbook.save_to_buffer()?;

    Ok(buffer)
}
