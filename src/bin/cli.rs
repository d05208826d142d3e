#![cfg(not(tarpaulin_include))]

use forecast_grid::config::{AppConfig, init_logging};
use forecast_grid::downloader::to_csv;
use forecast_grid::grid::Grid;
use forecast_grid::history::CalendarContext;
use forecast_grid::layout::{self, MONTH_BLOCK_WIDTH, MONTH_COUNT, MONTH_LABELS};
use forecast_grid::summary::monthly_forecast;
use forecast_grid::validator::EditOutcome;
use forecast_grid::workbook::{SaveOutcome, Workbook};
use std::env;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Instant;

const LABEL_WIDTH: usize = 14;
const CELL_WIDTH: usize = 9;

fn display_month(grid: &Grid, month: usize, version: &str, editing: bool) {
    let mode = if editing { "editing" } else { "viewing" };
    println!("== {} | {} ({}) ==", MONTH_LABELS[month], version, mode);

    let first = layout::column_for(month, 0, layout::Field::Quantity);
    let columns = first..first + MONTH_BLOCK_WIDTH;

    print!("{:>3} {:<LABEL_WIDTH$}", "", "");
    for col in columns.clone() {
        let title = layout::column_title(col);
        let short = title.split_once(' ').map_or(title.as_str(), |(_, rest)| rest);
        let short: String = short.chars().take(CELL_WIDTH).collect();
        print!(" {:>CELL_WIDTH$}", short);
    }
    println!();

    for (r, row) in grid.rows().iter().enumerate() {
        let indent = if row.role().is_model() { "  " } else { "" };
        let label = format!("{indent}{}", row.label());
        let marker = if row.role().is_editable() { '*' } else { ' ' };
        print!("{:>3}{}{:<LABEL_WIDTH$}", r, marker, label);
        for col in columns.clone() {
            let value: String = row.cells()[col].chars().take(CELL_WIDTH).collect();
            print!(" {:>CELL_WIDTH$}", value);
        }
        println!();
    }
}

fn print_help() {
    println!("Commands:");
    println!("  q: Quit");
    println!("  a: Previous month");
    println!("  d: Next month");
    println!("  disable_output / enable_output: Toggle the grid display");
    println!("  edit: Start editing the latest version");
    println!("  set <row> <col> <value>: Edit a cell (rows marked * are editable)");
    println!("  changes: Show pending changes");
    println!("  save: Save the edit session as a new version");
    println!("  cancel: Discard the edit session");
    println!("  versions: List versions");
    println!("  view <id>: Show a version");
    println!("  history [id]: Show the change history of a version");
    println!("  summary: Forecast totals per month and region");
    println!("  export <file>: Write the displayed grid as CSV");
}

fn run_command(
    workbook: &mut Workbook,
    month: &mut usize,
    show: &mut bool,
    command: &str,
) -> Result<String, Box<dyn std::error::Error>> {
    let mut parts = command.split_whitespace();
    let Some(verb) = parts.next() else {
        return Ok("invalid command".into());
    };

    match verb {
        "help" => print_help(),
        "a" => *month = month.saturating_sub(1),
        "d" => *month = (*month + 1).min(MONTH_COUNT - 1),
        "disable_output" => *show = false,
        "enable_output" => *show = true,
        "edit" => workbook.begin_edit()?,
        "set" => {
            let row: usize = parts.next().ok_or("missing row")?.parse()?;
            let col: usize = parts.next().ok_or("missing column")?.parse()?;
            let value = parts.collect::<Vec<_>>().join(" ");
            if let EditOutcome::Rejected { reason, .. } = workbook.apply_edit(row, col, &value)? {
                return Ok(format!("rejected: {reason}"));
            }
        }
        "changes" => {
            for change in workbook.pending_changes()? {
                println!(
                    "{}{} {} {} {}: {} -> {}",
                    if change.is_direct_change { "*" } else { " " },
                    change.country.as_deref().unwrap_or("-"),
                    change.model.as_deref().unwrap_or(""),
                    change.month.as_deref().unwrap_or(""),
                    change.category.as_deref().unwrap_or(""),
                    change.old_value,
                    change.new_value
                );
            }
        }
        "save" => match workbook.save(&CalendarContext::today())? {
            SaveOutcome::Unchanged => return Ok("no changes".into()),
            SaveOutcome::Saved { version, entry } => {
                return Ok(format!(
                    "saved {version} ({} change(s))",
                    entry.changes().len()
                ));
            }
        },
        "cancel" => {
            workbook.cancel_edit()?;
        }
        "versions" => {
            for id in workbook.versions().ids() {
                let marker = if id == workbook.current_version() { ">" } else { " " };
                let latest = if workbook.versions().is_latest(id) { " (latest)" } else { "" };
                println!("{marker} {id}{latest}");
            }
        }
        "view" => {
            let id = parts.next().ok_or("missing version id")?;
            workbook.view_version(id)?;
        }
        "history" => {
            let id = parts
                .next()
                .map(str::to_string)
                .unwrap_or_else(|| workbook.current_version().to_string());
            for entry in workbook.history_for(&id) {
                let calendar = entry.calendar();
                println!(
                    "{} [{} {} {}] {} change(s)",
                    entry.formatted_date(),
                    calendar.year,
                    calendar.month,
                    calendar.week,
                    entry.changes().len()
                );
                for change in entry.changes() {
                    println!(
                        "    {} {} {} {}: {} -> {}",
                        change.country.as_deref().unwrap_or("-"),
                        change.model.as_deref().unwrap_or(""),
                        change.month.as_deref().unwrap_or(""),
                        change.category.as_deref().unwrap_or(""),
                        change.old_value,
                        change.new_value
                    );
                }
            }
        }
        "summary" => {
            for month in monthly_forecast(workbook.grid()) {
                let regions: Vec<String> = month
                    .regions
                    .iter()
                    .map(|r| format!("{} {}/{}", r.name, r.qty, r.amt))
                    .collect();
                println!(
                    "{}: total {}/{} | {}",
                    month.month,
                    month.total_qty,
                    month.total_amt,
                    regions.join(" | ")
                );
            }
        }
        "export" => {
            let path = parts.next().ok_or("missing file name")?;
            fs::write(path, to_csv(workbook.grid()))?;
        }
        _ => return Ok("invalid command".into()),
    }

    Ok("ok".into())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let s = Instant::now();
    let mut config = AppConfig::from_env()?;
    if let Some(dir) = env::args().nth(1) {
        config.storage_dir = Some(PathBuf::from(dir));
    }
    init_logging(&config)?;

    let mut workbook = Workbook::open(config.open_store()?, config.hierarchy.clone())?;
    let mut month = 0;
    let mut show = true;
    let mut status = String::from("ok");
    let mut start_time = Instant::now();

    loop {
        if show {
            display_month(
                workbook.grid(),
                month,
                workbook.current_version(),
                workbook.is_editing(),
            );
        }

        let elapsed_time = start_time.elapsed().as_secs_f64();
        print!("[{:.1}] ({}) > ", elapsed_time, status);
        io::stdout().flush()?;

        let mut command = String::new();
        if io::stdin().read_line(&mut command)? == 0 {
            break;
        }
        let command = command.trim();
        start_time = Instant::now();

        if command == "q" {
            break;
        }
        status = match run_command(&mut workbook, &mut month, &mut show, command) {
            Ok(status) => status,
            Err(e) => e.to_string(),
        };
    }

    let e = s.elapsed().as_secs_f64();
    println!("Total elapsed time: {:.1} seconds", e);

    Ok(())
}
