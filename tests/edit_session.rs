use forecast_grid::codec::parse_number;
use forecast_grid::error::ForecastError;
use forecast_grid::grid::Hierarchy;
use forecast_grid::history::{CalendarContext, HistoryLog};
use forecast_grid::layout::{Category, Field, column_of};
use forecast_grid::saving::MemoryStore;
use forecast_grid::validator::{EditOutcome, RawChange};
use forecast_grid::workbook::{SaveOutcome, Workbook};

fn open() -> Workbook {
    Workbook::open(Box::new(MemoryStore::new()), Hierarchy::default()).unwrap()
}

fn calendar() -> CalendarContext {
    CalendarContext::new("2024", "01", "W3")
}

fn value(workbook: &Workbook, row: usize, col: usize) -> i64 {
    parse_number(workbook.grid().cell(row, col).unwrap(), 0)
}

#[test]
fn canada_forecast_edit_rolls_up_and_saves_one_change() {
    let mut workbook = open();
    let grid = workbook.grid();
    let leaf = grid.find_model("Canada", "Model1").unwrap();
    let sibling = grid.find_model("Canada", "Model2").unwrap();
    let canada = grid.find("Canada").unwrap();
    let americas = grid.find("Americas").unwrap();
    let total = grid.find("Grand Total").unwrap();
    let col = column_of(0, Category::Forecast, Field::Quantity);

    assert_eq!(grid.cell(leaf, col), Some("10"));
    let sibling_before = value(&workbook, sibling, col);
    let americas_before = value(&workbook, americas, col);
    let total_before = value(&workbook, total, col);

    workbook.begin_edit().unwrap();
    let outcome = workbook.apply_edit(leaf, col, "25").unwrap();
    assert_eq!(outcome, EditOutcome::Applied { value: "25".into() });

    assert_eq!(value(&workbook, sibling, col), sibling_before);
    assert_eq!(value(&workbook, canada, col), 25 + sibling_before);
    assert_eq!(value(&workbook, americas, col), americas_before + 15);
    assert_eq!(value(&workbook, total, col), total_before + 15);

    let pending = workbook.pending_changes().unwrap();
    let direct: Vec<_> = pending.iter().filter(|c| c.is_direct_change).collect();
    assert_eq!(direct.len(), 1);
    assert_eq!(direct[0].country.as_deref(), Some("Canada"));
    assert_eq!(direct[0].model.as_deref(), Some("Model1"));
    assert_eq!(direct[0].month.as_deref(), Some("Jan"));
    assert_eq!(direct[0].category.as_deref(), Some("Forecast"));
    assert_eq!((direct[0].old_value.as_str(), direct[0].new_value.as_str()), ("10", "25"));
    let derived_rows: Vec<usize> = pending
        .iter()
        .filter(|c| !c.is_direct_change)
        .map(|c| c.row)
        .collect();
    assert!(derived_rows.contains(&americas));
    assert!(derived_rows.contains(&total));

    let SaveOutcome::Saved { version, entry } = workbook.save(&calendar()).unwrap() else {
        panic!("expected a new version");
    };
    assert_eq!(version, "rev2");
    assert_eq!(entry.changes().len(), 1);
    assert_eq!(entry.calendar(), &calendar());
    assert_eq!(workbook.history().len(), 1);
    assert_eq!(workbook.history_for("rev2").len(), 1);
}

#[test]
fn history_ignores_sessions_with_only_derived_changes() {
    let mut workbook = open();
    let leaf = workbook.grid().find_model("USA", "Model1").unwrap();
    let col = column_of(2, Category::Forecast, Field::Amount);
    let current = workbook.grid().cell(leaf, col).unwrap().to_string();

    workbook.begin_edit().unwrap();
    // Same value with its separators removed is not a change
    workbook
        .apply_edit(leaf, col, &current.replace(',', ""))
        .unwrap();
    assert_eq!(workbook.save(&calendar()).unwrap(), SaveOutcome::Unchanged);
    assert!(workbook.history().is_empty());

    assert!(matches!(
        workbook.pending_changes(),
        Err(ForecastError::NotEditing)
    ));

    let mut log = HistoryLog::new();
    let mut change = forecast_grid::changes::CellChange {
        row: 0,
        col,
        old_value: "1".into(),
        new_value: "2".into(),
        country: Some("Grand Total".into()),
        model: None,
        month: Some("Mar".into()),
        category: Some("Forecast".into()),
        is_direct_change: false,
    };
    assert!(log.record_if_any("rev1", &calendar(), &[change.clone()]).is_none());
    change.is_direct_change = true;
    assert!(log.record_if_any("rev1", &calendar(), &[change]).is_some());
}

#[test]
fn only_the_latest_version_accepts_edits() {
    let mut workbook = open();
    let leaf = workbook.grid().find_model("Italy", "Model2").unwrap();
    let col = column_of(11, Category::Forecast, Field::Quantity);

    for value in ["30", "31"] {
        workbook.begin_edit().unwrap();
        workbook.apply_edit(leaf, col, value).unwrap();
        workbook.save(&calendar()).unwrap();
    }
    assert_eq!(workbook.versions().ids(), vec!["rev1", "rev2", "rev3"]);

    workbook.view_version("rev2").unwrap();
    assert_eq!(workbook.grid().cell(leaf, col), Some("30"));
    assert!(!workbook.is_latest());
    assert!(matches!(
        workbook.begin_edit(),
        Err(ForecastError::EditOnReadOnlyVersion { .. })
    ));
    assert!(matches!(
        workbook.apply_edit(leaf, col, "1"),
        Err(ForecastError::NotEditing)
    ));

    workbook.view_version("rev3").unwrap();
    workbook.begin_edit().unwrap();
    assert!(workbook.is_editing());
}

#[test]
fn cancel_discards_every_edit() {
    let mut workbook = open();
    let before = workbook.grid().clone();
    let leaf = workbook.grid().find_model("UK", "Model1").unwrap();

    workbook.begin_edit().unwrap();
    let changes = vec![
        RawChange::new(leaf, 1, before.cell(leaf, 1).unwrap(), "999"),
        RawChange::new(leaf, 11, "", "note"),
    ];
    let outcomes = workbook.apply_changes(&changes).unwrap();
    assert!(outcomes.iter().all(EditOutcome::is_applied));
    assert_ne!(workbook.grid(), &before);

    let restored = workbook.cancel_edit().unwrap().clone();
    assert_eq!(restored, before);
    assert!(!workbook.is_editing());
    assert_eq!(workbook.versions().len(), 1);
    assert!(workbook.history().is_empty());
}

#[test]
fn rejected_edits_do_not_reach_the_saved_version() {
    let mut workbook = open();
    let leaf = workbook.grid().find_model("USA", "Model2").unwrap();
    let col = column_of(6, Category::Forecast, Field::Quantity);
    let before = workbook.grid().cell(leaf, col).unwrap().to_string();

    workbook.begin_edit().unwrap();
    let outcome = workbook.apply_edit(leaf, col, "twelve").unwrap();
    assert!(!outcome.is_applied());
    assert_eq!(workbook.grid().cell(leaf, col), Some(before.as_str()));
    assert_eq!(workbook.save(&calendar()).unwrap(), SaveOutcome::Unchanged);
}

#[test]
fn rejected_edits_keep_the_cell_despite_a_bad_previous_value() {
    let mut workbook = open();
    let leaf = workbook.grid().find_model("USA", "Model1").unwrap();
    let qty = column_of(0, Category::PriorYear, Field::Quantity);
    let amt = column_of(0, Category::PriorYear, Field::Amount);

    workbook.begin_edit().unwrap();
    let outcome = workbook
        .apply_edit_with_previous(leaf, qty, "bad", Some("garbage"))
        .unwrap();
    assert!(!outcome.is_applied());
    assert_eq!(workbook.grid().cell(leaf, qty), Some("75"));

    let outcomes = workbook
        .apply_changes(&[RawChange::new(leaf, amt, "-500", "x")])
        .unwrap();
    assert!(!outcomes[0].is_applied());
    assert_eq!(workbook.grid().cell(leaf, amt), Some("1,725"));

    assert!(workbook.pending_changes().unwrap().is_empty());
    assert_eq!(workbook.save(&calendar()).unwrap(), SaveOutcome::Unchanged);
    assert_eq!(workbook.versions().ids(), vec!["rev1"]);
}
