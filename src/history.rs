//! Version history: one immutable entry per saved edit session.

use crate::changes::CellChange;
use chrono::{DateTime, Datelike, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reporting period an edit session was saved in.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarContext {
    pub year: String,
    /// Two-digit month, `01`..`12`.
    pub month: String,
    /// Week of the year as `W<n>`, weeks starting on Sunday.
    pub week: String,
}

impl CalendarContext {
    pub fn new(year: impl Into<String>, month: impl Into<String>, week: impl Into<String>) -> Self {
        Self {
            year: year.into(),
            month: month.into(),
            week: week.into(),
        }
    }

    pub fn from_date(date: NaiveDate) -> Self {
        let day_of_year = date.ordinal0();
        let weekday = date.weekday().num_days_from_sunday();
        let jan_first_weekday = (7 + weekday - day_of_year % 7) % 7;
        let week = (day_of_year + jan_first_weekday + 1).div_ceil(7);
        Self {
            year: date.year().to_string(),
            month: format!("{:02}", date.month()),
            week: format!("W{week}"),
        }
    }

    /// Context for the local calendar date.
    pub fn today() -> Self {
        Self::from_date(Local::now().date_naive())
    }
}

/// The direct changes saved in one edit session.
///
/// Fields are only readable; entries never change after creation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionHistoryEntry {
    id: Uuid,
    version: String,
    created_at: DateTime<Utc>,
    calendar: CalendarContext,
    changes: Vec<CellChange>,
}

impl VersionHistoryEntry {
    /// Builds an entry from the direct changes in `changes`.
    ///
    /// Returns `None` when none of them is a direct change.
    pub fn from_changes(
        version: &str,
        calendar: &CalendarContext,
        changes: &[CellChange],
        created_at: DateTime<Utc>,
    ) -> Option<Self> {
        let direct: Vec<CellChange> = changes
            .iter()
            .filter(|c| c.is_direct_change)
            .cloned()
            .collect();
        if direct.is_empty() {
            return None;
        }
        Some(Self {
            id: Uuid::new_v4(),
            version: version.to_string(),
            created_at,
            calendar: calendar.clone(),
            changes: direct,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn calendar(&self) -> &CalendarContext {
        &self.calendar
    }

    pub fn changes(&self) -> &[CellChange] {
        &self.changes
    }

    /// Short display form, `yy.MM.dd HH:mm` in local time.
    pub fn formatted_date(&self) -> String {
        self.created_at
            .with_timezone(&Local)
            .format("%y.%m.%d %H:%M")
            .to_string()
    }
}

/// Append-only log of history entries across all versions.
#[derive(Clone, Debug, Default)]
pub struct HistoryLog {
    entries: Vec<VersionHistoryEntry>,
}

impl HistoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<VersionHistoryEntry>) -> Self {
        Self { entries }
    }

    /// Records the direct changes of a save, if there are any.
    ///
    /// Derived (aggregate) changes alone never produce an entry.
    pub fn record_if_any(
        &mut self,
        version: &str,
        calendar: &CalendarContext,
        changes: &[CellChange],
    ) -> Option<VersionHistoryEntry> {
        let entry = VersionHistoryEntry::from_changes(version, calendar, changes, Utc::now())?;
        self.append(entry.clone());
        Some(entry)
    }

    pub(crate) fn append(&mut self, entry: VersionHistoryEntry) {
        self.entries.push(entry);
    }

    /// Entries recorded for `version`, oldest first.
    pub fn entries_for(&self, version: &str) -> Vec<&VersionHistoryEntry> {
        self.entries
            .iter()
            .filter(|e| e.version == version)
            .collect()
    }

    pub fn entries(&self) -> &[VersionHistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Free-function form of [`HistoryLog::record_if_any`].
pub fn record_version_if_changed(
    log: &mut HistoryLog,
    version: &str,
    calendar: &CalendarContext,
    changes: &[CellChange],
) -> Option<VersionHistoryEntry> {
    log.record_if_any(version, calendar, changes)
}
