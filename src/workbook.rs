//! The edit session: which version is on screen, whether it is being
//! edited, and what happens on save or cancel.
//!
//! ```text
//! Viewing --begin_edit--> Editing --save/cancel_edit--> Viewing
//! ```
//!
//! Only the latest version can enter `Editing`. A save that contains at
//! least one direct change becomes the next version and gets one history
//! entry; both are written to the store before the in-memory state moves.

use chrono::Utc;
use log::{debug, info, warn};

use crate::aggregation::recalculate_in_place;
use crate::changes::{CellChange, detect_changes};
use crate::error::{ForecastError, Result};
use crate::grid::{Grid, Hierarchy, generate_initial_grid};
use crate::history::{CalendarContext, HistoryLog, VersionHistoryEntry};
use crate::saving::Persistence;
use crate::validator::{self, EditOutcome, RawChange};
use crate::versions::VersionStore;

#[derive(Debug)]
enum Mode {
    Viewing,
    Editing { original: Grid },
}

/// What a save produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SaveOutcome {
    /// No direct change was made; nothing was stored.
    Unchanged,
    Saved {
        version: String,
        entry: VersionHistoryEntry,
    },
}

pub struct Workbook {
    store: Box<dyn Persistence + Send>,
    hierarchy: Hierarchy,
    versions: VersionStore,
    history: HistoryLog,
    current: String,
    grid: Grid,
    mode: Mode,
}

impl Workbook {
    /// Loads every stored version and the history log.
    ///
    /// Versions that cannot be read or fail grid validation are skipped.
    /// When nothing usable is stored, a generated grid is saved as `rev1`.
    pub fn open(store: Box<dyn Persistence + Send>, hierarchy: Hierarchy) -> Result<Self> {
        hierarchy.validate()?;
        let mut store = store;
        let mut versions = VersionStore::new();

        for id in store.list_versions()? {
            let loaded = store
                .load_version(&id)
                .and_then(|rows| Grid::from_rows(&hierarchy, rows));
            let grid = match loaded {
                Ok(grid) => grid,
                Err(e) => {
                    warn!("skipping stored version {id}: {e}");
                    continue;
                }
            };
            let created_at = match store.version_created_at(&id) {
                Ok(Some(at)) => at,
                Ok(None) => Utc::now(),
                Err(e) => {
                    warn!("no creation time for {id}: {e}");
                    Utc::now()
                }
            };
            versions.insert(id, grid, created_at);
        }

        if versions.is_empty() {
            let grid = generate_initial_grid(&hierarchy);
            let id = versions.next_id();
            store.save_version(&id, &grid)?;
            info!("no usable versions stored, created {id}");
            versions.insert(id, grid, Utc::now());
        }

        let history = match store.load_history() {
            Ok(entries) => HistoryLog::from_entries(entries),
            Err(e) => {
                warn!("could not read version history: {e}");
                HistoryLog::new()
            }
        };

        let latest = versions
            .latest()
            .ok_or_else(|| ForecastError::MalformedSnapshot("no versions".into()))?;
        let current = latest.id().to_string();
        let grid = latest.grid().clone();
        info!(
            "opened workbook with {} version(s), showing {current}",
            versions.len()
        );

        Ok(Self {
            store,
            hierarchy,
            versions,
            history,
            current,
            grid,
            mode: Mode::Viewing,
        })
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn hierarchy(&self) -> &Hierarchy {
        &self.hierarchy
    }

    pub fn current_version(&self) -> &str {
        &self.current
    }

    pub fn is_editing(&self) -> bool {
        matches!(self.mode, Mode::Editing { .. })
    }

    /// True when the version on screen is the latest one.
    pub fn is_latest(&self) -> bool {
        self.versions.is_latest(&self.current)
    }

    pub fn versions(&self) -> &VersionStore {
        &self.versions
    }

    pub fn history(&self) -> &HistoryLog {
        &self.history
    }

    pub fn history_for(&self, version: &str) -> Vec<&VersionHistoryEntry> {
        self.history.entries_for(version)
    }

    /// Switches the displayed version. Not allowed mid-edit.
    pub fn view_version(&mut self, id: &str) -> Result<&Grid> {
        if self.is_editing() {
            return Err(ForecastError::EditInProgress(self.current.clone()));
        }
        let snapshot = self.versions.get(id)?;
        self.grid = snapshot.grid().clone();
        self.current = id.to_string();
        debug!("viewing {id}");
        Ok(&self.grid)
    }

    pub fn begin_edit(&mut self) -> Result<()> {
        if self.is_editing() {
            return Err(ForecastError::EditInProgress(self.current.clone()));
        }
        if !self.is_latest() {
            let latest = self
                .versions
                .latest()
                .map(|v| v.id().to_string())
                .unwrap_or_default();
            return Err(ForecastError::EditOnReadOnlyVersion {
                version: self.current.clone(),
                latest,
            });
        }
        self.mode = Mode::Editing {
            original: self.grid.clone(),
        };
        info!("editing {}", self.current);
        Ok(())
    }

    fn ensure_editing(&self) -> Result<()> {
        if self.is_editing() {
            Ok(())
        } else {
            Err(ForecastError::NotEditing)
        }
    }

    /// Validates one edit and refreshes the aggregates if it was applied.
    pub fn apply_edit(&mut self, row: usize, col: usize, raw: &str) -> Result<EditOutcome> {
        self.apply_edit_with_previous(row, col, raw, None)
    }

    /// Like [`Workbook::apply_edit`], but a refused edit puts `previous`
    /// back into the cell when it is itself a valid value there.
    pub fn apply_edit_with_previous(
        &mut self,
        row: usize,
        col: usize,
        raw: &str,
        previous: Option<&str>,
    ) -> Result<EditOutcome> {
        self.ensure_editing()?;
        let outcome = validator::apply_edit_with_previous(&mut self.grid, row, col, raw, previous);
        if outcome.is_applied() {
            recalculate_in_place(&mut self.grid);
        }
        Ok(outcome)
    }

    /// Applies a batch of edits, recalculating once at the end.
    pub fn apply_changes(&mut self, changes: &[RawChange]) -> Result<Vec<EditOutcome>> {
        self.ensure_editing()?;
        let outcomes = validator::apply_changes(&mut self.grid, changes);
        recalculate_in_place(&mut self.grid);
        Ok(outcomes)
    }

    /// Changes made so far in this edit session.
    pub fn pending_changes(&self) -> Result<Vec<CellChange>> {
        match &self.mode {
            Mode::Editing { original } => Ok(detect_changes(original, &self.grid)),
            Mode::Viewing => Err(ForecastError::NotEditing),
        }
    }

    /// Ends the edit session, storing a new version if anything was
    /// directly changed.
    ///
    /// On a storage error the session stays open with its edits intact.
    pub fn save(&mut self, calendar: &CalendarContext) -> Result<SaveOutcome> {
        self.ensure_editing()?;
        recalculate_in_place(&mut self.grid);
        let changes = self.pending_changes()?;
        let version = self.versions.next_id();

        let Some(entry) =
            VersionHistoryEntry::from_changes(&version, calendar, &changes, Utc::now())
        else {
            self.mode = Mode::Viewing;
            info!("nothing to save on {}", self.current);
            return Ok(SaveOutcome::Unchanged);
        };

        self.store.save_version(&version, &self.grid)?;
        self.store.append_history(&entry)?;

        self.versions
            .insert(version.clone(), self.grid.clone(), entry.created_at());
        self.history.append(entry.clone());
        self.current = version.clone();
        self.mode = Mode::Viewing;
        info!(
            "saved {version} with {} direct change(s), {} cell(s) in total",
            entry.changes().len(),
            changes.len()
        );
        Ok(SaveOutcome::Saved { version, entry })
    }

    /// Drops the working copy and shows the grid as it was before editing.
    pub fn cancel_edit(&mut self) -> Result<&Grid> {
        match std::mem::replace(&mut self.mode, Mode::Viewing) {
            Mode::Editing { original } => {
                self.grid = original;
                info!("cancelled edit on {}", self.current);
                Ok(&self.grid)
            }
            Mode::Viewing => Err(ForecastError::NotEditing),
        }
    }
}
