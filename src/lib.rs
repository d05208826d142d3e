/*!
# Forecast Grid

A hierarchical, versioned sales-forecast sheet with automatic roll-ups, built in Rust.

## Overview

Planners edit monthly quantities and amounts for each product model in each
country. Every edit is validated, the country, region and grand-total rows are
recalculated from the leaves, and saving an edit session produces a new
immutable version together with a history entry listing exactly the cells the
planner changed.

## Architecture

### Core
- **Grid Model** - 133-column layout: a label column followed by twelve month
  blocks of five categories (Prior Year, Plan, Actual, Flash, Forecast), each a
  quantity/amount pair, plus one remark column per month
- **Hierarchy** - Grand Total, regions, countries, with one row per model under
  each of them; row roles are resolved once when a grid is built
- **Value Codec** - Thousands-separator formatting and lenient number parsing
- **Change Validator** - Only model rows under a country accept edits; numeric
  columns accept non-negative numbers, remarks accept any text
- **Aggregation Engine** - Country, region then total passes over every
  quantity/amount column
- **Change Detector** - Separator-insensitive diff that tells user edits apart
  from recalculated cells
- **Version History** - `rev1`, `rev2`, ... snapshots and per-version change logs

### Edit Session
- **Workbook** - Viewing/Editing state machine over the versions; only the
  latest version can be edited

### Data Persistence Layer
- Versions stored with Gzip compression and bincode serialization (`.bin.gz`)
- History stored as JSON lines
- CSV import/export, XLSX export

## Modules

- **layout**: Column layout, labels and header tiers
- **codec**: Number parsing and display formatting
- **grid**: Hierarchy, row roles and the grid itself
- **validator**: Edit validation
- **aggregation**: Roll-up recalculation and invariant checks
- **changes**: Change detection
- **history**: History entries and calendar context
- **versions**: Version snapshots
- **workbook**: Edit session state machine
- **saving**: Storage backends
- **loader**: CSV import
- **downloader**: Export functionality (CSV, XLSX)
- **summary**: Forecast roll-ups for charts
- **config**: Runtime configuration and logging setup
- **app**: Routing and handlers (feature `web`)

## REST API Endpoints

- `/api/grid`, `/api/headers` - Current grid and column headers
- `/api/versions`, `/api/versions/{id}/view` - List and switch versions
- `/api/history/{version}` - Change history of a version
- `/api/edit/begin`, `/api/edit/cell`, `/api/edit/save`, `/api/edit/cancel` - Edit session
- `/api/summary` - Monthly forecast per region
- `/api/export.csv`, `/api/export.xlsx` - Downloads
*/

pub mod aggregation;
pub mod changes;
pub mod codec;
pub mod config;
pub mod downloader;
pub mod error;
pub mod grid;
pub mod history;
pub mod layout;
pub mod loader;
pub mod saving;
pub mod summary;
pub mod validator;
pub mod versions;
pub mod workbook;

#[cfg(feature = "web")]
pub mod app;

pub use aggregation::{check_invariant, recalculate_all_aggregates};
pub use changes::{CellChange, detect_changes};
pub use error::{ForecastError, Result};
pub use grid::{Grid, Hierarchy, Level, RowRole, clone_grid, generate_initial_grid};
pub use history::{CalendarContext, HistoryLog, VersionHistoryEntry, record_version_if_changed};
pub use saving::{FileStore, MemoryStore, Persistence};
pub use validator::{EditOutcome, EditRejection, validate_and_apply_edit};
pub use versions::VersionStore;
pub use workbook::{SaveOutcome, Workbook};
