use thiserror::Error;

/// Failures surfaced to callers of the workbook, loaders and stores.
///
/// Rejected cell edits are not errors: they come back as
/// [`crate::validator::EditOutcome::Rejected`]. A save without changes is
/// [`crate::workbook::SaveOutcome::Unchanged`].
#[derive(Debug, Error)]
pub enum ForecastError {
    /// Stored or imported rows do not form a valid hierarchy grid.
    #[error("malformed snapshot: {0}")]
    MalformedSnapshot(String),

    /// Edits and saves are only allowed on the latest version.
    #[error("version {version} is read-only; only {latest} can be edited")]
    EditOnReadOnlyVersion { version: String, latest: String },

    #[error("no edit in progress")]
    NotEditing,

    #[error("an edit is already in progress on {0}")]
    EditInProgress(String),

    #[error("unknown version {0}")]
    UnknownVersion(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("encoding error: {0}")]
    Encoding(#[from] bincode::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, ForecastError>;
