use bincode::{deserialize_from, serialize_into};
use chrono::{DateTime, Utc};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Cursor, Write};
use std::path::{Path, PathBuf};

use crate::error::{ForecastError, Result};
use crate::grid::Grid;
use crate::history::VersionHistoryEntry;
use crate::versions::{revision_number, sort_version_ids};

/// Raw cell matrix as stored; turned back into a [`Grid`] by the caller.
pub type RawRows = Vec<Vec<String>>;

const VERSION_EXTENSION: &str = ".bin.gz";
const HISTORY_FILE: &str = "history.jsonl";

/// Storage used by the workbook for versions and history.
///
/// Stores hand back raw rows; validating them is the core's job.
pub trait Persistence {
    /// Stored `rev<n>` version ids, oldest first.
    fn list_versions(&self) -> Result<Vec<String>>;
    fn load_version(&self, id: &str) -> Result<RawRows>;
    /// When a stored version was written, if the store knows.
    fn version_created_at(&self, id: &str) -> Result<Option<DateTime<Utc>>>;
    fn save_version(&mut self, id: &str, grid: &Grid) -> Result<()>;
    fn append_history(&mut self, entry: &VersionHistoryEntry) -> Result<()>;
    fn load_history(&self) -> Result<Vec<VersionHistoryEntry>>;
}

/// Writes rows as gzip-compressed bincode.
pub fn write_rows<W: Write>(rows: &RawRows, out: W) -> Result<()> {
    let encoder = GzEncoder::new(out, Compression::default());
    let mut writer = BufWriter::new(encoder);
    serialize_into(&mut writer, rows)?;
    let encoder = writer
        .into_inner()
        .map_err(|e| ForecastError::Io(e.into_error()))?;
    encoder.finish()?;
    Ok(())
}

pub fn read_rows<R: std::io::Read>(input: R) -> Result<RawRows> {
    let decoder = GzDecoder::new(input);
    let mut reader = BufReader::new(decoder);
    let rows: RawRows = deserialize_from(&mut reader)?;
    Ok(rows)
}

pub fn encode_rows(rows: &RawRows) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    write_rows(rows, &mut buffer)?;
    Ok(buffer)
}

pub fn decode_rows(buffer: &[u8]) -> Result<RawRows> {
    read_rows(Cursor::new(buffer))
}

pub fn save_grid(grid: &Grid, filename: impl AsRef<Path>) -> Result<()> {
    let file = File::create(filename)?;
    write_rows(&grid.to_rows(), file)
}

pub fn load_rows(filename: impl AsRef<Path>) -> Result<RawRows> {
    let file = File::open(filename)?;
    read_rows(file)
}

/// Keeps everything in memory; nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    versions: HashMap<String, (RawRows, DateTime<Utc>)>,
    history: Vec<VersionHistoryEntry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Persistence for MemoryStore {
    fn list_versions(&self) -> Result<Vec<String>> {
        let mut ids: Vec<String> = self
            .versions
            .keys()
            .filter(|id| revision_number(id).is_some())
            .cloned()
            .collect();
        sort_version_ids(&mut ids);
        Ok(ids)
    }

    fn load_version(&self, id: &str) -> Result<RawRows> {
        self.versions
            .get(id)
            .map(|(rows, _)| rows.clone())
            .ok_or_else(|| ForecastError::UnknownVersion(id.to_string()))
    }

    fn version_created_at(&self, id: &str) -> Result<Option<DateTime<Utc>>> {
        Ok(self.versions.get(id).map(|(_, created_at)| *created_at))
    }

    fn save_version(&mut self, id: &str, grid: &Grid) -> Result<()> {
        self.versions
            .insert(id.to_string(), (grid.to_rows(), Utc::now()));
        Ok(())
    }

    fn append_history(&mut self, entry: &VersionHistoryEntry) -> Result<()> {
        self.history.push(entry.clone());
        Ok(())
    }

    fn load_history(&self) -> Result<Vec<VersionHistoryEntry>> {
        Ok(self.history.clone())
    }
}

/// One compressed file per version plus a JSON-lines history file.
///
/// Version files are written once, so a file's modification time is the
/// version's creation time. Files not named `rev<n>.bin.gz` are ignored.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Opens (and creates if needed) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        info!("file store at {}", dir.display());
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn version_path(&self, id: &str) -> Result<PathBuf> {
        let safe = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !safe {
            return Err(ForecastError::UnknownVersion(id.to_string()));
        }
        Ok(self.dir.join(format!("{id}{VERSION_EXTENSION}")))
    }

    fn history_path(&self) -> PathBuf {
        self.dir.join(HISTORY_FILE)
    }
}

impl Persistence for FileStore {
    fn list_versions(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let name = entry?.file_name();
            let Some(id) = name
                .to_str()
                .and_then(|n| n.strip_suffix(VERSION_EXTENSION))
            else {
                continue;
            };
            if revision_number(id).is_some() {
                ids.push(id.to_string());
            } else {
                warn!("ignoring {id}{VERSION_EXTENSION}: not a version file");
            }
        }
        sort_version_ids(&mut ids);
        Ok(ids)
    }

    fn load_version(&self, id: &str) -> Result<RawRows> {
        let path = self.version_path(id)?;
        if !path.exists() {
            return Err(ForecastError::UnknownVersion(id.to_string()));
        }
        debug!("loading version {id} from {}", path.display());
        load_rows(&path).map_err(|e| match e {
            ForecastError::Encoding(inner) => {
                ForecastError::MalformedSnapshot(format!("{id}: {inner}"))
            }
            other => other,
        })
    }

    fn version_created_at(&self, id: &str) -> Result<Option<DateTime<Utc>>> {
        let modified = fs::metadata(self.version_path(id)?)?.modified()?;
        Ok(Some(DateTime::<Utc>::from(modified)))
    }

    fn save_version(&mut self, id: &str, grid: &Grid) -> Result<()> {
        let path = self.version_path(id)?;
        save_grid(grid, &path)?;
        info!("saved version {id} to {}", path.display());
        Ok(())
    }

    fn append_history(&mut self, entry: &VersionHistoryEntry) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.history_path())?;
        let line = serde_json::to_string(entry)?;
        writeln!(file, "{line}")?;
        Ok(())
    }

    fn load_history(&self) -> Result<Vec<VersionHistoryEntry>> {
        let path = self.history_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let reader = BufReader::new(File::open(path)?);
        let mut entries = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            entries.push(serde_json::from_str(&line)?);
        }
        Ok(entries)
    }
}
