//! Ordered, immutable snapshots of the grid: `rev1`, `rev2`, ...

use crate::error::{ForecastError, Result};
use crate::grid::Grid;
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref VERSION_ID_REGEX: Regex = Regex::new(r"^rev(\d+)$").unwrap();
}

/// Sequence number of a `rev<n>` id.
pub fn revision_number(id: &str) -> Option<u32> {
    VERSION_ID_REGEX
        .captures(id)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

pub fn revision_id(number: u32) -> String {
    format!("rev{number}")
}

/// Orders version ids by revision number; unknown ids sort last by name.
pub fn sort_version_ids(ids: &mut [String]) {
    ids.sort_by(|a, b| match (revision_number(a), revision_number(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.cmp(b),
    });
}

/// A named, owned copy of the grid.
#[derive(Clone, Debug)]
pub struct VersionSnapshot {
    id: String,
    grid: Grid,
    created_at: DateTime<Utc>,
}

impl VersionSnapshot {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// All known versions, oldest first. Only the last one is editable.
#[derive(Clone, Debug, Default)]
pub struct VersionStore {
    versions: Vec<VersionSnapshot>,
}

impl VersionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id the next pushed version will get.
    pub fn next_id(&self) -> String {
        let highest = self
            .versions
            .iter()
            .filter_map(|v| revision_number(&v.id))
            .max()
            .unwrap_or(0);
        revision_id(highest + 1)
    }

    /// Stores a deep copy of `grid` as a new latest version.
    pub fn push(&mut self, grid: &Grid) -> String {
        let id = self.next_id();
        self.insert(id.clone(), grid.clone(), Utc::now());
        id
    }

    /// Adds a version under a known id, e.g. one loaded from storage.
    pub(crate) fn insert(&mut self, id: String, grid: Grid, created_at: DateTime<Utc>) {
        self.versions.push(VersionSnapshot {
            id,
            grid,
            created_at,
        });
    }

    pub fn get(&self, id: &str) -> Result<&VersionSnapshot> {
        self.versions
            .iter()
            .find(|v| v.id == id)
            .ok_or_else(|| ForecastError::UnknownVersion(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.versions.iter().any(|v| v.id == id)
    }

    pub fn latest(&self) -> Option<&VersionSnapshot> {
        self.versions.last()
    }

    pub fn is_latest(&self, id: &str) -> bool {
        self.latest().is_some_and(|v| v.id == id)
    }

    pub fn ids(&self) -> Vec<&str> {
        self.versions.iter().map(|v| v.id.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{Hierarchy, generate_initial_grid};

    #[test]
    fn ids_are_sequential() {
        let grid = generate_initial_grid(&Hierarchy::default());
        let mut store = VersionStore::new();
        assert_eq!(store.push(&grid), "rev1");
        assert_eq!(store.push(&grid), "rev2");
        assert!(store.is_latest("rev2"));
        assert!(!store.is_latest("rev1"));
        assert!(matches!(store.get("rev9"), Err(ForecastError::UnknownVersion(_))));
    }

    #[test]
    fn next_id_skips_gaps() {
        let grid = generate_initial_grid(&Hierarchy::default());
        let mut store = VersionStore::new();
        let created = Utc::now();
        store.insert("rev1".into(), grid.clone(), created);
        store.insert("rev4".into(), grid.clone(), created);
        assert_eq!(store.next_id(), "rev5");
        assert_eq!(store.get("rev4").unwrap().created_at(), created);
    }

    #[test]
    fn revision_ids_sort_numerically() {
        let mut ids = vec!["rev10".to_string(), "draft".into(), "rev2".into(), "rev1".into()];
        sort_version_ids(&mut ids);
        assert_eq!(ids, vec!["rev1", "rev2", "rev10", "draft"]);
        assert_eq!(revision_number("rev12"), Some(12));
        assert_eq!(revision_number("v12"), None);
    }
}
