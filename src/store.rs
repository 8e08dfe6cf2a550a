use std::sync::Arc;
use tracing::warn;

use crate::{
    error::{ExplorerError, Result},
    types::PathEntry,
};

/// Entries of exactly one directory level
///
/// Every mutation swaps in a new list so holders of an older snapshot can
/// tell it changed (`Arc::ptr_eq`, or the revision counter).
#[derive(Debug, Default)]
pub struct TreeStore {
    entries: Arc<Vec<PathEntry>>,
    revision: u64,
}

impl TreeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current list of entries
    pub fn snapshot(&self) -> Arc<Vec<PathEntry>> {
        Arc::clone(&self.entries)
    }

    /// Number of mutations applied so far
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Swap the whole level for a freshly fetched list
    pub fn replace(&mut self, entries: Vec<PathEntry>) {
        self.entries = Arc::new(entries);
        self.revision += 1;
    }

    /// Find an entry of this level by path. Deeper levels are not searched.
    pub fn locate(&self, path: &str) -> Result<&PathEntry> {
        self.entries
            .iter()
            .find(|entry| entry.path == path)
            .ok_or_else(|| ExplorerError::StaleReference {
                path: path.to_string(),
            })
    }

    pub fn contains(&self, path: &str) -> bool {
        self.locate(path).is_ok()
    }

    /// Attach `children` to the entry at `path`
    ///
    /// Returns `false` and leaves the store untouched if the entry is no
    /// longer part of this level.
    pub fn update_children_of(&mut self, path: &str, children: Vec<PathEntry>) -> bool {
        let Some(index) = self.entries.iter().position(|entry| entry.path == path) else {
            warn!(path, "Cannot attach children: entry is no longer loaded");
            return false;
        };

        let mut entries = Vec::clone(&self.entries);
        entries[index].children = Some(children);
        self.entries = Arc::new(entries);
        self.revision += 1;
        true
    }
}
