use async_trait::async_trait;
use crate::{error::Result, types::PathEntry};

/// Where a tree gets its data from
///
/// Implementors list the immediate children of a directory, already sorted
/// (folders first). Placeholders are never part of a source's answer.
#[async_trait]
pub trait EntrySource: Send + Sync {
    /// List the immediate children of `path`
    ///
    /// Returns `ExplorerError::NotFound` carrying the lister's message if the
    /// path doesn't exist
    async fn list_entries(&self, path: &str) -> Result<Vec<PathEntry>>;

    /// The root paths to explore, in display order
    async fn root_paths(&self) -> Result<Vec<String>>;

    /// Get a human-readable identifier for this source (for logging/debugging)
    fn identifier(&self) -> String;
}
