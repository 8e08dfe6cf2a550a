use async_trait::async_trait;
use std::cmp::Ordering;
use std::path::Path;

use crate::{
    error::{ExplorerError, Result},
    source::EntrySource,
    types::PathEntry,
};

/// List the immediate children of `path`, sorted folders first
///
/// Returns `ExplorerError::NotFound` when `path` doesn't exist
pub fn list_directory(path: &str) -> Result<Vec<PathEntry>> {
    let dir = std::path::absolute(Path::new(path))?;

    let read_dir = match std::fs::read_dir(&dir) {
        Ok(read_dir) => read_dir,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(not_found(path));
        }
        Err(e) => return Err(ExplorerError::Io(e)),
    };

    let mut entries = Vec::new();
    for dirent in read_dir {
        let dirent = dirent?;
        // Symlinks are reported as what they are, not what they point at
        let file_type = dirent.file_type()?;
        let name = dirent.file_name();

        entries.push(PathEntry {
            name: name.to_string_lossy().into_owned(),
            path: dir.join(&name).to_string_lossy().into_owned(),
            is_folder: file_type.is_dir(),
            children: None,
        });
    }

    Ok(sort_entries(entries))
}

fn not_found(path: &str) -> ExplorerError {
    ExplorerError::NotFound {
        message: format!("The requested path ({}) doesn't exist.", path),
    }
}

/// Folders first, then files, each group ordered with [`compare_names`]
pub fn sort_entries(mut entries: Vec<PathEntry>) -> Vec<PathEntry> {
    entries.sort_by(|a, b| {
        b.is_folder
            .cmp(&a.is_folder)
            .then_with(|| compare_names(&a.name, &b.name))
    });
    entries
}

/// Case-aware name ordering: case-folded comparison first, lowercase before
/// uppercase when names differ only by case
pub fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| b.cmp(a))
}

/// Entry source reading the local file system in-process
pub struct LocalEntrySource {
    roots: Vec<String>,
}

impl LocalEntrySource {
    pub fn new(roots: Vec<String>) -> Self {
        Self { roots }
    }
}

#[async_trait]
impl EntrySource for LocalEntrySource {
    async fn list_entries(&self, path: &str) -> Result<Vec<PathEntry>> {
        let path = path.to_string();
        tokio::task::spawn_blocking(move || list_directory(&path)).await?
    }

    async fn root_paths(&self) -> Result<Vec<String>> {
        Ok(self.roots.clone())
    }

    fn identifier(&self) -> String {
        format!("local({})", self.roots.join(", "))
    }
}
