use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, error, info};

use crate::{
    error::Result,
    notice::Notifier,
    render::{self, TreeItem},
    session::{Expansion, LevelSession},
    source::EntrySource,
    types::PathEntry,
};

/// Shown instead of a tree when no root paths were given
pub const NO_PATHS_MESSAGE: &str = "No paths were provided for exploring.";

struct MountedLevel {
    session: Arc<LevelSession>,
    parent: Option<String>,
}

/// The tree under one root path
///
/// Every expanded folder gets its own [`LevelSession`], which loads and
/// refreshes that folder independently of its parent.
pub struct PathExplorer {
    root: String,
    source: Arc<dyn EntrySource>,
    notifier: Arc<dyn Notifier>,
    refresh_interval: Duration,
    levels: RwLock<HashMap<String, MountedLevel>>,
    /// Bumped on every collapse
    epoch: AtomicU64,
    /// Epoch of the latest collapse of each folder
    collapses: Mutex<HashMap<String, u64>>,
}

impl PathExplorer {
    /// Mount the root level and run its initial load
    pub async fn open(
        root: impl Into<String>,
        source: Arc<dyn EntrySource>,
        notifier: Arc<dyn Notifier>,
        refresh_interval: Duration,
    ) -> Result<Self> {
        let explorer = Self {
            root: root.into(),
            source,
            notifier,
            refresh_interval,
            levels: RwLock::new(HashMap::new()),
            epoch: AtomicU64::new(0),
            collapses: Mutex::new(HashMap::new()),
        };

        info!(root = %explorer.root, source = %explorer.source.identifier(), "Opening explorer");
        let session = explorer.mount_level(&explorer.root).await?;
        explorer.levels.write().await.insert(
            explorer.root.clone(),
            MountedLevel {
                session,
                parent: None,
            },
        );

        Ok(explorer)
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    /// The mounted level for a folder (or the root)
    pub async fn level(&self, path: &str) -> Option<Arc<LevelSession>> {
        self.levels
            .read()
            .await
            .get(path)
            .map(|level| level.session.clone())
    }

    /// Entries of the root level
    pub async fn entries(&self) -> Arc<Vec<PathEntry>> {
        match self.level(&self.root).await {
            Some(session) => session.entries().await,
            None => Arc::new(Vec::new()),
        }
    }

    /// Paths of all expanded folders, sorted
    pub async fn expanded_paths(&self) -> Vec<String> {
        let levels = self.levels.read().await;
        let mut paths: Vec<String> = levels
            .iter()
            .filter(|(_, level)| level.parent.is_some())
            .map(|(path, _)| path.clone())
            .collect();
        paths.sort();
        paths
    }

    /// Whether `path` is an entry of any mounted level
    pub async fn owns(&self, path: &str) -> bool {
        self.owner_of(path).await.is_some()
    }

    /// Expand the folder at `path` and mount a level for it
    pub async fn expand(&self, path: &str) -> Result<Expansion> {
        if path.is_empty() {
            return Ok(Expansion::Collapsed);
        }

        let Some(owner) = self.owner_of(path).await else {
            error!(root = %self.root, path, "Ignoring expansion of an entry that is not loaded");
            return Ok(Expansion::Stale);
        };

        let epoch = self.epoch.load(Ordering::SeqCst);
        let outcome = owner.toggle(path).await?;
        if outcome != Expansion::Loaded || !owner.is_mounted() {
            return Ok(outcome);
        }

        if self.level(path).await.is_some() {
            return Ok(outcome);
        }

        let session = self.mount_level(path).await?;
        let mut levels = self.levels.write().await;
        if self.collapsed_since(path, epoch) {
            drop(levels);
            debug!(root = %self.root, path, "Folder collapsed while expanding, dropping its level");
            session.unmount().await;
            return Ok(Expansion::Collapsed);
        }

        let previous = levels.insert(
            path.to_string(),
            MountedLevel {
                session,
                parent: Some(owner.path().to_string()),
            },
        );
        drop(levels);
        if let Some(previous) = previous {
            previous.session.unmount().await;
        }

        Ok(outcome)
    }

    /// Collapse the folder at `path`, unmounting its level and every level below it
    pub async fn collapse(&self, path: &str) -> Result<()> {
        if let Some(owner) = self.owner_of(path).await {
            owner.toggle("").await?;
        }

        if path == self.root {
            return Ok(());
        }

        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        self.collapses().insert(path.to_string(), epoch);

        for session in self.detach_subtree(path).await {
            session.unmount().await;
        }
        Ok(())
    }

    /// Unmount levels whose folder disappeared from the parent's entries
    pub async fn prune(&self) {
        let candidates: Vec<(String, Arc<LevelSession>)> = {
            let levels = self.levels.read().await;
            levels
                .iter()
                .filter_map(|(path, level)| {
                    let parent = level.parent.as_ref()?;
                    let parent_session = levels.get(parent)?.session.clone();
                    Some((path.clone(), parent_session))
                })
                .collect()
        };

        for (path, parent) in candidates {
            if parent.contains(&path).await {
                continue;
            }
            debug!(root = %self.root, path = %path, "Folder vanished, unmounting its level");
            for session in self.detach_subtree(&path).await {
                session.unmount().await;
            }
        }
    }

    /// Display hierarchy of the whole explorer
    pub async fn project(&self) -> Vec<TreeItem> {
        self.prune().await;

        let sessions: Vec<(String, Arc<LevelSession>)> = {
            let levels = self.levels.read().await;
            levels
                .iter()
                .map(|(path, level)| (path.clone(), level.session.clone()))
                .collect()
        };

        let mut snapshots = HashMap::with_capacity(sessions.len());
        for (path, session) in sessions {
            snapshots.insert(path, session.entries().await);
        }

        render::project_level(&self.root, &snapshots)
    }

    pub async fn render(&self) -> String {
        render::render_text(&self.root, &self.project().await)
    }

    /// Unmount every level
    pub async fn close(&self) {
        let sessions: Vec<Arc<LevelSession>> = self
            .levels
            .write()
            .await
            .drain()
            .map(|(_, level)| level.session)
            .collect();

        for session in sessions {
            session.unmount().await;
        }
    }

    async fn mount_level(&self, path: &str) -> Result<Arc<LevelSession>> {
        let session = LevelSession::new(
            path,
            self.source.clone(),
            self.notifier.clone(),
            self.refresh_interval,
        );
        session.mount().await?;
        Ok(session)
    }

    async fn owner_of(&self, path: &str) -> Option<Arc<LevelSession>> {
        let sessions: Vec<Arc<LevelSession>> = self
            .levels
            .read()
            .await
            .values()
            .map(|level| level.session.clone())
            .collect();

        for session in sessions {
            if session.contains(path).await {
                return Some(session);
            }
        }
        None
    }

    /// Whether `path` or one of its ancestors was collapsed after `epoch`
    fn collapsed_since(&self, path: &str, epoch: u64) -> bool {
        self.collapses()
            .iter()
            .any(|(collapsed, at)| *at > epoch && Path::new(path).starts_with(collapsed))
    }

    fn collapses(&self) -> MutexGuard<'_, HashMap<String, u64>> {
        self.collapses.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn detach_subtree(&self, path: &str) -> Vec<Arc<LevelSession>> {
        let mut levels = self.levels.write().await;
        let mut detached = Vec::new();
        let mut pending = vec![path.to_string()];

        while let Some(current) = pending.pop() {
            if let Some(level) = levels.remove(&current) {
                detached.push(level.session);
            }
            pending.extend(
                levels
                    .iter()
                    .filter(|(_, level)| level.parent.as_deref() == Some(current.as_str()))
                    .map(|(child, _)| child.clone()),
            );
        }

        detached
    }
}

/// Every explorer of the page, one per root path
pub struct Workspace {
    explorers: Vec<PathExplorer>,
}

impl Workspace {
    /// Ask the source for its root paths and open an explorer for each
    pub async fn open(
        source: Arc<dyn EntrySource>,
        notifier: Arc<dyn Notifier>,
        refresh_interval: Duration,
    ) -> Result<Self> {
        let roots = source.root_paths().await?;
        debug!(?roots, "Source path(s)");

        let mut explorers = Vec::with_capacity(roots.len());
        for root in roots {
            explorers.push(
                PathExplorer::open(root, source.clone(), notifier.clone(), refresh_interval)
                    .await?,
            );
        }

        Ok(Self { explorers })
    }

    pub fn explorers(&self) -> &[PathExplorer] {
        &self.explorers
    }

    pub fn explorer(&self, root: &str) -> Option<&PathExplorer> {
        self.explorers.iter().find(|explorer| explorer.root() == root)
    }

    /// Expand `path` in whichever explorer has it loaded
    pub async fn expand(&self, path: &str) -> Result<Expansion> {
        if path.is_empty() {
            return Ok(Expansion::Collapsed);
        }

        for explorer in &self.explorers {
            if explorer.owns(path).await {
                return explorer.expand(path).await;
            }
        }

        error!(path, "No explorer has this entry loaded");
        Ok(Expansion::Stale)
    }

    pub async fn collapse(&self, path: &str) -> Result<()> {
        for explorer in &self.explorers {
            if explorer.level(path).await.is_some() {
                return explorer.collapse(path).await;
            }
        }
        Ok(())
    }

    pub async fn render(&self) -> String {
        if self.explorers.is_empty() {
            return format!("{}\n", NO_PATHS_MESSAGE);
        }

        let mut out = String::new();
        for explorer in &self.explorers {
            out.push_str(&explorer.render().await);
        }
        out
    }

    pub async fn close(&self) {
        for explorer in &self.explorers {
            explorer.close().await;
        }
    }
}
