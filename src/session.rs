use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::{
    error::{ExplorerError, Result},
    notice::Notifier,
    scheduler::{RefreshScheduler, Refreshable},
    source::EntrySource,
    store::TreeStore,
    types::PathEntry,
};

/// What a toggle event ended up doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expansion {
    /// Empty node id: the node was closed, nothing was fetched
    Collapsed,
    /// The node is not part of this level anymore
    Stale,
    /// Children were fetched and attached
    Loaded,
    /// The folder vanished; the user was notified
    NotFound,
    /// The level unmounted while the fetch was in flight
    Discarded,
}

/// What a level (re)load ended up doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refresh {
    Replaced,
    NotFound,
    Discarded,
}

/// Fetch the children of `path` and mark every folder among them as expandable
pub async fn fetch_children(source: &dyn EntrySource, path: &str) -> Result<Vec<PathEntry>> {
    let entries = source.list_entries(path).await?;
    Ok(entries.into_iter().map(PathEntry::with_placeholder).collect())
}

/// One mounted directory level: its entries, its mount guard and its refresh timer
///
/// Results of fetches that resolve after [`LevelSession::unmount`] are dropped
/// without touching the store.
pub struct LevelSession {
    path: String,
    source: Arc<dyn EntrySource>,
    notifier: Arc<dyn Notifier>,
    store: RwLock<TreeStore>,
    mounted: AtomicBool,
    settled: AtomicBool,
    scheduler: RefreshScheduler,
}

impl LevelSession {
    pub fn new(
        path: impl Into<String>,
        source: Arc<dyn EntrySource>,
        notifier: Arc<dyn Notifier>,
        refresh_interval: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            path: path.into(),
            source,
            notifier,
            store: RwLock::new(TreeStore::new()),
            mounted: AtomicBool::new(false),
            settled: AtomicBool::new(false),
            scheduler: RefreshScheduler::new(refresh_interval),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }

    /// Whether the initial load finished, whatever its outcome
    pub fn has_settled(&self) -> bool {
        self.settled.load(Ordering::SeqCst)
    }

    pub fn is_refreshing(&self) -> bool {
        self.scheduler.is_running()
    }

    pub async fn entries(&self) -> Arc<Vec<PathEntry>> {
        self.store.read().await.snapshot()
    }

    pub async fn revision(&self) -> u64 {
        self.store.read().await.revision()
    }

    pub async fn contains(&self, path: &str) -> bool {
        self.store.read().await.contains(path)
    }

    /// Start the refresh timer and run the initial load
    pub async fn mount(self: &Arc<Self>) -> Result<Refresh> {
        info!(level = %self.path, "Mounting level");
        self.mounted.store(true, Ordering::SeqCst);
        self.scheduler.start(Arc::downgrade(self));
        let outcome = self.refresh().await;
        self.settled.store(true, Ordering::SeqCst);
        outcome
    }

    /// Stop the timer and discard anything still in flight
    pub async fn unmount(&self) {
        info!(level = %self.path, "Unmounting level");
        self.scheduler.stop();
        // Taken under the write lock so no fetch result lands after the flag flips
        let _store = self.store.write().await;
        self.mounted.store(false, Ordering::SeqCst);
    }

    /// Re-fetch this level and replace its entries
    pub async fn refresh(&self) -> Result<Refresh> {
        let entries = match fetch_children(self.source.as_ref(), &self.path).await {
            Ok(entries) => entries,
            Err(e) => {
                return self
                    .recover(e)
                    .map(|notified| if notified { Refresh::NotFound } else { Refresh::Discarded });
            }
        };

        let mut store = self.store.write().await;
        if !self.is_mounted() {
            debug!(level = %self.path, "Dropping listing for unmounted level");
            return Ok(Refresh::Discarded);
        }

        store.replace(entries);
        Ok(Refresh::Replaced)
    }

    /// Handle a node toggle; an empty `node_id` means the node was collapsed
    pub async fn toggle(&self, node_id: &str) -> Result<Expansion> {
        if node_id.is_empty() {
            return Ok(Expansion::Collapsed);
        }

        let located = self
            .store
            .read()
            .await
            .locate(node_id)
            .map(|entry| entry.path.clone());
        let target = match located {
            Ok(path) => path,
            Err(e) => {
                error!(level = %self.path, error = %e, "Ignoring toggle");
                return Ok(Expansion::Stale);
            }
        };

        let children = match fetch_children(self.source.as_ref(), &target).await {
            Ok(children) => children,
            Err(e) => {
                return self
                    .recover(e)
                    .map(|notified| if notified { Expansion::NotFound } else { Expansion::Discarded });
            }
        };

        let mut store = self.store.write().await;
        if !self.is_mounted() {
            debug!(level = %self.path, path = %target, "Dropping children for unmounted level");
            return Ok(Expansion::Discarded);
        }

        if store.update_children_of(&target, children) {
            Ok(Expansion::Loaded)
        } else {
            Ok(Expansion::Stale)
        }
    }

    /// Turn a NotFound into a user notice. Returns whether the user was notified.
    fn recover(&self, error: ExplorerError) -> Result<bool> {
        match error {
            ExplorerError::NotFound { message } => {
                if !self.is_mounted() {
                    return Ok(false);
                }
                warn!(level = %self.path, %message, "Path not found");
                self.notifier.notify(&message);
                Ok(true)
            }
            other => Err(other),
        }
    }
}

#[async_trait]
impl Refreshable for LevelSession {
    fn is_mounted(&self) -> bool {
        LevelSession::is_mounted(self)
    }

    fn has_settled(&self) -> bool {
        LevelSession::has_settled(self)
    }

    async fn tick(&self) -> Result<()> {
        self.refresh().await.map(|_| ())
    }

    fn label(&self) -> String {
        self.path.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingNotifier, ScriptedSource};

    const PERIOD: Duration = Duration::from_millis(2000);

    fn source_with_a() -> Arc<ScriptedSource> {
        let source = Arc::new(ScriptedSource::new());
        source.set_entries(
            "/a",
            vec![
                PathEntry::folder("sub", "/a/sub"),
                PathEntry::file("f.txt", "/a/f.txt"),
            ],
        );
        source.set_entries(
            "/a/sub",
            vec![
                PathEntry::folder("deeper", "/a/sub/deeper"),
                PathEntry::file("inner.txt", "/a/sub/inner.txt"),
            ],
        );
        source
    }

    fn session(
        source: &Arc<ScriptedSource>,
        notifier: &Arc<RecordingNotifier>,
    ) -> Arc<LevelSession> {
        LevelSession::new(
            "/a",
            source.clone() as Arc<dyn EntrySource>,
            notifier.clone() as Arc<dyn Notifier>,
            PERIOD,
        )
    }

    #[tokio::test]
    async fn test_mount_loads_level_with_placeholders() {
        let source = source_with_a();
        let notifier = Arc::new(RecordingNotifier::default());
        let session = session(&source, &notifier);

        assert_eq!(session.mount().await.unwrap(), Refresh::Replaced);
        assert!(session.has_settled());
        assert!(session.is_refreshing());

        let entries = session.entries().await;
        assert_eq!(entries.len(), 2);

        let placeholders = entries[0].children.as_ref().unwrap();
        assert_eq!(placeholders.len(), 1);
        assert!(placeholders[0].is_placeholder());
        assert!(entries[1].children.is_none());

        session.unmount().await;
    }

    #[tokio::test]
    async fn test_toggle_attaches_children() {
        let source = source_with_a();
        let notifier = Arc::new(RecordingNotifier::default());
        let session = session(&source, &notifier);
        session.mount().await.unwrap();

        assert_eq!(session.toggle("/a/sub").await.unwrap(), Expansion::Loaded);

        let entries = session.entries().await;
        let children = entries[0].children.as_ref().unwrap();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].name, "deeper");
        assert!(children[0].children.as_ref().unwrap()[0].is_placeholder());
        assert_eq!(children[1].name, "inner.txt");
        assert!(notifier.messages().is_empty());

        session.unmount().await;
    }

    #[tokio::test]
    async fn test_collapse_never_fetches() {
        let source = source_with_a();
        let notifier = Arc::new(RecordingNotifier::default());
        let session = session(&source, &notifier);
        session.mount().await.unwrap();
        let requests = source.request_count();

        assert_eq!(session.toggle("").await.unwrap(), Expansion::Collapsed);
        assert_eq!(source.request_count(), requests);

        session.unmount().await;
    }

    #[tokio::test]
    async fn test_stale_toggle_is_silent_noop() {
        let source = source_with_a();
        let notifier = Arc::new(RecordingNotifier::default());
        let session = session(&source, &notifier);
        session.mount().await.unwrap();
        let revision = session.revision().await;
        let requests = source.request_count();

        assert_eq!(session.toggle("/a/removed").await.unwrap(), Expansion::Stale);
        assert_eq!(session.revision().await, revision);
        assert_eq!(source.request_count(), requests);
        assert!(notifier.messages().is_empty());

        session.unmount().await;
    }

    #[tokio::test]
    async fn test_not_found_on_expand_keeps_store() {
        let source = source_with_a();
        let notifier = Arc::new(RecordingNotifier::default());
        let session = session(&source, &notifier);
        session.mount().await.unwrap();
        let before = session.entries().await;

        source.set_missing("/a/sub", "The requested path (/a/sub) doesn't exist.");
        assert_eq!(session.toggle("/a/sub").await.unwrap(), Expansion::NotFound);

        assert_eq!(
            notifier.messages(),
            vec!["The requested path (/a/sub) doesn't exist."]
        );
        assert!(Arc::ptr_eq(&before, &session.entries().await));

        session.unmount().await;
    }

    #[tokio::test]
    async fn test_not_found_on_refresh_keeps_store() {
        let source = source_with_a();
        let notifier = Arc::new(RecordingNotifier::default());
        let session = session(&source, &notifier);
        session.mount().await.unwrap();
        let before = session.entries().await;

        source.set_missing("/a", "The requested path (/a) doesn't exist.");
        assert_eq!(session.refresh().await.unwrap(), Refresh::NotFound);

        assert_eq!(notifier.messages(), vec!["The requested path (/a) doesn't exist."]);
        assert_eq!(*session.entries().await, *before);

        session.unmount().await;
    }

    #[tokio::test]
    async fn test_unexpected_errors_propagate() {
        let source = source_with_a();
        let notifier = Arc::new(RecordingNotifier::default());
        let session = session(&source, &notifier);
        session.mount().await.unwrap();

        source.set_broken("/a/sub");
        let err = session.toggle("/a/sub").await.unwrap_err();
        assert!(matches!(err, ExplorerError::UnexpectedResponse { .. }));

        source.set_broken("/a");
        assert!(session.refresh().await.is_err());
        assert!(notifier.messages().is_empty());

        session.unmount().await;
    }

    #[tokio::test]
    async fn test_refresh_is_idempotent() {
        let source = source_with_a();
        let notifier = Arc::new(RecordingNotifier::default());
        let session = session(&source, &notifier);
        session.mount().await.unwrap();

        session.refresh().await.unwrap();
        let first = session.entries().await;
        session.refresh().await.unwrap();
        let second = session.entries().await;

        let shape = |entries: &[PathEntry]| {
            entries
                .iter()
                .map(|e| (e.path.clone(), e.is_folder))
                .collect::<Vec<_>>()
        };
        assert_eq!(shape(&first), shape(&second));

        session.unmount().await;
    }

    #[tokio::test]
    async fn test_expansion_after_unmount_is_discarded() {
        let source = source_with_a();
        let notifier = Arc::new(RecordingNotifier::default());
        let session = session(&source, &notifier);
        session.mount().await.unwrap();
        let revision = session.revision().await;
        let before = session.entries().await;

        let gate = source.gate("/a/sub");
        let expanding = tokio::spawn({
            let session = session.clone();
            async move { session.toggle("/a/sub").await }
        });
        gate.wait_started().await;

        session.unmount().await;
        gate.release();

        assert_eq!(expanding.await.unwrap().unwrap(), Expansion::Discarded);
        assert_eq!(session.revision().await, revision);
        assert!(Arc::ptr_eq(&before, &session.entries().await));
    }

    #[tokio::test]
    async fn test_refresh_after_unmount_is_discarded() {
        let source = source_with_a();
        let notifier = Arc::new(RecordingNotifier::default());
        let session = session(&source, &notifier);
        session.mount().await.unwrap();
        let revision = session.revision().await;

        let gate = source.gate("/a");
        let refreshing = tokio::spawn({
            let session = session.clone();
            async move { session.refresh().await }
        });
        gate.wait_started().await;

        session.unmount().await;
        source.set_missing("/a", "gone");
        gate.release();

        assert_eq!(refreshing.await.unwrap().unwrap(), Refresh::Discarded);
        assert_eq!(session.revision().await, revision);
        // No notice for a level nobody is looking at
        assert!(notifier.messages().is_empty());
    }

    #[tokio::test]
    async fn test_expansion_lands_on_refreshed_list() {
        let source = source_with_a();
        let notifier = Arc::new(RecordingNotifier::default());
        let session = session(&source, &notifier);
        session.mount().await.unwrap();

        let gate = source.gate("/a/sub");
        let expanding = tokio::spawn({
            let session = session.clone();
            async move { session.toggle("/a/sub").await }
        });
        gate.wait_started().await;

        // A refresh wins the race and swaps the whole list
        source.set_entries(
            "/a",
            vec![
                PathEntry::folder("sub", "/a/sub"),
                PathEntry::file("new.txt", "/a/new.txt"),
            ],
        );
        assert_eq!(session.refresh().await.unwrap(), Refresh::Replaced);

        gate.release();
        assert_eq!(expanding.await.unwrap().unwrap(), Expansion::Loaded);

        let entries = session.entries().await;
        assert_eq!(entries[1].name, "new.txt");
        assert_eq!(entries[0].children.as_ref().unwrap().len(), 2);

        session.unmount().await;
    }

    #[tokio::test]
    async fn test_expansion_of_entry_removed_by_refresh_is_stale() {
        let source = source_with_a();
        let notifier = Arc::new(RecordingNotifier::default());
        let session = session(&source, &notifier);
        session.mount().await.unwrap();

        let gate = source.gate("/a/sub");
        let expanding = tokio::spawn({
            let session = session.clone();
            async move { session.toggle("/a/sub").await }
        });
        gate.wait_started().await;

        source.set_entries("/a", vec![PathEntry::file("f.txt", "/a/f.txt")]);
        session.refresh().await.unwrap();
        let revision = session.revision().await;

        gate.release();
        assert_eq!(expanding.await.unwrap().unwrap(), Expansion::Stale);
        assert_eq!(session.revision().await, revision);

        session.unmount().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_refresh_until_unmount() {
        let source = source_with_a();
        let notifier = Arc::new(RecordingNotifier::default());
        let session = session(&source, &notifier);
        session.mount().await.unwrap();

        tokio::time::sleep(Duration::from_millis(4100)).await;
        assert_eq!(source.requests_for("/a"), 3);

        session.unmount().await;
        assert!(!session.is_refreshing());

        tokio::time::sleep(Duration::from_millis(10_000)).await;
        assert_eq!(source.requests_for("/a"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_refresh_survives_not_found() {
        let source = source_with_a();
        let notifier = Arc::new(RecordingNotifier::default());
        let session = session(&source, &notifier);
        session.mount().await.unwrap();

        source.set_missing("/a", "The requested path (/a) doesn't exist.");
        tokio::time::sleep(Duration::from_millis(4100)).await;

        assert_eq!(notifier.messages().len(), 2);
        assert!(session.is_refreshing());
        assert_eq!(session.entries().await.len(), 2);

        // Folder comes back: the next tick picks it up
        source.set_entries("/a", vec![PathEntry::file("back.txt", "/a/back.txt")]);
        tokio::time::sleep(Duration::from_millis(2000)).await;
        assert_eq!(session.entries().await[0].name, "back.txt");

        session.unmount().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_refresh_survives_unexpected_error() {
        let source = source_with_a();
        let notifier = Arc::new(RecordingNotifier::default());
        let session = session(&source, &notifier);
        session.mount().await.unwrap();

        source.set_broken("/a");
        tokio::time::sleep(Duration::from_millis(2100)).await;
        assert_eq!(source.requests_for("/a"), 2);
        assert!(session.is_refreshing());
        assert_eq!(session.entries().await[0].name, "sub");

        source.set_entries("/a", vec![PathEntry::file("back.txt", "/a/back.txt")]);
        tokio::time::sleep(Duration::from_millis(2000)).await;
        assert_eq!(source.requests_for("/a"), 3);
        assert_eq!(session.entries().await[0].name, "back.txt");
        assert!(notifier.messages().is_empty());

        session.unmount().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_level_missing_at_mount_is_polled_until_it_appears() {
        let source = source_with_a();
        source.set_missing("/a", "The requested path (/a) doesn't exist.");
        let notifier = Arc::new(RecordingNotifier::default());
        let session = session(&source, &notifier);

        assert_eq!(session.mount().await.unwrap(), Refresh::NotFound);
        assert!(session.has_settled());
        assert!(session.entries().await.is_empty());

        source.set_entries("/a", vec![PathEntry::file("late.txt", "/a/late.txt")]);
        tokio::time::sleep(Duration::from_millis(2100)).await;

        assert_eq!(source.requests_for("/a"), 2);
        assert_eq!(session.entries().await[0].name, "late.txt");
        assert_eq!(notifier.messages().len(), 1);

        session.unmount().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_refresh_waits_for_initial_load() {
        let source = source_with_a();
        let notifier = Arc::new(RecordingNotifier::default());
        let session = session(&source, &notifier);

        let gate = source.gate("/a");
        let mounting = tokio::spawn({
            let session = session.clone();
            async move { session.mount().await }
        });
        gate.wait_started().await;

        tokio::time::sleep(Duration::from_millis(5100)).await;
        assert_eq!(source.requests_for("/a"), 1);
        assert!(!session.has_settled());

        gate.open();
        assert_eq!(mounting.await.unwrap().unwrap(), Refresh::Replaced);

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(source.requests_for("/a"), 2);

        session.unmount().await;
    }

    #[tokio::test]
    async fn test_pending_expansion_leaves_store_alone() {
        let source = source_with_a();
        let notifier = Arc::new(RecordingNotifier::default());
        let session = session(&source, &notifier);
        session.mount().await.unwrap();
        let revision = session.revision().await;

        let gate = source.gate("/a/sub");
        let mut expanding = tokio_test::task::spawn(session.toggle("/a/sub"));
        tokio_test::assert_pending!(expanding.poll());
        assert_eq!(session.revision().await, revision);

        gate.release();
        assert!(expanding.is_woken());
        let outcome = tokio_test::assert_ready!(expanding.poll());
        assert_eq!(outcome.unwrap(), Expansion::Loaded);
        assert_eq!(session.revision().await, revision + 1);

        session.unmount().await;
    }
}
