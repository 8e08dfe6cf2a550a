pub mod config;
pub mod error;
pub mod explorer;
pub mod http;
pub mod local;
pub mod notice;
pub mod render;
pub mod roots;
pub mod scheduler;
pub mod server;
pub mod session;
pub mod source;
pub mod store;
pub mod types;

#[cfg(test)]
mod testing;

pub use config::ExplorerConfig;
pub use error::{ExplorerError, Result};
pub use explorer::{PathExplorer, Workspace, NO_PATHS_MESSAGE};
pub use http::HttpEntrySource;
pub use local::{list_directory, sort_entries, LocalEntrySource};
pub use notice::{ConsoleNotifier, Notifier};
pub use render::TreeItem;
pub use roots::root_paths_from_args;
pub use scheduler::{RefreshScheduler, Refreshable};
pub use server::ExplorerServer;
pub use session::{fetch_children, Expansion, LevelSession, Refresh};
pub use source::EntrySource;
pub use store::TreeStore;
pub use types::{PathEntriesResponse, PathEntry, PathsResponse};
