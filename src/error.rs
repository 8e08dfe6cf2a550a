use thiserror::Error;

/// Errors that can occur while exploring paths
#[derive(Error, Debug)]
pub enum ExplorerError {
    /// The lister reported the path as absent. `message` is shown to the user as-is.
    #[error("{message}")]
    NotFound { message: String },

    #[error("Entry is not part of the current level: {path}")]
    StaleReference { path: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Unexpected response (status {status}): {message}")]
    UnexpectedResponse { status: u16, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Server error: {message}")]
    Server { message: String },

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl ExplorerError {
    /// Errors a level handles on its own instead of propagating
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ExplorerError::NotFound { .. } | ExplorerError::StaleReference { .. }
        )
    }
}

/// Result type alias for explorer operations
pub type Result<T> = std::result::Result<T, ExplorerError>;
