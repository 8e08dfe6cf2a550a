use serde::{Deserialize, Serialize};

/// Path prefix for placeholder children. No absolute file-system path starts
/// with `/:/`, so placeholder paths never collide with real entries.
pub const PLACEHOLDER_PREFIX: &str = "/:/placeholder/-";

/// One file-system object as known to the tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathEntry {
    /// Leaf component of the path
    pub name: String,
    /// Absolute path, unique within the parent's child list
    pub path: String,
    #[serde(default)]
    pub is_folder: bool,
    /// `None` means "not loaded yet". Never sent on the wire.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<PathEntry>>,
}

impl PathEntry {
    pub fn folder(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            is_folder: true,
            children: None,
        }
    }

    pub fn file(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            is_folder: false,
            children: None,
        }
    }

    /// Synthetic child that marks `parent_path` as expandable
    pub fn placeholder(parent_path: &str) -> Self {
        Self {
            name: String::new(),
            path: format!("{}{}", PLACEHOLDER_PREFIX, parent_path),
            is_folder: false,
            children: None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.name.is_empty() && self.path.starts_with(PLACEHOLDER_PREFIX)
    }

    /// Attach the placeholder child to an unexpanded folder
    pub fn with_placeholder(mut self) -> Self {
        if self.is_folder {
            self.children = Some(vec![PathEntry::placeholder(&self.path)]);
        }
        self
    }
}

/// Body of `GET /paths`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathsResponse {
    #[serde(default)]
    pub paths: Vec<String>,
}

/// Body of `GET /path-entries`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathEntriesResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entries: Option<Vec<PathEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PathEntriesResponse {
    pub fn entries(entries: Vec<PathEntry>) -> Self {
        Self {
            entries: Some(entries),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            entries: None,
            error: Some(message.into()),
        }
    }
}
