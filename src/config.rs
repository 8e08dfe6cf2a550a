use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use crate::error::{ExplorerError, Result};

pub const DEFAULT_REFRESH_INTERVAL_MS: u64 = 2000;
pub const DEFAULT_BIND: &str = "127.0.0.1:3000";

/// Runtime settings, read from a TOML file and overridden from the command line
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExplorerConfig {
    /// Period of the per-level auto-refresh
    #[serde(default = "default_refresh_interval_ms")]
    pub refresh_interval_ms: u64,
    /// Listen address for `serve`
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Base URL of a running server for `browse`; browses in-process when unset
    #[serde(default)]
    pub url: Option<String>,
}

fn default_refresh_interval_ms() -> u64 {
    DEFAULT_REFRESH_INTERVAL_MS
}

fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            refresh_interval_ms: DEFAULT_REFRESH_INTERVAL_MS,
            bind: default_bind(),
            url: None,
        }
    }
}

impl ExplorerConfig {
    /// Load and validate a TOML config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ExplorerError::InvalidConfig {
            message: format!("Failed to read config file {}: {}", path.display(), e),
        })?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: ExplorerConfig =
            toml::from_str(content).map_err(|e| ExplorerError::InvalidConfig {
                message: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.refresh_interval_ms == 0 {
            return Err(ExplorerError::InvalidConfig {
                message: "refresh_interval_ms must be greater than zero".to_string(),
            });
        }

        self.bind_addr()?;

        if let Some(url) = &self.url {
            url::Url::parse(url).map_err(|e| ExplorerError::InvalidConfig {
                message: format!("Invalid url {:?}: {}", url, e),
            })?;
        }

        Ok(())
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.bind.parse().map_err(|e| ExplorerError::InvalidConfig {
            message: format!("Invalid bind address {:?}: {}", self.bind, e),
        })
    }
}
