//! Instance store configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Instance store backend type.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process memory; records are lost on restart.
    #[default]
    Memory,
    /// JSON Lines files, one per organization.
    File,
    /// Postgres table.
    Postgres,
}

/// Configuration for the instance store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// Directory holding the per-organization files (file backend).
    #[serde(default)]
    pub directory: Option<PathBuf>,

    /// Connection string (postgres backend).
    #[serde(default)]
    pub database_url: Option<String>,

    /// Environment variable holding the connection string. Takes precedence
    /// over `database_url` when set.
    #[serde(default)]
    pub database_url_env: Option<String>,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            directory: None,
            database_url: None,
            database_url_env: None,
            max_connections: default_max_connections(),
        }
    }
}

impl StoreConfig {
    /// Resolve the Postgres connection string.
    pub fn database_url(&self) -> Option<String> {
        if let Some(var) = &self.database_url_env {
            if let Ok(url) = std::env::var(var) {
                return Some(url);
            }
        }
        self.database_url.clone()
    }
}

fn default_max_connections() -> u32 {
    5
}
