//! Configuration types for the Meridian broker.
//!
//! Configuration is loaded from a single YAML file (`meridian.yaml` by
//! default). Relative paths inside it (template directory, credentials file,
//! file store directory) are resolved against the directory containing the
//! file when loaded through [`BrokerConfig::load_with_context`].
//!
//! # Sections
//!
//! - **service**: catalog metadata for the advertised service
//! - **templates**: where plan templates come from
//! - **credentials**: organizations the broker manages, one store partition each
//! - **store**: instance store backend
//! - **dashboard**: base URL used for management links
//! - **logging**: default log filter

pub mod credentials;
pub mod service;
pub mod store;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub use credentials::{CredentialsConfig, OrgCredentials};
pub use service::ServiceConfig;
pub use store::{StoreBackend, StoreConfig};

/// Complete broker configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Advertised service metadata.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Plan template sources.
    #[serde(default)]
    pub templates: TemplatesConfig,

    /// Organization credentials.
    #[serde(default)]
    pub credentials: CredentialsConfig,

    /// Instance store backend.
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub dashboard: DashboardConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where plan templates are loaded from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplatesConfig {
    /// Directory scanned for `*.yaml`, `*.yml`, `*.tpl` and `*.j2` templates.
    #[serde(default)]
    pub directory: Option<PathBuf>,

    /// Inline templates keyed by template name.
    #[serde(default)]
    pub inline: BTreeMap<String, String>,
}

/// Management console settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    #[serde(default = "default_dashboard_url")]
    pub base_url: String,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            base_url: default_dashboard_url(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default `tracing` filter directive. `RUST_LOG` takes precedence.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

fn default_dashboard_url() -> String {
    "https://cloud.mongodb.com".to_string()
}

fn default_log_filter() -> String {
    "info".to_string()
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl BrokerConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML content.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(ConfigError::from)
    }

    /// Load configuration and resolve all external references.
    ///
    /// This resolves relative paths against the config file's directory and
    /// merges organizations from `credentials.file` when specified.
    pub fn load_with_context(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut config = Self::from_file(path)?;

        let base_dir = path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        if let Some(dir) = &config.templates.directory {
            config.templates.directory = Some(resolve_path(&base_dir, dir));
        }

        if let Some(dir) = &config.store.directory {
            config.store.directory = Some(resolve_path(&base_dir, dir));
        }

        if let Some(file) = config.credentials.file.clone() {
            let file = resolve_path(&base_dir, &file);
            let external = CredentialsConfig::from_file(&file)?;
            config.credentials.merge(external);
        }

        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.store.backend {
            StoreBackend::File if self.store.directory.is_none() => Err(ConfigError::Config(
                "store.directory is required for the file backend".to_string(),
            )),
            StoreBackend::Postgres if self.store.database_url().is_none() => {
                Err(ConfigError::Config(
                    "store.database_url (or store.database_url_env) is required for the postgres backend"
                        .to_string(),
                ))
            }
            _ => Ok(()),
        }
    }
}

fn resolve_path(base_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}
