//! CLI command implementations.

pub mod catalog;
pub mod instance;
pub mod render;
pub mod smoke;

use anyhow::{Context, Result};
use meridian_core::BrokerConfig;
use meridian_plans::{PlanResolver, TemplateRegistry, injected_values};
use std::path::Path;

/// Load the configuration file, resolving relative paths against it.
pub fn load_config(path: &Path) -> Result<BrokerConfig> {
    BrokerConfig::load_with_context(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))
}

/// Like [`load_config`], but a missing file yields the defaults.
pub fn load_config_or_default(path: &Path) -> Result<BrokerConfig> {
    if path.exists() {
        load_config(path)
    } else {
        Ok(BrokerConfig::default())
    }
}

/// Build the plan resolver from the configured templates and credentials.
pub fn build_resolver(config: &BrokerConfig) -> Result<PlanResolver> {
    let registry =
        TemplateRegistry::from_config(&config.templates).context("Failed to load plan templates")?;
    tracing::info!(templates = registry.len(), "Loaded plan templates");
    Ok(PlanResolver::new(
        registry,
        injected_values(&config.credentials),
    ))
}
