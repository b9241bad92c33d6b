//! Catalog metadata for the advertised service.

use serde::{Deserialize, Serialize};

/// Metadata of the single service offered by the broker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_name")]
    pub name: String,

    #[serde(default = "default_description")]
    pub description: String,

    #[serde(default = "default_display_name")]
    pub display_name: String,

    #[serde(default = "default_image_url")]
    pub image_url: String,

    #[serde(default = "default_documentation_url")]
    pub documentation_url: String,

    #[serde(default = "default_provider_display_name")]
    pub provider_display_name: String,

    #[serde(default)]
    pub long_description: Option<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            description: default_description(),
            display_name: default_display_name(),
            image_url: default_image_url(),
            documentation_url: default_documentation_url(),
            provider_display_name: default_provider_display_name(),
            long_description: None,
        }
    }
}

fn default_name() -> String {
    "atlas".to_string()
}

fn default_description() -> String {
    "MongoDB Atlas Plan Template Deployments".to_string()
}

fn default_display_name() -> String {
    "MongoDB Atlas - Template Services".to_string()
}

fn default_image_url() -> String {
    "https://webassets.mongodb.com/_com_assets/cms/vectors-anchor-circle-mydmar539a.svg"
        .to_string()
}

fn default_documentation_url() -> String {
    "https://support.mongodb.com/welcome".to_string()
}

fn default_provider_display_name() -> String {
    "MongoDB".to_string()
}
