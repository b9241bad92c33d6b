//! Organization credentials.
//!
//! Every configured organization is a partition of the instance store. The
//! whole section is also injected into plan template contexts under the
//! `credentials` key so templates can pick keys per organization.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::ConfigError;

/// Credentials section of the broker configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CredentialsConfig {
    /// Optional external YAML file with additional organizations.
    #[serde(default, skip_serializing)]
    pub file: Option<PathBuf>,

    /// API keys per organization id.
    #[serde(default)]
    pub orgs: BTreeMap<String, OrgCredentials>,
}

/// API key pair for one organization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgCredentials {
    pub public_key: String,
    pub private_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl CredentialsConfig {
    /// Load a standalone credentials file (same shape as the section).
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        serde_yaml::from_str(&content).map_err(ConfigError::from)
    }

    /// Merge organizations from another source. Existing entries win.
    pub fn merge(&mut self, other: CredentialsConfig) {
        for (org_id, creds) in other.orgs {
            self.orgs.entry(org_id).or_insert(creds);
        }
    }

    /// Organization ids in their fixed (sorted) enumeration order.
    pub fn org_ids(&self) -> impl Iterator<Item = &str> {
        self.orgs.keys().map(String::as_str)
    }

    pub fn contains_org(&self, org_id: &str) -> bool {
        self.orgs.contains_key(org_id)
    }

    /// Value injected into template contexts under `credentials`.
    pub fn to_context_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds(key: &str) -> OrgCredentials {
        OrgCredentials {
            public_key: key.to_string(),
            private_key: format!("{}-private", key),
            display_name: None,
        }
    }

    #[test]
    fn test_merge_keeps_existing_entries() {
        let mut base = CredentialsConfig::default();
        base.orgs.insert("org-a".to_string(), creds("a"));

        let mut other = CredentialsConfig::default();
        other.orgs.insert("org-a".to_string(), creds("other"));
        other.orgs.insert("org-b".to_string(), creds("b"));

        base.merge(other);

        assert_eq!(base.orgs["org-a"].public_key, "a");
        assert!(base.contains_org("org-b"));
    }

    #[test]
    fn test_context_value_shape() {
        let mut config = CredentialsConfig::default();
        config.orgs.insert("org-a".to_string(), creds("a"));

        let value = config.to_context_value();
        assert_eq!(value["orgs"]["org-a"]["public_key"], "a");
        assert!(value.get("file").is_none());
    }
}
