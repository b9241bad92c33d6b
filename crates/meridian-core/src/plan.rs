//! Resolved plan model.
//!
//! A [`Plan`] is the concrete cluster specification for one instance, produced
//! by rendering a plan template and decoding the resulting YAML. Field names
//! follow the remote provisioning API (camelCase) so templates can be written
//! against the same vocabulary operators already use.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Settings key that overrides the role granted by `AddUserToProject`.
pub const OVERRIDE_USER_ROLE_SETTING: &str = "overrideAtlasUserRole";

const REDACTED: &str = "********";

/// Fully rendered specification for one instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    /// Plan name advertised in the catalog.
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,

    #[serde(default, deserialize_with = "nullable")]
    pub description: String,

    /// Whether the plan is free of charge.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub free: Option<bool>,

    /// Owning project. An empty `id` means the project is created on provision.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<Project>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<Cluster>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub database_users: Vec<DatabaseUser>,

    /// Network allow-list entries for the project.
    #[serde(
        default,
        alias = "ipWhitelists",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub ip_access_list: Vec<IpAccessEntry>,

    /// Free-form per-deployment overrides.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub settings: BTreeMap<String, String>,
}

impl Plan {
    /// Project id, or an empty string when no project is known yet.
    pub fn project_id(&self) -> &str {
        self.project.as_ref().map(|p| p.id.as_str()).unwrap_or("")
    }

    /// Organization owning the project, or an empty string.
    pub fn org_id(&self) -> &str {
        self.project.as_ref().map(|p| p.org_id.as_str()).unwrap_or("")
    }

    /// Cluster name, or an empty string when the plan has no cluster.
    pub fn cluster_name(&self) -> &str {
        self.cluster.as_ref().map(|c| c.name.as_str()).unwrap_or("")
    }

    /// Instance size advertised by the plan, if any.
    pub fn instance_size(&self) -> Option<&str> {
        self.cluster
            .as_ref()
            .and_then(|c| c.provider_settings.as_ref())
            .map(|p| p.instance_size_name.as_str())
            .filter(|s| !s.is_empty())
    }

    /// Look up a free-form setting.
    pub fn setting(&self, key: &str) -> Option<&str> {
        self.settings
            .get(key)
            .map(String::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Copy of the plan that is safe to log: user passwords are masked.
    pub fn redacted(&self) -> Plan {
        let mut copy = self.clone();
        for user in &mut copy.database_users {
            if !user.password.is_empty() {
                user.password = REDACTED.to_string();
            }
        }
        copy
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(&self.redacted()) {
            Ok(json) => f.write_str(&json),
            Err(_) => write!(f, "Plan({})", self.name),
        }
    }
}

/// Project (group) that owns clusters, users and the access list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "String::is_empty"
    )]
    pub id: String,
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub org_id: String,
}

/// Cluster definition as understood by the remote API.
///
/// Keys the broker does not model explicitly are kept in `extra` and passed
/// through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cluster {
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "String::is_empty"
    )]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_type: Option<String>,

    #[serde(
        default,
        rename = "mongoDBMajorVersion",
        skip_serializing_if = "Option::is_none"
    )]
    pub major_version: Option<String>,

    #[serde(
        default,
        rename = "diskSizeGB",
        skip_serializing_if = "Option::is_none"
    )]
    pub disk_size_gb: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_shards: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replication_factor: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paused: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_settings: Option<ProviderSettings>,

    /// Lifecycle state reported by the remote API.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_name: Option<String>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Cluster {
    /// Minimal update request that only toggles the paused flag.
    pub fn pause_request(paused: bool) -> Self {
        Self {
            paused: Some(paused),
            ..Default::default()
        }
    }

    /// Parsed lifecycle state.
    pub fn state(&self) -> ClusterState {
        ClusterState::parse(self.state_name.as_deref().unwrap_or(""))
    }
}

/// Cloud provider placement of a cluster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSettings {
    #[serde(default, deserialize_with = "nullable")]
    pub provider_name: String,

    /// Underlying provider for shared-tier (`TENANT`) clusters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backing_provider_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region_name: Option<String>,

    #[serde(default, deserialize_with = "nullable")]
    pub instance_size_name: String,
}

/// Remote cluster lifecycle states the broker reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterState {
    Idle,
    Creating,
    Updating,
    Repairing,
    Deleting,
    Deleted,
    /// Any state name the broker has no rule for.
    Other(String),
}

impl ClusterState {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "IDLE" => Self::Idle,
            "CREATING" => Self::Creating,
            "UPDATING" => Self::Updating,
            "REPAIRING" => Self::Repairing,
            "DELETING" => Self::Deleting,
            "DELETED" => Self::Deleted,
            other => Self::Other(other.to_string()),
        }
    }

    /// Raw state name as reported by the remote API.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Idle => "IDLE",
            Self::Creating => "CREATING",
            Self::Updating => "UPDATING",
            Self::Repairing => "REPAIRING",
            Self::Deleting => "DELETING",
            Self::Deleted => "DELETED",
            Self::Other(raw) => raw,
        }
    }
}

impl fmt::Display for ClusterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Database user created alongside a new project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseUser {
    pub username: String,

    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "String::is_empty"
    )]
    pub password: String,

    /// Authentication database.
    #[serde(default = "default_auth_database")]
    pub database_name: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<DatabaseRole>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseRole {
    pub role_name: String,
    pub database_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_name: Option<String>,
}

/// Network allow-list entry. Exactly one of `cidr_block` / `ip_address` is
/// expected to be set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpAccessEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cidr_block: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Treat an explicit YAML null (e.g. a template placeholder that rendered
/// empty) like a missing value.
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn default_auth_database() -> String {
    "admin".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAN_YAML: &str = r#"
name: basic
description: Basic M10 cluster
project:
  name: team-a
  orgId: org-1
cluster:
  name: inst-1
  diskSizeGB: 10
  mongoDBMajorVersion: "6.0"
  providerSettings:
    providerName: AWS
    regionName: EU_WEST_1
    instanceSizeName: M10
  biConnector:
    enabled: false
databaseUsers:
  - username: app
    password: s3cret
    roles:
      - roleName: readWrite
        databaseName: app
ipWhitelists:
  - cidrBlock: 10.0.0.0/8
    comment: internal
settings:
  overrideAtlasUserRole: GROUP_OWNER
"#;

    #[test]
    fn test_decode_plan_yaml() {
        let plan: Plan = serde_yaml::from_str(PLAN_YAML).unwrap();

        assert_eq!(plan.name, "basic");
        assert_eq!(plan.org_id(), "org-1");
        assert_eq!(plan.project_id(), "");
        assert_eq!(plan.cluster_name(), "inst-1");
        assert_eq!(plan.instance_size(), Some("M10"));
        assert_eq!(plan.database_users[0].database_name, "admin");
        assert_eq!(plan.ip_access_list.len(), 1);
        assert_eq!(
            plan.setting(OVERRIDE_USER_ROLE_SETTING),
            Some("GROUP_OWNER")
        );

        let cluster = plan.cluster.unwrap();
        assert_eq!(cluster.disk_size_gb, Some(10.0));
        assert_eq!(cluster.major_version.as_deref(), Some("6.0"));
        assert!(cluster.extra.contains_key("biConnector"));
    }

    #[test]
    fn test_empty_placeholders_decode_as_empty_strings() {
        let plan: Plan = serde_yaml::from_str(
            "name: basic\nproject:\n  id:\n  orgId: org-1\ncluster:\n  name:\n",
        )
        .unwrap();
        assert_eq!(plan.project_id(), "");
        assert_eq!(plan.cluster_name(), "");
    }

    #[test]
    fn test_redacted_masks_passwords() {
        let plan: Plan = serde_yaml::from_str(PLAN_YAML).unwrap();
        let safe = plan.redacted();

        assert_eq!(safe.database_users[0].password, REDACTED);
        assert_eq!(plan.database_users[0].password, "s3cret");
        assert!(!plan.to_string().contains("s3cret"));
    }

    #[test]
    fn test_pause_request_serializes_only_paused() {
        let json = serde_json::to_value(Cluster::pause_request(true)).unwrap();
        assert_eq!(json, serde_json::json!({ "paused": true }));
    }

    #[test]
    fn test_cluster_state_parsing() {
        assert_eq!(ClusterState::parse("IDLE"), ClusterState::Idle);
        assert_eq!(ClusterState::parse("DELETED"), ClusterState::Deleted);
        assert_eq!(
            ClusterState::parse("MAINTENANCE"),
            ClusterState::Other("MAINTENANCE".to_string())
        );
        assert_eq!(ClusterState::parse("MAINTENANCE").as_str(), "MAINTENANCE");
    }
}
