//! # meridian-core
//!
//! Types shared by every Meridian crate: the resolved plan model, the request
//! context handed to plan templates, the stored instance record, operation
//! tokens and states, and the YAML configuration layer.

use serde::{Deserialize, Serialize};
use std::fmt;

pub mod config;
pub mod context;
pub mod plan;
pub mod snapshot;

pub use config::{
    BrokerConfig, ConfigError, CredentialsConfig, DashboardConfig, LoggingConfig,
    OrgCredentials, ServiceConfig, StoreBackend, StoreConfig, TemplatesConfig,
};
pub use context::{ContextError, RequestContext};
pub use plan::{
    Cluster, ClusterState, DatabaseRole, DatabaseUser, IpAccessEntry, Plan, Project,
    ProviderSettings,
};
pub use snapshot::{SnapshotError, decode_plan, encode_plan};

/// Async lifecycle transition carried by the platform between polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationToken {
    Provision,
    Update,
    Deprovision,
}

impl OperationToken {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Provision => "provision",
            Self::Update => "update",
            Self::Deprovision => "deprovision",
        }
    }

    /// Parse the operation data supplied back by the platform.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "provision" => Some(Self::Provision),
            "update" => Some(Self::Update),
            "deprovision" => Some(Self::Deprovision),
            _ => None,
        }
    }
}

impl fmt::Display for OperationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State reported for the last operation on an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationState {
    #[serde(rename = "in progress")]
    InProgress,
    #[serde(rename = "succeeded")]
    Succeeded,
    #[serde(rename = "failed")]
    Failed,
}

impl OperationState {
    /// Terminal states end polling.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::InProgress)
    }
}

/// Response to a last-operation poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastOperation {
    pub state: OperationState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl LastOperation {
    pub fn succeeded() -> Self {
        Self {
            state: OperationState::Succeeded,
            description: None,
        }
    }

    pub fn in_progress(description: impl Into<String>) -> Self {
        Self {
            state: OperationState::InProgress,
            description: Some(description.into()),
        }
    }

    pub fn failed(description: impl Into<String>) -> Self {
        Self {
            state: OperationState::Failed,
            description: Some(description.into()),
        }
    }
}

/// Durable snapshot kept for every instance, partitioned by organization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceRecord {
    pub plan_id: String,
    pub service_id: String,
    #[serde(default)]
    pub dashboard_url: String,
    /// Encoded resolved plan, see [`snapshot`].
    pub parameters: serde_json::Value,
}

impl InstanceRecord {
    /// Decode the resolved plan held by this record.
    pub fn plan(&self) -> Result<Plan, SnapshotError> {
        decode_plan(&self.parameters)
    }
}

/// Provision request details.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvisionDetails {
    pub service_id: String,
    pub plan_id: String,
    /// Caller parameters (JSON object).
    #[serde(default, rename = "parameters")]
    pub raw_parameters: Option<serde_json::Value>,
    /// Platform context (JSON object).
    #[serde(default, rename = "context")]
    pub raw_context: Option<serde_json::Value>,
}

/// Update request details. `plan_id` is absent when the plan is unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateDetails {
    pub service_id: String,
    #[serde(default)]
    pub plan_id: Option<String>,
    #[serde(default, rename = "parameters")]
    pub raw_parameters: Option<serde_json::Value>,
    #[serde(default, rename = "context")]
    pub raw_context: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeprovisionDetails {
    pub service_id: String,
    pub plan_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionedServiceSpec {
    pub is_async: bool,
    pub dashboard_url: String,
    pub operation: OperationToken,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateServiceSpec {
    /// `false` when the update already completed synchronously.
    pub is_async: bool,
    pub dashboard_url: String,
    pub operation: OperationToken,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeprovisionServiceSpec {
    pub is_async: bool,
    pub operation: OperationToken,
}

/// Result of looking an instance up across all partitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceDetailsSpec {
    /// Partition the record was found in.
    pub org_id: String,
    pub service_id: String,
    pub plan_id: String,
    pub dashboard_url: String,
    /// Encoded resolved plan, as stored.
    pub parameters: serde_json::Value,
}

/// Build the management console link for a cluster.
pub fn dashboard_url(base_url: &str, project_id: &str, cluster_name: &str) -> String {
    format!(
        "{}/v2/{}#clusters/detail/{}",
        base_url.trim_end_matches('/'),
        project_id,
        cluster_name
    )
}
