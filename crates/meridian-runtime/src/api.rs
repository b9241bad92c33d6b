//! Remote cluster API contract.
//!
//! The orchestrator only talks to the provisioning service through
//! [`ClusterApi`]; transports and credentials live behind it.

use async_trait::async_trait;
use meridian_core::{Cluster, DatabaseUser, IpAccessEntry, Project};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Organization-level user that can be granted project roles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectUser {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub username: String,
    pub email_address: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub password: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub roles: Vec<ProjectRole>,
}

/// Role granted to a [`ProjectUser`] on one project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRole {
    pub group_id: String,
    pub role_name: String,
}

/// Errors returned by the remote API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClusterApiError {
    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    #[error("{kind} already exists: {name}")]
    AlreadyExists { kind: &'static str, name: String },

    #[error("remote API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),
}

impl ClusterApiError {
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub fn already_exists(kind: &'static str, name: impl Into<String>) -> Self {
        Self::AlreadyExists {
            kind,
            name: name.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Operations the broker needs from the cluster provisioning service.
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// Create a project and return it with its assigned id.
    async fn create_project(&self, project: &Project) -> Result<Project, ClusterApiError>;

    async fn delete_project(&self, project_id: &str) -> Result<(), ClusterApiError>;

    async fn create_database_user(
        &self,
        project_id: &str,
        user: &DatabaseUser,
    ) -> Result<DatabaseUser, ClusterApiError>;

    async fn delete_database_user(
        &self,
        project_id: &str,
        database_name: &str,
        username: &str,
    ) -> Result<(), ClusterApiError>;

    /// Append entries to the project's network access list.
    async fn create_ip_access_list(
        &self,
        project_id: &str,
        entries: &[IpAccessEntry],
    ) -> Result<Vec<IpAccessEntry>, ClusterApiError>;

    async fn create_cluster(
        &self,
        project_id: &str,
        cluster: &Cluster,
    ) -> Result<Cluster, ClusterApiError>;

    async fn get_cluster(&self, project_id: &str, name: &str) -> Result<Cluster, ClusterApiError>;

    /// Apply the set fields of `cluster` to the named cluster.
    async fn update_cluster(
        &self,
        project_id: &str,
        name: &str,
        cluster: &Cluster,
    ) -> Result<Cluster, ClusterApiError>;

    async fn delete_cluster(&self, project_id: &str, name: &str) -> Result<(), ClusterApiError>;

    async fn create_project_user(
        &self,
        user: &ProjectUser,
    ) -> Result<ProjectUser, ClusterApiError>;

    async fn get_user_by_name(&self, username: &str) -> Result<ProjectUser, ClusterApiError>;

    async fn remove_user_from_project(
        &self,
        project_id: &str,
        user_id: &str,
    ) -> Result<(), ClusterApiError>;
}
