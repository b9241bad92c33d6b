//! In-memory implementation of [`ClusterApi`].
//!
//! Used by the `smoke` command and by tests. Clusters move through states
//! only when told to: `create` leaves a cluster `CREATING`, `update`
//! leaves it `UPDATING`, `delete` leaves it `DELETING`; advance them with
//! [`InMemoryClusterApi::set_cluster_state`] or drop them with
//! [`InMemoryClusterApi::remove_cluster`]. Every call is journaled and a
//! failure can be injected for the next call of a given operation.

use async_trait::async_trait;
use meridian_core::{Cluster, ClusterState, DatabaseUser, IpAccessEntry, Project};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use crate::api::{ClusterApi, ClusterApiError, ProjectUser};

/// Remote operation names, used for the journal and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ApiOp {
    CreateProject,
    DeleteProject,
    CreateDatabaseUser,
    DeleteDatabaseUser,
    CreateIpAccessList,
    CreateCluster,
    GetCluster,
    UpdateCluster,
    DeleteCluster,
    CreateProjectUser,
    GetUserByName,
    RemoveUserFromProject,
}

/// One journaled call.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiCall {
    pub op: ApiOp,
    /// Resource addressed by the call (project id, `project/cluster`, ...).
    pub target: String,
    /// Request body, when the call carries one.
    pub body: Option<Value>,
}

#[derive(Default)]
struct SimState {
    next_id: u64,
    projects: BTreeMap<String, Project>,
    clusters: BTreeMap<(String, String), Cluster>,
    database_users: BTreeMap<(String, String, String), DatabaseUser>,
    access_lists: BTreeMap<String, Vec<IpAccessEntry>>,
    users: BTreeMap<String, ProjectUser>,
    journal: Vec<ApiCall>,
    failures: BTreeMap<ApiOp, ClusterApiError>,
}

impl SimState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{:08x}", prefix, self.next_id)
    }

    /// Journal the call, then return the injected failure if one is armed.
    fn enter(
        &mut self,
        op: ApiOp,
        target: impl Into<String>,
        body: Option<Value>,
    ) -> Result<(), ClusterApiError> {
        self.journal.push(ApiCall {
            op,
            target: target.into(),
            body,
        });
        match self.failures.remove(&op) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Simulated remote API.
#[derive(Default)]
pub struct InMemoryClusterApi {
    state: Mutex<SimState>,
}

impl InMemoryClusterApi {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        // A panic while holding the lock cannot leave the maps half-written
        // in a way later calls care about.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Fail the next call of `op` with `err`.
    pub fn fail_next(&self, op: ApiOp, err: ClusterApiError) {
        self.lock().failures.insert(op, err);
    }

    /// Force a cluster into a lifecycle state. Returns false if unknown.
    pub fn set_cluster_state(&self, project_id: &str, name: &str, state: ClusterState) -> bool {
        let mut sim = self.lock();
        match sim
            .clusters
            .get_mut(&(project_id.to_string(), name.to_string()))
        {
            Some(cluster) => {
                cluster.state_name = Some(state.as_str().to_string());
                true
            }
            None => false,
        }
    }

    /// Drop a cluster entirely, as if the remote side forgot it.
    pub fn remove_cluster(&self, project_id: &str, name: &str) -> bool {
        self.lock()
            .clusters
            .remove(&(project_id.to_string(), name.to_string()))
            .is_some()
    }

    /// Register a project directly, bypassing the journal.
    pub fn seed_project(&self, project: Project) {
        self.lock().projects.insert(project.id.clone(), project);
    }

    pub fn cluster(&self, project_id: &str, name: &str) -> Option<Cluster> {
        self.lock()
            .clusters
            .get(&(project_id.to_string(), name.to_string()))
            .cloned()
    }

    pub fn project(&self, project_id: &str) -> Option<Project> {
        self.lock().projects.get(project_id).cloned()
    }

    pub fn database_user_count(&self, project_id: &str) -> usize {
        self.lock()
            .database_users
            .keys()
            .filter(|(p, _, _)| p == project_id)
            .count()
    }

    pub fn access_list(&self, project_id: &str) -> Vec<IpAccessEntry> {
        self.lock()
            .access_lists
            .get(project_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn user(&self, username: &str) -> Option<ProjectUser> {
        self.lock()
            .users
            .values()
            .find(|u| u.username == username)
            .cloned()
    }

    /// All calls so far, in order.
    pub fn calls(&self) -> Vec<ApiCall> {
        self.lock().journal.clone()
    }

    /// Calls of one operation, in order.
    pub fn calls_of(&self, op: ApiOp) -> Vec<ApiCall> {
        self.lock()
            .journal
            .iter()
            .filter(|c| c.op == op)
            .cloned()
            .collect()
    }
}

fn body<T: serde::Serialize>(value: &T) -> Option<Value> {
    serde_json::to_value(value).ok()
}

fn cluster_target(project_id: &str, name: &str) -> String {
    format!("{}/{}", project_id, name)
}

/// Overlay the set fields of `patch` onto `cluster`.
fn apply_patch(cluster: &mut Cluster, patch: &Cluster) {
    if patch.cluster_type.is_some() {
        cluster.cluster_type = patch.cluster_type.clone();
    }
    if patch.major_version.is_some() {
        cluster.major_version = patch.major_version.clone();
    }
    if patch.disk_size_gb.is_some() {
        cluster.disk_size_gb = patch.disk_size_gb;
    }
    if patch.num_shards.is_some() {
        cluster.num_shards = patch.num_shards;
    }
    if patch.replication_factor.is_some() {
        cluster.replication_factor = patch.replication_factor;
    }
    if patch.paused.is_some() {
        cluster.paused = patch.paused;
    }
    if patch.provider_settings.is_some() {
        cluster.provider_settings = patch.provider_settings.clone();
    }
    for (key, value) in &patch.extra {
        cluster.extra.insert(key.clone(), value.clone());
    }
}

#[async_trait]
impl ClusterApi for InMemoryClusterApi {
    async fn create_project(&self, project: &Project) -> Result<Project, ClusterApiError> {
        let mut sim = self.lock();
        sim.enter(ApiOp::CreateProject, &project.name, body(project))?;

        if sim.projects.values().any(|p| p.name == project.name) {
            return Err(ClusterApiError::already_exists("project", &project.name));
        }
        let created = Project {
            id: sim.next_id("proj"),
            ..project.clone()
        };
        sim.projects.insert(created.id.clone(), created.clone());
        Ok(created)
    }

    async fn delete_project(&self, project_id: &str) -> Result<(), ClusterApiError> {
        let mut sim = self.lock();
        sim.enter(ApiOp::DeleteProject, project_id, None)?;
        sim.projects
            .remove(project_id)
            .map(|_| ())
            .ok_or_else(|| ClusterApiError::not_found("project", project_id))
    }

    async fn create_database_user(
        &self,
        project_id: &str,
        user: &DatabaseUser,
    ) -> Result<DatabaseUser, ClusterApiError> {
        let mut sim = self.lock();
        sim.enter(
            ApiOp::CreateDatabaseUser,
            project_id,
            body(&user.username),
        )?;
        if !sim.projects.contains_key(project_id) {
            return Err(ClusterApiError::not_found("project", project_id));
        }
        let key = (
            project_id.to_string(),
            user.database_name.clone(),
            user.username.clone(),
        );
        if sim.database_users.contains_key(&key) {
            return Err(ClusterApiError::already_exists(
                "database user",
                &user.username,
            ));
        }
        sim.database_users.insert(key, user.clone());
        Ok(user.clone())
    }

    async fn delete_database_user(
        &self,
        project_id: &str,
        database_name: &str,
        username: &str,
    ) -> Result<(), ClusterApiError> {
        let mut sim = self.lock();
        sim.enter(
            ApiOp::DeleteDatabaseUser,
            format!("{}/{}/{}", project_id, database_name, username),
            None,
        )?;
        let key = (
            project_id.to_string(),
            database_name.to_string(),
            username.to_string(),
        );
        sim.database_users
            .remove(&key)
            .map(|_| ())
            .ok_or_else(|| ClusterApiError::not_found("database user", username))
    }

    async fn create_ip_access_list(
        &self,
        project_id: &str,
        entries: &[IpAccessEntry],
    ) -> Result<Vec<IpAccessEntry>, ClusterApiError> {
        let mut sim = self.lock();
        sim.enter(ApiOp::CreateIpAccessList, project_id, body(&entries))?;
        if !sim.projects.contains_key(project_id) {
            return Err(ClusterApiError::not_found("project", project_id));
        }
        let list = sim.access_lists.entry(project_id.to_string()).or_default();
        list.extend(entries.iter().cloned());
        Ok(list.clone())
    }

    async fn create_cluster(
        &self,
        project_id: &str,
        cluster: &Cluster,
    ) -> Result<Cluster, ClusterApiError> {
        let mut sim = self.lock();
        sim.enter(
            ApiOp::CreateCluster,
            cluster_target(project_id, &cluster.name),
            body(cluster),
        )?;
        let key = (project_id.to_string(), cluster.name.clone());
        if sim.clusters.contains_key(&key) {
            return Err(ClusterApiError::already_exists("cluster", &cluster.name));
        }
        let mut created = cluster.clone();
        created.state_name = Some(ClusterState::Creating.as_str().to_string());
        sim.clusters.insert(key, created.clone());
        Ok(created)
    }

    async fn get_cluster(&self, project_id: &str, name: &str) -> Result<Cluster, ClusterApiError> {
        let mut sim = self.lock();
        sim.enter(ApiOp::GetCluster, cluster_target(project_id, name), None)?;
        sim.clusters
            .get(&(project_id.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| ClusterApiError::not_found("cluster", name))
    }

    async fn update_cluster(
        &self,
        project_id: &str,
        name: &str,
        cluster: &Cluster,
    ) -> Result<Cluster, ClusterApiError> {
        let mut sim = self.lock();
        sim.enter(
            ApiOp::UpdateCluster,
            cluster_target(project_id, name),
            body(cluster),
        )?;
        let existing = sim
            .clusters
            .get_mut(&(project_id.to_string(), name.to_string()))
            .ok_or_else(|| ClusterApiError::not_found("cluster", name))?;
        apply_patch(existing, cluster);
        existing.state_name = Some(ClusterState::Updating.as_str().to_string());
        Ok(existing.clone())
    }

    async fn delete_cluster(&self, project_id: &str, name: &str) -> Result<(), ClusterApiError> {
        let mut sim = self.lock();
        sim.enter(ApiOp::DeleteCluster, cluster_target(project_id, name), None)?;
        let existing = sim
            .clusters
            .get_mut(&(project_id.to_string(), name.to_string()))
            .ok_or_else(|| ClusterApiError::not_found("cluster", name))?;
        existing.state_name = Some(ClusterState::Deleting.as_str().to_string());
        Ok(())
    }

    async fn create_project_user(
        &self,
        user: &ProjectUser,
    ) -> Result<ProjectUser, ClusterApiError> {
        let mut sim = self.lock();
        sim.enter(ApiOp::CreateProjectUser, &user.username, None)?;
        if sim.users.values().any(|u| u.username == user.username) {
            return Err(ClusterApiError::already_exists("user", &user.username));
        }
        let created = ProjectUser {
            id: sim.next_id("user"),
            ..user.clone()
        };
        sim.users.insert(created.id.clone(), created.clone());
        Ok(created)
    }

    async fn get_user_by_name(&self, username: &str) -> Result<ProjectUser, ClusterApiError> {
        let mut sim = self.lock();
        sim.enter(ApiOp::GetUserByName, username, None)?;
        sim.users
            .values()
            .find(|u| u.username == username)
            .cloned()
            .ok_or_else(|| ClusterApiError::not_found("user", username))
    }

    async fn remove_user_from_project(
        &self,
        project_id: &str,
        user_id: &str,
    ) -> Result<(), ClusterApiError> {
        let mut sim = self.lock();
        sim.enter(
            ApiOp::RemoveUserFromProject,
            format!("{}/{}", project_id, user_id),
            None,
        )?;
        let user = sim
            .users
            .get_mut(user_id)
            .ok_or_else(|| ClusterApiError::not_found("user", user_id))?;
        user.roles.retain(|r| r.group_id != project_id);
        Ok(())
    }
}
