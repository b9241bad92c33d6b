//! Lifecycle Orchestrator.
//!
//! Implements Provision / Update / Deprovision / LastOperation / GetInstance
//! as a state machine spread across calls. Nothing runs in the background:
//! progress is observed through repeated `last_operation` polls, which also
//! perform the final deprovision cleanup.

use meridian_core::{
    Cluster, ClusterState, DeprovisionDetails, DeprovisionServiceSpec, InstanceDetailsSpec,
    InstanceRecord, LastOperation, OperationToken, Plan, Project, ProvisionDetails,
    ProvisionedServiceSpec, RequestContext, UpdateDetails, UpdateServiceSpec, dashboard_url,
    encode_plan,
};
use meridian_plans::{CLUSTER_FIELD, PROJECT_FIELD, PlanError, PlanResolver, service_id};
use meridian_store::InstanceStore;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::api::ClusterApi;
use crate::error::BrokerError;
use crate::operations::{OPERATION_KEY, ProjectOperation};

/// Context key toggling the paused flag of a cluster.
pub const PAUSED_KEY: &str = "paused";

/// Coordinates the plan resolver, the remote API and the instance store.
pub struct Orchestrator {
    resolver: Arc<PlanResolver>,
    api: Arc<dyn ClusterApi>,
    store: Arc<dyn InstanceStore>,
    /// Organization partitions, in scan order.
    partitions: BTreeSet<String>,
    dashboard_base_url: String,
}

impl Orchestrator {
    pub fn new(
        resolver: Arc<PlanResolver>,
        api: Arc<dyn ClusterApi>,
        store: Arc<dyn InstanceStore>,
        partitions: impl IntoIterator<Item = String>,
        dashboard_base_url: impl Into<String>,
    ) -> Self {
        Self {
            resolver,
            api,
            store,
            partitions: partitions.into_iter().collect(),
            dashboard_base_url: dashboard_base_url.into(),
        }
    }

    pub fn resolver(&self) -> &PlanResolver {
        &self.resolver
    }

    fn context(
        &self,
        instance_id: &str,
        parameters: Option<&serde_json::Value>,
        context: Option<&serde_json::Value>,
    ) -> Result<RequestContext, BrokerError> {
        Ok(RequestContext::build(
            instance_id,
            parameters,
            context,
            self.resolver.injected(),
        )?)
    }

    // ========================================================================
    // Provision
    // ========================================================================

    pub async fn provision(
        &self,
        instance_id: &str,
        details: &ProvisionDetails,
        async_allowed: bool,
    ) -> Result<ProvisionedServiceSpec, BrokerError> {
        if !async_allowed {
            return Err(BrokerError::AsyncRequired);
        }

        let ctx = self.context(
            instance_id,
            details.raw_parameters.as_ref(),
            details.raw_context.as_ref(),
        )?;
        let mut plan = self.resolver.resolve(&details.plan_id, &ctx)?;

        let Some(cluster) = plan.cluster.as_mut() else {
            return Err(invalid_plan(&details.plan_id, CLUSTER_FIELD));
        };
        cluster.name = instance_id.to_string();
        if plan.project.is_none() {
            return Err(invalid_plan(&details.plan_id, PROJECT_FIELD));
        }
        let org_id = plan.org_id().to_string();
        if !self.partitions.contains(&org_id) {
            return Err(BrokerError::UnknownOrganization(org_id));
        }

        tracing::info!(
            instance_id = %instance_id,
            plan_id = %details.plan_id,
            org_id = %org_id,
            plan = %plan,
            "Provisioning instance"
        );

        if plan.project_id().is_empty() {
            let project = self.create_resources(&plan).await?;
            plan.project = Some(project);
        }
        let project_id = plan.project_id().to_string();
        let dashboard = dashboard_url(&self.dashboard_base_url, &project_id, instance_id);

        let record = InstanceRecord {
            plan_id: details.plan_id.clone(),
            service_id: if details.service_id.is_empty() {
                service_id()
            } else {
                details.service_id.clone()
            },
            dashboard_url: dashboard.clone(),
            parameters: encode_plan(&plan)?,
        };
        self.store.put(&org_id, instance_id, &record).await?;

        let cluster = plan.cluster.as_ref().cloned().unwrap_or_default();
        if let Err(e) = self.api.create_cluster(&project_id, &cluster).await {
            tracing::error!(
                instance_id = %instance_id,
                project_id = %project_id,
                error = %e,
                "Cluster creation failed"
            );
            if let Err(cleanup) = self.store.delete_one(&org_id, instance_id).await {
                tracing::warn!(
                    instance_id = %instance_id,
                    error = %cleanup,
                    "Failed to remove instance record after cluster creation failure"
                );
            }
            return Err(e.into());
        }

        Ok(ProvisionedServiceSpec {
            is_async: true,
            dashboard_url: dashboard,
            operation: OperationToken::Provision,
        })
    }

    /// Create the project with its database users and access list.
    ///
    /// Sub-resource failures abort provisioning; the project is left in
    /// place and logged so an operator can clean it up.
    async fn create_resources(&self, plan: &Plan) -> Result<Project, BrokerError> {
        let requested = plan.project.clone().unwrap_or_default();
        let created = self.api.create_project(&requested).await?;
        tracing::info!(project_id = %created.id, org_id = %requested.org_id, "Created project");

        for user in &plan.database_users {
            if let Err(e) = self.api.create_database_user(&created.id, user).await {
                tracing::error!(
                    project_id = %created.id,
                    username = %user.username,
                    error = %e,
                    "Failed to create database user"
                );
                return Err(e.into());
            }
        }

        if !plan.ip_access_list.is_empty() {
            if let Err(e) = self
                .api
                .create_ip_access_list(&created.id, &plan.ip_access_list)
                .await
            {
                tracing::error!(
                    project_id = %created.id,
                    error = %e,
                    "Failed to create network access list"
                );
                return Err(e.into());
            }
        }

        Ok(Project {
            id: created.id,
            ..requested
        })
    }

    // ========================================================================
    // Update
    // ========================================================================

    pub async fn update(
        &self,
        instance_id: &str,
        details: &UpdateDetails,
        async_allowed: bool,
    ) -> Result<UpdateServiceSpec, BrokerError> {
        if !async_allowed {
            return Err(BrokerError::AsyncRequired);
        }

        let ctx = self.context(
            instance_id,
            details.raw_parameters.as_ref(),
            details.raw_context.as_ref(),
        )?;
        let (org_id, record) = self.find_record(instance_id).await?;
        let existing = record.plan()?;
        let project_id = existing.project_id().to_string();
        let cluster_name = existing.cluster_name().to_string();

        if let Some(paused) = ctx.bool(PAUSED_KEY)? {
            tracing::info!(instance_id = %instance_id, paused, "Toggling cluster pause");
            self.api
                .update_cluster(&project_id, &cluster_name, &Cluster::pause_request(paused))
                .await?;
            return Ok(UpdateServiceSpec {
                is_async: true,
                dashboard_url: record.dashboard_url,
                operation: OperationToken::Update,
            });
        }

        if let Some(op) = ctx.str(OPERATION_KEY)? {
            let op = ProjectOperation::parse(op)?;
            tracing::info!(instance_id = %instance_id, operation = %op, "Running project operation");
            op.perform(self.api.as_ref(), &ctx, &existing).await?;
            return Ok(UpdateServiceSpec {
                is_async: false,
                dashboard_url: record.dashboard_url,
                operation: OperationToken::Update,
            });
        }

        let plan_id = details
            .plan_id
            .clone()
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| record.plan_id.clone());

        let live = self.api.get_cluster(&project_id, &cluster_name).await?;
        let cluster_name = live.name;

        let mut plan = self.resolver.resolve(&plan_id, &ctx)?;
        let Some(mut requested) = plan.cluster.take() else {
            return Err(invalid_plan(&plan_id, CLUSTER_FIELD));
        };
        requested.name = cluster_name.clone();

        tracing::info!(
            instance_id = %instance_id,
            plan_id = %plan_id,
            project_id = %project_id,
            cluster = %cluster_name,
            "Updating cluster"
        );
        let updated = self
            .api
            .update_cluster(&project_id, &cluster_name, &requested)
            .await?;

        plan.project = existing.project.clone();
        plan.cluster = Some(updated);

        self.store.delete_one(&org_id, instance_id).await?;
        let new_record = InstanceRecord {
            plan_id,
            service_id: record.service_id,
            dashboard_url: record.dashboard_url.clone(),
            parameters: encode_plan(&plan)?,
        };
        if let Err(e) = self.store.put(&org_id, instance_id, &new_record).await {
            tracing::error!(
                instance_id = %instance_id,
                error = %e,
                "Cluster updated but instance record could not be written"
            );
            return Err(e.into());
        }

        Ok(UpdateServiceSpec {
            is_async: true,
            dashboard_url: record.dashboard_url,
            operation: OperationToken::Update,
        })
    }

    // ========================================================================
    // Deprovision
    // ========================================================================

    pub async fn deprovision(
        &self,
        instance_id: &str,
        details: &DeprovisionDetails,
        async_allowed: bool,
    ) -> Result<DeprovisionServiceSpec, BrokerError> {
        if !async_allowed {
            return Err(BrokerError::AsyncRequired);
        }

        let (_, record) = self.find_record(instance_id).await?;
        let plan = record.plan()?;
        let project_id = plan.project_id();

        tracing::info!(
            instance_id = %instance_id,
            plan_id = %details.plan_id,
            project_id = %project_id,
            "Deprovisioning instance"
        );

        if let Err(e) = self.api.delete_cluster(project_id, plan.cluster_name()).await {
            tracing::error!(instance_id = %instance_id, error = %e, "Failed to delete cluster");
        }

        for user in &plan.database_users {
            if let Err(e) = self
                .api
                .delete_database_user(project_id, &user.database_name, &user.username)
                .await
            {
                tracing::error!(
                    instance_id = %instance_id,
                    username = %user.username,
                    error = %e,
                    "Failed to delete database user"
                );
            }
        }

        Ok(DeprovisionServiceSpec {
            is_async: true,
            operation: OperationToken::Deprovision,
        })
    }

    // ========================================================================
    // LastOperation
    // ========================================================================

    /// Report the progress of the operation identified by `operation`.
    ///
    /// Never fails: local errors become a `Failed` state.
    pub async fn last_operation(&self, instance_id: &str, operation: &str) -> LastOperation {
        let Some(token) = OperationToken::parse(operation) else {
            return LastOperation::failed(format!("unknown operation {:?}", operation));
        };

        match self.poll(instance_id, token).await {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(
                    instance_id = %instance_id,
                    operation = %token,
                    error = %e,
                    "Last operation check failed"
                );
                LastOperation::failed(format!("got error: {}", e))
            }
        }
    }

    async fn poll(
        &self,
        instance_id: &str,
        token: OperationToken,
    ) -> Result<LastOperation, BrokerError> {
        let Some((org_id, record)) = self.lookup_record(instance_id).await? else {
            return match token {
                // Already cleaned up by an earlier poll.
                OperationToken::Deprovision => Ok(LastOperation::succeeded()),
                _ => Err(BrokerError::InstanceNotFound(instance_id.to_string())),
            };
        };
        let plan = record.plan()?;

        let state = match self
            .api
            .get_cluster(plan.project_id(), plan.cluster_name())
            .await
        {
            Ok(cluster) => Some(cluster.state()),
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e.into()),
        };

        tracing::debug!(
            instance_id = %instance_id,
            operation = %token,
            state = ?state,
            "Polled cluster state"
        );

        let result = match token {
            OperationToken::Provision | OperationToken::Update => match state {
                None => LastOperation::failed("cluster not found"),
                Some(ClusterState::Idle) => LastOperation::succeeded(),
                Some(other) => LastOperation::in_progress(other.as_str()),
            },
            OperationToken::Deprovision => match state {
                None | Some(ClusterState::Deleted) => {
                    self.cleanup(&org_id, instance_id, &plan).await;
                    LastOperation::succeeded()
                }
                Some(other) => LastOperation::in_progress(other.as_str()),
            },
        };
        Ok(result)
    }

    /// Final deprovision cleanup. Failures are logged only.
    async fn cleanup(&self, org_id: &str, instance_id: &str, plan: &Plan) {
        let project_id = plan.project_id();
        match self.api.delete_project(project_id).await {
            Ok(()) => tracing::info!(project_id = %project_id, "Deleted project"),
            Err(e) if e.is_not_found() => {
                tracing::debug!(project_id = %project_id, "Project already deleted");
            }
            Err(e) => tracing::warn!(
                project_id = %project_id,
                error = %e,
                "Failed to delete project"
            ),
        }

        if let Err(e) = self.store.delete_one(org_id, instance_id).await {
            tracing::warn!(
                instance_id = %instance_id,
                org_id = %org_id,
                error = %e,
                "Failed to delete instance record"
            );
        }
    }

    // ========================================================================
    // GetInstance
    // ========================================================================

    pub async fn get_instance(&self, instance_id: &str) -> Result<InstanceDetailsSpec, BrokerError> {
        let (org_id, record) = self.find_record(instance_id).await?;
        Ok(InstanceDetailsSpec {
            org_id,
            service_id: record.service_id,
            plan_id: record.plan_id,
            dashboard_url: record.dashboard_url,
            parameters: record.parameters,
        })
    }

    async fn find_record(&self, instance_id: &str) -> Result<(String, InstanceRecord), BrokerError> {
        self.lookup_record(instance_id)
            .await?
            .ok_or_else(|| BrokerError::InstanceNotFound(instance_id.to_string()))
    }

    /// Scan partitions in order; the first match wins.
    ///
    /// A partition that fails is skipped, but absence is only reported when
    /// every partition answered. Otherwise the first store error is returned.
    async fn lookup_record(
        &self,
        instance_id: &str,
    ) -> Result<Option<(String, InstanceRecord)>, BrokerError> {
        let mut failure = None;
        for org_id in &self.partitions {
            match self.store.find_one(org_id, instance_id).await {
                Ok(Some(record)) => return Ok(Some((org_id.clone(), record))),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(
                        org_id = %org_id,
                        instance_id = %instance_id,
                        error = %e,
                        "Skipping partition after store error"
                    );
                    failure.get_or_insert(e);
                }
            }
        }
        match failure {
            Some(e) => Err(e.into()),
            None => Ok(None),
        }
    }
}

fn invalid_plan(plan_id: &str, field: &str) -> BrokerError {
    BrokerError::Plan(PlanError::InvalidPlan {
        plan_id: plan_id.to_string(),
        field: field.to_string(),
    })
}
