//! `meridian smoke`: provision -> poll -> update -> deprovision -> poll
//! against the simulated remote API and an in-memory store.
//!
//! Without configured templates a built-in demo plan is used, so the command
//! also works on a fresh checkout.

use anyhow::{Context, Result, ensure};
use meridian_core::{
    BrokerConfig, ClusterState, DeprovisionDetails, LastOperation, OperationState, OrgCredentials,
    ProvisionDetails, UpdateDetails, decode_plan,
};
use meridian_plans::{
    Catalog, PlanResolver, PlanTemplate, TemplateRegistry, injected_values, service_id,
};
use meridian_runtime::{InMemoryClusterApi, Orchestrator};
use meridian_store::MemoryInstanceStore;
use serde_json::json;
use std::sync::Arc;

const DEMO_ORG: &str = "demo-org";

const DEMO_TEMPLATE: &str = r#"name: demo
description: Simulated replica set for smoke runs
project:
  name: "smoke-{{ instance_id }}"
  orgId: demo-org
cluster:
  clusterType: REPLICASET
  providerSettings:
    providerName: AWS
    regionName: US_EAST_1
    instanceSizeName: "{{ size | default('M10') }}"
databaseUsers:
  - username: smoke
    password: "{{ password | default('smoke-password') }}"
    roles:
      - roleName: readWrite
        databaseName: smoke
"#;

pub async fn run(mut config: BrokerConfig, plan: Option<&str>, instance_id: &str) -> Result<()> {
    let mut registry = TemplateRegistry::from_config(&config.templates)?;
    if registry.is_empty() {
        tracing::info!("No plan templates configured, using the built-in demo plan");
        registry.register(PlanTemplate::new("demo", DEMO_TEMPLATE))?;
        config.credentials.orgs.insert(
            DEMO_ORG.to_string(),
            OrgCredentials {
                public_key: "demo-public".to_string(),
                private_key: "demo-private".to_string(),
                display_name: Some("Smoke test organization".to_string()),
            },
        );
    }
    let resolver = Arc::new(PlanResolver::new(
        registry,
        injected_values(&config.credentials),
    ));

    let plan_id = match plan {
        Some(plan) => plan.to_string(),
        None => {
            let catalog = Catalog::build(&resolver, &config.service);
            catalog
                .services
                .first()
                .and_then(|s| s.plans.first())
                .map(|p| p.id.clone())
                .context("No plan in the catalog resolves; pass --plan")?
        }
    };

    let api = Arc::new(InMemoryClusterApi::new());
    let orchestrator = Orchestrator::new(
        resolver,
        api.clone(),
        Arc::new(MemoryInstanceStore::new()),
        config.credentials.org_ids().map(str::to_string),
        config.dashboard.base_url.clone(),
    );

    // Provision
    let spec = orchestrator
        .provision(
            instance_id,
            &ProvisionDetails {
                service_id: service_id(),
                plan_id: plan_id.clone(),
                raw_parameters: None,
                raw_context: None,
            },
            true,
        )
        .await?;
    println!("provision: dashboard {}", spec.dashboard_url);

    let details = orchestrator.get_instance(instance_id).await?;
    let plan = decode_plan(&details.parameters)?;
    let project_id = plan.project_id().to_string();

    expect_state(&orchestrator, instance_id, "provision", OperationState::InProgress).await?;
    api.set_cluster_state(&project_id, instance_id, ClusterState::Idle);
    expect_state(&orchestrator, instance_id, "provision", OperationState::Succeeded).await?;

    // Update: pause, then resume.
    for paused in [true, false] {
        orchestrator
            .update(
                instance_id,
                &UpdateDetails {
                    service_id: service_id(),
                    plan_id: None,
                    raw_parameters: None,
                    raw_context: Some(json!({ "paused": paused })),
                },
                true,
            )
            .await?;
        api.set_cluster_state(&project_id, instance_id, ClusterState::Idle);
        expect_state(&orchestrator, instance_id, "update", OperationState::Succeeded).await?;
    }

    // Deprovision
    orchestrator
        .deprovision(
            instance_id,
            &DeprovisionDetails {
                service_id: service_id(),
                plan_id: plan_id.clone(),
            },
            true,
        )
        .await?;
    expect_state(&orchestrator, instance_id, "deprovision", OperationState::InProgress).await?;
    api.set_cluster_state(&project_id, instance_id, ClusterState::Deleted);
    expect_state(&orchestrator, instance_id, "deprovision", OperationState::Succeeded).await?;

    ensure!(
        api.project(&project_id).is_none(),
        "project {} still exists after deprovision",
        project_id
    );
    ensure!(
        orchestrator.get_instance(instance_id).await.is_err(),
        "instance record still exists after deprovision"
    );

    println!(
        "smoke run passed: plan {} ({} remote calls)",
        plan_id,
        api.calls().len()
    );
    Ok(())
}

async fn expect_state(
    orchestrator: &Orchestrator,
    instance_id: &str,
    operation: &str,
    expected: OperationState,
) -> Result<LastOperation> {
    let op = orchestrator.last_operation(instance_id, operation).await;
    println!(
        "{}: {:?} {}",
        operation,
        op.state,
        op.description.as_deref().unwrap_or("")
    );
    ensure!(
        op.state == expected,
        "{} poll returned {:?}, expected {:?}",
        operation,
        op.state,
        expected
    );
    Ok(op)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_smoke_with_demo_plan() {
        run(BrokerConfig::default(), None, "smoke-test").await.unwrap();
    }
}
