//! `meridian instance <id>`

use anyhow::Result;
use meridian_core::{BrokerConfig, decode_plan};
use meridian_plans::service_id;
use meridian_runtime::{InMemoryClusterApi, Orchestrator};
use meridian_store::create_store;
use serde_json::json;
use std::sync::Arc;

pub async fn run(config: &BrokerConfig, instance_id: &str) -> Result<()> {
    let resolver = Arc::new(super::build_resolver(config)?);
    let store = create_store(&config.store).await?;

    // Lookups only read the store, so no remote API client is needed.
    let orchestrator = Orchestrator::new(
        resolver,
        Arc::new(InMemoryClusterApi::new()),
        store,
        config.credentials.org_ids().map(str::to_string),
        config.dashboard.base_url.clone(),
    );

    let details = orchestrator.get_instance(instance_id).await?;
    let plan = decode_plan(&details.parameters)?;
    if details.service_id != service_id() {
        tracing::warn!(service_id = %details.service_id, "Instance belongs to another service");
    }

    let output = json!({
        "org_id": details.org_id,
        "plan_id": details.plan_id,
        "service_id": details.service_id,
        "dashboard_url": details.dashboard_url,
        "plan": plan.redacted(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
