//! `meridian render`: resolve one plan the way Provision would.

use anyhow::{Context, Result};
use meridian_core::{BrokerConfig, RequestContext};

pub fn run(
    config: &BrokerConfig,
    plan_id: &str,
    instance_id: &str,
    params: Option<&str>,
) -> Result<()> {
    let resolver = super::build_resolver(config)?;

    let params = params
        .map(serde_json::from_str::<serde_json::Value>)
        .transpose()
        .context("--params must be valid JSON")?;
    let ctx = RequestContext::build(instance_id, params.as_ref(), None, resolver.injected())?;

    let mut plan = resolver.resolve(plan_id, &ctx)?;
    // Provision pins the cluster name to the instance id.
    if let Some(cluster) = plan.cluster.as_mut() {
        cluster.name = instance_id.to_string();
    }

    print!("{}", serde_yaml::to_string(&plan.redacted())?);
    Ok(())
}
