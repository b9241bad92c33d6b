//! Plan Resolver: render a template against a request context and decode the
//! result into a validated [`Plan`].

use meridian_core::{Plan, RequestContext};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::engine::TemplateEngine;
use crate::error::PlanError;
use crate::registry::TemplateRegistry;

pub const PROVIDER_NAME_FIELD: &str = ".cluster.providerSettings.providerName";
pub const INSTANCE_SIZE_FIELD: &str = ".cluster.providerSettings.instanceSizeName";
pub const CLUSTER_FIELD: &str = ".cluster";
pub const PROJECT_FIELD: &str = ".project";

/// Resolves plan ids into concrete plans.
///
/// Holds the immutable template registry and the process-level values
/// injected into every request context (e.g. `credentials`).
pub struct PlanResolver {
    registry: TemplateRegistry,
    engine: TemplateEngine,
    injected: BTreeMap<String, Value>,
}

impl PlanResolver {
    pub fn new(registry: TemplateRegistry, injected: BTreeMap<String, Value>) -> Self {
        Self {
            registry,
            engine: TemplateEngine::new(),
            injected,
        }
    }

    pub fn registry(&self) -> &TemplateRegistry {
        &self.registry
    }

    /// Values merged last (highest priority) into every request context.
    pub fn injected(&self) -> &BTreeMap<String, Value> {
        &self.injected
    }

    /// Context holding only the injected values, used for catalog builds.
    pub fn minimal_context(&self) -> RequestContext {
        self.injected.clone().into_iter().collect()
    }

    /// Resolve `plan_id` against `ctx`. Pure: no side effects.
    pub fn resolve(&self, plan_id: &str, ctx: &RequestContext) -> Result<Plan, PlanError> {
        let template = self
            .registry
            .get(plan_id)
            .ok_or_else(|| PlanError::PlanNotFound(plan_id.to_string()))?;

        let rendered =
            self.engine
                .render(template.source(), ctx)
                .map_err(|source| PlanError::TemplateRender {
                    plan_id: plan_id.to_string(),
                    source,
                })?;

        let plan: Plan =
            serde_yaml::from_str(&rendered).map_err(|source| PlanError::MalformedPlan {
                plan_id: plan_id.to_string(),
                source,
            })?;

        validate_plan(plan_id, &plan)?;
        Ok(plan)
    }
}

/// Check required fields, reporting the first missing one in a fixed order.
pub fn validate_plan(plan_id: &str, plan: &Plan) -> Result<(), PlanError> {
    let Some(cluster) = &plan.cluster else {
        return Ok(());
    };
    let settings = cluster.provider_settings.as_ref();

    if settings.is_none_or(|s| s.provider_name.is_empty()) {
        return Err(invalid(plan_id, PROVIDER_NAME_FIELD));
    }
    if settings.is_none_or(|s| s.instance_size_name.is_empty()) {
        return Err(invalid(plan_id, INSTANCE_SIZE_FIELD));
    }
    Ok(())
}

pub(crate) fn invalid(plan_id: &str, field: &str) -> PlanError {
    PlanError::InvalidPlan {
        plan_id: plan_id.to_string(),
        field: field.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{PlanTemplate, plan_id_for};
    use serde_json::json;

    const BASIC: &str = r#"name: {{ plan_name | default('basic') }}
description: Basic replica set
project:
  id: "{{ project_id }}"
  orgId: "{{ org_id | default('org-1') }}"
cluster:
  name: "{{ instance_id }}"
  providerSettings:
    providerName: "{{ provider | default('AWS') }}"
    regionName: US_EAST_1
    instanceSizeName: "{{ size }}"
databaseUsers:
  - username: app
    password: "{{ password | default('secret') }}"
"#;

    fn resolver() -> PlanResolver {
        let mut registry = TemplateRegistry::new();
        registry.register(PlanTemplate::new("basic", BASIC)).unwrap();
        registry
            .register(PlanTemplate::new("broken", "cluster: [unclosed\n"))
            .unwrap();
        registry
            .register(PlanTemplate::new("bad-syntax", "name: {{ oops\n"))
            .unwrap();
        PlanResolver::new(registry, BTreeMap::new())
    }

    fn ctx(params: serde_json::Value) -> RequestContext {
        RequestContext::build("inst-1", Some(&params), None, &BTreeMap::new()).unwrap()
    }

    #[test]
    fn test_resolve_renders_context_values() {
        let plan = resolver()
            .resolve(&plan_id_for("basic"), &ctx(json!({"size": "M10"})))
            .unwrap();

        assert_eq!(plan.name, "basic");
        assert_eq!(plan.cluster_name(), "inst-1");
        assert_eq!(plan.instance_size(), Some("M10"));
        assert_eq!(plan.org_id(), "org-1");
        assert_eq!(plan.project_id(), "");
    }

    #[test]
    fn test_resolve_is_deterministic() {
        let resolver = resolver();
        let context = ctx(json!({"size": "M20", "project_id": "p-1"}));

        let first = resolver.resolve(&plan_id_for("basic"), &context).unwrap();
        let second = resolver.resolve(&plan_id_for("basic"), &context).unwrap();

        assert_eq!(
            serde_json::to_vec(&first).unwrap(),
            serde_json::to_vec(&second).unwrap()
        );
    }

    #[test]
    fn test_missing_provider_reported_before_size() {
        let err = resolver()
            .resolve(&plan_id_for("basic"), &ctx(json!({"provider": ""})))
            .unwrap_err();
        assert_eq!(err.invalid_field(), Some(PROVIDER_NAME_FIELD));

        let err = resolver()
            .resolve(&plan_id_for("basic"), &ctx(json!({})))
            .unwrap_err();
        assert_eq!(err.invalid_field(), Some(INSTANCE_SIZE_FIELD));
    }

    #[test]
    fn test_unknown_plan() {
        let err = resolver()
            .resolve("meridian-plan-template-nope", &ctx(json!({})))
            .unwrap_err();
        assert!(matches!(err, PlanError::PlanNotFound(id) if id == "meridian-plan-template-nope"));
    }

    #[test]
    fn test_malformed_and_unrenderable_plans() {
        let resolver = resolver();

        let err = resolver
            .resolve(&plan_id_for("broken"), &ctx(json!({})))
            .unwrap_err();
        assert!(matches!(err, PlanError::MalformedPlan { .. }));

        let err = resolver
            .resolve(&plan_id_for("bad-syntax"), &ctx(json!({})))
            .unwrap_err();
        assert!(matches!(err, PlanError::TemplateRender { .. }));
    }

    #[test]
    fn test_plan_without_cluster_is_valid() {
        let plan = Plan::default();
        assert!(validate_plan("p", &plan).is_ok());
    }
}
