//! Service catalog built from the plan templates.

use meridian_core::ServiceConfig;
use serde::Serialize;

use crate::registry::service_id;
use crate::resolver::PlanResolver;

/// Catalog advertised to the platform.
#[derive(Debug, Clone, Serialize)]
pub struct Catalog {
    pub services: Vec<Service>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Service {
    pub id: String,
    pub name: String,
    pub description: String,
    pub bindable: bool,
    pub instances_retrievable: bool,
    pub bindings_retrievable: bool,
    pub plan_updateable: bool,
    pub metadata: ServiceMetadata,
    pub plans: Vec<ServicePlan>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceMetadata {
    pub display_name: String,
    pub image_url: String,
    pub documentation_url: String,
    pub provider_display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub long_description: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServicePlan {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub free: Option<bool>,
    pub metadata: ServicePlanMetadata,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicePlanMetadata {
    pub display_name: String,
    pub bullets: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_size: Option<String>,
}

impl Catalog {
    /// Resolve every template once with the minimal context.
    ///
    /// A template that fails to resolve is logged and left out; the build
    /// itself never fails.
    pub fn build(resolver: &PlanResolver, service: &ServiceConfig) -> Self {
        let ctx = resolver.minimal_context();
        let mut plans = Vec::with_capacity(resolver.registry().len());

        for template in resolver.registry().iter() {
            let plan = match resolver.resolve(template.plan_id(), &ctx) {
                Ok(plan) => plan,
                Err(e) => {
                    tracing::warn!(
                        plan_id = %template.plan_id(),
                        error = %e,
                        "Excluding plan from catalog"
                    );
                    continue;
                }
            };

            let name = if plan.name.is_empty() {
                template.name().to_string()
            } else {
                plan.name.clone()
            };
            tracing::debug!(plan_id = %template.plan_id(), plan = %plan, "Catalog plan");

            plans.push(ServicePlan {
                id: template.plan_id().to_string(),
                description: plan.description.clone(),
                free: plan.free,
                metadata: ServicePlanMetadata {
                    display_name: name.clone(),
                    bullets: vec![plan.description.clone()],
                    instance_size: plan.instance_size().map(str::to_string),
                },
                name,
            });
        }

        tracing::info!(plans = plans.len(), "Built service catalog");

        Self {
            services: vec![Service {
                id: service_id(),
                name: service.name.clone(),
                description: service.description.clone(),
                bindable: true,
                instances_retrievable: true,
                bindings_retrievable: false,
                plan_updateable: true,
                metadata: ServiceMetadata {
                    display_name: service.display_name.clone(),
                    image_url: service.image_url.clone(),
                    documentation_url: service.documentation_url.clone(),
                    provider_display_name: service.provider_display_name.clone(),
                    long_description: service.long_description.clone(),
                },
                plans,
            }],
        }
    }

    /// Look up an advertised plan.
    pub fn plan(&self, plan_id: &str) -> Option<&ServicePlan> {
        self.services
            .iter()
            .flat_map(|s| s.plans.iter())
            .find(|p| p.id == plan_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{PlanTemplate, TemplateRegistry};
    use serde_json::json;
    use std::collections::BTreeMap;

    const SIZED: &str = r#"description: Dedicated {{ credentials.tier | default('M10') }}
free: false
project:
  orgId: org-1
cluster:
  name: "{{ instance_id }}"
  providerSettings:
    providerName: AWS
    instanceSizeName: "{{ credentials.tier | default('M10') }}"
"#;

    fn resolver() -> PlanResolver {
        let mut registry = TemplateRegistry::new();
        registry
            .register(PlanTemplate::new("Zeta", "name: zeta-plan\ndescription: z\n"))
            .unwrap();
        registry.register(PlanTemplate::new("sized", SIZED)).unwrap();
        registry
            .register(PlanTemplate::new(
                "unsized",
                "cluster:\n  providerSettings:\n    providerName: AWS\n",
            ))
            .unwrap();

        let mut injected = BTreeMap::new();
        injected.insert("credentials".to_string(), json!({"tier": "M30"}));
        PlanResolver::new(registry, injected)
    }

    #[test]
    fn test_build_skips_failing_plans_and_orders_by_id() {
        let catalog = Catalog::build(&resolver(), &ServiceConfig::default());
        assert_eq!(catalog.services.len(), 1);

        let service = &catalog.services[0];
        assert_eq!(service.id, "meridian-service-template");

        let ids: Vec<&str> = service.plans.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "meridian-plan-template-sized",
                "meridian-plan-template-zeta"
            ]
        );
    }

    #[test]
    fn test_plan_metadata_uses_injected_values() {
        let catalog = Catalog::build(&resolver(), &ServiceConfig::default());

        let sized = catalog.plan("meridian-plan-template-sized").unwrap();
        assert_eq!(sized.name, "sized");
        assert_eq!(sized.description, "Dedicated M30");
        assert_eq!(sized.free, Some(false));
        assert_eq!(sized.metadata.instance_size.as_deref(), Some("M30"));
        assert_eq!(sized.metadata.bullets, vec!["Dedicated M30".to_string()]);

        let zeta = catalog.plan("meridian-plan-template-zeta").unwrap();
        assert_eq!(zeta.name, "zeta-plan");
        assert!(zeta.metadata.instance_size.is_none());
    }

    #[test]
    fn test_catalog_json_shape() {
        let catalog = Catalog::build(&resolver(), &ServiceConfig::default());
        let value = serde_json::to_value(&catalog).unwrap();

        assert_eq!(value["services"][0]["plan_updateable"], true);
        assert_eq!(value["services"][0]["metadata"]["providerDisplayName"], "MongoDB");
        assert_eq!(
            value["services"][0]["plans"][0]["metadata"]["instanceSize"],
            "M30"
        );
    }
}
