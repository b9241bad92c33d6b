//! # meridian-plans
//!
//! Plan templates and their resolution.
//!
//! - [`TemplateRegistry`]: templates loaded from a directory and inline
//!   configuration, keyed by advertised plan id
//! - [`PlanResolver`]: renders a template against a request context and
//!   returns a validated [`meridian_core::Plan`]
//! - [`Catalog`]: the service catalog derived from the templates

pub mod catalog;
pub mod engine;
pub mod error;
pub mod filters;
pub mod registry;
pub mod resolver;

pub use catalog::{Catalog, Service, ServicePlan};
pub use engine::TemplateEngine;
pub use error::PlanError;
pub use registry::{PlanTemplate, TemplateRegistry, plan_id_for, service_id};
pub use resolver::{
    CLUSTER_FIELD, INSTANCE_SIZE_FIELD, PROJECT_FIELD, PROVIDER_NAME_FIELD, PlanResolver,
    validate_plan,
};

use meridian_core::CredentialsConfig;
use serde_json::Value;
use std::collections::BTreeMap;

/// Context key under which organization credentials are injected.
pub const CREDENTIALS_KEY: &str = "credentials";

/// Process-level values injected into every request context.
pub fn injected_values(credentials: &CredentialsConfig) -> BTreeMap<String, Value> {
    let mut values = BTreeMap::new();
    values.insert(CREDENTIALS_KEY.to_string(), credentials.to_context_value());
    values
}
