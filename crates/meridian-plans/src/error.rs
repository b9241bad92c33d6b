//! Plan resolution errors.

use thiserror::Error;

/// Errors raised while loading templates or resolving plans.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("plan not found: {0}")]
    PlanNotFound(String),

    #[error("failed to render template for plan {plan_id}: {source}")]
    TemplateRender {
        plan_id: String,
        source: minijinja::Error,
    },

    #[error("malformed plan {plan_id}: {source}")]
    MalformedPlan {
        plan_id: String,
        source: serde_yaml::Error,
    },

    #[error("invalid plan {plan_id}: {field} is required")]
    InvalidPlan { plan_id: String, field: String },

    #[error("duplicate plan template: {0}")]
    DuplicateTemplate(String),

    #[error("invalid template name: {0:?}")]
    InvalidTemplateName(String),

    #[error("failed to read templates: {0}")]
    Io(#[from] std::io::Error),
}

impl PlanError {
    /// Field path reported by [`PlanError::InvalidPlan`], if any.
    pub fn invalid_field(&self) -> Option<&str> {
        match self {
            Self::InvalidPlan { field, .. } => Some(field),
            _ => None,
        }
    }
}
