//! Error Classifier: maps broker errors onto the caller-facing taxonomy.

use meridian_plans::PlanError;
use serde::Serialize;

use crate::error::BrokerError;

/// Caller-facing error with an HTTP status and a stable key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiError {
    #[serde(skip)]
    pub status: u16,
    pub error: &'static str,
    pub description: String,
}

/// Classify an error for the inbound boundary.
pub fn classify(err: &BrokerError) -> ApiError {
    let (status, key) = match err {
        BrokerError::AsyncRequired => (422, "AsyncRequired"),
        BrokerError::InstanceDoesNotExist(_) => (410, "InstanceDoesNotExist"),
        BrokerError::InstanceAlreadyExists(_) => (409, "InstanceAlreadyExists"),
        BrokerError::InstanceNotFound(_) => (404, "InstanceNotFound"),
        BrokerError::Plan(plan) => match plan {
            PlanError::PlanNotFound(_) => (400, "PlanNotFound"),
            PlanError::TemplateRender { .. } | PlanError::MalformedPlan { .. } => {
                (400, "MalformedPlan")
            }
            PlanError::InvalidPlan { .. } => (400, "InvalidPlan"),
            PlanError::DuplicateTemplate(_)
            | PlanError::InvalidTemplateName(_)
            | PlanError::Io(_) => (500, "InternalError"),
        },
        BrokerError::UnknownOrganization(_) => (400, "UnknownOrganization"),
        BrokerError::UnknownOperation(_) => (400, "UnknownOperation"),
        BrokerError::InvalidContext(_) => (422, "InvalidRawParameters"),
        BrokerError::Remote(_) => (400, "InvalidParameters"),
        BrokerError::Store(_) | BrokerError::Snapshot(_) => (500, "InternalError"),
    };

    ApiError {
        status,
        error: key,
        description: err.to_string(),
    }
}

impl From<&BrokerError> for ApiError {
    fn from(err: &BrokerError) -> Self {
        classify(err)
    }
}
