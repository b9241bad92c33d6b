//! Broker error type.

use meridian_core::{ContextError, SnapshotError};
use meridian_plans::PlanError;
use meridian_store::StoreError;
use thiserror::Error;

use crate::api::ClusterApiError;

/// Errors surfaced by lifecycle operations.
///
/// Remote errors are classified on conversion: "not found" and "already
/// exists" get their own variants, everything else is kept as [`Remote`].
///
/// [`Remote`]: BrokerError::Remote
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("this service plan requires client support for asynchronous service operations")]
    AsyncRequired,

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error("organization {0} is not configured")]
    UnknownOrganization(String),

    #[error("invalid request context: {0}")]
    InvalidContext(#[from] ContextError),

    #[error("unknown operation {0:?}")]
    UnknownOperation(String),

    /// No stored record for the instance in any partition.
    #[error("instance {0} not found")]
    InstanceNotFound(String),

    /// The remote API does not know the resource.
    #[error("instance does not exist: {0}")]
    InstanceDoesNotExist(ClusterApiError),

    #[error("instance already exists: {0}")]
    InstanceAlreadyExists(ClusterApiError),

    #[error(transparent)]
    Remote(ClusterApiError),

    #[error("instance store error: {0}")]
    Store(#[from] StoreError),

    #[error("corrupt instance record: {0}")]
    Snapshot(#[from] SnapshotError),
}

impl From<ClusterApiError> for BrokerError {
    fn from(err: ClusterApiError) -> Self {
        match err {
            ClusterApiError::NotFound { .. } => Self::InstanceDoesNotExist(err),
            ClusterApiError::AlreadyExists { .. } => Self::InstanceAlreadyExists(err),
            other => Self::Remote(other),
        }
    }
}
