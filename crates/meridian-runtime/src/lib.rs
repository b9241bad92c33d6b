//! # meridian-runtime
//!
//! Lifecycle orchestration: the remote cluster API contract and its
//! in-memory simulator, the broker error taxonomy, and the [`Orchestrator`]
//! driving Provision / Update / Deprovision / LastOperation / GetInstance.

pub mod api;
pub mod classify;
pub mod error;
pub mod operations;
pub mod orchestrator;
pub mod simulator;

pub use api::{ClusterApi, ClusterApiError, ProjectRole, ProjectUser};
pub use classify::{ApiError, classify};
pub use error::BrokerError;
pub use operations::ProjectOperation;
pub use orchestrator::{Orchestrator, PAUSED_KEY};
pub use simulator::{ApiCall, ApiOp, InMemoryClusterApi};
