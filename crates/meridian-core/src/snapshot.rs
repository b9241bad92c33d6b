//! Encoding of a resolved plan inside a stored instance record.
//!
//! The record's `parameters` field holds `{"plan": "<base64 of plan JSON>"}`.

use base64::{Engine, engine::general_purpose::STANDARD};
use serde_json::{Value, json};

use crate::plan::Plan;

const PLAN_KEY: &str = "plan";

/// Encode a plan into the opaque snapshot stored alongside an instance.
pub fn encode_plan(plan: &Plan) -> Result<Value, SnapshotError> {
    let raw = serde_json::to_vec(plan)?;
    Ok(json!({ PLAN_KEY: STANDARD.encode(raw) }))
}

/// Decode a snapshot produced by [`encode_plan`].
pub fn decode_plan(parameters: &Value) -> Result<Plan, SnapshotError> {
    let encoded = parameters
        .get(PLAN_KEY)
        .and_then(Value::as_str)
        .ok_or(SnapshotError::MissingPlan)?;
    let raw = STANDARD.decode(encoded)?;
    Ok(serde_json::from_slice(&raw)?)
}

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("instance parameters do not contain an encoded plan")]
    MissingPlan,

    #[error("invalid base64 in plan snapshot: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("invalid plan JSON in snapshot: {0}")]
    Json(#[from] serde_json::Error),
}
