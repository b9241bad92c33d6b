//! Request context used to render plan templates.
//!
//! The context is a semi-structured bag whose shape depends on the operation
//! requested. Values stay as tagged JSON values; callers read them through
//! typed extractors that fail with [`ContextError`] on a shape mismatch.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Key synthesized from the instance identifier.
pub const INSTANCE_ID_KEY: &str = "instance_id";

/// Ordered key/value mapping handed to the template engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RequestContext {
    values: BTreeMap<String, Value>,
}

impl RequestContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the context for a lifecycle request.
    ///
    /// Sources are merged in increasing priority: the synthesized
    /// `instance_id`, caller parameters, caller context, then process-level
    /// injected values. Later sources overwrite earlier keys.
    pub fn build(
        instance_id: &str,
        parameters: Option<&Value>,
        context: Option<&Value>,
        injected: &BTreeMap<String, Value>,
    ) -> Result<Self, ContextError> {
        let mut ctx = Self::new();
        ctx.insert(INSTANCE_ID_KEY, Value::String(instance_id.to_string()));
        ctx.merge_payload("parameters", parameters)?;
        ctx.merge_payload("context", context)?;
        ctx.extend(injected.clone());
        Ok(ctx)
    }

    /// Merge a caller payload. `None` and JSON `null` are treated as absent;
    /// anything else must be an object.
    pub fn merge_payload(
        &mut self,
        payload_name: &'static str,
        payload: Option<&Value>,
    ) -> Result<(), ContextError> {
        match payload {
            None | Some(Value::Null) => Ok(()),
            Some(Value::Object(map)) => {
                for (key, value) in map {
                    self.values.insert(key.clone(), value.clone());
                }
                Ok(())
            }
            Some(other) => Err(ContextError::NotAnObject {
                payload: payload_name,
                found: kind_of(other),
            }),
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }

    pub fn extend(&mut self, values: impl IntoIterator<Item = (String, Value)>) {
        self.values.extend(values);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Read a boolean. Absent keys yield `Ok(None)`.
    pub fn bool(&self, key: &str) -> Result<Option<bool>, ContextError> {
        match self.values.get(key) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(other) => Err(ContextError::type_mismatch(key, "boolean", other)),
        }
    }

    /// Read a string. Absent keys yield `Ok(None)`.
    pub fn str(&self, key: &str) -> Result<Option<&str>, ContextError> {
        match self.values.get(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(other) => Err(ContextError::type_mismatch(key, "string", other)),
        }
    }

    /// Read a string that must be present.
    pub fn required_str(&self, key: &str) -> Result<&str, ContextError> {
        self.str(key)?
            .ok_or_else(|| ContextError::MissingKey(key.to_string()))
    }

    pub fn as_map(&self) -> &BTreeMap<String, Value> {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<(String, Value)> for RequestContext {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// Shape errors raised while building or reading a request context.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContextError {
    #[error("request {payload} must be a JSON object, got {found}")]
    NotAnObject {
        payload: &'static str,
        found: &'static str,
    },

    #[error("context key '{key}' should be a {expected}, got {found}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("context key '{0}' is required")]
    MissingKey(String),
}

impl ContextError {
    fn type_mismatch(key: &str, expected: &'static str, found: &Value) -> Self {
        Self::TypeMismatch {
            key: key.to_string(),
            expected,
            found: kind_of(found),
        }
    }
}

/// Name of a JSON value's variant, for error messages.
pub fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
