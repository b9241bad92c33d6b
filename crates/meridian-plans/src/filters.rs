//! Custom template filters.
//!
//! `default`, `upper` and `lower` come from minijinja's builtins; the broker
//! adds:
//! - `required`: fail rendering when a value is missing
//! - `b64encode` / `b64decode`: base64 helpers for secrets passed in context

use base64::{Engine, engine::general_purpose::STANDARD};
use minijinja::{Error, ErrorKind, Value};

/// Usage: `{{ project_id | required }}`
pub fn required(value: Value) -> Result<Value, Error> {
    if value.is_undefined() || value.is_none() {
        Err(Error::new(
            ErrorKind::UndefinedError,
            "required value is missing",
        ))
    } else {
        Ok(value)
    }
}

/// Usage: `{{ secret | b64encode }}`
pub fn b64encode(value: &str) -> String {
    STANDARD.encode(value.as_bytes())
}

/// Usage: `{{ encoded | b64decode }}`
pub fn b64decode(value: &str) -> Result<String, Error> {
    let bytes = STANDARD.decode(value).map_err(|e| {
        Error::new(
            ErrorKind::InvalidOperation,
            format!("base64 decode error: {}", e),
        )
    })?;
    String::from_utf8(bytes).map_err(|e| {
        Error::new(
            ErrorKind::InvalidOperation,
            format!("base64 decode produced invalid UTF-8: {}", e),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_rejects_missing_values() {
        assert!(required(Value::UNDEFINED).is_err());
        assert!(required(Value::from(())).is_err());
        assert_eq!(
            required(Value::from("M10")).unwrap().as_str(),
            Some("M10")
        );
    }

    #[test]
    fn test_b64_helpers() {
        assert_eq!(b64encode("hunter2"), "aHVudGVyMg==");
        assert_eq!(b64decode("aHVudGVyMg==").unwrap(), "hunter2");
        assert!(b64decode("not base64!").is_err());
    }
}
