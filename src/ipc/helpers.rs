use crate::error::{PortalError, Result};
use serde_json::Value;

fn trimmed(params: &Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn get_required_str(params: &Value, key: &str) -> Result<String> {
    trimmed(params, key).ok_or_else(|| PortalError::validation(format!("missing {key}")))
}

pub fn get_optional_str(params: &Value, key: &str) -> Option<String> {
    trimmed(params, key)
}

pub fn get_optional_usize(params: &Value, key: &str) -> Result<Option<usize>> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .filter(|n| *n > 0)
            .map(|n| Some(n as usize))
            .ok_or_else(|| PortalError::validation(format!("{key} must be a positive integer"))),
    }
}
