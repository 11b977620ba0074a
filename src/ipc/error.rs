use super::types::Reply;
use crate::error::PortalError;
use serde_json::json;
use tracing::{debug, error};

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "status": 200,
        "result": result
    })
}

pub fn created(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "status": 201,
        "result": result
    })
}

pub fn err(
    id: &str,
    status: u16,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "status": status,
        "error": error,
    })
}

/// Reply for a line that is not a valid request; there is no id to echo.
pub fn bad_json(message: impl Into<String>) -> serde_json::Value {
    json!({
        "ok": false,
        "status": 400,
        "error": {
            "code": "bad_json",
            "message": message.into(),
        }
    })
}

/// Reply for a line over the payload ceiling; it is never parsed, so there
/// is no id to echo either.
pub fn payload_too_large(size: usize, limit: usize) -> serde_json::Value {
    let e = PortalError::PayloadTooLarge { size, limit };
    debug!(size, limit, "request line rejected");
    json!({
        "ok": false,
        "status": e.status(),
        "error": {
            "code": e.code(),
            "message": e.to_string(),
            "details": details(&e),
        }
    })
}

fn details(e: &PortalError) -> Option<serde_json::Value> {
    match e {
        PortalError::PolicyViolation {
            member,
            organization,
            school,
        } => Some(json!({
            "memberName": member,
            "organizationName": organization,
            "schoolName": school,
        })),
        PortalError::PayloadTooLarge { size, limit } => Some(json!({
            "size": size,
            "limit": limit,
        })),
        PortalError::NotFound { entity, id } => Some(json!({
            "entity": entity,
            "id": id,
        })),
        _ => None,
    }
}

pub fn from_portal_error(id: &str, e: &PortalError) -> serde_json::Value {
    if e.status() >= 500 {
        error!(request_id = id, code = e.code(), error = %e, "request failed");
    } else {
        debug!(request_id = id, code = e.code(), error = %e, "request rejected");
    }
    err(id, e.status(), e.code(), e.to_string(), details(e))
}

pub fn respond(id: &str, result: Result<Reply, PortalError>) -> serde_json::Value {
    match result {
        Ok(Reply::Ok(v)) => ok(id, v),
        Ok(Reply::Created(v)) => created(id, v),
        Err(e) => from_portal_error(id, &e),
    }
}
