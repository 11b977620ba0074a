use crate::error::{PortalError, Result};
use crate::ipc::error::respond;
use crate::ipc::helpers::{get_optional_str, get_optional_usize, get_required_str};
use crate::ipc::types::{AppState, Reply, Request};
use crate::store::{MemberFilter, NewMember, Store};
use serde_json::json;

/// Reads a member payload. The organization always comes from the school;
/// a caller-supplied `organizationId` must agree with it.
fn parse_member(store: &dyn Store, req: &Request) -> Result<NewMember> {
    let name = get_required_str(&req.params, "name")
        .map_err(|_| PortalError::validation("Name is required"))?;
    let school_id = get_required_str(&req.params, "schoolId")
        .map_err(|_| PortalError::validation("School is required"))?;
    let submission_url = get_required_str(&req.params, "submissionUrl")
        .map_err(|_| PortalError::validation("Submission URL is required"))?;

    let school = store
        .get_school(&school_id)?
        .ok_or_else(|| PortalError::validation(format!("School not found: {school_id}")))?;
    let organization_id = school.school.organization_id;
    if let Some(supplied) = get_optional_str(&req.params, "organizationId") {
        if supplied != organization_id {
            return Err(PortalError::validation(
                "School does not belong to the given organization",
            ));
        }
    }

    Ok(NewMember {
        name,
        school_id,
        organization_id,
        submission_url,
    })
}

fn detail(store: &dyn Store, id: &str) -> Result<serde_json::Value> {
    let member = store
        .get_member(id)?
        .ok_or_else(|| PortalError::not_found("member", id))?;
    Ok(json!(member))
}

fn handle_list(state: &mut AppState, req: &Request) -> Result<Reply> {
    let limit = get_optional_usize(&req.params, "limit")?.unwrap_or(state.config.member_list_limit);
    let filter = MemberFilter {
        school_id: get_optional_str(&req.params, "schoolId"),
        search: get_optional_str(&req.params, "search"),
        limit: Some(limit),
    };
    let members = state.store()?.list_members(&filter)?;
    Ok(Reply::Ok(json!(members)))
}

fn handle_get(state: &mut AppState, req: &Request) -> Result<Reply> {
    let id = get_required_str(&req.params, "id")?;
    Ok(Reply::Ok(detail(state.store()?, &id)?))
}

fn handle_create(state: &mut AppState, req: &Request) -> Result<Reply> {
    let store = state.store_mut()?;
    let member = parse_member(store, req)?;
    let created = store.insert_members(std::slice::from_ref(&member))?;
    let id = created
        .first()
        .map(|m| m.id.clone())
        .ok_or_else(|| PortalError::Resolution("member insert returned no row".into()))?;
    Ok(Reply::Created(detail(store, &id)?))
}

fn handle_update(state: &mut AppState, req: &Request) -> Result<Reply> {
    let id = get_required_str(&req.params, "id")?;
    let store = state.store_mut()?;
    let member = parse_member(store, req)?;
    if store.update_member(&id, &member)?.is_none() {
        return Err(PortalError::not_found("member", &id));
    }
    Ok(Reply::Ok(detail(store, &id)?))
}

fn handle_delete(state: &mut AppState, req: &Request) -> Result<Reply> {
    let id = get_required_str(&req.params, "id")?;
    if !state.store_mut()?.delete_member(&id)? {
        return Err(PortalError::not_found("member", &id));
    }
    Ok(Reply::Ok(json!({ "message": "Member deleted successfully" })))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "members.list" => handle_list(state, req),
        "members.get" => handle_get(state, req),
        "members.create" => handle_create(state, req),
        "members.update" => handle_update(state, req),
        "members.delete" => handle_delete(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
