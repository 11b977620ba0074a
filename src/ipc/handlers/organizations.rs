use crate::error::{PortalError, Result};
use crate::ipc::error::respond;
use crate::ipc::helpers::get_required_str;
use crate::ipc::types::{AppState, Reply, Request};
use crate::store::StoreError;
use serde_json::json;

fn name_taken(name: &str) -> PortalError {
    PortalError::validation(format!(
        "An organization named \"{name}\" already exists. Please choose a different name."
    ))
}

fn required_name(req: &Request) -> Result<String> {
    get_required_str(&req.params, "name").map_err(|_| PortalError::validation("Name is required"))
}

fn handle_list(state: &mut AppState, _req: &Request) -> Result<Reply> {
    let orgs = state.store()?.list_organizations()?;
    Ok(Reply::Ok(json!(orgs)))
}

fn handle_get(state: &mut AppState, req: &Request) -> Result<Reply> {
    let id = get_required_str(&req.params, "id")?;
    let org = state
        .store()?
        .get_organization(&id)?
        .ok_or_else(|| PortalError::not_found("organization", &id))?;
    Ok(Reply::Ok(json!(org)))
}

fn handle_create(state: &mut AppState, req: &Request) -> Result<Reply> {
    let name = required_name(req)?;
    match state.store_mut()?.create_organization(&name) {
        Ok(org) => Ok(Reply::Created(json!(org))),
        Err(StoreError::Conflict(_)) => Err(name_taken(&name)),
        Err(e) => Err(e.into()),
    }
}

fn handle_update(state: &mut AppState, req: &Request) -> Result<Reply> {
    let id = get_required_str(&req.params, "id")?;
    let name = required_name(req)?;
    match state.store_mut()?.rename_organization(&id, &name) {
        Ok(Some(org)) => Ok(Reply::Ok(json!(org))),
        Ok(None) => Err(PortalError::not_found("organization", &id)),
        Err(StoreError::Conflict(_)) => Err(name_taken(&name)),
        Err(e) => Err(e.into()),
    }
}

fn handle_delete(state: &mut AppState, req: &Request) -> Result<Reply> {
    let id = get_required_str(&req.params, "id")?;
    if !state.store_mut()?.delete_organization(&id)? {
        return Err(PortalError::not_found("organization", &id));
    }
    Ok(Reply::Ok(
        json!({ "message": "Organization deleted successfully" }),
    ))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "organizations.list" => handle_list(state, req),
        "organizations.get" => handle_get(state, req),
        "organizations.create" => handle_create(state, req),
        "organizations.update" => handle_update(state, req),
        "organizations.delete" => handle_delete(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
