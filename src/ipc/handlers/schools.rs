use crate::error::{PortalError, Result};
use crate::ipc::error::respond;
use crate::ipc::helpers::{get_optional_str, get_required_str};
use crate::ipc::types::{AppState, Reply, Request};
use crate::store::{NewSchool, Store, StoreError};
use serde_json::json;

fn name_taken(name: &str) -> PortalError {
    PortalError::validation(format!(
        "A school named \"{name}\" already exists in this organization. Please choose a different name."
    ))
}

fn parse_school(store: &dyn Store, req: &Request) -> Result<NewSchool> {
    let name = get_required_str(&req.params, "name")
        .map_err(|_| PortalError::validation("Name is required"))?;
    let organization_id = get_required_str(&req.params, "organizationId")
        .map_err(|_| PortalError::validation("Organization is required"))?;
    if store.get_organization(&organization_id)?.is_none() {
        return Err(PortalError::validation(format!(
            "Organization not found: {organization_id}"
        )));
    }
    Ok(NewSchool {
        name,
        organization_id,
    })
}

fn detail(store: &dyn Store, id: &str) -> Result<serde_json::Value> {
    let school = store
        .get_school(id)?
        .ok_or_else(|| PortalError::not_found("school", id))?;
    Ok(json!(school))
}

fn handle_list(state: &mut AppState, req: &Request) -> Result<Reply> {
    let organization_id = get_optional_str(&req.params, "organizationId");
    let schools = state.store()?.list_schools(organization_id.as_deref())?;
    Ok(Reply::Ok(json!(schools)))
}

fn handle_get(state: &mut AppState, req: &Request) -> Result<Reply> {
    let id = get_required_str(&req.params, "id")?;
    Ok(Reply::Ok(detail(state.store()?, &id)?))
}

fn handle_create(state: &mut AppState, req: &Request) -> Result<Reply> {
    let store = state.store_mut()?;
    let school = parse_school(store, req)?;
    let created = match store.create_school(&school) {
        Ok(s) => s,
        Err(StoreError::Conflict(_)) => return Err(name_taken(&school.name)),
        Err(e) => return Err(e.into()),
    };
    Ok(Reply::Created(detail(store, &created.id)?))
}

fn handle_update(state: &mut AppState, req: &Request) -> Result<Reply> {
    let id = get_required_str(&req.params, "id")?;
    let store = state.store_mut()?;
    let school = parse_school(store, req)?;
    match store.update_school(&id, &school) {
        Ok(Some(_)) => {}
        Ok(None) => return Err(PortalError::not_found("school", &id)),
        Err(StoreError::Conflict(_)) => return Err(name_taken(&school.name)),
        Err(e) => return Err(e.into()),
    }
    Ok(Reply::Ok(detail(store, &id)?))
}

fn handle_delete(state: &mut AppState, req: &Request) -> Result<Reply> {
    let id = get_required_str(&req.params, "id")?;
    if !state.store_mut()?.delete_school(&id)? {
        return Err(PortalError::not_found("school", &id));
    }
    Ok(Reply::Ok(json!({ "message": "School deleted successfully" })))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "schools.list" => handle_list(state, req),
        "schools.get" => handle_get(state, req),
        "schools.create" => handle_create(state, req),
        "schools.update" => handle_update(state, req),
        "schools.delete" => handle_delete(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
