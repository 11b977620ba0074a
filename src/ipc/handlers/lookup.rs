//! The three-step lookup wizard: organization, then school, then member,
//! ending in the member's submission URL.

use crate::error::{PortalError, Result};
use crate::ipc::error::respond;
use crate::ipc::helpers::{get_optional_str, get_required_str};
use crate::ipc::types::{AppState, Reply, Request};
use crate::store::MemberFilter;
use serde_json::json;

fn handle_organizations(state: &mut AppState, _req: &Request) -> Result<Reply> {
    let orgs = state.store()?.list_organizations()?;
    Ok(Reply::Ok(json!(orgs)))
}

fn handle_schools(state: &mut AppState, req: &Request) -> Result<Reply> {
    let organization_id = get_required_str(&req.params, "organizationId")?;
    let mut schools = state.store()?.list_schools(Some(&organization_id))?;
    if let Some(term) = get_optional_str(&req.params, "search") {
        let term = term.to_lowercase();
        schools.retain(|s| s.school.name.to_lowercase().starts_with(&term));
    }
    Ok(Reply::Ok(json!(schools)))
}

fn handle_members(state: &mut AppState, req: &Request) -> Result<Reply> {
    let school_id = get_required_str(&req.params, "schoolId")?;
    let Some(search) = get_optional_str(&req.params, "search") else {
        return Ok(Reply::Ok(json!([])));
    };
    let filter = MemberFilter {
        school_id: Some(school_id),
        search: Some(search),
        limit: Some(state.config.member_list_limit),
    };
    let members = state.store()?.list_members(&filter)?;
    Ok(Reply::Ok(json!(members)))
}

fn handle_resolve(state: &mut AppState, req: &Request) -> Result<Reply> {
    let member_id = get_required_str(&req.params, "memberId")?;
    let member = state
        .store()?
        .get_member(&member_id)?
        .ok_or_else(|| PortalError::not_found("member", &member_id))?;
    let url = member.member.submission_url.trim().to_string();
    if url.is_empty() {
        return Err(PortalError::validation(format!(
            "No submission URL on file for {}",
            member.member.name
        )));
    }
    Ok(Reply::Ok(json!({ "redirectUrl": url, "member": member })))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "lookup.organizations" => handle_organizations(state, req),
        "lookup.schools" => handle_schools(state, req),
        "lookup.members" => handle_members(state, req),
        "lookup.resolve" => handle_resolve(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
