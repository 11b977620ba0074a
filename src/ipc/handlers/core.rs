use crate::config::ImportDefaults;
use crate::error::{PortalError, Result};
use crate::import::DuplicatePolicy;
use crate::ipc::error::respond;
use crate::ipc::helpers::get_optional_usize;
use crate::ipc::types::{AppState, Reply, Request};
use crate::store::{SqliteStore, StoreError};
use serde_json::json;
use std::path::PathBuf;
use tracing::info;

fn handle_health(state: &mut AppState, _req: &Request) -> Result<Reply> {
    Ok(Reply::Ok(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string())
    })))
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> Result<Reply> {
    let in_memory = req
        .params
        .get("inMemory")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    if in_memory {
        let store = SqliteStore::open_in_memory().map_err(StoreError::Open)?;
        state.workspace = None;
        state.store = Some(Box::new(store));
        info!("opened in-memory workspace");
        return Ok(Reply::Ok(json!({ "workspacePath": null, "inMemory": true })));
    }

    let path = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from)
        .ok_or_else(|| PortalError::validation("missing params.path"))?;
    let store = SqliteStore::open(&path).map_err(StoreError::Open)?;
    info!(path = %path.display(), "opened workspace");
    state.workspace = Some(path.clone());
    state.store = Some(Box::new(store));
    Ok(Reply::Ok(json!({ "workspacePath": path.to_string_lossy() })))
}

fn handle_config_get(state: &mut AppState, _req: &Request) -> Result<Reply> {
    let import_defaults = match state.store() {
        Ok(store) => Some(ImportDefaults::load(store, &state.config)?),
        Err(_) => None,
    };
    Ok(Reply::Ok(json!({
        "config": state.config,
        "importDefaults": import_defaults,
    })))
}

fn handle_config_set_import_defaults(state: &mut AppState, req: &Request) -> Result<Reply> {
    // Validate before touching the store.
    let policy = match req.params.get("defaultDuplicateHandling") {
        None | Some(serde_json::Value::Null) => None,
        Some(v) => Some(
            v.as_str()
                .ok_or_else(|| PortalError::validation("defaultDuplicateHandling must be a string"))?
                .parse::<DuplicatePolicy>()?,
        ),
    };
    let chunk_size = get_optional_usize(&req.params, "chunkSize")?;

    let config = state.config.clone();
    let store = state.store_mut()?;
    let mut defaults = ImportDefaults::load(store, &config)?;
    if let Some(p) = policy {
        defaults.default_duplicate_handling = p;
    }
    if let Some(n) = chunk_size {
        defaults.chunk_size = n;
    }
    defaults.save(store)?;
    Ok(Reply::Ok(json!({ "importDefaults": defaults })))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "health" => handle_health(state, req),
        "workspace.select" => handle_workspace_select(state, req),
        "config.get" => handle_config_get(state, req),
        "config.setImportDefaults" => handle_config_set_import_defaults(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
