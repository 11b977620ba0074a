use crate::config::ImportDefaults;
use crate::error::{PortalError, Result};
use crate::import::{
    import_in_chunks, import_records, records_from_csv, DuplicatePolicy, ImportOptions,
    ImportRecord,
};
use crate::ipc::error::respond;
use crate::ipc::helpers::get_optional_usize;
use crate::ipc::types::{AppState, Reply, Request};
use serde_json::{json, Value};
use tracing::info;

fn explicit_policy(params: &Value) -> Result<Option<DuplicatePolicy>> {
    match params.get("duplicateHandling") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => s.parse::<DuplicatePolicy>().map(Some),
        Some(_) => Err(PortalError::validation(
            "Invalid duplicateHandling option. Must be skip, update, or error",
        )),
    }
}

/// Either `members` (an array of records) or `csvData`, never both.
fn parse_records(params: &Value) -> Result<Vec<ImportRecord>> {
    let members = params.get("members").filter(|v| !v.is_null());
    let csv = params.get("csvData").filter(|v| !v.is_null());
    match (members, csv) {
        (Some(_), Some(_)) => Err(PortalError::validation(
            "Provide either members or csvData, not both",
        )),
        (Some(Value::Array(items)), None) => items
            .iter()
            .enumerate()
            .map(|(i, v)| {
                serde_json::from_value::<ImportRecord>(v.clone()).map_err(|e| {
                    PortalError::validation(format!("Invalid member record {}: {e}", i + 1))
                })
            })
            .collect(),
        (Some(_), None) | (None, None) => Err(PortalError::validation("Members array is required")),
        (None, Some(Value::String(text))) => records_from_csv(text),
        (None, Some(_)) => Err(PortalError::validation("csvData must be a string")),
    }
}

fn handle_bulk_import(state: &mut AppState, req: &Request) -> Result<Reply> {
    let policy = explicit_policy(&req.params)?;
    let records = parse_records(&req.params)?;

    let config = state.config.clone();
    let store = state.store_mut()?;
    let policy = match policy {
        Some(p) => p,
        None => ImportDefaults::load(store, &config)?.default_duplicate_handling,
    };
    let opts = ImportOptions {
        policy,
        lookup_batch_size: config.lookup_batch_size,
    };
    let outcome = import_records(store, &records, &opts)?;
    Ok(Reply::Created(json!(outcome)))
}

fn handle_bulk_upload(state: &mut AppState, req: &Request) -> Result<Reply> {
    let policy = explicit_policy(&req.params)?;
    let chunk_size = get_optional_usize(&req.params, "chunkSize")?;
    let records = parse_records(&req.params)?;

    let config = state.config.clone();
    let store = state.store_mut()?;
    let defaults = ImportDefaults::load(store, &config)?;
    let opts = ImportOptions {
        policy: policy.unwrap_or(defaults.default_duplicate_handling),
        lookup_batch_size: config.lookup_batch_size,
    };
    let chunk_size = chunk_size.unwrap_or(defaults.chunk_size);
    let report = import_in_chunks(store, &records, &opts, chunk_size)?;
    info!(
        chunks = report.chunks_total,
        failed = report.chunks_failed,
        processed = report.members_processed,
        "bulk upload finished"
    );
    Ok(Reply::Ok(json!(report)))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "members.bulkImport" => handle_bulk_import(state, req),
        "members.bulkUpload" => handle_bulk_upload(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
