use super::parser::parse_csv;
use super::reconciler::reconcile;
use super::resolver::resolve_entities;
use super::{DuplicatePolicy, ImportRecord, ImportStats, REQUIRED_COLUMNS};
use crate::error::{PortalError, Result};
use crate::store::{MemberDetail, Store};
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy)]
pub struct ImportOptions {
    pub policy: DuplicatePolicy,
    /// Upper bound on names per lookup request.
    pub lookup_batch_size: usize,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            policy: DuplicatePolicy::Skip,
            lookup_batch_size: 100,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ImportOutcome {
    pub message: String,
    /// Inserted members first, then updated ones.
    pub data: Vec<MemberDetail>,
    pub stats: ImportStats,
}

/// Parses CSV text into import records, checking the header carries every
/// required column and that at least one data row survived parsing.
pub fn records_from_csv(text: &str) -> Result<Vec<ImportRecord>> {
    let parsed = parse_csv(text)?;
    let missing = REQUIRED_COLUMNS
        .iter()
        .filter(|c| !parsed.headers.iter().any(|h| h == *c))
        .copied()
        .collect::<Vec<_>>();
    if parsed.headers.is_empty() || parsed.rows.is_empty() {
        return Err(PortalError::validation(
            "CSV must have at least a header and one data row",
        ));
    }
    if !missing.is_empty() {
        return Err(PortalError::validation(format!(
            "Missing required columns: {}",
            missing.join(", ")
        )));
    }
    if parsed.rows_dropped > 0 {
        warn!(
            dropped = parsed.rows_dropped,
            "csv rows with a mismatched column count were skipped"
        );
    }
    Ok(parsed.rows.iter().map(ImportRecord::from_row).collect())
}

pub fn validate_records(records: &[ImportRecord]) -> Result<()> {
    if records.is_empty() {
        return Err(PortalError::validation("Members array is required"));
    }
    if let Some(i) = records.iter().position(|r| !r.is_complete()) {
        return Err(PortalError::validation(format!(
            "Each member must have organization_name, school_name, member_name, and submission_url (record {})",
            i + 1
        )));
    }
    Ok(())
}

/// Runs one chunk through resolve -> reconcile -> persist inside a single
/// store transaction. Any failure rolls back everything the chunk wrote,
/// including organizations and schools it created.
pub fn import_records(
    store: &mut dyn Store,
    records: &[ImportRecord],
    opts: &ImportOptions,
) -> Result<ImportOutcome> {
    validate_records(records)?;

    store.begin()?;
    let outcome = match run(store, records, opts) {
        Ok(v) => v,
        Err(e) => {
            if let Err(rb) = store.rollback() {
                warn!(error = %rb, "rollback after failed import chunk");
            }
            return Err(e);
        }
    };
    if let Err(e) = store.commit() {
        let _ = store.rollback();
        return Err(e.into());
    }

    info!(
        records = records.len(),
        policy = opts.policy.as_str(),
        organizations_created = outcome.stats.organizations_created,
        schools_created = outcome.stats.schools_created,
        members_created = outcome.stats.members_created,
        duplicates_skipped = outcome.stats.duplicates_skipped,
        duplicates_updated = outcome.stats.duplicates_updated,
        "import chunk committed"
    );
    Ok(outcome)
}

fn run(
    store: &mut dyn Store,
    records: &[ImportRecord],
    opts: &ImportOptions,
) -> Result<ImportOutcome> {
    let resolution = resolve_entities(store, records, opts.lookup_batch_size)?;
    let resolved = records
        .iter()
        .map(|r| resolution.resolve(r))
        .collect::<Result<Vec<_>>>()?;

    let plan = reconcile(store, &resolved, opts.policy, opts.lookup_batch_size)?;

    let inserted = store.insert_members(&plan.to_insert)?;
    let mut ids = inserted.iter().map(|m| m.id.clone()).collect::<Vec<_>>();
    for u in &plan.to_update {
        let updated = store
            .set_submission_url(&u.member_id, &u.submission_url)?
            .ok_or_else(|| {
                PortalError::Resolution(format!("member {} disappeared during import", u.member_id))
            })?;
        ids.push(updated.id);
    }
    let data = store.members_by_id(&ids)?;

    let stats = ImportStats {
        organizations_created: resolution.organizations_created,
        schools_created: resolution.schools_created,
        members_created: inserted.len(),
        duplicates_skipped: plan.duplicates_skipped,
        duplicates_updated: plan.duplicates_updated,
    };
    Ok(ImportOutcome {
        message: format!("{} members processed successfully", data.len()),
        data,
        stats,
    })
}
