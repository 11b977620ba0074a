use super::pipeline::{import_records, ImportOptions};
use super::{ImportRecord, ImportStats};
use crate::error::{PortalError, Result};
use crate::store::Store;
use serde::Serialize;
use tracing::warn;

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkedReport {
    pub chunks_total: usize,
    pub chunks_failed: usize,
    pub members_processed: usize,
    pub stats: ImportStats,
    /// One `Chunk N: <message>` entry per failed chunk.
    pub errors: Vec<String>,
}

/// Imports `records` in consecutive chunks of `chunk_size`, one transaction
/// per chunk. A failed chunk is reported and skipped; chunks already
/// committed stay committed.
pub fn import_in_chunks(
    store: &mut dyn Store,
    records: &[ImportRecord],
    opts: &ImportOptions,
    chunk_size: usize,
) -> Result<ChunkedReport> {
    if records.is_empty() {
        return Err(PortalError::validation("Members array is required"));
    }

    let mut report = ChunkedReport::default();
    for (i, chunk) in records.chunks(chunk_size.max(1)).enumerate() {
        report.chunks_total += 1;
        match import_records(store, chunk, opts) {
            Ok(outcome) => {
                report.members_processed += outcome.data.len();
                report.stats.absorb(&outcome.stats);
            }
            Err(e) => {
                warn!(chunk = i + 1, code = e.code(), error = %e, "import chunk failed");
                report.chunks_failed += 1;
                report.errors.push(format!("Chunk {}: {}", i + 1, e));
            }
        }
    }
    Ok(report)
}
