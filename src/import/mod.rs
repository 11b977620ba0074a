//! Bulk member import: CSV parsing, organization/school resolution,
//! duplicate reconciliation and the per-chunk pipeline that ties them
//! together.

pub mod chunked;
pub mod parser;
pub mod pipeline;
pub mod reconciler;
pub mod resolver;

use crate::error::PortalError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

pub use chunked::import_in_chunks;
pub use pipeline::{import_records, records_from_csv, ImportOptions};

/// CSV columns every import file must carry.
pub const REQUIRED_COLUMNS: [&str; 4] = ["organization", "school", "member_name", "submission_url"];

/// One member row as supplied by the caller, before any ids are known.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct ImportRecord {
    #[serde(default)]
    pub organization_name: String,
    #[serde(default)]
    pub school_name: String,
    #[serde(default)]
    pub member_name: String,
    #[serde(default)]
    pub submission_url: String,
}

impl ImportRecord {
    /// Maps a parsed CSV row (keyed by normalized header) onto a record.
    pub fn from_row(row: &HashMap<String, String>) -> Self {
        let field = |k: &str| row.get(k).cloned().unwrap_or_default();
        Self {
            organization_name: field("organization"),
            school_name: field("school"),
            member_name: field("member_name"),
            submission_url: field("submission_url"),
        }
    }

    fn is_complete(&self) -> bool {
        [
            &self.organization_name,
            &self.school_name,
            &self.member_name,
            &self.submission_url,
        ]
        .iter()
        .all(|v| !v.trim().is_empty())
    }
}

/// What to do when an imported member already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    #[default]
    Skip,
    Update,
    Error,
}

impl DuplicatePolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            DuplicatePolicy::Skip => "skip",
            DuplicatePolicy::Update => "update",
            DuplicatePolicy::Error => "error",
        }
    }
}

impl FromStr for DuplicatePolicy {
    type Err = PortalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "skip" => Ok(DuplicatePolicy::Skip),
            "update" => Ok(DuplicatePolicy::Update),
            "error" => Ok(DuplicatePolicy::Error),
            _ => Err(PortalError::validation(
                "Invalid duplicateHandling option. Must be skip, update, or error",
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportStats {
    pub organizations_created: usize,
    pub schools_created: usize,
    pub members_created: usize,
    pub duplicates_skipped: usize,
    pub duplicates_updated: usize,
}

impl ImportStats {
    pub fn absorb(&mut self, other: &ImportStats) {
        self.organizations_created += other.organizations_created;
        self.schools_created += other.schools_created;
        self.members_created += other.members_created;
        self.duplicates_skipped += other.duplicates_skipped;
        self.duplicates_updated += other.duplicates_updated;
    }
}
