use super::resolver::ResolvedMember;
use super::DuplicatePolicy;
use crate::error::{PortalError, Result};
use crate::store::{Member, NewMember, Store};
use std::collections::{HashMap, HashSet};

/// Natural key used to detect an already-imported member.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemberKey {
    pub name: String,
    pub school_id: String,
    pub organization_id: String,
}

impl From<&ResolvedMember> for MemberKey {
    fn from(m: &ResolvedMember) -> Self {
        Self {
            name: m.name.clone(),
            school_id: m.school_id.clone(),
            organization_id: m.organization_id.clone(),
        }
    }
}

impl From<&Member> for MemberKey {
    fn from(m: &Member) -> Self {
        Self {
            name: m.name.clone(),
            school_id: m.school_id.clone(),
            organization_id: m.organization_id.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingUpdate {
    pub member_id: String,
    pub submission_url: String,
}

#[derive(Debug, Default)]
pub struct Reconciliation {
    pub to_insert: Vec<NewMember>,
    pub to_update: Vec<PendingUpdate>,
    pub duplicates_skipped: usize,
    pub duplicates_updated: usize,
}

fn violation(m: &ResolvedMember) -> PortalError {
    PortalError::PolicyViolation {
        member: m.name.clone(),
        organization: m.organization_name.clone(),
        school: m.school_name.clone(),
    }
}

/// Existing members matching the batch, keyed by natural key. Reads are
/// grouped per school and chunked to at most `batch_size` names.
fn existing_members(
    store: &dyn Store,
    batch: &[ResolvedMember],
    batch_size: usize,
) -> Result<HashMap<MemberKey, Member>> {
    let mut per_school: Vec<(&str, Vec<String>)> = Vec::new();
    let mut seen = HashSet::new();
    for m in batch {
        if !seen.insert((m.school_id.as_str(), m.name.as_str())) {
            continue;
        }
        match per_school.iter_mut().find(|(id, _)| *id == m.school_id) {
            Some((_, names)) => names.push(m.name.clone()),
            None => per_school.push((m.school_id.as_str(), vec![m.name.clone()])),
        }
    }

    let mut existing = HashMap::new();
    for (school_id, names) in per_school {
        for chunk in names.chunks(batch_size.max(1)) {
            for member in store.find_members_by_name(school_id, chunk)? {
                // Oldest row wins when the store already holds duplicates.
                existing.entry(MemberKey::from(&member)).or_insert(member);
            }
        }
    }
    Ok(existing)
}

/// Splits `batch` into inserts, URL updates and skips according to `policy`.
///
/// Under `DuplicatePolicy::Error` the first collision aborts with a
/// `PolicyViolation` and nothing is returned for the batch. A key repeated
/// within the batch collides with its first occurrence the same way.
pub fn reconcile(
    store: &dyn Store,
    batch: &[ResolvedMember],
    policy: DuplicatePolicy,
    batch_size: usize,
) -> Result<Reconciliation> {
    let existing = existing_members(store, batch, batch_size)?;

    let mut out = Reconciliation::default();
    let mut pending_insert: HashMap<MemberKey, usize> = HashMap::new();
    let mut pending_update: HashMap<String, usize> = HashMap::new();

    for m in batch {
        let key = MemberKey::from(m);
        if let Some(found) = existing.get(&key) {
            match policy {
                DuplicatePolicy::Error => return Err(violation(m)),
                DuplicatePolicy::Skip => out.duplicates_skipped += 1,
                DuplicatePolicy::Update => {
                    out.duplicates_updated += 1;
                    match pending_update.get(&found.id) {
                        Some(&i) => out.to_update[i].submission_url = m.submission_url.clone(),
                        None => {
                            pending_update.insert(found.id.clone(), out.to_update.len());
                            out.to_update.push(PendingUpdate {
                                member_id: found.id.clone(),
                                submission_url: m.submission_url.clone(),
                            });
                        }
                    }
                }
            }
            continue;
        }

        if let Some(&i) = pending_insert.get(&key) {
            match policy {
                DuplicatePolicy::Error => return Err(violation(m)),
                DuplicatePolicy::Skip => out.duplicates_skipped += 1,
                DuplicatePolicy::Update => {
                    out.duplicates_updated += 1;
                    out.to_insert[i].submission_url = m.submission_url.clone();
                }
            }
            continue;
        }

        pending_insert.insert(key, out.to_insert.len());
        out.to_insert.push(NewMember {
            name: m.name.clone(),
            school_id: m.school_id.clone(),
            organization_id: m.organization_id.clone(),
            submission_url: m.submission_url.clone(),
        });
    }
    Ok(out)
}
