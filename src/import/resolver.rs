use super::ImportRecord;
use crate::error::{PortalError, Result};
use crate::store::{NewSchool, Store};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Schools are unique by name within an organization, not globally.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SchoolKey {
    pub organization_id: String,
    pub name: String,
}

impl SchoolKey {
    fn new(organization_id: &str, name: &str) -> Self {
        Self {
            organization_id: organization_id.to_string(),
            name: name.to_string(),
        }
    }
}

/// An import record with its organization and school turned into ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMember {
    pub name: String,
    pub school_id: String,
    pub organization_id: String,
    pub submission_url: String,
    pub organization_name: String,
    pub school_name: String,
}

#[derive(Debug, Default)]
pub struct Resolution {
    pub organizations: HashMap<String, String>,
    pub schools: HashMap<SchoolKey, String>,
    pub organizations_created: usize,
    pub schools_created: usize,
}

impl Resolution {
    pub fn resolve(&self, record: &ImportRecord) -> Result<ResolvedMember> {
        let unresolved = || {
            PortalError::Resolution(format!(
                "Failed to resolve organization or school for member: {}",
                record.member_name
            ))
        };
        let organization_id = self
            .organizations
            .get(&record.organization_name)
            .ok_or_else(unresolved)?;
        let school_id = self
            .schools
            .get(&SchoolKey::new(organization_id, &record.school_name))
            .ok_or_else(unresolved)?;
        Ok(ResolvedMember {
            name: record.member_name.clone(),
            school_id: school_id.clone(),
            organization_id: organization_id.clone(),
            submission_url: record.submission_url.clone(),
            organization_name: record.organization_name.clone(),
            school_name: record.school_name.clone(),
        })
    }
}

fn distinct<'a>(items: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .filter(|s| seen.insert(*s))
        .map(str::to_string)
        .collect()
}

fn fetch_organizations(
    store: &dyn Store,
    names: &[String],
    batch_size: usize,
    into: &mut HashMap<String, String>,
) -> Result<()> {
    for chunk in names.chunks(batch_size) {
        for org in store.find_organizations_by_name(chunk)? {
            into.insert(org.name, org.id);
        }
    }
    Ok(())
}

fn fetch_schools(
    store: &dyn Store,
    organization_id: &str,
    names: &[String],
    batch_size: usize,
    into: &mut HashMap<SchoolKey, String>,
) -> Result<()> {
    for chunk in names.chunks(batch_size) {
        for school in store.find_schools_by_name(organization_id, chunk)? {
            into.insert(SchoolKey::new(&school.organization_id, &school.name), school.id);
        }
    }
    Ok(())
}

/// Finds or creates every organization and school named in `records`.
///
/// Lookups are issued in chunks of at most `batch_size` names. Creation is
/// insert-if-absent: a name that another writer created in the meantime is
/// simply re-fetched, and only rows this call actually inserted are counted.
pub fn resolve_entities(
    store: &mut dyn Store,
    records: &[ImportRecord],
    batch_size: usize,
) -> Result<Resolution> {
    let batch_size = batch_size.max(1);
    let mut resolution = Resolution::default();

    let org_names = distinct(records.iter().map(|r| r.organization_name.as_str()));
    fetch_organizations(store, &org_names, batch_size, &mut resolution.organizations)?;

    let missing_orgs = org_names
        .iter()
        .filter(|n| !resolution.organizations.contains_key(*n))
        .cloned()
        .collect::<Vec<_>>();
    if !missing_orgs.is_empty() {
        let created = store.insert_organizations(&missing_orgs)?;
        resolution.organizations_created = created.len();
        for org in created {
            resolution.organizations.insert(org.name, org.id);
        }
        let raced = missing_orgs
            .into_iter()
            .filter(|n| !resolution.organizations.contains_key(n))
            .collect::<Vec<_>>();
        if !raced.is_empty() {
            debug!(count = raced.len(), "organizations created concurrently; re-fetching");
            fetch_organizations(store, &raced, batch_size, &mut resolution.organizations)?;
        }
    }

    // School names grouped per organization, in first-appearance order.
    let mut per_org: Vec<(String, Vec<String>)> = Vec::new();
    let mut seen_pairs = HashSet::new();
    for r in records {
        let Some(org_id) = resolution.organizations.get(&r.organization_name) else {
            return Err(PortalError::Resolution(format!(
                "Failed to resolve organization: {}",
                r.organization_name
            )));
        };
        if !seen_pairs.insert((org_id.as_str(), r.school_name.as_str())) {
            continue;
        }
        match per_org.iter_mut().find(|(id, _)| id == org_id) {
            Some((_, names)) => names.push(r.school_name.clone()),
            None => per_org.push((org_id.clone(), vec![r.school_name.clone()])),
        }
    }

    for (org_id, names) in &per_org {
        fetch_schools(store, org_id, names, batch_size, &mut resolution.schools)?;
    }

    let missing_schools = per_org
        .iter()
        .flat_map(|(org_id, names)| {
            names.iter().map(move |n| NewSchool {
                name: n.clone(),
                organization_id: org_id.clone(),
            })
        })
        .filter(|s| {
            !resolution
                .schools
                .contains_key(&SchoolKey::new(&s.organization_id, &s.name))
        })
        .collect::<Vec<_>>();
    if !missing_schools.is_empty() {
        let created = store.insert_schools(&missing_schools)?;
        resolution.schools_created = created.len();
        for school in created {
            resolution
                .schools
                .insert(SchoolKey::new(&school.organization_id, &school.name), school.id);
        }
        for s in missing_schools {
            if !resolution
                .schools
                .contains_key(&SchoolKey::new(&s.organization_id, &s.name))
            {
                fetch_schools(
                    store,
                    &s.organization_id,
                    std::slice::from_ref(&s.name),
                    batch_size,
                    &mut resolution.schools,
                )?;
            }
        }
    }

    debug!(
        organizations = resolution.organizations.len(),
        schools = resolution.schools.len(),
        organizations_created = resolution.organizations_created,
        schools_created = resolution.schools_created,
        "resolved import entities"
    );
    Ok(resolution)
}
