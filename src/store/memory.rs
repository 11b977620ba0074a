//! In-process fake used by unit tests of the import pipeline.

use super::{
    new_id, now_timestamp, Member, MemberDetail, MemberFilter, NewMember, NewSchool,
    Organization, OrganizationRef, School, SchoolDetail, SchoolRef, Store, StoreError,
};
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
struct Tables {
    organizations: Vec<Organization>,
    schools: Vec<School>,
    members: Vec<Member>,
    settings: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Tables,
    snapshot: Option<Tables>,
    /// Number of bulk reads issued, so tests can check lookup chunking.
    pub reads: std::cell::Cell<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn organizations(&self) -> &[Organization] {
        &self.tables.organizations
    }

    pub fn schools(&self) -> &[School] {
        &self.tables.schools
    }

    pub fn members(&self) -> &[Member] {
        &self.tables.members
    }

    fn count_read(&self) {
        self.reads.set(self.reads.get() + 1);
    }

    fn org_name(&self, id: &str) -> String {
        self.tables
            .organizations
            .iter()
            .find(|o| o.id == id)
            .map(|o| o.name.clone())
            .unwrap_or_default()
    }

    fn school_detail(&self, s: &School) -> SchoolDetail {
        SchoolDetail {
            school: s.clone(),
            organization: OrganizationRef {
                id: s.organization_id.clone(),
                name: self.org_name(&s.organization_id),
            },
        }
    }

    fn member_detail(&self, m: &Member) -> Option<MemberDetail> {
        let school = self.tables.schools.iter().find(|s| s.id == m.school_id)?;
        Some(MemberDetail {
            member: m.clone(),
            school: SchoolRef {
                id: school.id.clone(),
                name: school.name.clone(),
                organization: OrganizationRef {
                    id: school.organization_id.clone(),
                    name: self.org_name(&school.organization_id),
                },
            },
        })
    }

    fn school_name_taken(&self, organization_id: &str, name: &str, except: Option<&str>) -> bool {
        self.tables.schools.iter().any(|s| {
            s.organization_id == organization_id && s.name == name && Some(s.id.as_str()) != except
        })
    }
}

impl Store for MemoryStore {
    fn begin(&mut self) -> Result<(), StoreError> {
        self.snapshot = Some(self.tables.clone());
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        self.snapshot = None;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), StoreError> {
        if let Some(t) = self.snapshot.take() {
            self.tables = t;
        }
        Ok(())
    }

    fn list_organizations(&self) -> Result<Vec<Organization>, StoreError> {
        let mut out = self.tables.organizations.clone();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    fn get_organization(&self, id: &str) -> Result<Option<Organization>, StoreError> {
        Ok(self.tables.organizations.iter().find(|o| o.id == id).cloned())
    }

    fn find_organizations_by_name(
        &self,
        names: &[String],
    ) -> Result<Vec<Organization>, StoreError> {
        self.count_read();
        Ok(self
            .tables
            .organizations
            .iter()
            .filter(|o| names.contains(&o.name))
            .cloned()
            .collect())
    }

    fn insert_organizations(&mut self, names: &[String]) -> Result<Vec<Organization>, StoreError> {
        let now = now_timestamp();
        let mut created = Vec::new();
        for name in names {
            if self.tables.organizations.iter().any(|o| &o.name == name) {
                continue;
            }
            let org = Organization {
                id: new_id(),
                name: name.clone(),
                created_at: now.clone(),
            };
            self.tables.organizations.push(org.clone());
            created.push(org);
        }
        Ok(created)
    }

    fn create_organization(&mut self, name: &str) -> Result<Organization, StoreError> {
        let mut created = self.insert_organizations(&[name.to_string()])?;
        created
            .pop()
            .ok_or_else(|| StoreError::Conflict(format!("organization {name}")))
    }

    fn rename_organization(
        &mut self,
        id: &str,
        name: &str,
    ) -> Result<Option<Organization>, StoreError> {
        if self
            .tables
            .organizations
            .iter()
            .any(|o| o.name == name && o.id != id)
        {
            return Err(StoreError::Conflict(format!("organization {name}")));
        }
        let Some(org) = self.tables.organizations.iter_mut().find(|o| o.id == id) else {
            return Ok(None);
        };
        org.name = name.to_string();
        Ok(Some(org.clone()))
    }

    fn delete_organization(&mut self, id: &str) -> Result<bool, StoreError> {
        let before = self.tables.organizations.len();
        self.tables.organizations.retain(|o| o.id != id);
        self.tables.schools.retain(|s| s.organization_id != id);
        self.tables.members.retain(|m| m.organization_id != id);
        Ok(self.tables.organizations.len() != before)
    }

    fn list_schools(&self, organization_id: Option<&str>) -> Result<Vec<SchoolDetail>, StoreError> {
        let mut out = self
            .tables
            .schools
            .iter()
            .filter(|s| organization_id.map_or(true, |o| s.organization_id == o))
            .map(|s| self.school_detail(s))
            .collect::<Vec<_>>();
        out.sort_by(|a, b| a.school.name.cmp(&b.school.name));
        Ok(out)
    }

    fn get_school(&self, id: &str) -> Result<Option<SchoolDetail>, StoreError> {
        Ok(self
            .tables
            .schools
            .iter()
            .find(|s| s.id == id)
            .map(|s| self.school_detail(s)))
    }

    fn find_schools_by_name(
        &self,
        organization_id: &str,
        names: &[String],
    ) -> Result<Vec<School>, StoreError> {
        self.count_read();
        Ok(self
            .tables
            .schools
            .iter()
            .filter(|s| s.organization_id == organization_id && names.contains(&s.name))
            .cloned()
            .collect())
    }

    fn insert_schools(&mut self, schools: &[NewSchool]) -> Result<Vec<School>, StoreError> {
        let now = now_timestamp();
        let mut created = Vec::new();
        for s in schools {
            if self.school_name_taken(&s.organization_id, &s.name, None) {
                continue;
            }
            let row = School {
                id: new_id(),
                name: s.name.clone(),
                organization_id: s.organization_id.clone(),
                created_at: now.clone(),
            };
            self.tables.schools.push(row.clone());
            created.push(row);
        }
        Ok(created)
    }

    fn create_school(&mut self, school: &NewSchool) -> Result<School, StoreError> {
        let mut created = self.insert_schools(std::slice::from_ref(school))?;
        created
            .pop()
            .ok_or_else(|| StoreError::Conflict(format!("school {}", school.name)))
    }

    fn update_school(
        &mut self,
        id: &str,
        school: &NewSchool,
    ) -> Result<Option<School>, StoreError> {
        if self.school_name_taken(&school.organization_id, &school.name, Some(id)) {
            return Err(StoreError::Conflict(format!("school {}", school.name)));
        }
        let Some(row) = self.tables.schools.iter_mut().find(|s| s.id == id) else {
            return Ok(None);
        };
        row.name = school.name.clone();
        row.organization_id = school.organization_id.clone();
        let updated = row.clone();
        for m in self.tables.members.iter_mut().filter(|m| m.school_id == id) {
            m.organization_id = school.organization_id.clone();
        }
        Ok(Some(updated))
    }

    fn delete_school(&mut self, id: &str) -> Result<bool, StoreError> {
        let before = self.tables.schools.len();
        self.tables.schools.retain(|s| s.id != id);
        self.tables.members.retain(|m| m.school_id != id);
        Ok(self.tables.schools.len() != before)
    }

    fn list_members(&self, filter: &MemberFilter) -> Result<Vec<MemberDetail>, StoreError> {
        let term = filter
            .search
            .as_deref()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty());
        let mut out = self
            .tables
            .members
            .iter()
            .filter(|m| filter.school_id.as_deref().map_or(true, |s| m.school_id == s))
            .filter(|m| {
                term.as_deref()
                    .map_or(true, |t| m.name.to_lowercase().contains(t))
            })
            .filter_map(|m| self.member_detail(m))
            .collect::<Vec<_>>();
        out.sort_by(|a, b| a.member.name.cmp(&b.member.name));
        if let Some(limit) = filter.limit {
            out.truncate(limit);
        }
        Ok(out)
    }

    fn get_member(&self, id: &str) -> Result<Option<MemberDetail>, StoreError> {
        Ok(self
            .tables
            .members
            .iter()
            .find(|m| m.id == id)
            .and_then(|m| self.member_detail(m)))
    }

    fn members_by_id(&self, ids: &[String]) -> Result<Vec<MemberDetail>, StoreError> {
        let mut out = Vec::new();
        for id in ids {
            if let Some(d) = self.get_member(id)? {
                out.push(d);
            }
        }
        Ok(out)
    }

    fn find_members_by_name(
        &self,
        school_id: &str,
        names: &[String],
    ) -> Result<Vec<Member>, StoreError> {
        self.count_read();
        Ok(self
            .tables
            .members
            .iter()
            .filter(|m| m.school_id == school_id && names.contains(&m.name))
            .cloned()
            .collect())
    }

    fn insert_members(&mut self, members: &[NewMember]) -> Result<Vec<Member>, StoreError> {
        let now = now_timestamp();
        let mut inserted = Vec::with_capacity(members.len());
        for m in members {
            let row = Member {
                id: new_id(),
                name: m.name.clone(),
                school_id: m.school_id.clone(),
                organization_id: m.organization_id.clone(),
                submission_url: m.submission_url.clone(),
                created_at: now.clone(),
            };
            self.tables.members.push(row.clone());
            inserted.push(row);
        }
        Ok(inserted)
    }

    fn update_member(
        &mut self,
        id: &str,
        member: &NewMember,
    ) -> Result<Option<Member>, StoreError> {
        let Some(row) = self.tables.members.iter_mut().find(|m| m.id == id) else {
            return Ok(None);
        };
        row.name = member.name.clone();
        row.school_id = member.school_id.clone();
        row.organization_id = member.organization_id.clone();
        row.submission_url = member.submission_url.clone();
        Ok(Some(row.clone()))
    }

    fn set_submission_url(&mut self, id: &str, url: &str) -> Result<Option<Member>, StoreError> {
        let Some(row) = self.tables.members.iter_mut().find(|m| m.id == id) else {
            return Ok(None);
        };
        row.submission_url = url.to_string();
        Ok(Some(row.clone()))
    }

    fn delete_member(&mut self, id: &str) -> Result<bool, StoreError> {
        let before = self.tables.members.len();
        self.tables.members.retain(|m| m.id != id);
        Ok(self.tables.members.len() != before)
    }

    fn setting(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError> {
        Ok(self.tables.settings.get(key).cloned())
    }

    fn set_setting(&mut self, key: &str, value: &serde_json::Value) -> Result<(), StoreError> {
        self.tables.settings.insert(key.to_string(), value.clone());
        Ok(())
    }
}
