//! Access to the organizations / schools / members tables.
//!
//! Handlers and the import pipeline never touch a connection directly; they
//! receive a `&mut dyn Store` for the workspace selected by the request loop.
//! `SqliteStore` is the production implementation and `MemoryStore` is the
//! fake used by unit tests.

#[cfg(test)]
pub mod memory;
pub mod sqlite;

use serde::Serialize;

pub use sqlite::SqliteStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A uniqueness constraint rejected the write.
    #[error("duplicate key: {0}")]
    Conflict(String),

    #[error("stored value is not valid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to open workspace database: {0:#}")]
    Open(anyhow::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Organization {
    pub id: String,
    pub name: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct School {
    pub id: String,
    pub name: String,
    pub organization_id: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Member {
    pub id: String,
    pub name: String,
    pub school_id: String,
    pub organization_id: String,
    pub submission_url: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrganizationRef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchoolRef {
    pub id: String,
    pub name: String,
    pub organization: OrganizationRef,
}

/// A school together with its owning organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchoolDetail {
    #[serde(flatten)]
    pub school: School,
    pub organization: OrganizationRef,
}

/// A member enriched with its school and organization for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberDetail {
    #[serde(flatten)]
    pub member: Member,
    pub school: SchoolRef,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSchool {
    pub name: String,
    pub organization_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMember {
    pub name: String,
    pub school_id: String,
    pub organization_id: String,
    pub submission_url: String,
}

#[derive(Debug, Clone, Default)]
pub struct MemberFilter {
    pub school_id: Option<String>,
    /// Case-insensitive substring of the member name.
    pub search: Option<String>,
    pub limit: Option<usize>,
}

pub trait Store {
    fn begin(&mut self) -> Result<(), StoreError>;
    fn commit(&mut self) -> Result<(), StoreError>;
    fn rollback(&mut self) -> Result<(), StoreError>;

    fn list_organizations(&self) -> Result<Vec<Organization>, StoreError>;
    fn get_organization(&self, id: &str) -> Result<Option<Organization>, StoreError>;
    fn find_organizations_by_name(&self, names: &[String])
        -> Result<Vec<Organization>, StoreError>;
    /// Insert-if-absent. Returns only the rows that were actually created;
    /// names that already existed are left for the caller to re-fetch.
    fn insert_organizations(&mut self, names: &[String]) -> Result<Vec<Organization>, StoreError>;
    /// Strict insert; an existing name is a `Conflict`.
    fn create_organization(&mut self, name: &str) -> Result<Organization, StoreError>;
    fn rename_organization(
        &mut self,
        id: &str,
        name: &str,
    ) -> Result<Option<Organization>, StoreError>;
    /// Cascades to the organization's schools and members.
    fn delete_organization(&mut self, id: &str) -> Result<bool, StoreError>;

    fn list_schools(&self, organization_id: Option<&str>) -> Result<Vec<SchoolDetail>, StoreError>;
    fn get_school(&self, id: &str) -> Result<Option<SchoolDetail>, StoreError>;
    fn find_schools_by_name(
        &self,
        organization_id: &str,
        names: &[String],
    ) -> Result<Vec<School>, StoreError>;
    /// Insert-if-absent keyed by (organization_id, name); returns created rows only.
    fn insert_schools(&mut self, schools: &[NewSchool]) -> Result<Vec<School>, StoreError>;
    fn create_school(&mut self, school: &NewSchool) -> Result<School, StoreError>;
    /// Moving a school to another organization also rewrites the
    /// organization_id of every member of that school.
    fn update_school(&mut self, id: &str, school: &NewSchool)
        -> Result<Option<School>, StoreError>;
    /// Cascades to the school's members.
    fn delete_school(&mut self, id: &str) -> Result<bool, StoreError>;

    fn list_members(&self, filter: &MemberFilter) -> Result<Vec<MemberDetail>, StoreError>;
    fn get_member(&self, id: &str) -> Result<Option<MemberDetail>, StoreError>;
    /// Enriched members for `ids`, in the order given. Unknown ids are skipped.
    fn members_by_id(&self, ids: &[String]) -> Result<Vec<MemberDetail>, StoreError>;
    fn find_members_by_name(
        &self,
        school_id: &str,
        names: &[String],
    ) -> Result<Vec<Member>, StoreError>;
    fn insert_members(&mut self, members: &[NewMember]) -> Result<Vec<Member>, StoreError>;
    fn update_member(&mut self, id: &str, member: &NewMember)
        -> Result<Option<Member>, StoreError>;
    fn set_submission_url(&mut self, id: &str, url: &str) -> Result<Option<Member>, StoreError>;
    fn delete_member(&mut self, id: &str) -> Result<bool, StoreError>;

    fn setting(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError>;
    fn set_setting(&mut self, key: &str, value: &serde_json::Value) -> Result<(), StoreError>;
}

pub(crate) fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
