use super::{
    new_id, now_timestamp, Member, MemberDetail, MemberFilter, NewMember, NewSchool,
    Organization, OrganizationRef, School, SchoolDetail, SchoolRef, Store, StoreError,
};
use crate::db;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::path::Path;

const MEMBER_DETAIL_SELECT: &str = "SELECT
       m.id, m.name, m.school_id, m.organization_id, m.submission_url, m.created_at,
       s.name, o.id, o.name
     FROM members m
     JOIN schools s ON s.id = m.school_id
     JOIN organizations o ON o.id = s.organization_id";

const SCHOOL_DETAIL_SELECT: &str = "SELECT s.id, s.name, s.organization_id, s.created_at, o.name
     FROM schools s
     JOIN organizations o ON o.id = s.organization_id";

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(workspace: &Path) -> anyhow::Result<Self> {
        Ok(Self {
            conn: db::open_db(workspace)?,
        })
    }

    pub fn open_in_memory() -> anyhow::Result<Self> {
        Ok(Self {
            conn: db::open_in_memory()?,
        })
    }
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

fn text_values(items: &[String]) -> impl Iterator<Item = Value> + '_ {
    items.iter().map(|s| Value::Text(s.clone()))
}

fn unique_conflict(e: rusqlite::Error, what: impl FnOnce() -> String) -> StoreError {
    match &e {
        rusqlite::Error::SqliteFailure(f, _)
            if f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            StoreError::Conflict(what())
        }
        _ => StoreError::Sqlite(e),
    }
}

fn organization_from_row(row: &Row<'_>) -> rusqlite::Result<Organization> {
    Ok(Organization {
        id: row.get(0)?,
        name: row.get(1)?,
        created_at: row.get(2)?,
    })
}

fn school_from_row(row: &Row<'_>) -> rusqlite::Result<School> {
    Ok(School {
        id: row.get(0)?,
        name: row.get(1)?,
        organization_id: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn school_detail_from_row(row: &Row<'_>) -> rusqlite::Result<SchoolDetail> {
    let school = school_from_row(row)?;
    let organization = OrganizationRef {
        id: school.organization_id.clone(),
        name: row.get(4)?,
    };
    Ok(SchoolDetail {
        school,
        organization,
    })
}

fn member_from_row(row: &Row<'_>) -> rusqlite::Result<Member> {
    Ok(Member {
        id: row.get(0)?,
        name: row.get(1)?,
        school_id: row.get(2)?,
        organization_id: row.get(3)?,
        submission_url: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn member_detail_from_row(row: &Row<'_>) -> rusqlite::Result<MemberDetail> {
    let member = member_from_row(row)?;
    let school = SchoolRef {
        id: member.school_id.clone(),
        name: row.get(6)?,
        organization: OrganizationRef {
            id: row.get(7)?,
            name: row.get(8)?,
        },
    };
    Ok(MemberDetail { member, school })
}

impl SqliteStore {
    fn select_member(&self, id: &str) -> Result<Option<Member>, StoreError> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, name, school_id, organization_id, submission_url, created_at
                 FROM members WHERE id = ?",
                [id],
                member_from_row,
            )
            .optional()?)
    }
}

impl Store for SqliteStore {
    fn begin(&mut self) -> Result<(), StoreError> {
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), StoreError> {
        self.conn.execute_batch("ROLLBACK")?;
        Ok(())
    }

    fn list_organizations(&self) -> Result<Vec<Organization>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, created_at FROM organizations ORDER BY name")?;
        let rows = stmt
            .query_map([], organization_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn get_organization(&self, id: &str) -> Result<Option<Organization>, StoreError> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, name, created_at FROM organizations WHERE id = ?",
                [id],
                organization_from_row,
            )
            .optional()?)
    }

    fn find_organizations_by_name(
        &self,
        names: &[String],
    ) -> Result<Vec<Organization>, StoreError> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT id, name, created_at FROM organizations WHERE name IN ({})",
            placeholders(names.len())
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(text_values(names)), organization_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn insert_organizations(&mut self, names: &[String]) -> Result<Vec<Organization>, StoreError> {
        let now = now_timestamp();
        let mut stmt = self.conn.prepare(
            "INSERT INTO organizations(id, name, created_at) VALUES(?, ?, ?)
             ON CONFLICT(name) DO NOTHING",
        )?;
        let mut created = Vec::new();
        for name in names {
            let id = new_id();
            if stmt.execute((&id, name, &now))? == 1 {
                created.push(Organization {
                    id,
                    name: name.clone(),
                    created_at: now.clone(),
                });
            }
        }
        Ok(created)
    }

    fn create_organization(&mut self, name: &str) -> Result<Organization, StoreError> {
        let org = Organization {
            id: new_id(),
            name: name.to_string(),
            created_at: now_timestamp(),
        };
        self.conn
            .execute(
                "INSERT INTO organizations(id, name, created_at) VALUES(?, ?, ?)",
                (&org.id, &org.name, &org.created_at),
            )
            .map_err(|e| unique_conflict(e, || format!("organization {name}")))?;
        Ok(org)
    }

    fn rename_organization(
        &mut self,
        id: &str,
        name: &str,
    ) -> Result<Option<Organization>, StoreError> {
        let changed = self
            .conn
            .execute("UPDATE organizations SET name = ? WHERE id = ?", (name, id))
            .map_err(|e| unique_conflict(e, || format!("organization {name}")))?;
        if changed == 0 {
            return Ok(None);
        }
        self.get_organization(id)
    }

    fn delete_organization(&mut self, id: &str) -> Result<bool, StoreError> {
        let changed = self
            .conn
            .execute("DELETE FROM organizations WHERE id = ?", [id])?;
        Ok(changed > 0)
    }

    fn list_schools(&self, organization_id: Option<&str>) -> Result<Vec<SchoolDetail>, StoreError> {
        let mut sql = SCHOOL_DETAIL_SELECT.to_string();
        let mut bind_values: Vec<Value> = Vec::new();
        if let Some(org_id) = organization_id {
            sql.push_str(" WHERE s.organization_id = ?");
            bind_values.push(Value::Text(org_id.to_string()));
        }
        sql.push_str(" ORDER BY s.name");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(bind_values), school_detail_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn get_school(&self, id: &str) -> Result<Option<SchoolDetail>, StoreError> {
        let sql = format!("{SCHOOL_DETAIL_SELECT} WHERE s.id = ?");
        Ok(self
            .conn
            .query_row(&sql, [id], school_detail_from_row)
            .optional()?)
    }

    fn find_schools_by_name(
        &self,
        organization_id: &str,
        names: &[String],
    ) -> Result<Vec<School>, StoreError> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT id, name, organization_id, created_at
             FROM schools
             WHERE organization_id = ? AND name IN ({})",
            placeholders(names.len())
        );
        let mut bind_values = vec![Value::Text(organization_id.to_string())];
        bind_values.extend(text_values(names));
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(bind_values), school_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn insert_schools(&mut self, schools: &[NewSchool]) -> Result<Vec<School>, StoreError> {
        let now = now_timestamp();
        let mut stmt = self.conn.prepare(
            "INSERT INTO schools(id, name, organization_id, created_at) VALUES(?, ?, ?, ?)
             ON CONFLICT(organization_id, name) DO NOTHING",
        )?;
        let mut created = Vec::new();
        for s in schools {
            let id = new_id();
            if stmt.execute((&id, &s.name, &s.organization_id, &now))? == 1 {
                created.push(School {
                    id,
                    name: s.name.clone(),
                    organization_id: s.organization_id.clone(),
                    created_at: now.clone(),
                });
            }
        }
        Ok(created)
    }

    fn create_school(&mut self, school: &NewSchool) -> Result<School, StoreError> {
        let row = School {
            id: new_id(),
            name: school.name.clone(),
            organization_id: school.organization_id.clone(),
            created_at: now_timestamp(),
        };
        self.conn
            .execute(
                "INSERT INTO schools(id, name, organization_id, created_at) VALUES(?, ?, ?, ?)",
                (&row.id, &row.name, &row.organization_id, &row.created_at),
            )
            .map_err(|e| unique_conflict(e, || format!("school {}", school.name)))?;
        Ok(row)
    }

    fn update_school(
        &mut self,
        id: &str,
        school: &NewSchool,
    ) -> Result<Option<School>, StoreError> {
        let sp = self.conn.savepoint()?;
        let changed = sp
            .execute(
                "UPDATE schools SET name = ?, organization_id = ? WHERE id = ?",
                (&school.name, &school.organization_id, id),
            )
            .map_err(|e| unique_conflict(e, || format!("school {}", school.name)))?;
        if changed == 0 {
            return Ok(None);
        }
        // Members carry a copy of their school's organization.
        sp.execute(
            "UPDATE members SET organization_id = ? WHERE school_id = ?",
            (&school.organization_id, id),
        )?;
        let row = sp.query_row(
            "SELECT id, name, organization_id, created_at FROM schools WHERE id = ?",
            [id],
            school_from_row,
        )?;
        sp.commit()?;
        Ok(Some(row))
    }

    fn delete_school(&mut self, id: &str) -> Result<bool, StoreError> {
        let changed = self.conn.execute("DELETE FROM schools WHERE id = ?", [id])?;
        Ok(changed > 0)
    }

    fn list_members(&self, filter: &MemberFilter) -> Result<Vec<MemberDetail>, StoreError> {
        let mut sql = MEMBER_DETAIL_SELECT.to_string();
        let mut clauses: Vec<&str> = Vec::new();
        let mut bind_values: Vec<Value> = Vec::new();
        if let Some(school_id) = filter.school_id.as_deref() {
            clauses.push("m.school_id = ?");
            bind_values.push(Value::Text(school_id.to_string()));
        }
        if let Some(term) = filter.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            clauses.push("instr(lower(m.name), lower(?)) > 0");
            bind_values.push(Value::Text(term.to_string()));
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY m.name, m.created_at");
        if let Some(limit) = filter.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(limit as i64));
        }
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(bind_values), member_detail_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn get_member(&self, id: &str) -> Result<Option<MemberDetail>, StoreError> {
        let sql = format!("{MEMBER_DETAIL_SELECT} WHERE m.id = ?");
        Ok(self
            .conn
            .query_row(&sql, [id], member_detail_from_row)
            .optional()?)
    }

    fn members_by_id(&self, ids: &[String]) -> Result<Vec<MemberDetail>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "{MEMBER_DETAIL_SELECT} WHERE m.id IN ({})",
            placeholders(ids.len())
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut by_id: HashMap<String, MemberDetail> = stmt
            .query_map(params_from_iter(text_values(ids)), member_detail_from_row)?
            .map(|r| r.map(|d| (d.member.id.clone(), d)))
            .collect::<Result<HashMap<_, _>, _>>()?;
        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    fn find_members_by_name(
        &self,
        school_id: &str,
        names: &[String],
    ) -> Result<Vec<Member>, StoreError> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT id, name, school_id, organization_id, submission_url, created_at
             FROM members
             WHERE school_id = ? AND name IN ({})
             ORDER BY created_at, rowid",
            placeholders(names.len())
        );
        let mut bind_values = vec![Value::Text(school_id.to_string())];
        bind_values.extend(text_values(names));
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(bind_values), member_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn insert_members(&mut self, members: &[NewMember]) -> Result<Vec<Member>, StoreError> {
        let now = now_timestamp();
        let mut stmt = self.conn.prepare(
            "INSERT INTO members(id, name, school_id, organization_id, submission_url, created_at)
             VALUES(?, ?, ?, ?, ?, ?)",
        )?;
        let mut inserted = Vec::with_capacity(members.len());
        for m in members {
            let id = new_id();
            stmt.execute((
                &id,
                &m.name,
                &m.school_id,
                &m.organization_id,
                &m.submission_url,
                &now,
            ))?;
            inserted.push(Member {
                id,
                name: m.name.clone(),
                school_id: m.school_id.clone(),
                organization_id: m.organization_id.clone(),
                submission_url: m.submission_url.clone(),
                created_at: now.clone(),
            });
        }
        Ok(inserted)
    }

    fn update_member(
        &mut self,
        id: &str,
        member: &NewMember,
    ) -> Result<Option<Member>, StoreError> {
        let changed = self.conn.execute(
            "UPDATE members
             SET name = ?, school_id = ?, organization_id = ?, submission_url = ?
             WHERE id = ?",
            (
                &member.name,
                &member.school_id,
                &member.organization_id,
                &member.submission_url,
                id,
            ),
        )?;
        if changed == 0 {
            return Ok(None);
        }
        self.select_member(id)
    }

    fn set_submission_url(&mut self, id: &str, url: &str) -> Result<Option<Member>, StoreError> {
        let changed = self
            .conn
            .execute("UPDATE members SET submission_url = ? WHERE id = ?", (url, id))?;
        if changed == 0 {
            return Ok(None);
        }
        self.select_member(id)
    }

    fn delete_member(&mut self, id: &str) -> Result<bool, StoreError> {
        let changed = self.conn.execute("DELETE FROM members WHERE id = ?", [id])?;
        Ok(changed > 0)
    }

    fn setting(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT value_json FROM settings WHERE key = ?",
                [key],
                |r| r.get(0),
            )
            .optional()?;
        match raw {
            Some(s) => Ok(Some(serde_json::from_str(&s)?)),
            None => Ok(None),
        }
    }

    fn set_setting(&mut self, key: &str, value: &serde_json::Value) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO settings(key, value_json) VALUES(?, ?)
             ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
            (key, value.to_string()),
        )?;
        Ok(())
    }
}
