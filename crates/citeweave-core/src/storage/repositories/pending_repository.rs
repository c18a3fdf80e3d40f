use std::collections::HashSet;
use std::sync::MutexGuard;

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{CiteweaveError, Result};
use crate::models::{Eid, IdList, MatchKey, PendingRecord};

use super::{collect_ids, read_date, Repository};

const PENDING_COLUMNS: &str =
    "id, title, url, reference_type, authors, citedby, date, doi, source, referenced_by";

pub trait PendingRepository: Repository<Entity = PendingRecord, Id = Eid> {
    fn all_ids(&self) -> Result<HashSet<Eid>>;
    fn set_referenced_by(&self, id: Eid, referenced_by: &IdList) -> Result<()>;
    fn match_keys(&self) -> Result<Vec<MatchKey>>;
    fn list_all(&self) -> Result<Vec<PendingRecord>>;
    /// Rows with no title but a DOI to look one up by.
    fn missing_titles(&self) -> Result<Vec<PendingRecord>>;
    fn count(&self) -> Result<usize>;
}

pub struct SqlitePendingRepository<'a> {
    conn: MutexGuard<'a, Connection>,
}

impl<'a> SqlitePendingRepository<'a> {
    pub fn new(conn: MutexGuard<'a, Connection>) -> Self {
        Self { conn }
    }

    fn row_to_pending(row: &rusqlite::Row) -> rusqlite::Result<PendingRecord> {
        Ok(PendingRecord {
            id: row.get(0)?,
            title: row.get(1)?,
            url: row.get(2)?,
            reference_type: row.get(3)?,
            authors: IdList::parse(&row.get::<_, String>(4)?),
            citedby: row.get(5)?,
            date: read_date(row.get(6)?),
            doi: row.get(7)?,
            source: row.get(8)?,
            referenced_by: IdList::parse(&row.get::<_, String>(9)?),
        })
    }

    fn query_records(&self, sql: &str) -> Result<Vec<PendingRecord>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map([], Self::row_to_pending)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

impl<'a> Repository for SqlitePendingRepository<'a> {
    type Entity = PendingRecord;
    type Id = Eid;

    fn find_by_id(&self, id: &Self::Id) -> Result<Option<Self::Entity>> {
        let sql = format!("SELECT {PENDING_COLUMNS} FROM pending_records WHERE id = ?1");
        let record = self
            .conn
            .query_row(&sql, params![id], Self::row_to_pending)
            .optional()?;
        Ok(record)
    }

    fn save(&self, r: &Self::Entity) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO pending_records
                (id, title, url, reference_type, authors, citedby, date, doi, source, referenced_by)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                r.id,
                r.title,
                r.url,
                r.reference_type,
                r.authors.to_string(),
                r.citedby,
                r.date.map(|d| d.to_string()),
                r.doi,
                r.source,
                r.referenced_by.to_string(),
            ],
        )?;
        Ok(())
    }

    fn delete(&self, id: &Self::Id) -> Result<bool> {
        let n = self
            .conn
            .execute("DELETE FROM pending_records WHERE id = ?1", params![id])?;
        Ok(n > 0)
    }
}

impl<'a> PendingRepository for SqlitePendingRepository<'a> {
    fn all_ids(&self) -> Result<HashSet<Eid>> {
        collect_ids(&self.conn, "SELECT id FROM pending_records")
    }

    fn set_referenced_by(&self, id: Eid, referenced_by: &IdList) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE pending_records SET referenced_by = ?1 WHERE id = ?2",
            params![referenced_by.to_string(), id],
        )?;
        if changed == 0 {
            return Err(CiteweaveError::PendingNotFound(id));
        }
        Ok(())
    }

    fn match_keys(&self) -> Result<Vec<MatchKey>> {
        let mut stmt = self.conn.prepare("SELECT id, title, doi, date FROM pending_records")?;
        let rows = stmt.query_map([], |row| {
            Ok(MatchKey {
                id: row.get(0)?,
                title: row.get(1)?,
                doi: row.get(2)?,
                date: read_date(row.get(3)?),
            })
        })?;
        let mut keys = Vec::new();
        for row in rows {
            keys.push(row?);
        }
        Ok(keys)
    }

    fn list_all(&self) -> Result<Vec<PendingRecord>> {
        self.query_records(&format!("SELECT {PENDING_COLUMNS} FROM pending_records ORDER BY id"))
    }

    fn missing_titles(&self) -> Result<Vec<PendingRecord>> {
        self.query_records(&format!(
            "SELECT {PENDING_COLUMNS} FROM pending_records
             WHERE title IS NULL AND doi <> '' ORDER BY id"
        ))
    }

    fn count(&self) -> Result<usize> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM pending_records", [], |row| row.get(0))?;
        Ok(n as usize)
    }
}
