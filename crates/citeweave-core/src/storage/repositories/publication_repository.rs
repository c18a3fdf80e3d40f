use std::collections::HashSet;
use std::sync::MutexGuard;

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{CiteweaveError, Result};
use crate::models::{Eid, IdList, LabelSet, MatchKey, Publication};

use super::{collect_ids, read_date, Repository};

const PUBLICATION_COLUMNS: &str = "eid, title, source, issn, volume, issue, date, doi, abstract,
     citedby, affiliations, type, author_count, authors, author_keywords,
     source_id, url, label, cites, ref_count";

pub trait PublicationRepository: Repository<Entity = Publication, Id = Eid> {
    fn all_ids(&self) -> Result<HashSet<Eid>>;
    fn exists(&self, eid: Eid) -> Result<bool>;
    fn set_label(&self, eid: Eid, label: &LabelSet) -> Result<()>;
    fn set_cites(&self, eid: Eid, cites: &IdList) -> Result<()>;
    fn set_ref_count(&self, eid: Eid, count: i64) -> Result<()>;
    fn match_keys(&self) -> Result<Vec<MatchKey>>;
    fn list_all(&self) -> Result<Vec<Publication>>;
    /// Publications whose reference list has never been fetched.
    fn awaiting_references(&self, label: Option<&str>) -> Result<Vec<Eid>>;
    fn count(&self) -> Result<usize>;
}

pub struct SqlitePublicationRepository<'a> {
    conn: MutexGuard<'a, Connection>,
}

impl<'a> SqlitePublicationRepository<'a> {
    pub fn new(conn: MutexGuard<'a, Connection>) -> Self {
        Self { conn }
    }

    fn row_to_publication(row: &rusqlite::Row) -> rusqlite::Result<Publication> {
        Ok(Publication {
            eid: row.get(0)?,
            title: row.get(1)?,
            source: row.get(2)?,
            issn: row.get(3)?,
            volume: row.get(4)?,
            issue: row.get(5)?,
            date: read_date(row.get(6)?),
            doi: row.get(7)?,
            abstract_text: row.get(8)?,
            citedby: row.get(9)?,
            affiliations: IdList::parse(&row.get::<_, String>(10)?),
            doc_type: row.get(11)?,
            author_count: row.get(12)?,
            authors: IdList::parse(&row.get::<_, String>(13)?),
            author_keywords: row.get(14)?,
            source_id: row.get(15)?,
            url: row.get(16)?,
            label: LabelSet::parse(&row.get::<_, String>(17)?),
            cites: IdList::parse(&row.get::<_, String>(18)?),
            ref_count: row.get(19)?,
        })
    }

    fn update_column(&self, eid: Eid, sql: &str, value: &dyn rusqlite::ToSql) -> Result<()> {
        let changed = self.conn.execute(sql, params![value, eid])?;
        if changed == 0 {
            return Err(CiteweaveError::PublicationNotFound(eid));
        }
        Ok(())
    }
}

impl<'a> Repository for SqlitePublicationRepository<'a> {
    type Entity = Publication;
    type Id = Eid;

    fn find_by_id(&self, id: &Self::Id) -> Result<Option<Self::Entity>> {
        let sql = format!("SELECT {PUBLICATION_COLUMNS} FROM publications WHERE eid = ?1");
        let publication = self
            .conn
            .query_row(&sql, params![id], Self::row_to_publication)
            .optional()?;
        Ok(publication)
    }

    fn save(&self, p: &Self::Entity) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO publications
                (eid, title, source, issn, volume, issue, date, doi, abstract,
                 citedby, affiliations, type, author_count, authors, author_keywords,
                 source_id, url, label, cites, ref_count)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)",
            params![
                p.eid,
                p.title,
                p.source,
                p.issn,
                p.volume,
                p.issue,
                p.date.map(|d| d.to_string()),
                p.doi,
                p.abstract_text,
                p.citedby,
                p.affiliations.to_string(),
                p.doc_type,
                p.author_count,
                p.authors.to_string(),
                p.author_keywords,
                p.source_id,
                p.url,
                p.label.to_string(),
                p.cites.to_string(),
                p.ref_count,
            ],
        )?;
        Ok(())
    }

    fn delete(&self, id: &Self::Id) -> Result<bool> {
        let n = self.conn.execute("DELETE FROM publications WHERE eid = ?1", params![id])?;
        Ok(n > 0)
    }
}

impl<'a> PublicationRepository for SqlitePublicationRepository<'a> {
    fn all_ids(&self) -> Result<HashSet<Eid>> {
        collect_ids(&self.conn, "SELECT eid FROM publications")
    }

    fn exists(&self, eid: Eid) -> Result<bool> {
        let found = self
            .conn
            .prepare("SELECT 1 FROM publications WHERE eid = ?1")?
            .exists(params![eid])?;
        Ok(found)
    }

    fn set_label(&self, eid: Eid, label: &LabelSet) -> Result<()> {
        self.update_column(
            eid,
            "UPDATE publications SET label = ?1 WHERE eid = ?2",
            &label.to_string(),
        )
    }

    fn set_cites(&self, eid: Eid, cites: &IdList) -> Result<()> {
        self.update_column(
            eid,
            "UPDATE publications SET cites = ?1 WHERE eid = ?2",
            &cites.to_string(),
        )
    }

    fn set_ref_count(&self, eid: Eid, count: i64) -> Result<()> {
        self.update_column(
            eid,
            "UPDATE publications SET ref_count = ?1 WHERE eid = ?2",
            &count,
        )
    }

    fn match_keys(&self) -> Result<Vec<MatchKey>> {
        let mut stmt = self.conn.prepare("SELECT eid, title, doi, date FROM publications")?;
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

    fn list_all(&self) -> Result<Vec<Publication>> {
        let sql = format!("SELECT {PUBLICATION_COLUMNS} FROM publications ORDER BY eid");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], Self::row_to_publication)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    fn awaiting_references(&self, label: Option<&str>) -> Result<Vec<Eid>> {
        let mut stmt = self
            .conn
            .prepare("SELECT eid, label FROM publications WHERE ref_count IS NULL ORDER BY eid")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, Eid>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (eid, raw_label) = row?;
            let keep = match label {
                Some(tag) => LabelSet::parse(&raw_label).contains(tag),
                None => true,
            };
            if keep {
                out.push(eid);
            }
        }
        Ok(out)
    }

    fn count(&self) -> Result<usize> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM publications", [], |row| row.get(0))?;
        Ok(n as usize)
    }
}
