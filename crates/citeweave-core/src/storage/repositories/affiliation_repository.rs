use std::collections::HashSet;
use std::sync::MutexGuard;

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;
use crate::models::{Affiliation, AffiliationId};

use super::{collect_ids, Repository};

pub trait AffiliationRepository: Repository<Entity = Affiliation, Id = AffiliationId> {
    fn all_ids(&self) -> Result<HashSet<AffiliationId>>;
    fn insert_batch(&self, affiliations: &[Affiliation]) -> Result<usize>;
}

pub struct SqliteAffiliationRepository<'a> {
    conn: MutexGuard<'a, Connection>,
}

impl<'a> SqliteAffiliationRepository<'a> {
    pub fn new(conn: MutexGuard<'a, Connection>) -> Self {
        Self { conn }
    }
}

impl<'a> Repository for SqliteAffiliationRepository<'a> {
    type Entity = Affiliation;
    type Id = AffiliationId;

    fn find_by_id(&self, id: &Self::Id) -> Result<Option<Self::Entity>> {
        let affiliation = self
            .conn
            .query_row(
                "SELECT id, name, city, country, url FROM affiliations WHERE id = ?1",
                params![id],
                |row| {
                    Ok(Affiliation {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        city: row.get(2)?,
                        country: row.get(3)?,
                        url: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(affiliation)
    }

    // Affiliations are immutable once stored.
    fn save(&self, a: &Self::Entity) -> Result<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO affiliations (id, name, city, country, url)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![a.id, a.name, a.city, a.country, a.url],
        )?;
        Ok(())
    }

    fn delete(&self, id: &Self::Id) -> Result<bool> {
        let n = self
            .conn
            .execute("DELETE FROM affiliations WHERE id = ?1", params![id])?;
        Ok(n > 0)
    }
}

impl<'a> AffiliationRepository for SqliteAffiliationRepository<'a> {
    fn all_ids(&self) -> Result<HashSet<AffiliationId>> {
        collect_ids(&self.conn, "SELECT id FROM affiliations")
    }

    fn insert_batch(&self, affiliations: &[Affiliation]) -> Result<usize> {
        if affiliations.is_empty() {
            return Ok(0);
        }
        let tx = self.conn.unchecked_transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO affiliations (id, name, city, country, url)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for a in affiliations {
                inserted += stmt.execute(params![a.id, a.name, a.city, a.country, a.url])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }
}
