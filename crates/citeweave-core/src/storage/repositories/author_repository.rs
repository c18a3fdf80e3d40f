use std::collections::HashSet;
use std::sync::MutexGuard;

use rusqlite::{params, Connection, OptionalExtension, Statement};

use crate::error::{CiteweaveError, Result};
use crate::models::{Author, AuthorId, IdList};

use super::{collect_ids, Repository};

pub trait AuthorRepository: Repository<Entity = Author, Id = AuthorId> {
    fn all_ids(&self) -> Result<HashSet<AuthorId>>;
    /// Inserts every author in one transaction. Ids already present are left untouched.
    fn insert_batch(&self, authors: &[Author]) -> Result<usize>;
    fn set_aka(&self, id: AuthorId, aka: &IdList) -> Result<()>;
    fn count(&self) -> Result<usize>;
}

pub struct SqliteAuthorRepository<'a> {
    conn: MutexGuard<'a, Connection>,
}

impl<'a> SqliteAuthorRepository<'a> {
    pub fn new(conn: MutexGuard<'a, Connection>) -> Self {
        Self { conn }
    }
}

const AUTHOR_VALUES: &str = "(id, name, surname, given_name, initials, affiliations, url, aka)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)";

fn execute_author(stmt: &mut Statement<'_>, a: &Author) -> rusqlite::Result<usize> {
    stmt.execute(params![
        a.id,
        a.name,
        a.surname,
        a.given_name,
        a.initials,
        a.affiliations.to_string(),
        a.url,
        a.aka.to_string(),
    ])
}

impl<'a> Repository for SqliteAuthorRepository<'a> {
    type Entity = Author;
    type Id = AuthorId;

    fn find_by_id(&self, id: &Self::Id) -> Result<Option<Self::Entity>> {
        let author = self
            .conn
            .query_row(
                "SELECT id, name, surname, given_name, initials, affiliations, url, aka
                 FROM authors WHERE id = ?1",
                params![id],
                |row| {
                    Ok(Author {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        surname: row.get(2)?,
                        given_name: row.get(3)?,
                        initials: row.get(4)?,
                        affiliations: IdList::parse(&row.get::<_, String>(5)?),
                        url: row.get(6)?,
                        aka: IdList::parse(&row.get::<_, String>(7)?),
                    })
                },
            )
            .optional()?;
        Ok(author)
    }

    fn save(&self, author: &Self::Entity) -> Result<()> {
        let mut stmt = self
            .conn
            .prepare(&format!("INSERT OR REPLACE INTO authors {AUTHOR_VALUES}"))?;
        execute_author(&mut stmt, author)?;
        Ok(())
    }

    fn delete(&self, id: &Self::Id) -> Result<bool> {
        let n = self.conn.execute("DELETE FROM authors WHERE id = ?1", params![id])?;
        Ok(n > 0)
    }
}

impl<'a> AuthorRepository for SqliteAuthorRepository<'a> {
    fn all_ids(&self) -> Result<HashSet<AuthorId>> {
        collect_ids(&self.conn, "SELECT id FROM authors")
    }

    fn insert_batch(&self, authors: &[Author]) -> Result<usize> {
        if authors.is_empty() {
            return Ok(0);
        }
        let tx = self.conn.unchecked_transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(&format!("INSERT OR IGNORE INTO authors {AUTHOR_VALUES}"))?;
            for author in authors {
                inserted += execute_author(&mut stmt, author)?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    fn set_aka(&self, id: AuthorId, aka: &IdList) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE authors SET aka = ?1 WHERE id = ?2",
            params![aka.to_string(), id],
        )?;
        if changed == 0 {
            return Err(CiteweaveError::AuthorNotFound(id));
        }
        Ok(())
    }

    fn count(&self) -> Result<usize> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM authors", [], |row| row.get(0))?;
        Ok(n as usize)
    }
}
