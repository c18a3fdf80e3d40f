mod affiliation_repository;
mod author_repository;
mod pending_repository;
mod publication_repository;

pub use affiliation_repository::{AffiliationRepository, SqliteAffiliationRepository};
pub use author_repository::{AuthorRepository, SqliteAuthorRepository};
pub use pending_repository::{PendingRepository, SqlitePendingRepository};
pub use publication_repository::{PublicationRepository, SqlitePublicationRepository};

use std::collections::HashSet;

use rusqlite::Connection;

use crate::error::Result;
use crate::models::PartialDate;

pub trait Repository {
    type Entity;
    type Id;

    fn find_by_id(&self, id: &Self::Id) -> Result<Option<Self::Entity>>;
    fn save(&self, entity: &Self::Entity) -> Result<()>;
    fn delete(&self, id: &Self::Id) -> Result<bool>;
}

fn collect_ids(conn: &Connection, sql: &str) -> Result<HashSet<i64>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([], |row| row.get::<_, i64>(0))?;
    let mut ids = HashSet::new();
    for row in rows {
        ids.insert(row?);
    }
    Ok(ids)
}

fn read_date(raw: Option<String>) -> Option<PartialDate> {
    raw.as_deref().and_then(PartialDate::parse_opt)
}
