mod connection;
mod migrations;
mod schema;

pub use connection::ConnectionPool;
pub use migrations::{get_applied_versions, run_migrations, Migration};
pub use schema::SCHEMA_VERSION;

use std::collections::HashSet;
use std::path::Path;

use crate::error::{CiteweaveError, Result};
use crate::models::{
    Affiliation, AffiliationId, Author, AuthorId, Eid, IdList, LabelSet, MatchKey, PendingRecord,
    Publication,
};

use super::record_store::RecordStore;
use super::repositories::{
    AffiliationRepository, AuthorRepository, PendingRepository, PublicationRepository, Repository,
    SqliteAffiliationRepository, SqliteAuthorRepository, SqlitePendingRepository,
    SqlitePublicationRepository,
};

pub fn open_database(path: &Path) -> Result<ConnectionPool> {
    let pool = ConnectionPool::open(path)?;
    {
        let conn = pool.get_connection();
        migrations::run_migrations(&conn)?;
    }
    Ok(pool)
}

pub fn open_in_memory() -> Result<ConnectionPool> {
    let pool = ConnectionPool::open_in_memory()?;
    {
        let conn = pool.get_connection();
        migrations::run_migrations(&conn)?;
    }
    Ok(pool)
}

/// Row counts per table, for `status` and `doctor`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct StoreCounts {
    pub publications: usize,
    pub pending: usize,
    pub authors: usize,
    pub awaiting_references: usize,
}

pub struct Database {
    pool: ConnectionPool,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let pool = open_database(path)?;
        Ok(Self { pool })
    }

    pub fn open_in_memory() -> Result<Self> {
        let pool = open_in_memory()?;
        Ok(Self { pool })
    }

    pub fn path(&self) -> Option<&str> {
        self.pool.path()
    }

    fn publications(&self) -> SqlitePublicationRepository<'_> {
        SqlitePublicationRepository::new(self.pool.get_connection())
    }

    fn pending(&self) -> SqlitePendingRepository<'_> {
        SqlitePendingRepository::new(self.pool.get_connection())
    }

    fn authors(&self) -> SqliteAuthorRepository<'_> {
        SqliteAuthorRepository::new(self.pool.get_connection())
    }

    fn affiliations(&self) -> SqliteAffiliationRepository<'_> {
        SqliteAffiliationRepository::new(self.pool.get_connection())
    }

    pub fn list_authors(&self) -> Result<Vec<Author>> {
        let ids = self.authors().all_ids()?;
        let mut ids: Vec<AuthorId> = ids.into_iter().collect();
        ids.sort_unstable();
        let repo = self.authors();
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(author) = repo.find_by_id(&id)? {
                out.push(author);
            }
        }
        Ok(out)
    }

    pub fn counts(&self) -> Result<StoreCounts> {
        // One repository at a time: each holds the connection lock.
        let publications = self.publications().count()?;
        let pending = self.pending().count()?;
        let authors = self.authors().count()?;
        let awaiting_references = self.publications().awaiting_references(None)?.len();
        Ok(StoreCounts {
            publications,
            pending,
            authors,
            awaiting_references,
        })
    }

    pub fn applied_versions(&self) -> Result<Vec<u32>> {
        let conn = self.pool.get_connection();
        get_applied_versions(&conn)
    }
}

impl RecordStore for Database {
    fn publication_ids(&self) -> Result<HashSet<Eid>> {
        self.publications().all_ids()
    }

    fn pending_ids(&self) -> Result<HashSet<Eid>> {
        self.pending().all_ids()
    }

    fn author_ids(&self) -> Result<HashSet<AuthorId>> {
        self.authors().all_ids()
    }

    fn affiliation_ids(&self) -> Result<HashSet<AffiliationId>> {
        self.affiliations().all_ids()
    }

    fn get_publication(&self, eid: Eid) -> Result<Option<Publication>> {
        self.publications().find_by_id(&eid)
    }

    fn insert_publication(&self, publication: &Publication) -> Result<()> {
        self.publications().save(publication)
    }

    fn set_label(&self, eid: Eid, label: &LabelSet) -> Result<()> {
        self.publications().set_label(eid, label)
    }

    fn set_cites(&self, eid: Eid, cites: &IdList) -> Result<()> {
        self.publications().set_cites(eid, cites)
    }

    fn set_ref_count(&self, eid: Eid, count: i64) -> Result<()> {
        self.publications().set_ref_count(eid, count)
    }

    fn get_pending(&self, id: Eid) -> Result<Option<PendingRecord>> {
        self.pending().find_by_id(&id)
    }

    fn insert_pending(&self, record: &PendingRecord) -> Result<()> {
        if self.publications().exists(record.id)? {
            return Err(CiteweaveError::DuplicateId(record.id));
        }
        self.pending().save(record)
    }

    fn update_pending(&self, record: &PendingRecord) -> Result<()> {
        let repo = self.pending();
        if repo.find_by_id(&record.id)?.is_none() {
            return Err(CiteweaveError::PendingNotFound(record.id));
        }
        repo.save(record)
    }

    fn set_referenced_by(&self, id: Eid, referenced_by: &IdList) -> Result<()> {
        self.pending().set_referenced_by(id, referenced_by)
    }

    fn delete_pending(&self, id: Eid) -> Result<bool> {
        self.pending().delete(&id)
    }

    fn get_author(&self, id: AuthorId) -> Result<Option<Author>> {
        self.authors().find_by_id(&id)
    }

    fn insert_authors(&self, authors: &[Author]) -> Result<usize> {
        self.authors().insert_batch(authors)
    }

    fn set_aka(&self, id: AuthorId, aka: &IdList) -> Result<()> {
        self.authors().set_aka(id, aka)
    }

    fn insert_affiliations(&self, affiliations: &[Affiliation]) -> Result<usize> {
        self.affiliations().insert_batch(affiliations)
    }

    fn publication_match_keys(&self) -> Result<Vec<MatchKey>> {
        self.publications().match_keys()
    }

    fn pending_match_keys(&self) -> Result<Vec<MatchKey>> {
        self.pending().match_keys()
    }

    fn list_publications(&self) -> Result<Vec<Publication>> {
        self.publications().list_all()
    }

    fn list_pending(&self) -> Result<Vec<PendingRecord>> {
        self.pending().list_all()
    }

    fn awaiting_references(&self, label: Option<&str>) -> Result<Vec<Eid>> {
        self.publications().awaiting_references(label)
    }

    fn pending_missing_titles(&self) -> Result<Vec<PendingRecord>> {
        self.pending().missing_titles()
    }
}
