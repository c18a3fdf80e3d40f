//! The keyed-record interface the reconciliation code works against.

use std::collections::HashSet;

use crate::error::Result;
use crate::models::{
    Affiliation, AffiliationId, Author, AuthorId, Eid, IdList, LabelSet, MatchKey, PendingRecord,
    Publication,
};

/// Keyed access to publications, pending records, authors and affiliations.
///
/// Every write is committed when the call returns; batch inserts commit
/// as a single transaction.
pub trait RecordStore {
    fn publication_ids(&self) -> Result<HashSet<Eid>>;
    fn pending_ids(&self) -> Result<HashSet<Eid>>;
    fn author_ids(&self) -> Result<HashSet<AuthorId>>;
    fn affiliation_ids(&self) -> Result<HashSet<AffiliationId>>;

    fn get_publication(&self, eid: Eid) -> Result<Option<Publication>>;
    fn insert_publication(&self, publication: &Publication) -> Result<()>;
    fn set_label(&self, eid: Eid, label: &LabelSet) -> Result<()>;
    fn set_cites(&self, eid: Eid, cites: &IdList) -> Result<()>;
    fn set_ref_count(&self, eid: Eid, count: i64) -> Result<()>;

    fn get_pending(&self, id: Eid) -> Result<Option<PendingRecord>>;
    /// Fails with `DuplicateId` when `record.id` is already a publication.
    fn insert_pending(&self, record: &PendingRecord) -> Result<()>;
    fn update_pending(&self, record: &PendingRecord) -> Result<()>;
    fn set_referenced_by(&self, id: Eid, referenced_by: &IdList) -> Result<()>;
    fn delete_pending(&self, id: Eid) -> Result<bool>;

    fn get_author(&self, id: AuthorId) -> Result<Option<Author>>;
    fn insert_authors(&self, authors: &[Author]) -> Result<usize>;
    fn set_aka(&self, id: AuthorId, aka: &IdList) -> Result<()>;

    fn insert_affiliations(&self, affiliations: &[Affiliation]) -> Result<usize>;

    fn publication_match_keys(&self) -> Result<Vec<MatchKey>>;
    fn pending_match_keys(&self) -> Result<Vec<MatchKey>>;

    fn list_publications(&self) -> Result<Vec<Publication>>;
    fn list_pending(&self) -> Result<Vec<PendingRecord>>;
    /// Publications whose reference list was never fetched, optionally
    /// only those carrying `label`.
    fn awaiting_references(&self, label: Option<&str>) -> Result<Vec<Eid>>;
    /// Pending records with no title but a DOI to look it up by.
    fn pending_missing_titles(&self) -> Result<Vec<PendingRecord>>;
}
