use std::collections::HashSet;

use crate::error::Result;
use crate::models::{AffiliationId, AuthorId, Eid};
use crate::storage::RecordStore;

/// Id sets read from the store at sweep start.
///
/// A cache only: sweeps update it in lockstep with their own writes and
/// drop it when they return.
#[derive(Debug, Clone, Default)]
pub struct WorkingSet {
    pub publications: HashSet<Eid>,
    pub pending: HashSet<Eid>,
    pub authors: HashSet<AuthorId>,
    pub affiliations: HashSet<AffiliationId>,
}

impl WorkingSet {
    pub fn load(store: &dyn RecordStore) -> Result<Self> {
        let set = Self {
            publications: store.publication_ids()?,
            pending: store.pending_ids()?,
            authors: store.author_ids()?,
            affiliations: store.affiliation_ids()?,
        };
        tracing::debug!(
            publications = set.publications.len(),
            pending = set.pending.len(),
            authors = set.authors.len(),
            affiliations = set.affiliations.len(),
            "working set loaded"
        );
        Ok(set)
    }

    pub fn is_publication(&self, eid: Eid) -> bool {
        self.publications.contains(&eid)
    }

    pub fn is_pending(&self, eid: Eid) -> bool {
        self.pending.contains(&eid)
    }

    /// Moves `eid` from the pending side to the publication side.
    pub fn promote(&mut self, eid: Eid) {
        self.pending.remove(&eid);
        self.publications.insert(eid);
    }
}
