use std::collections::HashSet;

use citeweave_core::{Checkpoint, CiteweaveError, Eid, IdList, PendingRecord, RecordStore, WorkingSet};
use serde::Serialize;

use crate::dedup::merger::fold_pending;
use crate::error::Result;
use crate::ingest::store_authors;
use crate::raw::RawReference;
use crate::sources::MetadataSource;

/// Per-publication tally of where each reference went.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolveReport {
    pub eid: Eid,
    /// Total the source reported; `None` when the response had no reference section.
    pub total: Option<i64>,
    /// Existing pending records that gained this citer.
    pub pending_linked: usize,
    /// Existing publications this one now cites.
    pub publications_linked: usize,
    pub pending_created: usize,
    /// Entries without an id, self-references and repeats.
    pub ignored: usize,
}

/// Fetches the reference list of publication `eid` and files every entry:
/// a known pending record gains `eid` in `referenced_by`, a known
/// publication is added to `eid`'s `cites`, anything else becomes a new
/// pending record cited by `eid`.
///
/// `ref_count` is written last, so a publication interrupted halfway is
/// picked up again by the next reference sweep.
pub fn resolve_references(
    store: &dyn RecordStore,
    source: &dyn MetadataSource,
    ws: &mut WorkingSet,
    checkpoint: &mut Checkpoint,
    eid: Eid,
) -> Result<ResolveReport> {
    let mut citer = store
        .get_publication(eid)?
        .ok_or(CiteweaveError::PublicationNotFound(eid))?;

    let list = source.references(eid)?;
    checkpoint.record_call(list.quota_remaining);

    let mut report = ResolveReport {
        eid,
        total: list.total,
        ..Default::default()
    };
    let mut seen = HashSet::new();

    for entry in &list.entries {
        let Some(cited) = entry.id.filter(|&id| id != eid && seen.insert(id)) else {
            report.ignored += 1;
            continue;
        };

        if ws.is_publication(cited) {
            if ws.is_pending(cited) {
                fold_pending(store, cited)?;
                ws.promote(cited);
            }
            if citer.cites.insert_id(cited) {
                store.set_cites(eid, &citer.cites)?;
            }
            report.publications_linked += 1;
        } else if ws.is_pending(cited) {
            let Some(mut pending) = store.get_pending(cited)? else {
                tracing::warn!(eid, cited, "pending record missing from store");
                ws.pending.remove(&cited);
                report.ignored += 1;
                continue;
            };
            if pending.referenced_by.insert_id(eid) {
                store.set_referenced_by(cited, &pending.referenced_by)?;
            }
            report.pending_linked += 1;
        } else {
            create_pending(store, ws, checkpoint, entry, cited, eid)?;
            report.pending_created += 1;
        }
    }

    let count = match list.total {
        Some(total) => total,
        None => {
            tracing::warn!(eid, "no reference section in response; recording 0");
            0
        }
    };
    store.set_ref_count(eid, count)?;

    tracing::debug!(
        eid,
        pending_linked = report.pending_linked,
        publications_linked = report.publications_linked,
        pending_created = report.pending_created,
        "references resolved"
    );
    Ok(report)
}

fn create_pending(
    store: &dyn RecordStore,
    ws: &mut WorkingSet,
    checkpoint: &mut Checkpoint,
    entry: &RawReference,
    id: Eid,
    citer: Eid,
) -> Result<()> {
    let authors = store_authors(store, ws, checkpoint, &entry.authors)?;
    let record = PendingRecord {
        id,
        title: entry.title.clone().filter(|t| !t.trim().is_empty()),
        url: entry.url.clone(),
        reference_type: entry.reference_type.clone(),
        authors,
        citedby: entry.citedby,
        date: entry.date,
        doi: entry.doi.clone(),
        source: entry.source.clone(),
        referenced_by: IdList::from_ids([citer]),
    };
    store.insert_pending(&record)?;
    ws.pending.insert(id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw::RawAuthor;
    use crate::sources::ReferenceList;
    use crate::sources::fake::FakeSource;
    use citeweave_core::{Database, Publication};

    fn reference(id: Eid) -> RawReference {
        RawReference {
            id: Some(id),
            title: Some(format!("work {id}")),
            ..Default::default()
        }
    }

    #[test]
    fn three_way_dispatch() {
        let db = Database::open_in_memory().unwrap();
        db.insert_publication(&Publication::new(1, "citer")).unwrap();
        db.insert_publication(&Publication::new(2, "known")).unwrap();
        db.insert_publication(&Publication::new(5, "other citer")).unwrap();
        db.insert_pending(&PendingRecord::new(3, 5)).unwrap();

        let source = FakeSource::default();
        let mut fresh = reference(4);
        fresh.doi = "10.1/four".to_string();
        fresh.authors = vec![RawAuthor {
            id: Some(70),
            name: "Holland J.".to_string(),
            ..Default::default()
        }];
        source.add_references(
            1,
            ReferenceList {
                total: Some(6),
                entries: vec![
                    reference(2),
                    reference(3),
                    fresh,
                    reference(4),
                    reference(1),
                    RawReference::default(),
                ],
                quota_remaining: Some(900),
            },
        );

        let mut ws = WorkingSet::load(&db).unwrap();
        let mut cp = Checkpoint::default();
        let report = resolve_references(&db, &source, &mut ws, &mut cp, 1).unwrap();

        assert_eq!(report.publications_linked, 1);
        assert_eq!(report.pending_linked, 1);
        assert_eq!(report.pending_created, 1);
        assert_eq!(report.ignored, 3);
        assert_eq!(cp.remaining_quota, 900);

        let citer = db.get_publication(1).unwrap().unwrap();
        assert_eq!(citer.cites.to_string(), "2");
        assert_eq!(citer.ref_count, Some(6));
        assert_eq!(db.get_pending(3).unwrap().unwrap().referenced_by.to_string(), "5,1");

        let created = db.get_pending(4).unwrap().unwrap();
        assert_eq!(created.referenced_by.to_string(), "1");
        assert_eq!(created.doi, "10.1/four");
        assert_eq!(created.authors.to_string(), "70");
        assert!(db.get_author(70).unwrap().is_some());
        assert!(ws.is_pending(4));
    }

    #[test]
    fn second_run_adds_no_duplicates() {
        let db = Database::open_in_memory().unwrap();
        db.insert_publication(&Publication::new(1, "citer")).unwrap();
        let source = FakeSource::default();
        source.add_references(
            1,
            ReferenceList {
                total: Some(1),
                entries: vec![reference(9)],
                quota_remaining: None,
            },
        );

        let mut ws = WorkingSet::load(&db).unwrap();
        let mut cp = Checkpoint::default();
        resolve_references(&db, &source, &mut ws, &mut cp, 1).unwrap();
        let report = resolve_references(&db, &source, &mut ws, &mut cp, 1).unwrap();

        assert_eq!(report.pending_linked, 1);
        assert_eq!(db.get_pending(9).unwrap().unwrap().referenced_by.to_string(), "1");
        assert_eq!(cp.remaining_quota, citeweave_core::checkpoint::DEFAULT_QUOTA - 2);
    }

    #[test]
    fn missing_reference_section_records_zero() {
        let db = Database::open_in_memory().unwrap();
        db.insert_publication(&Publication::new(1, "citer")).unwrap();
        let source = FakeSource::default();

        let mut ws = WorkingSet::load(&db).unwrap();
        let mut cp = Checkpoint::default();
        let report = resolve_references(&db, &source, &mut ws, &mut cp, 1).unwrap();

        assert_eq!(report.total, None);
        assert_eq!(db.get_publication(1).unwrap().unwrap().ref_count, Some(0));
    }

    #[test]
    fn leftover_pending_row_of_a_publication_is_folded() {
        let db = Database::open_in_memory().unwrap();
        db.insert_publication(&Publication::new(1, "citer")).unwrap();
        db.insert_publication(&Publication::new(5, "earlier citer")).unwrap();
        db.insert_pending(&PendingRecord::new(7, 5)).unwrap();
        db.insert_publication(&Publication::new(7, "cited")).unwrap();
        let source = FakeSource::default();
        source.add_references(
            1,
            ReferenceList {
                total: Some(1),
                entries: vec![reference(7)],
                quota_remaining: None,
            },
        );

        let mut ws = WorkingSet::load(&db).unwrap();
        let mut cp = Checkpoint::default();
        let report = resolve_references(&db, &source, &mut ws, &mut cp, 1).unwrap();

        assert_eq!(report.publications_linked, 1);
        assert_eq!(report.pending_linked, 0);
        assert!(db.get_pending(7).unwrap().is_none());
        assert_eq!(db.get_publication(1).unwrap().unwrap().cites.to_string(), "7");
        assert_eq!(db.get_publication(5).unwrap().unwrap().cites.to_string(), "7");
        assert!(!ws.is_pending(7));
    }

    #[test]
    fn unknown_citer_is_an_error() {
        let db = Database::open_in_memory().unwrap();
        let source = FakeSource::default();
        let mut ws = WorkingSet::default();
        let mut cp = Checkpoint::default();
        assert!(resolve_references(&db, &source, &mut ws, &mut cp, 42).is_err());
        assert!(source.calls.borrow().is_empty());
    }
}
