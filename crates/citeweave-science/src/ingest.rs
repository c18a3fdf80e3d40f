//! Filing fetched records into the store.

use citeweave_core::{
    Author, Checkpoint, Eid, IdList, LabelChange, LabelSet, Publication, RecordStore, WorkingSet,
};

use crate::dedup::merger::fold_pending;
use crate::error::{Result, ScienceError};
use crate::raw::{RawAffiliation, RawAuthor, RawRecord};
use crate::vocabulary::VocabularyEntry;

/// What [`ingest`] did with one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// A new publication row. `folded_citers` counts citers carried over
    /// from a pending record with the same id.
    Inserted {
        eid: Eid,
        label: LabelSet,
        folded_citers: usize,
    },
    /// Already a publication; its label set changed.
    Relabelled { eid: Eid, change: LabelChange },
    /// Already a publication, reached through a citing-work search; it
    /// gained the cited eid.
    CitationLinked { eid: Eid },
    /// Already a publication and nothing needed changing.
    Unchanged { eid: Eid },
}

impl IngestOutcome {
    pub fn eid(&self) -> Eid {
        match self {
            IngestOutcome::Inserted { eid, .. }
            | IngestOutcome::Relabelled { eid, .. }
            | IngestOutcome::CitationLinked { eid }
            | IngestOutcome::Unchanged { eid } => *eid,
        }
    }
}

/// Files one search hit.
///
/// `entry` is the vocabulary entry whose search produced the hit. `cited`
/// is set when the hit came from a "works citing X" search, and is then
/// recorded in the hit's `cites`.
///
/// Each store write commits before the next one starts, so an
/// interrupted call is finished by re-running it: the existing-id check
/// makes the second run take the re-discovery path, folding a pending row
/// the first run did not get to delete.
pub fn ingest(
    store: &dyn RecordStore,
    ws: &mut WorkingSet,
    checkpoint: &mut Checkpoint,
    raw: &RawRecord,
    entry: &VocabularyEntry,
    cited: Option<Eid>,
) -> Result<IngestOutcome> {
    let eid = raw
        .eid
        .ok_or_else(|| ScienceError::MissingId(raw.title.clone()))?;
    checkpoint.records_checked += 1;

    if ws.is_publication(eid) {
        checkpoint.in_database += 1;
        if ws.is_pending(eid) {
            let folded = fold_pending(store, eid)?.unwrap_or_default();
            ws.promote(eid);
            tracing::info!(eid, folded_citers = folded, "leftover pending row folded");
        }
        return rediscover(store, checkpoint, eid, entry, cited);
    }

    store_affiliations(store, ws, &raw.affiliations)?;
    let authors = store_authors(store, ws, checkpoint, &raw.authors)?;

    let label = entry.label_for(&raw.title, &raw.abstract_text);
    if label.contains(&entry.tag) {
        checkpoint.enqueue_citing(eid);
    }

    let mut publication = Publication {
        eid,
        title: raw.title.clone(),
        source: raw.source.clone(),
        issn: raw.issn.clone(),
        volume: raw.volume.clone(),
        issue: raw.issue.clone(),
        date: raw.cover_date,
        doi: raw.doi.clone(),
        abstract_text: raw.abstract_text.clone(),
        citedby: raw.citedby,
        affiliations: IdList::from_ids(raw.affiliations.iter().map(|a| a.id)),
        doc_type: raw.doc_type.clone(),
        author_count: raw.author_count,
        authors,
        author_keywords: raw.author_keywords.clone(),
        source_id: raw.source_id.clone(),
        url: raw.url.clone(),
        label: label.clone(),
        cites: IdList::new(),
        ref_count: None,
    };
    if let Some(cited) = cited {
        publication.cites.insert_id(cited);
    }
    store.insert_publication(&publication)?;
    checkpoint.newly_added += 1;

    let folded_citers = if ws.is_pending(eid) {
        fold_pending(store, eid)?.unwrap_or_default()
    } else {
        0
    };
    ws.promote(eid);

    tracing::debug!(eid, label = %label, folded_citers, "publication inserted");
    Ok(IngestOutcome::Inserted {
        eid,
        label,
        folded_citers,
    })
}

fn rediscover(
    store: &dyn RecordStore,
    checkpoint: &mut Checkpoint,
    eid: Eid,
    entry: &VocabularyEntry,
    cited: Option<Eid>,
) -> Result<IngestOutcome> {
    let mut publication = store
        .get_publication(eid)?
        .ok_or(citeweave_core::CiteweaveError::PublicationNotFound(eid))?;

    if let Some(cited) = cited {
        if cited == eid || !publication.cites.insert_id(cited) {
            return Ok(IngestOutcome::Unchanged { eid });
        }
        store.set_cites(eid, &publication.cites)?;
        tracing::debug!(eid, cited, "citation linked");
        return Ok(IngestOutcome::CitationLinked { eid });
    }

    let change = publication.label.add(&entry.tag);
    match change {
        LabelChange::Unchanged => Ok(IngestOutcome::Unchanged { eid }),
        LabelChange::Replaced | LabelChange::Appended => {
            store.set_label(eid, &publication.label)?;
            if change == LabelChange::Replaced {
                checkpoint.enqueue_citing(eid);
            }
            tracing::debug!(eid, label = %publication.label, "label updated");
            Ok(IngestOutcome::Relabelled { eid, change })
        }
    }
}

/// Inserts affiliations not seen before in this run.
pub(crate) fn store_affiliations(
    store: &dyn RecordStore,
    ws: &mut WorkingSet,
    affiliations: &[RawAffiliation],
) -> Result<usize> {
    let fresh: Vec<RawAffiliation> = affiliations
        .iter()
        .filter(|a| ws.affiliations.insert(a.id))
        .cloned()
        .collect();
    if fresh.is_empty() {
        return Ok(0);
    }
    Ok(store.insert_affiliations(&fresh)?)
}

/// Inserts authors not seen before in this run, minting ids for authors
/// the source gave none. Returns the record's author ids in source order.
pub(crate) fn store_authors(
    store: &dyn RecordStore,
    ws: &mut WorkingSet,
    checkpoint: &mut Checkpoint,
    authors: &[RawAuthor],
) -> Result<IdList> {
    let mut ids = IdList::new();
    let mut fresh = Vec::new();

    for raw in authors {
        let id = match raw.id {
            Some(id) => id,
            None => checkpoint.mint_author_id(),
        };
        ids.insert_id(id);
        if ws.authors.insert(id) {
            fresh.push(Author {
                id,
                name: raw.name.clone(),
                surname: raw.surname.clone(),
                given_name: raw.given_name.clone(),
                initials: raw.initials.clone(),
                affiliations: IdList::from_ids(&raw.affiliation_ids),
                url: raw.url.clone(),
                aka: IdList::new(),
            });
        }
    }

    if !fresh.is_empty() {
        store.insert_authors(&fresh)?;
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use citeweave_core::{Affiliation, Database, PendingRecord};

    fn pso() -> VocabularyEntry {
        VocabularyEntry::new("particle swarm optimization", "PSO")
    }

    fn record(eid: Eid, title: &str) -> RawRecord {
        RawRecord {
            eid: Some(eid),
            title: title.to_string(),
            authors: vec![RawAuthor {
                id: Some(7),
                name: "Kennedy J.".to_string(),
                affiliation_ids: vec![60],
                ..Default::default()
            }],
            affiliations: vec![Affiliation {
                id: 60,
                name: "Purdue".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    fn setup() -> (Database, WorkingSet, Checkpoint) {
        let db = Database::open_in_memory().unwrap();
        let ws = WorkingSet::load(&db).unwrap();
        (db, ws, Checkpoint::default())
    }

    #[test]
    fn keyword_in_title_sets_tag() {
        let (db, mut ws, mut cp) = setup();
        let raw = record(1, "A Particle-Swarm Optimisation variant");

        let outcome = ingest(&db, &mut ws, &mut cp, &raw, &pso(), None).unwrap();
        assert!(matches!(outcome, IngestOutcome::Inserted { .. }));

        let stored = db.get_publication(1).unwrap().unwrap();
        assert_eq!(stored.label.to_string(), "PSO");
        assert_eq!(stored.authors.to_string(), "7");
        assert_eq!(stored.affiliations.to_string(), "60");
        assert!(db.get_author(7).unwrap().is_some());
        assert_eq!(cp.citing_queue, [1]);
        assert_eq!(cp.newly_added, 1);
    }

    #[test]
    fn no_match_sets_other() {
        let (db, mut ws, mut cp) = setup();
        let mut raw = record(2, "Ant colonies");
        raw.abstract_text = "Pheromone trails on graphs.".to_string();

        ingest(&db, &mut ws, &mut cp, &raw, &pso(), None).unwrap();

        let stored = db.get_publication(2).unwrap().unwrap();
        assert_eq!(stored.label.to_string(), "OTHER");
        assert!(cp.citing_queue.is_empty());
    }

    #[test]
    fn abstract_match_counts() {
        let (db, mut ws, mut cp) = setup();
        let mut raw = record(3, "Swarm methods");
        raw.abstract_text = "We tune particle swarm optimization.".to_string();

        ingest(&db, &mut ws, &mut cp, &raw, &pso(), None).unwrap();
        assert_eq!(db.get_publication(3).unwrap().unwrap().label.to_string(), "PSO");
    }

    #[test]
    fn second_ingest_only_touches_label() {
        let (db, mut ws, mut cp) = setup();
        let raw = record(4, "Ant colonies");
        ingest(&db, &mut ws, &mut cp, &raw, &pso(), None).unwrap();

        let ga = VocabularyEntry::new("genetic algorithm", "GA");
        let outcome = ingest(&db, &mut ws, &mut cp, &raw, &ga, None).unwrap();
        assert_eq!(
            outcome,
            IngestOutcome::Relabelled {
                eid: 4,
                change: LabelChange::Replaced
            }
        );

        let outcome = ingest(&db, &mut ws, &mut cp, &raw, &pso(), None).unwrap();
        assert_eq!(
            outcome,
            IngestOutcome::Relabelled {
                eid: 4,
                change: LabelChange::Appended
            }
        );
        let outcome = ingest(&db, &mut ws, &mut cp, &raw, &pso(), None).unwrap();
        assert_eq!(outcome, IngestOutcome::Unchanged { eid: 4 });

        assert_eq!(db.publication_ids().unwrap().len(), 1);
        assert_eq!(db.get_publication(4).unwrap().unwrap().label.to_string(), "GA,PSO");
        assert_eq!(cp.in_database, 3);
        // promoted from OTHER, so its citing works get crawled
        assert_eq!(cp.citing_queue, [4]);
    }

    #[test]
    fn citing_hit_records_cited_eid() {
        let (db, mut ws, mut cp) = setup();
        ingest(&db, &mut ws, &mut cp, &record(10, "Ants"), &pso(), Some(99)).unwrap();
        assert_eq!(db.get_publication(10).unwrap().unwrap().cites.to_string(), "99");

        let outcome = ingest(&db, &mut ws, &mut cp, &record(10, "Ants"), &pso(), Some(98)).unwrap();
        assert_eq!(outcome, IngestOutcome::CitationLinked { eid: 10 });
        let stored = db.get_publication(10).unwrap().unwrap();
        assert_eq!(stored.cites.to_string(), "99,98");
        assert!(stored.label.is_other());
    }

    #[test]
    fn pending_record_is_folded_forward() {
        let (db, _, mut cp) = setup();
        db.insert_publication(&Publication::new(20, "citer")).unwrap();
        let mut pending = PendingRecord::new(30, 20);
        pending.referenced_by.insert_id(21);
        db.insert_pending(&pending).unwrap();
        let mut ws = WorkingSet::load(&db).unwrap();

        let outcome = ingest(&db, &mut ws, &mut cp, &record(30, "Ants"), &pso(), None).unwrap();
        assert!(matches!(
            outcome,
            IngestOutcome::Inserted {
                folded_citers: 1,
                ..
            }
        ));
        assert!(db.get_pending(30).unwrap().is_none());
        assert_eq!(db.get_publication(20).unwrap().unwrap().cites.to_string(), "30");
        assert!(ws.is_publication(30));
        assert!(!ws.is_pending(30));
    }

    #[test]
    fn rerun_after_interrupted_insert_folds_pending() {
        let (db, _, mut cp) = setup();
        db.insert_publication(&Publication::new(20, "citer")).unwrap();
        let mut pending = PendingRecord::new(30, 20);
        pending.doi = "10.1/x".to_string();
        db.insert_pending(&pending).unwrap();
        // the first run stopped after inserting the publication
        let mut first = Publication::new(30, "Ants");
        first.doi = "10.1/x".to_string();
        db.insert_publication(&first).unwrap();
        let mut ws = WorkingSet::load(&db).unwrap();

        let outcome = ingest(&db, &mut ws, &mut cp, &record(30, "Ants"), &pso(), None).unwrap();
        assert_eq!(
            outcome,
            IngestOutcome::Relabelled {
                eid: 30,
                change: LabelChange::Replaced
            }
        );
        assert!(db.get_pending(30).unwrap().is_none());
        assert_eq!(db.get_publication(20).unwrap().unwrap().cites.to_string(), "30");
        assert!(!ws.is_pending(30));
        assert_eq!(cp.in_database, 1);
    }

    #[test]
    fn authors_without_id_get_minted_once_each() {
        let (db, mut ws, mut cp) = setup();
        let mut raw = record(40, "Ants");
        raw.authors = vec![
            RawAuthor {
                name: "Dorigo M.".to_string(),
                ..Default::default()
            },
            RawAuthor {
                name: "Stützle T.".to_string(),
                ..Default::default()
            },
        ];
        ingest(&db, &mut ws, &mut cp, &raw, &pso(), None).unwrap();

        assert_eq!(db.get_publication(40).unwrap().unwrap().authors.to_string(), "1,2");
        assert_eq!(cp.next_author_id, 3);
        assert_eq!(db.get_author(2).unwrap().unwrap().name, "Stützle T.");
    }

    #[test]
    fn missing_eid_is_an_error() {
        let (db, mut ws, mut cp) = setup();
        let raw = RawRecord::default();
        let err = ingest(&db, &mut ws, &mut cp, &raw, &pso(), None).unwrap_err();
        assert!(matches!(err, ScienceError::MissingId(_)));
        assert!(db.publication_ids().unwrap().is_empty());
    }

    #[test]
    fn known_author_is_not_rewritten() {
        let (db, mut ws, mut cp) = setup();
        ingest(&db, &mut ws, &mut cp, &record(50, "Ants"), &pso(), None).unwrap();

        let mut second = record(51, "Bees");
        second.authors[0].name = "Kennedy James".to_string();
        ingest(&db, &mut ws, &mut cp, &second, &pso(), None).unwrap();

        assert_eq!(db.get_author(7).unwrap().unwrap().name, "Kennedy J.");
    }
}
