use std::cmp::Ordering as DateOrdering;
use std::sync::atomic::{AtomicBool, Ordering};

use citeweave_core::{Author, Checkpoint, IdList, PendingRecord, RecordStore};
use serde::Serialize;

use crate::error::Result;
use crate::sources::crossref::{CrossRefSource, CrossRefWork};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FillReport {
    pub checked: usize,
    pub updated: usize,
    /// DOIs CrossRef did not know, or knew without a title.
    pub unresolved: usize,
    pub authors_minted: usize,
    pub cancelled: bool,
}

/// Completes untitled pending records from CrossRef metadata for their DOI.
/// Each record is written as soon as it is filled.
pub fn fill_missing(
    store: &dyn RecordStore,
    crossref: &CrossRefSource,
    checkpoint: &mut Checkpoint,
    cancel: &AtomicBool,
) -> Result<FillReport> {
    let records = store.pending_missing_titles()?;
    tracing::info!(records = records.len(), "filling pending records from CrossRef");

    let mut report = FillReport::default();
    for mut record in records {
        if cancel.load(Ordering::Relaxed) {
            report.cancelled = true;
            break;
        }
        report.checked += 1;

        let work = match crossref.fetch_by_doi(&record.doi)? {
            Some(work) if !work.title.trim().is_empty() => work,
            _ => {
                tracing::debug!(id = record.id, doi = %record.doi, "DOI not resolved");
                report.unresolved += 1;
                continue;
            }
        };

        let new_authors = apply_work(&mut record, &work, checkpoint);
        if !new_authors.is_empty() {
            report.authors_minted += store.insert_authors(&new_authors)?;
        }
        store.update_pending(&record)?;
        report.updated += 1;
    }

    tracing::info!(updated = report.updated, unresolved = report.unresolved, "fill finished");
    Ok(report)
}

/// Copies what the stored record lacks from `work`. Returns author rows
/// minted for the record, still to be inserted.
fn apply_work(record: &mut PendingRecord, work: &CrossRefWork, checkpoint: &mut Checkpoint) -> Vec<Author> {
    record.title = Some(work.title.clone());

    if let Some(published) = work.published {
        let earlier = match record.date {
            None => true,
            Some(stored) => published.cmp_shared(&stored) == DateOrdering::Less,
        };
        if earlier {
            record.date = Some(published);
        }
    }

    record.citedby = record.citedby.max(work.citation_count);

    let mut minted = Vec::new();
    if record.authors.is_empty() {
        let mut ids = IdList::new();
        for a in &work.authors {
            let id = checkpoint.mint_author_id();
            ids.insert_id(id);
            minted.push(Author {
                id,
                name: a.display_name(),
                surname: a.family.clone(),
                given_name: a.given.clone(),
                initials: a.initials(),
                ..Default::default()
            });
        }
        record.authors = ids;
    }

    let venue = work.container_title.trim();
    if !venue.is_empty() && (record.source.is_empty() || !record.source.eq_ignore_ascii_case(venue)) {
        record.source = venue.to_string();
    }

    minted
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use citeweave_core::{Database, PartialDate, Publication};
    use mockito::Server;

    const WORK: &str = r#"{
        "message": {
            "DOI": "10.1/x",
            "title": ["Swarm intelligence"],
            "author": [{"given": "James", "family": "Kennedy"}],
            "published": {"date-parts": [[2001, 3]]},
            "container-title": ["Morgan Kaufmann", "Series"],
            "is-referenced-by-count": 40
        }
    }"#;

    fn untitled(id: i64, doi: &str) -> PendingRecord {
        PendingRecord {
            doi: doi.to_string(),
            ..PendingRecord::new(id, 1)
        }
    }

    #[test]
    fn fills_from_crossref() {
        let mut server = Server::new();
        let _ok = server
            .mock("GET", "/works/10.1/x")
            .with_status(200)
            .with_body(WORK)
            .create();
        let _gone = server.mock("GET", "/works/10.1/gone").with_status(404).create();

        let db = Database::open_in_memory().unwrap();
        db.insert_publication(&Publication::new(1, "citer")).unwrap();
        let mut first = untitled(10, "10.1/x");
        first.date = PartialDate::parse_opt("2001-05-01");
        first.citedby = 90;
        db.insert_pending(&first).unwrap();
        db.insert_pending(&untitled(11, "10.1/gone")).unwrap();

        let crossref = CrossRefSource::with_params(&server.url(), Duration::ZERO, None).unwrap();
        let mut cp = Checkpoint::default();
        let report = fill_missing(&db, &crossref, &mut cp, &AtomicBool::new(false)).unwrap();

        assert_eq!(report.checked, 2);
        assert_eq!(report.updated, 1);
        assert_eq!(report.unresolved, 1);
        assert_eq!(report.authors_minted, 1);

        let filled = db.get_pending(10).unwrap().unwrap();
        assert_eq!(filled.title.as_deref(), Some("Swarm intelligence"));
        assert_eq!(filled.date, PartialDate::parse_opt("2001-03"));
        assert_eq!(filled.citedby, 90);
        assert_eq!(filled.source, "Morgan Kaufmann;Series");
        assert_eq!(filled.authors.to_string(), "1");
        assert_eq!(db.get_author(1).unwrap().unwrap().name, "Kennedy J.");

        assert!(db.get_pending(11).unwrap().unwrap().title.is_none());
        assert_eq!(db.pending_missing_titles().unwrap().len(), 1);
    }

    #[test]
    fn keeps_what_is_already_better() {
        let v: serde_json::Value = serde_json::from_str(WORK).unwrap();
        let work = CrossRefWork::from_json(&v["message"]).unwrap();

        let mut record = untitled(10, "10.1/x");
        record.date = PartialDate::parse_opt("2000");
        record.authors = IdList::parse("5");
        record.source = "MORGAN KAUFMANN;SERIES".to_string();

        let mut cp = Checkpoint::default();
        let minted = apply_work(&mut record, &work, &mut cp);

        assert!(minted.is_empty());
        assert_eq!(record.date, PartialDate::parse_opt("2000"));
        assert_eq!(record.citedby, 40);
        assert_eq!(record.authors.to_string(), "5");
        assert_eq!(record.source, "MORGAN KAUFMANN;SERIES");
        assert_eq!(cp.next_author_id, 1);
    }
}
