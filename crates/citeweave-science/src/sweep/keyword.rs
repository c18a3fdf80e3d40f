use std::sync::atomic::AtomicBool;

use citeweave_core::{Checkpoint, RecordStore, WorkingSet};

use super::{QuotaFloors, SweepOutcome, absorb_rate_limit, cancelled};
use crate::error::Result;
use crate::ingest::ingest;
use crate::sources::{FIRST_CURSOR, MetadataSource, SearchRequest};
use crate::vocabulary::{Vocabulary, VocabularyEntry};

/// Searches every vocabulary keyword not yet completed and ingests the
/// hits, crawling the citing works of newly matched publications in
/// between pages.
///
/// The keyword cursor only advances once a whole page is ingested, so a
/// cancelled page is fetched again on the next run.
pub fn run_keyword_sweep(
    store: &dyn RecordStore,
    source: &dyn MetadataSource,
    vocabulary: &Vocabulary,
    checkpoint: &mut Checkpoint,
    floors: QuotaFloors,
    cancel: &AtomicBool,
) -> Result<SweepOutcome> {
    checkpoint.reset_counters();
    let mut ws = WorkingSet::load(store)?;

    for entry in vocabulary.entries() {
        if checkpoint.is_completed(&entry.keyword) {
            continue;
        }
        if checkpoint.current_keyword.as_deref() != Some(entry.keyword.as_str()) {
            checkpoint.current_keyword = Some(entry.keyword.clone());
            checkpoint.keyword_cursor = None;
        }
        tracing::info!(keyword = %entry.keyword, tag = %entry.tag, "keyword search");

        loop {
            let outcome = drain_citing_queue(store, source, &mut ws, checkpoint, entry, floors, cancel)?;
            if outcome != SweepOutcome::Completed {
                return Ok(outcome);
            }
            if cancelled(cancel) {
                return Ok(SweepOutcome::Cancelled);
            }
            if checkpoint.remaining_quota <= floors.search {
                return Ok(SweepOutcome::QuotaExhausted);
            }

            let request = SearchRequest::Keyword {
                keyword: entry.keyword.clone(),
                cursor: checkpoint
                    .keyword_cursor
                    .clone()
                    .unwrap_or_else(|| FIRST_CURSOR.to_string()),
            };
            let Some(page) = absorb_rate_limit(checkpoint, source.search(&request))? else {
                return Ok(SweepOutcome::QuotaExhausted);
            };
            checkpoint.record_call(page.quota_remaining);

            for raw in &page.records {
                if cancelled(cancel) {
                    return Ok(SweepOutcome::Cancelled);
                }
                ingest(store, &mut ws, checkpoint, raw, entry, None)?;
            }

            tracing::info!(
                keyword = %entry.keyword,
                checked = checkpoint.records_checked,
                added = checkpoint.newly_added,
                quota = checkpoint.remaining_quota,
                "page ingested"
            );

            if page.is_last() {
                checkpoint.complete_keyword(&entry.keyword);
                break;
            }
            checkpoint.keyword_cursor = Some(page.cursor_next);
        }
    }

    // Publications queued by the last keyword still need their citing works.
    if let Some(entry) = vocabulary.entries().last() {
        return drain_citing_queue(store, source, &mut ws, checkpoint, entry, floors, cancel);
    }
    Ok(SweepOutcome::Completed)
}

/// Pages through the works citing each queued publication. New hits are
/// classified against `entry`.
fn drain_citing_queue(
    store: &dyn RecordStore,
    source: &dyn MetadataSource,
    ws: &mut WorkingSet,
    checkpoint: &mut Checkpoint,
    entry: &VocabularyEntry,
    floors: QuotaFloors,
    cancel: &AtomicBool,
) -> Result<SweepOutcome> {
    while let Some(&cited) = checkpoint.citing_queue.front() {
        if cancelled(cancel) {
            return Ok(SweepOutcome::Cancelled);
        }
        if checkpoint.remaining_quota <= floors.citing {
            return Ok(SweepOutcome::QuotaExhausted);
        }

        let request = SearchRequest::Citing {
            eid: cited,
            cursor: checkpoint
                .citing_cursor
                .clone()
                .unwrap_or_else(|| FIRST_CURSOR.to_string()),
        };
        let Some(page) = absorb_rate_limit(checkpoint, source.search(&request))? else {
            return Ok(SweepOutcome::QuotaExhausted);
        };
        checkpoint.record_call(page.quota_remaining);

        for raw in &page.records {
            if cancelled(cancel) {
                return Ok(SweepOutcome::Cancelled);
            }
            ingest(store, ws, checkpoint, raw, entry, Some(cited))?;
        }

        if page.is_last() {
            checkpoint.citing_queue.pop_front();
            checkpoint.citing_cursor = None;
            tracing::debug!(cited, "citing works crawled");
        } else {
            checkpoint.citing_cursor = Some(page.cursor_next);
        }
    }
    Ok(SweepOutcome::Completed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw::RawRecord;
    use crate::sources::SearchPage;
    use crate::sources::fake::FakeSource;
    use citeweave_core::Database;

    fn hit(eid: i64, title: &str) -> RawRecord {
        RawRecord {
            eid: Some(eid),
            title: title.to_string(),
            ..Default::default()
        }
    }

    fn page(records: Vec<RawRecord>, current: &str, next: &str) -> SearchPage {
        SearchPage {
            records,
            cursor_current: current.to_string(),
            cursor_next: next.to_string(),
            next_url: None,
            quota_remaining: None,
        }
    }

    fn vocabulary() -> Vocabulary {
        Vocabulary::parse("particle swarm optimization : PSO").unwrap()
    }

    #[test]
    fn pages_keyword_and_crawls_citing_works() {
        let db = Database::open_in_memory().unwrap();
        let source = FakeSource::default();
        source.add_keyword_page(
            "particle swarm optimization",
            "*",
            page(
                vec![hit(1, "Particle swarm optimization"), hit(2, "Ant colonies")],
                "*",
                "p2",
            ),
        );
        source.add_keyword_page(
            "particle swarm optimization",
            "p2",
            page(vec![hit(3, "Particle swarm optimisation revisited")], "p2", "p2"),
        );
        source.add_citing_page(1, "*", page(vec![hit(2, "Ant colonies"), hit(4, "Bees")], "*", "*"));

        let mut cp = Checkpoint::default();
        let cancel = AtomicBool::new(false);
        let outcome =
            run_keyword_sweep(&db, &source, &vocabulary(), &mut cp, QuotaFloors::default(), &cancel)
                .unwrap();

        assert_eq!(outcome, SweepOutcome::Completed);
        assert!(cp.is_completed("particle swarm optimization"));
        assert!(cp.citing_queue.is_empty());
        assert_eq!(cp.keyword_cursor, None);

        assert_eq!(db.get_publication(2).unwrap().unwrap().cites.to_string(), "1");
        assert_eq!(db.get_publication(4).unwrap().unwrap().cites.to_string(), "1");
        assert!(db.get_publication(4).unwrap().unwrap().label.is_other());
        // 3 was queued by the second page and crawled after it
        assert!(source.calls.borrow().contains(&"refeid:3@*".to_string()));
    }

    #[test]
    fn low_quota_stops_before_searching() {
        let db = Database::open_in_memory().unwrap();
        let source = FakeSource::default();
        let mut cp = Checkpoint {
            remaining_quota: 50,
            ..Default::default()
        };
        let cancel = AtomicBool::new(false);

        let outcome =
            run_keyword_sweep(&db, &source, &vocabulary(), &mut cp, QuotaFloors::default(), &cancel)
                .unwrap();
        assert_eq!(outcome, SweepOutcome::QuotaExhausted);
        assert!(source.calls.borrow().is_empty());
        assert_eq!(cp.current_keyword.as_deref(), Some("particle swarm optimization"));
    }

    #[test]
    fn rate_limit_exhausts_quota() {
        let db = Database::open_in_memory().unwrap();
        let source = FakeSource::default();
        *source.fail_with_rate_limit.borrow_mut() = true;
        let mut cp = Checkpoint::default();
        let cancel = AtomicBool::new(false);

        let outcome =
            run_keyword_sweep(&db, &source, &vocabulary(), &mut cp, QuotaFloors::default(), &cancel)
                .unwrap();
        assert_eq!(outcome, SweepOutcome::QuotaExhausted);
        assert_eq!(cp.remaining_quota, 0);
    }

    #[test]
    fn cancel_keeps_cursor_for_resume() {
        let db = Database::open_in_memory().unwrap();
        let source = FakeSource::default();
        let mut cp = Checkpoint {
            current_keyword: Some("particle swarm optimization".to_string()),
            keyword_cursor: Some("p7".to_string()),
            ..Default::default()
        };
        let cancel = AtomicBool::new(true);

        let outcome =
            run_keyword_sweep(&db, &source, &vocabulary(), &mut cp, QuotaFloors::default(), &cancel)
                .unwrap();
        assert_eq!(outcome, SweepOutcome::Cancelled);
        assert_eq!(cp.keyword_cursor.as_deref(), Some("p7"));
    }

    #[test]
    fn completed_keywords_are_skipped() {
        let db = Database::open_in_memory().unwrap();
        let source = FakeSource::default();
        let mut cp = Checkpoint {
            completed_keywords: vec!["particle swarm optimization".to_string()],
            ..Default::default()
        };
        let cancel = AtomicBool::new(false);

        let outcome =
            run_keyword_sweep(&db, &source, &vocabulary(), &mut cp, QuotaFloors::default(), &cancel)
                .unwrap();
        assert_eq!(outcome, SweepOutcome::Completed);
        assert!(source.calls.borrow().is_empty());
    }
}
