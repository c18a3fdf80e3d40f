use std::sync::atomic::AtomicBool;

use citeweave_core::{Checkpoint, RecordStore, WorkingSet};

use super::{QuotaFloors, SweepOutcome, absorb_rate_limit, cancelled};
use crate::error::Result;
use crate::references::resolve_references;
use crate::sources::MetadataSource;

/// Resolves the reference list of every publication that has none yet,
/// optionally only those labelled `label`.
pub fn run_reference_sweep(
    store: &dyn RecordStore,
    source: &dyn MetadataSource,
    checkpoint: &mut Checkpoint,
    label: Option<&str>,
    floors: QuotaFloors,
    cancel: &AtomicBool,
) -> Result<SweepOutcome> {
    checkpoint.reset_counters();
    let mut ws = WorkingSet::load(store)?;
    let awaiting = store.awaiting_references(label)?;
    tracing::info!(publications = awaiting.len(), label, "reference sweep started");

    for eid in awaiting {
        if cancelled(cancel) {
            return Ok(SweepOutcome::Cancelled);
        }
        if checkpoint.remaining_quota <= floors.references {
            return Ok(SweepOutcome::QuotaExhausted);
        }

        let result = resolve_references(store, source, &mut ws, checkpoint, eid);
        let Some(report) = absorb_rate_limit(checkpoint, result)? else {
            return Ok(SweepOutcome::QuotaExhausted);
        };
        checkpoint.records_checked += 1;
        checkpoint.newly_added += report.pending_created as u64;

        if checkpoint.records_checked % 100 == 0 {
            tracing::info!(
                resolved = checkpoint.records_checked,
                quota = checkpoint.remaining_quota,
                "reference sweep progress"
            );
        }
    }

    tracing::info!(
        resolved = checkpoint.records_checked,
        new_pending = checkpoint.newly_added,
        "reference sweep finished"
    );
    Ok(SweepOutcome::Completed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw::RawReference;
    use crate::sources::ReferenceList;
    use crate::sources::fake::FakeSource;
    use citeweave_core::{Database, LabelSet, Publication};

    fn labelled(eid: i64, tag: &str) -> Publication {
        let mut p = Publication::new(eid, "t");
        p.label = LabelSet::single(tag);
        p
    }

    #[test]
    fn resolves_only_requested_label() {
        let db = Database::open_in_memory().unwrap();
        db.insert_publication(&labelled(1, "PSO")).unwrap();
        db.insert_publication(&labelled(2, "GA")).unwrap();
        let source = FakeSource::default();
        source.add_references(
            1,
            ReferenceList {
                total: Some(1),
                entries: vec![RawReference {
                    id: Some(50),
                    ..Default::default()
                }],
                quota_remaining: None,
            },
        );

        let mut cp = Checkpoint::default();
        let cancel = AtomicBool::new(false);
        let outcome =
            run_reference_sweep(&db, &source, &mut cp, Some("PSO"), QuotaFloors::default(), &cancel)
                .unwrap();

        assert_eq!(outcome, SweepOutcome::Completed);
        assert_eq!(cp.records_checked, 1);
        assert_eq!(cp.newly_added, 1);
        assert_eq!(db.get_publication(1).unwrap().unwrap().ref_count, Some(1));
        assert_eq!(db.get_publication(2).unwrap().unwrap().ref_count, None);
        assert_eq!(db.awaiting_references(None).unwrap(), vec![2]);
    }

    #[test]
    fn stops_at_reference_floor() {
        let db = Database::open_in_memory().unwrap();
        db.insert_publication(&labelled(1, "PSO")).unwrap();
        let source = FakeSource::default();
        let mut cp = Checkpoint {
            remaining_quota: 10,
            ..Default::default()
        };
        let cancel = AtomicBool::new(false);

        let outcome =
            run_reference_sweep(&db, &source, &mut cp, None, QuotaFloors::default(), &cancel)
                .unwrap();
        assert_eq!(outcome, SweepOutcome::QuotaExhausted);
        assert!(source.calls.borrow().is_empty());
        assert_eq!(db.get_publication(1).unwrap().unwrap().ref_count, None);
    }
}
