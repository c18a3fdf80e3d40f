use std::collections::{BTreeMap, BTreeSet};

use citeweave_core::{Author, AuthorId, Eid, RecordStore};
use serde::Serialize;

use crate::error::Result;
use crate::normalize::normalize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum MergeResult {
    Merged {
        aliases_added: usize,
        citers_updated: usize,
    },
    /// Left untouched for manual inspection.
    Skipped { reason: SkipReason },
    /// The pair is not a publication and a pending record (for instance the
    /// pending side was merged already).
    Invalid { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    /// Normalized author names differ between the two records.
    AuthorMismatch {
        publication: Vec<String>,
        pending: Vec<String>,
    },
    /// An author listed on one side has no author row.
    MissingAuthor { author_id: AuthorId },
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::AuthorMismatch {
                publication,
                pending,
            } => write!(
                f,
                "author names differ: [{}] vs [{}]",
                publication.join("; "),
                pending.join("; ")
            ),
            SkipReason::MissingAuthor { author_id } => write!(f, "author {author_id} not found"),
        }
    }
}

/// Folds pending record `pending_id` into publication `publication_id`.
///
/// Authors are matched by normalized display name and the two name sets
/// must be equal; otherwise nothing is written. Matching authors with
/// different ids become aliases of each other, every publication citing
/// the pending record is made to cite the publication instead, and the
/// pending row is deleted.
///
/// Running it again on a merged pair returns `Invalid`, since the pending
/// row is gone.
///
/// Equal ids mean an interrupted ingest left the pending row behind its
/// own publication; the row is folded without comparing authors.
pub fn merge(store: &dyn RecordStore, publication_id: Eid, pending_id: Eid) -> Result<MergeResult> {
    if publication_id == pending_id {
        if store.get_publication(publication_id)?.is_none() {
            return Ok(invalid(format!("publication {publication_id} not found")));
        }
        return Ok(match fold_pending(store, pending_id)? {
            Some(citers_updated) => MergeResult::Merged {
                aliases_added: 0,
                citers_updated,
            },
            None => invalid(format!("pending record {pending_id} not found")),
        });
    }
    let Some(publication) = store.get_publication(publication_id)? else {
        return Ok(invalid(format!("publication {publication_id} not found")));
    };
    let Some(pending) = store.get_pending(pending_id)? else {
        return Ok(invalid(format!("pending record {pending_id} not found")));
    };

    let mut aliases_added = 0;
    if !publication.authors.same_members(&pending.authors) {
        let ours = match names_by_key(store, &publication.authors.ids())? {
            Ok(map) => map,
            Err(reason) => return Ok(skipped(publication_id, pending_id, reason)),
        };
        let theirs = match names_by_key(store, &pending.authors.ids())? {
            Ok(map) => map,
            Err(reason) => return Ok(skipped(publication_id, pending_id, reason)),
        };

        if !ours.keys().eq(theirs.keys()) {
            let reason = SkipReason::AuthorMismatch {
                publication: ours.keys().cloned().collect(),
                pending: theirs.keys().cloned().collect(),
            };
            return Ok(skipped(publication_id, pending_id, reason));
        }

        aliases_added = link_aliases(store, &ours, &theirs)?;
    }

    let mut citers_updated = 0;
    for citer in pending.referenced_by.ids() {
        if citer == publication_id {
            continue;
        }
        let Some(mut citing) = store.get_publication(citer)? else {
            tracing::warn!(pending_id, citer, "citer is not a publication");
            continue;
        };
        if citing.cites.insert_id(publication_id) {
            store.set_cites(citer, &citing.cites)?;
            citers_updated += 1;
        }
    }

    store.delete_pending(pending_id)?;
    tracing::debug!(publication_id, pending_id, aliases_added, citers_updated, "merged");

    Ok(MergeResult::Merged {
        aliases_added,
        citers_updated,
    })
}

/// Moves the citers of pending record `eid` onto the publication with the
/// same id, then deletes the pending row. Returns the number of citers
/// updated, or `None` when there is no such pending row.
pub(crate) fn fold_pending(store: &dyn RecordStore, eid: Eid) -> Result<Option<usize>> {
    let Some(pending) = store.get_pending(eid)? else {
        return Ok(None);
    };

    let mut updated = 0;
    for citer in pending.referenced_by.ids() {
        if citer == eid {
            continue;
        }
        let Some(mut citing) = store.get_publication(citer)? else {
            tracing::warn!(eid, citer, "citer of pending record is not a publication");
            continue;
        };
        if citing.cites.insert_id(eid) {
            store.set_cites(citer, &citing.cites)?;
            updated += 1;
        }
    }
    store.delete_pending(eid)?;
    tracing::debug!(eid, citers_updated = updated, "pending record folded");
    Ok(Some(updated))
}

fn invalid(reason: String) -> MergeResult {
    MergeResult::Invalid { reason }
}

fn skipped(publication_id: Eid, pending_id: Eid, reason: SkipReason) -> MergeResult {
    tracing::warn!(publication_id, pending_id, %reason, "merge skipped");
    MergeResult::Skipped { reason }
}

/// Author rows keyed by normalized display name. The inner `Err` names the
/// first author id without a row.
fn names_by_key(
    store: &dyn RecordStore,
    ids: &[AuthorId],
) -> Result<std::result::Result<BTreeMap<String, Author>, SkipReason>> {
    let mut map = BTreeMap::new();
    for &id in ids {
        match store.get_author(id)? {
            Some(author) => {
                map.insert(normalize(&author.name), author);
            }
            None => return Ok(Err(SkipReason::MissingAuthor { author_id: id })),
        }
    }
    Ok(Ok(map))
}

/// Adds each differing id pair to both `aka` lists. Returns the number of
/// pairs that were not linked before.
fn link_aliases(
    store: &dyn RecordStore,
    ours: &BTreeMap<String, Author>,
    theirs: &BTreeMap<String, Author>,
) -> Result<usize> {
    let mut touched: BTreeMap<AuthorId, Author> = BTreeMap::new();
    let mut changed = BTreeSet::new();
    let mut added = 0;

    for (name, a) in ours {
        let Some(b) = theirs.get(name) else { continue };
        if a.id == b.id {
            continue;
        }
        let a_new = touched
            .entry(a.id)
            .or_insert_with(|| a.clone())
            .aka
            .insert_id(b.id);
        let b_new = touched
            .entry(b.id)
            .or_insert_with(|| b.clone())
            .aka
            .insert_id(a.id);
        if a_new {
            changed.insert(a.id);
        }
        if b_new {
            changed.insert(b.id);
        }
        if a_new || b_new {
            added += 1;
        }
    }

    for id in changed {
        if let Some(author) = touched.get(&id) {
            store.set_aka(id, &author.aka)?;
        }
    }
    Ok(added)
}
