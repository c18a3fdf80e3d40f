use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use citeweave_core::{Eid, MatchKey, RecordStore};
use rand::Rng;
use rand::seq::SliceRandom;
use serde::Serialize;

use super::merger::{MergeResult, merge};
use crate::error::Result;
use crate::normalize::normalize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchCriterion {
    /// Same DOI on both sides.
    Doi,
    /// Same normalized title, for pending records without a DOI.
    Title,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Verdict {
    Merge,
    /// Needs a human; the reason says why.
    Flag(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate {
    pub publication_id: Eid,
    pub pending_id: Eid,
    /// The DOI or normalized title both sides share.
    pub key: String,
    pub verdict: Verdict,
}

/// Canonical DOI form for comparison.
pub fn doi_key(doi: &str) -> String {
    doi.trim().to_lowercase()
}

/// Pairs every pending record with the publication it appears to
/// duplicate under `criterion`. Result order is by pending id.
pub fn find_candidates(store: &dyn RecordStore, criterion: MatchCriterion) -> Result<Vec<Candidate>> {
    let key_of = |k: &MatchKey| -> String {
        match criterion {
            MatchCriterion::Doi => doi_key(&k.doi),
            MatchCriterion::Title => k.title.as_deref().map(normalize).unwrap_or_default(),
        }
    };

    let mut buckets: HashMap<String, Vec<MatchKey>> = HashMap::new();
    for key in store.publication_match_keys()? {
        let k = key_of(&key);
        if !k.is_empty() {
            buckets.entry(k).or_default().push(key);
        }
    }

    let mut pending = store.pending_match_keys()?;
    pending.sort_by_key(|k| k.id);

    let mut candidates = Vec::new();
    for record in pending {
        if criterion == MatchCriterion::Title && !record.doi.trim().is_empty() {
            continue;
        }
        let k = key_of(&record);
        if k.is_empty() {
            continue;
        }
        let Some(matches) = buckets.get(&k) else {
            continue;
        };

        // a publication with the pending record's own id is the same work
        let same_id = matches.iter().find(|m| m.id == record.id);
        let publication = same_id.unwrap_or(&matches[0]);
        let verdict = if same_id.is_some() {
            Verdict::Merge
        } else if matches.len() > 1 {
            let ids: Vec<String> = matches.iter().map(|m| m.id.to_string()).collect();
            Verdict::Flag(format!("ambiguous: publications {}", ids.join(",")))
        } else {
            match criterion {
                MatchCriterion::Doi => doi_verdict(publication, &record),
                MatchCriterion::Title => title_verdict(publication, &record),
            }
        };

        candidates.push(Candidate {
            publication_id: publication.id,
            pending_id: record.id,
            key: k,
            verdict,
        });
    }
    Ok(candidates)
}

fn doi_verdict(publication: &MatchKey, pending: &MatchKey) -> Verdict {
    let pending_title = pending.title.as_deref().map(normalize).unwrap_or_default();
    if pending_title.is_empty() {
        return Verdict::Merge;
    }
    let publication_title = normalize(publication.title.as_deref().unwrap_or_default());
    if publication_title == pending_title {
        Verdict::Merge
    } else {
        Verdict::Flag(format!(
            "same DOI, different titles: {publication_title:?} vs {pending_title:?}"
        ))
    }
}

fn title_verdict(publication: &MatchKey, pending: &MatchKey) -> Verdict {
    let Some(pending_date) = pending.date else {
        return Verdict::Merge;
    };
    match publication.date {
        Some(d) if d.same_month(&pending_date) => Verdict::Merge,
        Some(d) => Verdict::Flag(format!("same title, dates differ: {d} vs {pending_date}")),
        None => Verdict::Flag(format!("same title, publication undated vs {pending_date}")),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    pub candidates: usize,
    pub merged: usize,
    pub skipped: usize,
    pub flagged: usize,
    pub invalid: usize,
    pub cancelled: bool,
}

/// Finds candidates under `criterion` and merges them in random order.
/// Stops between candidates once `cancel` is set.
pub fn run_merge_sweep<R: Rng + ?Sized>(
    store: &dyn RecordStore,
    criterion: MatchCriterion,
    rng: &mut R,
    cancel: &AtomicBool,
) -> Result<MergeReport> {
    let mut candidates = find_candidates(store, criterion)?;
    candidates.shuffle(rng);

    let mut report = MergeReport {
        candidates: candidates.len(),
        ..Default::default()
    };
    tracing::info!(?criterion, candidates = report.candidates, "merge sweep started");

    for candidate in &candidates {
        if cancel.load(Ordering::Relaxed) {
            report.cancelled = true;
            break;
        }
        if let Verdict::Flag(reason) = &candidate.verdict {
            tracing::warn!(
                publication_id = candidate.publication_id,
                pending_id = candidate.pending_id,
                key = %candidate.key,
                %reason,
                "candidate flagged"
            );
            report.flagged += 1;
            continue;
        }
        match merge(store, candidate.publication_id, candidate.pending_id)? {
            MergeResult::Merged { .. } => report.merged += 1,
            MergeResult::Skipped { .. } => report.skipped += 1,
            MergeResult::Invalid { reason } => {
                tracing::debug!(pending_id = candidate.pending_id, %reason, "candidate no longer valid");
                report.invalid += 1;
            }
        }
    }

    tracing::info!(
        merged = report.merged,
        skipped = report.skipped,
        flagged = report.flagged,
        "merge sweep finished"
    );
    Ok(report)
}
