//! Reconciling pending records with the publications they duplicate.

pub mod finder;
pub mod merger;

pub use finder::{
    Candidate, MatchCriterion, MergeReport, Verdict, doi_key, find_candidates, run_merge_sweep,
};
pub use merger::{MergeResult, SkipReason, merge};
