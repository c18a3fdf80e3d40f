//! Resumable batch drivers over the external source.
//!
//! Each driver commits one unit of work at a time and checks the cancel
//! flag and the remaining quota between units. The caller owns the
//! checkpoint and persists it whatever the outcome.

use std::sync::atomic::{AtomicBool, Ordering};

use citeweave_core::Checkpoint;
use citeweave_core::config::ScopusConfig;
use serde::Serialize;

use crate::error::{Result, ScienceError};

pub mod keyword;
pub mod references;

pub use keyword::run_keyword_sweep;
pub use references::run_reference_sweep;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepOutcome {
    Completed,
    /// Remaining quota reached the floor, or the source answered 429.
    QuotaExhausted,
    Cancelled,
}

/// Quota levels at which each kind of call stops being issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaFloors {
    pub search: u32,
    pub citing: u32,
    pub references: u32,
}

impl Default for QuotaFloors {
    fn default() -> Self {
        Self {
            search: 50,
            citing: 10,
            references: 10,
        }
    }
}

impl From<&ScopusConfig> for QuotaFloors {
    fn from(config: &ScopusConfig) -> Self {
        Self {
            search: config.search_quota_floor,
            citing: config.citing_quota_floor,
            references: config.references_quota_floor,
        }
    }
}

pub(crate) fn cancelled(cancel: &AtomicBool) -> bool {
    cancel.load(Ordering::Relaxed)
}

/// Turns a 429 into an exhausted quota; other errors pass through.
pub(crate) fn absorb_rate_limit<T>(
    checkpoint: &mut Checkpoint,
    result: Result<T>,
) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(ScienceError::RateLimit(url, wait)) => {
            tracing::warn!(%url, wait, "rate limited; pausing sweep");
            checkpoint.remaining_quota = 0;
            Ok(None)
        }
        Err(e) => Err(e),
    }
}
