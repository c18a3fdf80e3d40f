use std::collections::VecDeque;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{AuthorId, Eid};

/// Weekly allowance of the search API when nothing has been recorded yet.
pub const DEFAULT_QUOTA: u32 = 20_000;

/// Resumption state shared by every sweep, persisted as JSON between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Checkpoint {
    pub remaining_quota: u32,
    /// Next-page cursor of the keyword search in progress.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword_cursor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_keyword: Option<String>,
    pub completed_keywords: Vec<String>,
    /// Primary publications whose citing works are still to be crawled.
    pub citing_queue: VecDeque<Eid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub citing_cursor: Option<String>,
    pub next_author_id: AuthorId,
    pub records_checked: u64,
    pub newly_added: u64,
    pub in_database: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,
}

impl Default for Checkpoint {
    fn default() -> Self {
        Self {
            remaining_quota: DEFAULT_QUOTA,
            keyword_cursor: None,
            current_keyword: None,
            completed_keywords: Vec::new(),
            citing_queue: VecDeque::new(),
            citing_cursor: None,
            next_author_id: 1,
            records_checked: 0,
            newly_added: 0,
            in_database: 0,
            saved_at: None,
        }
    }
}

impl Checkpoint {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Writes to a sibling temp file and renames it over `path`.
    pub fn save(&mut self, path: &Path) -> Result<()> {
        self.saved_at = Some(Utc::now());
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(self)?)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Per-run counters start from zero on every sweep.
    pub fn reset_counters(&mut self) {
        self.records_checked = 0;
        self.newly_added = 0;
        self.in_database = 0;
    }

    /// Books one external call: the server's remaining-quota header wins,
    /// otherwise the local count drops by one.
    pub fn record_call(&mut self, reported_remaining: Option<u32>) {
        self.remaining_quota = match reported_remaining {
            Some(n) => n,
            None => self.remaining_quota.saturating_sub(1),
        };
    }

    pub fn mint_author_id(&mut self) -> AuthorId {
        let id = self.next_author_id;
        self.next_author_id += 1;
        id
    }

    /// Queues `eid` for the citing crawl. Returns false if already queued.
    pub fn enqueue_citing(&mut self, eid: Eid) -> bool {
        if self.citing_queue.contains(&eid) {
            return false;
        }
        self.citing_queue.push_back(eid);
        true
    }

    pub fn is_completed(&self, keyword: &str) -> bool {
        self.completed_keywords.iter().any(|k| k == keyword)
    }

    pub fn complete_keyword(&mut self, keyword: &str) {
        if !self.is_completed(keyword) {
            self.completed_keywords.push(keyword.to_string());
        }
        self.current_keyword = None;
        self.keyword_cursor = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_gives_default() {
        let dir = TempDir::new().unwrap();
        let cp = Checkpoint::load(&dir.path().join("checkpoint.json")).unwrap();
        assert_eq!(cp, Checkpoint::default());
        assert_eq!(cp.next_author_id, 1);
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state").join("checkpoint.json");

        let mut cp = Checkpoint::default();
        cp.keyword_cursor = Some("AoJ4".to_string());
        cp.enqueue_citing(85000000001);
        cp.mint_author_id();
        cp.save(&path).unwrap();

        let loaded = Checkpoint::load(&path).unwrap();
        assert_eq!(loaded, cp);
        assert_eq!(loaded.next_author_id, 2);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn quota_prefers_server_header() {
        let mut cp = Checkpoint::default();
        cp.record_call(Some(120));
        assert_eq!(cp.remaining_quota, 120);
        cp.record_call(None);
        assert_eq!(cp.remaining_quota, 119);

        cp.remaining_quota = 0;
        cp.record_call(None);
        assert_eq!(cp.remaining_quota, 0);
    }

    #[test]
    fn citing_queue_has_no_duplicates() {
        let mut cp = Checkpoint::default();
        assert!(cp.enqueue_citing(5));
        assert!(!cp.enqueue_citing(5));
        assert_eq!(cp.citing_queue.len(), 1);
    }

    #[test]
    fn completing_keyword_clears_cursor() {
        let mut cp = Checkpoint::default();
        cp.current_keyword = Some("genetic algorithm".to_string());
        cp.keyword_cursor = Some("next".to_string());
        cp.complete_keyword("genetic algorithm");
        cp.complete_keyword("genetic algorithm");
        assert_eq!(cp.completed_keywords, vec!["genetic algorithm".to_string()]);
        assert_eq!(cp.keyword_cursor, None);
        assert!(cp.is_completed("genetic algorithm"));
    }
}
