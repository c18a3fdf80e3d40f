//! External metadata sources.

use citeweave_core::Eid;

use crate::error::Result;
use crate::raw::{RawRecord, RawReference};

pub mod crossref;
pub mod scopus;

/// Cursor value that starts a fresh result set.
pub const FIRST_CURSOR: &str = "*";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchRequest {
    /// Works whose title or abstract mentions `keyword`.
    Keyword { keyword: String, cursor: String },
    /// Works whose reference list contains `eid`.
    Citing { eid: Eid, cursor: String },
}

impl SearchRequest {
    pub fn cursor(&self) -> &str {
        match self {
            SearchRequest::Keyword { cursor, .. } | SearchRequest::Citing { cursor, .. } => cursor,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SearchPage {
    pub records: Vec<RawRecord>,
    pub cursor_current: String,
    pub cursor_next: String,
    pub next_url: Option<String>,
    pub quota_remaining: Option<u32>,
}

impl SearchPage {
    /// The result set is exhausted once the cursor stops advancing.
    pub fn is_last(&self) -> bool {
        self.cursor_next.is_empty() || self.cursor_current == self.cursor_next
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReferenceList {
    /// Reported total; `None` when the response had no reference section.
    pub total: Option<i64>,
    pub entries: Vec<RawReference>,
    pub quota_remaining: Option<u32>,
}

/// A paginated bibliographic search API with per-record reference lists.
pub trait MetadataSource {
    fn name(&self) -> &str;
    fn search(&self, request: &SearchRequest) -> Result<SearchPage>;
    fn references(&self, eid: Eid) -> Result<ReferenceList>;
}

#[cfg(test)]
pub(crate) mod fake {
    //! Scripted in-process source for sweep and resolver tests.

    use std::cell::RefCell;
    use std::collections::{HashMap, VecDeque};

    use super::*;
    use crate::error::ScienceError;

    #[derive(Default)]
    pub struct FakeSource {
        pub pages: RefCell<HashMap<(String, String), SearchPage>>,
        pub references: RefCell<HashMap<Eid, ReferenceList>>,
        pub calls: RefCell<VecDeque<String>>,
        pub fail_with_rate_limit: RefCell<bool>,
    }

    fn key(request: &SearchRequest) -> (String, String) {
        match request {
            SearchRequest::Keyword { keyword, cursor } => (keyword.clone(), cursor.clone()),
            SearchRequest::Citing { eid, cursor } => (format!("refeid:{eid}"), cursor.clone()),
        }
    }

    impl FakeSource {
        pub fn add_keyword_page(&self, keyword: &str, cursor: &str, page: SearchPage) {
            self.pages
                .borrow_mut()
                .insert((keyword.to_string(), cursor.to_string()), page);
        }

        pub fn add_citing_page(&self, eid: Eid, cursor: &str, page: SearchPage) {
            self.pages
                .borrow_mut()
                .insert((format!("refeid:{eid}"), cursor.to_string()), page);
        }

        pub fn add_references(&self, eid: Eid, list: ReferenceList) {
            self.references.borrow_mut().insert(eid, list);
        }
    }

    impl MetadataSource for FakeSource {
        fn name(&self) -> &str {
            "fake"
        }

        fn search(&self, request: &SearchRequest) -> Result<SearchPage> {
            let (query, cursor) = key(request);
            self.calls.borrow_mut().push_back(format!("{query}@{cursor}"));
            if *self.fail_with_rate_limit.borrow() {
                return Err(ScienceError::RateLimit("fake".to_string(), 60));
            }
            Ok(self
                .pages
                .borrow()
                .get(&(query, cursor.clone()))
                .cloned()
                .unwrap_or_else(|| SearchPage {
                    cursor_current: cursor.clone(),
                    cursor_next: cursor,
                    ..Default::default()
                }))
        }

        fn references(&self, eid: Eid) -> Result<ReferenceList> {
            self.calls.borrow_mut().push_back(format!("ref:{eid}"));
            Ok(self.references.borrow().get(&eid).cloned().unwrap_or_default())
        }
    }
}
