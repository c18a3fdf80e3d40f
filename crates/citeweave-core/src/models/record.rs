use serde::{Deserialize, Serialize};

use super::{IdList, LabelSet, PartialDate};

/// External identifier of a publication or pending record (the numeric
/// part of a source eid).
pub type Eid = i64;
pub type AuthorId = i64;
pub type AffiliationId = i64;

/// A record in the primary corpus.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Publication {
    pub eid: Eid,
    pub title: String,
    pub source: String,
    pub issn: String,
    pub volume: String,
    pub issue: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<PartialDate>,
    pub doi: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub citedby: i64,
    pub affiliations: IdList,
    pub doc_type: String,
    pub author_count: i64,
    pub authors: IdList,
    pub author_keywords: String,
    pub source_id: String,
    pub url: String,
    pub label: LabelSet,
    pub cites: IdList,
    /// Total references reported by the source; `None` until fetched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ref_count: Option<i64>,
}

impl Publication {
    pub fn new(eid: Eid, title: impl Into<String>) -> Self {
        Self {
            eid,
            title: title.into(),
            ..Default::default()
        }
    }
}

/// A work known only because some publication cites it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PendingRecord {
    pub id: Eid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub url: String,
    pub reference_type: String,
    pub authors: IdList,
    pub citedby: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<PartialDate>,
    pub doi: String,
    pub source: String,
    pub referenced_by: IdList,
}

impl PendingRecord {
    pub fn new(id: Eid, referenced_by: Eid) -> Self {
        Self {
            id,
            referenced_by: IdList::from_ids([referenced_by]),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: AuthorId,
    pub name: String,
    pub surname: String,
    pub given_name: String,
    pub initials: String,
    pub affiliations: IdList,
    pub url: String,
    /// Other author ids known to denote the same person. Kept symmetric.
    pub aka: IdList,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Affiliation {
    pub id: AffiliationId,
    pub name: String,
    pub city: String,
    pub country: String,
    pub url: String,
}

/// The fields the duplicate finder compares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchKey {
    pub id: Eid,
    pub title: Option<String>,
    pub doi: String,
    pub date: Option<PartialDate>,
}
