//! Source-neutral records as fetched, before they touch the store.

use citeweave_core::{Affiliation, AffiliationId, Eid, PartialDate};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawAuthor {
    /// Source-assigned id; `None` when the source gives none and one must be minted.
    pub id: Option<i64>,
    pub name: String,
    pub surname: String,
    pub given_name: String,
    pub initials: String,
    pub affiliation_ids: Vec<AffiliationId>,
    pub url: String,
}

pub type RawAffiliation = Affiliation;

/// One search hit. Missing optional fields are empty or zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    /// `None` when the source omitted the id; ingesting such a record is an error.
    pub eid: Option<Eid>,
    pub title: String,
    pub abstract_text: String,
    pub doi: String,
    pub issn: String,
    pub volume: String,
    pub issue: String,
    pub cover_date: Option<PartialDate>,
    pub citedby: i64,
    pub doc_type: String,
    pub author_count: i64,
    pub source: String,
    pub source_id: String,
    pub url: String,
    pub author_keywords: String,
    pub authors: Vec<RawAuthor>,
    pub affiliations: Vec<RawAffiliation>,
}

/// One entry of a publication's reference list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawReference {
    pub id: Option<Eid>,
    pub title: Option<String>,
    pub url: String,
    pub reference_type: String,
    pub doi: String,
    pub source: String,
    pub citedby: i64,
    pub date: Option<PartialDate>,
    pub authors: Vec<RawAuthor>,
}
