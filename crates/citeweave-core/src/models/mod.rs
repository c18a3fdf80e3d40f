mod date;
mod id_list;
mod label;
mod record;

pub use date::PartialDate;
pub use id_list::IdList;
pub use label::{LabelChange, LabelSet, OTHER_LABEL};
pub use record::{
    Affiliation, AffiliationId, Author, AuthorId, Eid, MatchKey, PendingRecord, Publication,
};
