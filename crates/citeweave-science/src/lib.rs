//! Citeweave science: normalization, metadata sources, ingestion and
//! reconciliation of bibliographic records.

pub mod dedup;
pub mod enrichment;
pub mod error;
pub mod graph;
pub mod http;
pub mod ingest;
pub mod normalize;
pub mod raw;
pub mod references;
pub mod sources;
pub mod sweep;
pub mod vocabulary;

pub use dedup::{MatchCriterion, MergeReport, MergeResult, merge, run_merge_sweep};
pub use error::{Result, ScienceError};
pub use graph::{AuthorCitationGraph, AuthorGraphStats, CitationGraph, GraphStats};
pub use ingest::{IngestOutcome, ingest};
pub use normalize::normalize;
pub use raw::{RawAffiliation, RawAuthor, RawRecord, RawReference};
pub use references::{ResolveReport, resolve_references};
pub use sources::crossref::CrossRefSource;
pub use sources::scopus::ScopusSource;
pub use sources::{MetadataSource, SearchPage, SearchRequest};
pub use sweep::{QuotaFloors, SweepOutcome, run_keyword_sweep, run_reference_sweep};
pub use vocabulary::{Vocabulary, VocabularyEntry};
