//! Citeweave core: record model, SQLite record store, checkpoint state and config.

pub mod checkpoint;
pub mod config;
pub mod error;
pub mod models;
pub mod storage;
pub mod working_set;

pub use checkpoint::Checkpoint;
pub use config::AppConfig;
pub use error::{CiteweaveError, ExitCode, Result};
pub use models::*;
pub use working_set::WorkingSet;

pub use storage::RecordStore;
pub use storage::database::{
    ConnectionPool, Database, SCHEMA_VERSION, StoreCounts, open_database, open_in_memory,
};
pub use storage::repositories::{
    AffiliationRepository, AuthorRepository, PendingRepository, PublicationRepository, Repository,
    SqliteAffiliationRepository, SqliteAuthorRepository, SqlitePendingRepository,
    SqlitePublicationRepository,
};
