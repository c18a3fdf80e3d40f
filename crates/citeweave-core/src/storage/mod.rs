pub mod database;
pub mod record_store;
pub mod repositories;

pub use record_store::RecordStore;
