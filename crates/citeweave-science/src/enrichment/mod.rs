//! Maintenance passes over stored records.

pub mod fill_missing;
pub mod relabel;

pub use fill_missing::{FillReport, fill_missing};
pub use relabel::relabel;
