pub mod resolver;

pub use resolver::{ResolveReport, resolve_references};
