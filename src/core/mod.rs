pub mod cache;
pub mod config;
pub mod error;

pub use cache::ConceptCache;
pub use config::OntomapConfig;
pub use error::{OntomapError, Result};
