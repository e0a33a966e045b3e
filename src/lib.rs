pub mod core;
pub mod embedding;
pub mod mcp;
pub mod ontology;
pub mod similarity;
pub mod text;
pub mod utils;

pub use utils::preview;

pub use crate::core::config::OntomapConfig;
pub use crate::core::error::{OntomapError, Result};
pub use crate::embedding::{Embedder, EmbeddingError, EmbeddingGenerator};
pub use crate::ontology::{
    Concept, ConceptMatch, ConceptMatcher, ConceptSuggester, ConceptType, OntologyLoader,
    SuggestedConcept,
};

/// URL of the published EDAM ontology document.
pub const DEFAULT_ONTOLOGY_URL: &str = "https://edamontology.org/EDAM.owl";

/// URI prefix that scopes which graph nodes belong to the vocabulary.
pub const DEFAULT_NAMESPACE: &str = "http://edamontology.org/";

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

pub const DEFAULT_EMBEDDING_MODEL: &str = "nomic-embed-text";

/// Minimum confidence used when pre-mapping before suggestion generation.
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.7;

pub const DEFAULT_MAX_SUGGESTIONS: usize = 5;

/// Freshness window for the on-disk concept snapshot, in seconds.
pub const DEFAULT_CONCEPT_CACHE_TTL: u64 = 3600;

/// Capacity of the in-memory embedding query cache.
pub const DEFAULT_EMBEDDING_CACHE_SIZE: usize = 1000;

/// TTL for entries in the embedding query cache, in seconds.
pub const DEFAULT_EMBEDDING_CACHE_TTL: u64 = 300;
