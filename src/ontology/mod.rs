pub mod loader;
pub mod matcher;
pub mod models;
pub mod suggester;

pub use loader::OntologyLoader;
pub use matcher::ConceptMatcher;
pub use models::{Concept, ConceptMatch, ConceptType, SuggestedConcept};
pub use suggester::{ConceptSuggester, infer_concept_type};
