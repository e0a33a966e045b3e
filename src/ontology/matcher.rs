//! Concept matching strategies: exact label equality, embedding-based
//! semantic similarity and hierarchy neighbor search.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{debug, error};

use crate::embedding::{Embedder, EmbeddingError};
use crate::ontology::loader::OntologyLoader;
use crate::ontology::models::ConceptMatch;
use crate::similarity::cosine_similarity;
use crate::text::preprocess;

/// Matches free text against the loaded concept table.
///
/// The per-concept embedding table is built once, on the first semantic
/// match, and kept for the matcher's lifetime. Reloading the ontology does
/// not refresh it; construct a new matcher after a reload when embeddings
/// must stay consistent with the table.
pub struct ConceptMatcher {
    loader: Arc<OntologyLoader>,
    embedder: Arc<dyn Embedder>,
    embeddings: OnceCell<Vec<(String, Vec<f32>)>>,
}

impl ConceptMatcher {
    pub fn new(loader: Arc<OntologyLoader>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            loader,
            embedder,
            embeddings: OnceCell::new(),
        }
    }

    /// Case-insensitive equality against labels and synonyms. Every equal
    /// concept is returned with confidence 1.0, in table order.
    pub fn find_exact(&self, text: &str) -> Vec<ConceptMatch> {
        let needle = text.to_lowercase();
        self.loader
            .concepts()
            .values()
            .filter(|concept| {
                concept.label.to_lowercase() == needle
                    || concept.synonyms.iter().any(|s| s.to_lowercase() == needle)
            })
            .map(|concept| ConceptMatch::from_concept(concept, 1.0))
            .collect()
    }

    /// Embedding-based ranking of concepts against `description`, with
    /// optional extra `context` appended to the query. Unavailable
    /// embeddings degrade to an empty result, never an error.
    pub async fn match_concepts(
        &self,
        description: &str,
        context: Option<&str>,
        max_results: usize,
        min_confidence: f32,
    ) -> Vec<ConceptMatch> {
        let table = match self.embedding_table().await {
            Ok(table) => table,
            Err(e) => {
                error!("Concept embeddings unavailable: {}", e);
                return Vec::new();
            }
        };

        let mut query = preprocess(description);
        if let Some(context) = context {
            let context = preprocess(context);
            if !context.is_empty() {
                query.push(' ');
                query.push_str(&context);
            }
        }

        let query_vector = match self.embedder.embed(&query).await {
            Ok(vector) => vector,
            Err(e) => {
                error!("Query embedding failed: {}", e);
                return Vec::new();
            }
        };

        let mut scored: Vec<(String, f32)> = table
            .iter()
            .map(|(uri, vector)| (uri.clone(), cosine_similarity(&query_vector, vector)))
            .filter(|(_, score)| *score >= min_confidence)
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(max_results);

        let mut matches = Vec::with_capacity(scored.len());
        for (uri, score) in scored {
            if let Some(concept) = self.loader.get(&uri) {
                matches.push(ConceptMatch::from_concept(&concept, score));
            }
        }
        matches
    }

    /// Breadth-first walk over parent and child edges from `uri`, out to
    /// `max_distance` hops. The start concept itself is excluded and each
    /// concept is visited once at its first-seen distance. Confidence
    /// decays by 0.2 per hop, floored at zero.
    pub fn neighbors(&self, uri: &str, max_distance: usize) -> Vec<ConceptMatch> {
        let concepts = self.loader.concepts();
        if !concepts.contains_key(uri) {
            return Vec::new();
        }

        let mut matches = Vec::new();
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        visited.insert(uri.to_string());
        queue.push_back((uri.to_string(), 0usize));

        while let Some((current, distance)) = queue.pop_front() {
            let Some(concept) = concepts.get(&current) else {
                continue;
            };
            if distance > 0 {
                let confidence = (1.0 - 0.2 * distance as f32).max(0.0);
                matches.push(ConceptMatch::from_concept(concept, confidence));
            }
            if distance < max_distance {
                for next in concept.parents.iter().chain(concept.children.iter()) {
                    if visited.insert(next.clone()) {
                        queue.push_back((next.clone(), distance + 1));
                    }
                }
            }
        }
        matches
    }

    async fn embedding_table(&self) -> Result<&Vec<(String, Vec<f32>)>, EmbeddingError> {
        self.embeddings
            .get_or_try_init(|| self.build_embedding_table())
            .await
    }

    async fn build_embedding_table(&self) -> Result<Vec<(String, Vec<f32>)>, EmbeddingError> {
        let texts: Vec<(String, String)> = self
            .loader
            .concepts()
            .values()
            .map(|concept| (concept.uri.clone(), concept.embedding_text()))
            .collect();

        debug!("Building embeddings for {} concepts", texts.len());
        let mut table = Vec::with_capacity(texts.len());
        for (uri, text) in texts {
            let vector = self.embedder.embed(&text).await?;
            table.push((uri, vector));
        }
        Ok(table)
    }
}
