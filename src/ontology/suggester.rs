//! Heuristic generation of new-concept proposals for descriptions the
//! loaded ontology does not cover.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use crate::ontology::loader::OntologyLoader;
use crate::ontology::matcher::ConceptMatcher;
use crate::ontology::models::{Concept, ConceptType, SuggestedConcept};
use crate::text::{preprocess, title_case};
use crate::utils::preview;

const OPERATION_KEYWORDS: [&str; 18] = [
    "analyze", "process", "filter", "transform", "convert", "calculate", "compute", "generate",
    "create", "extract", "merge", "split", "align", "assemble", "annotate", "predict", "classify",
    "cluster",
];
const DATA_KEYWORDS: [&str; 17] = [
    "sequence", "alignment", "matrix", "table", "list", "tree", "graph", "network", "profile",
    "signature", "pattern", "motif", "dataset", "collection", "set", "file", "record",
];
const FORMAT_KEYWORDS: [&str; 18] = [
    "format", "file", "extension", "encoding", "structure", "fasta", "fastq", "sam", "bam", "vcf",
    "bed", "gff", "gtf", "csv", "tsv", "json", "xml", "yaml",
];
const TOPIC_KEYWORDS: [&str; 17] = [
    "biology", "genomics", "proteomics", "metabolomics", "transcriptomics", "phylogenetics",
    "evolution", "disease", "cancer", "drug", "protein", "gene", "dna", "rna", "sequence",
    "alignment", "annotation",
];

/// Words dropped when building the condensed label variant.
const LABEL_STOP_WORDS: [&str; 12] = [
    "the", "a", "an", "and", "or", "for", "with", "in", "on", "at", "to", "of",
];

/// Number of semantic matches consulted when hunting for parent
/// candidates, and the relaxed threshold used for that search.
const PARENT_SEARCH_LIMIT: usize = 10;
const PARENT_SEARCH_THRESHOLD: f32 = 0.3;

/// Scores the description against the per-type keyword lists and picks
/// the strictly best type, ties resolved in declaration order. Identifier
/// is never inferred; a description hitting no keywords falls back to
/// Operation.
pub fn infer_concept_type(description: &str) -> ConceptType {
    let description_lower = description.to_lowercase();
    let scores = [
        (
            ConceptType::Operation,
            keyword_hits(&description_lower, &OPERATION_KEYWORDS),
        ),
        (
            ConceptType::Data,
            keyword_hits(&description_lower, &DATA_KEYWORDS),
        ),
        (
            ConceptType::Format,
            keyword_hits(&description_lower, &FORMAT_KEYWORDS),
        ),
        (
            ConceptType::Topic,
            keyword_hits(&description_lower, &TOPIC_KEYWORDS),
        ),
    ];

    let mut best = ConceptType::Operation;
    let mut best_score = 0;
    for (concept_type, score) in scores {
        if score > best_score {
            best = concept_type;
            best_score = score;
        }
    }
    best
}

fn keyword_hits(text: &str, keywords: &[&str]) -> usize {
    keywords.iter().filter(|&&keyword| text.contains(keyword)).count()
}

/// Synthesizes candidate concepts from a description, blending plain
/// label variants with placements under plausible parent concepts.
pub struct ConceptSuggester {
    loader: Arc<OntologyLoader>,
    matcher: Arc<ConceptMatcher>,
}

impl ConceptSuggester {
    pub fn new(loader: Arc<OntologyLoader>, matcher: Arc<ConceptMatcher>) -> Self {
        Self { loader, matcher }
    }

    /// Generates up to `max_suggestions` proposals. Label-based and
    /// hierarchical candidates are merged, deduplicated by exact label
    /// (first generated wins), then ranked by descending confidence.
    pub async fn suggest(
        &self,
        description: &str,
        concept_type: Option<ConceptType>,
        parent_hint: Option<&str>,
        rationale: Option<&str>,
        max_suggestions: usize,
    ) -> Vec<SuggestedConcept> {
        let concept_type = concept_type.unwrap_or_else(|| infer_concept_type(description));
        debug!("Suggesting {} concepts for type {}", max_suggestions, concept_type);
        if let Some(rationale) = rationale {
            debug!("Caller rationale: '{}'", preview(rationale, 80));
        }

        let mut suggestions = self.label_based(description, concept_type, max_suggestions);
        suggestions.extend(
            self.hierarchical(description, concept_type, parent_hint, max_suggestions)
                .await,
        );

        dedup_by_label(&mut suggestions);
        suggestions.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        suggestions.truncate(max_suggestions);
        suggestions
    }

    fn label_based(
        &self,
        description: &str,
        concept_type: ConceptType,
        max_suggestions: usize,
    ) -> Vec<SuggestedConcept> {
        // Variants come from the cleaned text; definition, rationale and
        // confidence keep the caller's wording.
        label_variants(&preprocess(description))
            .into_iter()
            .take(max_suggestions)
            .map(|label| {
                let confidence = label_confidence(&label, description);
                SuggestedConcept {
                    suggested_uri: self.synth_uri(&label, concept_type),
                    suggested_label: label,
                    concept_type,
                    definition: synth_definition(description),
                    parent_concept: None,
                    rationale: format!("Generated from description: '{description}'"),
                    confidence,
                }
            })
            .collect()
    }

    async fn hierarchical(
        &self,
        description: &str,
        concept_type: ConceptType,
        parent_hint: Option<&str>,
        max_suggestions: usize,
    ) -> Vec<SuggestedConcept> {
        let parents = self.candidate_parents(description, parent_hint).await;

        parents
            .into_iter()
            .take(max_suggestions)
            .map(|parent_uri| {
                let parent = self.loader.get(&parent_uri);
                let label = contextual_label(description, parent.as_ref());
                let confidence = hierarchical_confidence(parent.as_ref(), description);
                SuggestedConcept {
                    suggested_uri: self.synth_uri(&label, concept_type),
                    suggested_label: label,
                    concept_type,
                    definition: synth_definition(description),
                    rationale: format!(
                        "Suggested as child of '{parent_uri}' based on description"
                    ),
                    parent_concept: Some(parent_uri),
                    confidence,
                }
            })
            .collect()
    }

    /// Parent candidates are the parents of semantically similar concepts
    /// found at a relaxed threshold, deduplicated in discovery order. An
    /// explicit hint always goes first. The search runs on the description
    /// alone.
    async fn candidate_parents(
        &self,
        description: &str,
        parent_hint: Option<&str>,
    ) -> Vec<String> {
        let matches = self
            .matcher
            .match_concepts(
                description,
                None,
                PARENT_SEARCH_LIMIT,
                PARENT_SEARCH_THRESHOLD,
            )
            .await;

        let mut parents = Vec::new();
        for matched in &matches {
            let Some(concept) = self.loader.get(&matched.concept_uri) else {
                continue;
            };
            for parent in concept.parents {
                if !parents.contains(&parent) {
                    parents.push(parent);
                }
            }
        }
        if let Some(hint) = parent_hint {
            parents.insert(0, hint.to_string());
        }
        parents
    }

    fn synth_uri(&self, label: &str, concept_type: ConceptType) -> String {
        let slug: String = label
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace())
            .collect::<String>()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("_")
            .to_lowercase();
        format!(
            "{}/{}_{}",
            self.loader.namespace().trim_end_matches('/'),
            concept_type.uri_prefix(),
            slug
        )
    }
}

/// Up to three label candidates: the full title-cased description, its
/// first three words, and a stop-word-filtered form capped at four words.
/// Duplicates collapse, first occurrence wins.
fn label_variants(description: &str) -> Vec<String> {
    let words: Vec<&str> = description.split_whitespace().collect();
    let mut variants = Vec::new();

    let mut push = |variant: String| {
        if !variant.is_empty() && !variants.contains(&variant) {
            variants.push(variant);
        }
    };

    push(title_case(description));
    if words.len() > 1 {
        push(title_case(&words[..3.min(words.len())].join(" ")));
    }
    let filtered: Vec<&str> = words
        .iter()
        .copied()
        .filter(|w| !LABEL_STOP_WORDS.contains(&w.to_lowercase().as_str()))
        .collect();
    if !filtered.is_empty() {
        push(title_case(&filtered[..4.min(filtered.len())].join(" ")));
    }

    variants
}

/// Label combining the first two description words with the parent's
/// label; without a resolvable parent the whole description is used.
fn contextual_label(description: &str, parent: Option<&Concept>) -> String {
    match parent {
        Some(parent) => {
            let prefix: Vec<&str> = description.split_whitespace().take(2).collect();
            format!("{} {}", title_case(&prefix.join(" ")), parent.label)
        }
        None => title_case(description),
    }
}

fn synth_definition(description: &str) -> String {
    let trimmed = description.trim();
    let mut definition = String::with_capacity(trimmed.len() + 1);
    let mut chars = trimmed.chars();
    if let Some(first) = chars.next() {
        definition.extend(first.to_uppercase());
        definition.push_str(chars.as_str());
    }
    if !definition.is_empty() && !definition.ends_with('.') {
        definition.push('.');
    }
    definition
}

/// Base 0.5, rewarded for a 3 to 6 word label, length over ten
/// characters, a purely alphanumeric label and word overlap with the
/// description, clipped to 1.0.
fn label_confidence(label: &str, description: &str) -> f32 {
    let mut score: f32 = 0.5;

    let word_count = label.split_whitespace().count();
    if (3..=6).contains(&word_count) {
        score += 0.2;
    }
    if label.chars().count() > 10 {
        score += 0.1;
    }
    let compact: String = label.chars().filter(|c| !c.is_whitespace()).collect();
    if !compact.is_empty() && compact.chars().all(|c| c.is_ascii_alphanumeric()) {
        score += 0.1;
    }
    score += overlap_bonus(label, description);

    score.min(1.0)
}

/// Base 0.6, rewarded when the parent's label occurs in the description
/// and for word overlap between the parent's definition and the
/// description, clipped to 1.0.
fn hierarchical_confidence(parent: Option<&Concept>, description: &str) -> f32 {
    let mut score: f32 = 0.6;
    let Some(parent) = parent else {
        return score;
    };

    if description
        .to_lowercase()
        .contains(&parent.label.to_lowercase())
    {
        score += 0.2;
    }
    if let Some(definition) = &parent.definition {
        score += overlap_bonus(definition, description);
    }

    score.min(1.0)
}

/// 0.1 per shared lowercased word between the two texts, capped at 0.2.
fn overlap_bonus(text1: &str, text2: &str) -> f32 {
    let words1: HashSet<String> = text1.split_whitespace().map(str::to_lowercase).collect();
    let words2: HashSet<String> = text2.split_whitespace().map(str::to_lowercase).collect();
    let overlap = words1.intersection(&words2).count();
    (0.1 * overlap as f32).min(0.2)
}

fn dedup_by_label(suggestions: &mut Vec<SuggestedConcept>) {
    let mut seen = HashSet::new();
    suggestions.retain(|s| seen.insert(s.suggested_label.clone()));
}
