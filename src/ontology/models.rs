use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use crate::text::preprocess;

/// Concept category, derived from the URI at load time. Derivation checks
/// the variants in declaration order and the first lowercase name found as
/// a substring of the lowercased URI wins.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    IntoStaticStr,
)]
pub enum ConceptType {
    Operation,
    Data,
    Format,
    Topic,
    Identifier,
    Unknown,
}

impl ConceptType {
    pub fn from_uri(uri: &str) -> Self {
        let uri_lower = uri.to_lowercase();
        if uri_lower.contains("operation") {
            Self::Operation
        } else if uri_lower.contains("data") {
            Self::Data
        } else if uri_lower.contains("format") {
            Self::Format
        } else if uri_lower.contains("topic") {
            Self::Topic
        } else if uri_lower.contains("identifier") {
            Self::Identifier
        } else {
            Self::Unknown
        }
    }

    /// Segment prefix used when synthesizing URIs for suggested concepts.
    pub fn uri_prefix(self) -> &'static str {
        match self {
            Self::Operation => "operation",
            Self::Data => "data",
            Self::Format => "format",
            Self::Topic => "topic",
            Self::Identifier => "identifier",
            Self::Unknown => "unknown",
        }
    }
}

/// One vocabulary entry. Immutable after load; the whole collection is
/// rebuilt and swapped wholesale on reload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Concept {
    pub uri: String,
    pub label: String,
    pub definition: Option<String>,
    pub synonyms: Vec<String>,
    #[serde(rename = "type")]
    pub concept_type: ConceptType,
    /// Direct super-class URIs only, source order preserved. The hierarchy
    /// walk follows the first entry.
    pub parents: Vec<String>,
    pub children: Vec<String>,
}

impl Concept {
    /// Text embedded for semantic matching: label, definition and synonyms
    /// joined by single spaces, in canonical preprocessed form.
    pub fn embedding_text(&self) -> String {
        let mut parts = vec![self.label.clone()];
        if let Some(definition) = &self.definition {
            parts.push(definition.clone());
        }
        parts.extend(self.synonyms.iter().cloned());
        preprocess(&parts.join(" "))
    }
}

/// A scored association between an input text and a loaded concept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConceptMatch {
    pub concept_uri: String,
    pub concept_label: String,
    pub confidence: f32,
    pub concept_type: ConceptType,
    pub definition: Option<String>,
    pub synonyms: Vec<String>,
}

impl ConceptMatch {
    pub fn from_concept(concept: &Concept, confidence: f32) -> Self {
        Self {
            concept_uri: concept.uri.clone(),
            concept_label: concept.label.clone(),
            confidence,
            concept_type: concept.concept_type,
            definition: concept.definition.clone(),
            synonyms: concept.synonyms.clone(),
        }
    }
}

/// A synthesized candidate concept. Never written back into the graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestedConcept {
    pub suggested_label: String,
    pub suggested_uri: String,
    pub concept_type: ConceptType,
    pub definition: String,
    pub parent_concept: Option<String>,
    pub rationale: String,
    pub confidence: f32,
}
