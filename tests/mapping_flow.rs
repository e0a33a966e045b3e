//! End-to-end mapping, suggestion and lookup flows over a small OWL
//! fixture on disk, with a deterministic stub embedder.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::CallToolResult;

use ontomap::mcp::OntomapServer;
use ontomap::mcp::server::{
    ConceptDetailsParams, MapToConceptParams, SearchConceptsParams, SuggestConceptParams,
};
use ontomap::{Embedder, EmbeddingError, OntologyLoader, OntomapConfig};

const FIXTURE: &str = r#"<?xml version="1.0"?>
<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"
         xmlns:rdfs="http://www.w3.org/2000/01/rdf-schema#"
         xmlns:owl="http://www.w3.org/2002/07/owl#"
         xmlns:skos="http://www.w3.org/2004/02/skos/core#"
         xmlns:oboInOwl="http://www.geneontology.org/formats/oboInOwl#">
  <owl:Class rdf:about="http://edamontology.org/operation_0004">
    <rdfs:label>Operation</rdfs:label>
    <skos:definition>A function that processes inputs and produces outputs.</skos:definition>
  </owl:Class>
  <owl:Class rdf:about="http://edamontology.org/operation_2928">
    <rdfs:label>Alignment</rdfs:label>
    <oboInOwl:hasDefinition>Align two or more molecular sequences.</oboInOwl:hasDefinition>
    <skos:altLabel>Sequence alignment construction</skos:altLabel>
    <oboInOwl:hasExactSynonym>Alignment construction</oboInOwl:hasExactSynonym>
    <rdfs:subClassOf rdf:resource="http://edamontology.org/operation_0004"/>
  </owl:Class>
  <owl:Class rdf:about="http://edamontology.org/format_2330">
    <rdfs:label>Textual format</rdfs:label>
  </owl:Class>
  <owl:Class rdf:about="http://edamontology.org/format_1929">
    <rdfs:label>FASTA</rdfs:label>
    <skos:definition>FASTA sequence format.</skos:definition>
    <rdfs:subClassOf rdf:resource="http://edamontology.org/format_2330"/>
  </owl:Class>
  <owl:Class rdf:about="http://edamontology.org/data_0006">
    <rdfs:label>Data</rdfs:label>
  </owl:Class>
</rdf:RDF>"#;

/// Preprocessed embedding text of the Alignment fixture concept.
const ALIGNMENT_TEXT: &str = "alignment align two or more molecular sequences sequence alignment construction alignment construction";

struct StubEmbedder {
    vectors: HashMap<String, Vec<f32>>,
}

#[async_trait]
impl Embedder for StubEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(self
            .vectors
            .get(text)
            .cloned()
            .unwrap_or_else(|| vec![0.0, 0.0]))
    }
}

fn setup(name: &str) -> (OntomapConfig, PathBuf) {
    let dir = std::env::temp_dir().join(format!("ontomap-e2e-{}-{}", std::process::id(), name));
    std::fs::create_dir_all(&dir).unwrap();
    let owl = dir.join("edam.owl");
    std::fs::write(&owl, FIXTURE).unwrap();

    let mut config = OntomapConfig::default();
    config.ontology_url = owl.to_str().unwrap().to_string();
    config.cache_dir = dir.join("cache").to_str().unwrap().to_string();
    config.cache_ttl = 3600;
    (config, dir)
}

fn server_with(config: &OntomapConfig, vectors: HashMap<String, Vec<f32>>) -> OntomapServer {
    let loader = Arc::new(OntologyLoader::from_config(config));
    OntomapServer::with_components(config.clone(), loader, Arc::new(StubEmbedder { vectors }))
}

/// Unwraps the JSON payload a tool returned as its text content.
fn tool_json(result: &CallToolResult) -> serde_json::Value {
    let value = serde_json::to_value(result).unwrap();
    let text = value["content"][0]["text"].as_str().unwrap();
    serde_json::from_str(text).unwrap()
}

#[tokio::test]
async fn test_load_and_cache_roundtrip() {
    let (config, dir) = setup("cache");

    let loader = OntologyLoader::from_config(&config);
    assert!(loader.load().await);
    assert_eq!(loader.len(), 5);
    let alignment = loader.get("http://edamontology.org/operation_2928").unwrap();
    assert_eq!(alignment.label, "Alignment");
    assert_eq!(
        alignment.parents,
        vec!["http://edamontology.org/operation_0004".to_string()]
    );

    // With the source gone, a fresh loader restores from the snapshot.
    std::fs::remove_file(&config.ontology_url).unwrap();
    let restored = OntologyLoader::from_config(&config);
    assert!(restored.load().await);
    assert_eq!(restored.len(), 5);
    assert_eq!(
        restored
            .get("http://edamontology.org/operation_2928")
            .unwrap()
            .synonyms,
        alignment.synonyms
    );

    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn test_stale_cache_is_ignored() {
    let (mut config, dir) = setup("stale");
    config.cache_ttl = 0;

    let loader = OntologyLoader::from_config(&config);
    assert!(loader.load().await);

    // TTL zero means the snapshot written above is already stale, so a
    // loader without the source file fails instead of restoring.
    std::fs::remove_file(&config.ontology_url).unwrap();
    let second = OntologyLoader::from_config(&config);
    assert!(!second.load().await);

    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn test_map_to_concept_exact() {
    let (config, dir) = setup("map-exact");
    let server = server_with(&config, HashMap::new());

    let result = server
        .map_to_concept(Parameters(MapToConceptParams {
            description: "alignment".to_string(),
            context: None,
            max_results: None,
            min_confidence: None,
        }))
        .await
        .unwrap();

    let body = tool_json(&result);
    assert_eq!(body["has_exact_match"], true);
    assert_eq!(body["total_matches"], 1);
    assert_eq!(
        body["matches"][0]["concept_uri"],
        "http://edamontology.org/operation_2928"
    );
    assert_eq!(body["matches"][0]["confidence"], 1.0);
    assert_eq!(body["matches"][0]["concept_type"], "Operation");

    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn test_map_to_concept_semantic() {
    let (config, dir) = setup("map-semantic");
    let mut vectors = HashMap::new();
    vectors.insert(ALIGNMENT_TEXT.to_string(), vec![1.0, 0.0]);
    vectors.insert("compare protein sequences".to_string(), vec![1.0, 0.0]);
    let server = server_with(&config, vectors);

    let result = server
        .map_to_concept(Parameters(MapToConceptParams {
            description: "Compare protein sequences".to_string(),
            context: None,
            max_results: None,
            min_confidence: None,
        }))
        .await
        .unwrap();

    let body = tool_json(&result);
    assert_eq!(body["has_exact_match"], false);
    assert_eq!(body["total_matches"], 1);
    assert_eq!(body["matches"][0]["concept_label"], "Alignment");
    assert!(body["matches"][0]["confidence"].as_f64().unwrap() > 0.99);
    assert_eq!(body["confidence_threshold"], 0.5);

    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn test_suggest_skips_when_exact_match_exists() {
    let (config, dir) = setup("suggest-skip");
    let server = server_with(&config, HashMap::new());

    let result = server
        .suggest_concept(Parameters(SuggestConceptParams {
            description: "Alignment".to_string(),
            concept_type: None,
            parent_concept: None,
            rationale: None,
        }))
        .await
        .unwrap();

    let body = tool_json(&result);
    assert_eq!(body["total_suggestions"], 0);
    assert_eq!(body["mapping_attempted"], true);
    assert_eq!(
        body["mapping_failed_reason"],
        "High-confidence existing matches found"
    );

    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn test_suggest_generates_for_uncovered_description() {
    let (config, dir) = setup("suggest-new");
    let server = server_with(&config, HashMap::new());

    let result = server
        .suggest_concept(Parameters(SuggestConceptParams {
            description: "FASTQ file format".to_string(),
            concept_type: None,
            parent_concept: None,
            rationale: Some("Sequencing reads with quality scores".to_string()),
        }))
        .await
        .unwrap();

    let body = tool_json(&result);
    assert_eq!(body["total_suggestions"], 1);
    assert_eq!(body["mapping_failed_reason"], serde_json::Value::Null);
    let suggestion = &body["suggestions"][0];
    assert_eq!(suggestion["suggested_label"], "Fastq File Format");
    assert_eq!(
        suggestion["suggested_uri"],
        "http://edamontology.org/format_fastq_file_format"
    );
    assert_eq!(suggestion["concept_type"], "Format");
    assert_eq!(suggestion["definition"], "FASTQ file format.");
    assert_eq!(suggestion["parent_concept"], serde_json::Value::Null);

    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn test_suggest_rejects_invalid_type() {
    let (config, dir) = setup("suggest-invalid");
    let server = server_with(&config, HashMap::new());

    let err = server
        .suggest_concept(Parameters(SuggestConceptParams {
            description: "anything".to_string(),
            concept_type: Some("Unknown".to_string()),
            parent_concept: None,
            rationale: None,
        }))
        .await
        .unwrap_err();
    assert!(err.message.contains("Unknown"));

    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn test_search_concepts_tool() {
    let (config, dir) = setup("search");
    let server = server_with(&config, HashMap::new());

    let result = server
        .search_concepts(Parameters(SearchConceptsParams {
            query: "fasta".to_string(),
            max_results: None,
        }))
        .await
        .unwrap();

    let body = tool_json(&result);
    let hits = body.as_array().unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0]["label"], "FASTA");
    assert_eq!(hits[0]["type"], "Format");

    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn test_concept_details_tool() {
    let (config, dir) = setup("details");
    let server = server_with(&config, HashMap::new());

    let result = server
        .concept_details(Parameters(ConceptDetailsParams {
            uri: "http://edamontology.org/operation_2928".to_string(),
            max_distance: None,
        }))
        .await
        .unwrap();

    let body = tool_json(&result);
    assert_eq!(body["concept"]["label"], "Alignment");
    assert_eq!(body["concept"]["type"], "Operation");
    assert_eq!(body["hierarchy_path"], serde_json::json!(["Operation", "Alignment"]));
    let neighbors = body["neighbors"].as_array().unwrap();
    assert_eq!(neighbors.len(), 1);
    assert_eq!(
        neighbors[0]["concept_uri"],
        "http://edamontology.org/operation_0004"
    );
    assert!((neighbors[0]["confidence"].as_f64().unwrap() - 0.8).abs() < 1e-6);

    let err = server
        .concept_details(Parameters(ConceptDetailsParams {
            uri: "http://edamontology.org/missing".to_string(),
            max_distance: None,
        }))
        .await
        .unwrap_err();
    assert!(err.message.contains("Unknown concept URI"));

    let _ = std::fs::remove_dir_all(&dir);
}
