use rmcp::{
    handler::server::{
        router::prompt::PromptRouter,
        router::tool::ToolRouter,
        wrapper::Parameters,
    },
    model::*,
    prompt, prompt_handler, prompt_router,
    service::RequestContext,
    tool, tool_handler, tool_router,
    transport::stdio,
    ErrorData as McpError, RoleServer, ServerHandler, ServiceExt,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

use crate::core::{OntomapConfig, OntomapError};
use crate::embedding::{Embedder, EmbeddingGenerator};
use crate::ontology::{
    Concept, ConceptMatch, ConceptMatcher, ConceptSuggester, ConceptType, OntologyLoader,
    SuggestedConcept,
};
use crate::utils::preview;

const DEFAULT_MAX_RESULTS: usize = 5;
const DEFAULT_MIN_CONFIDENCE: f32 = 0.5;
const SEARCH_DEFAULT_RESULTS: usize = 10;
const DEFAULT_NEIGHBOR_DISTANCE: usize = 2;

/// Matches consulted before suggesting, and the confidence at which an
/// existing match suppresses suggestion generation entirely.
const PRE_MAP_RESULTS: usize = 5;
const HIGH_CONFIDENCE: f32 = 0.8;

#[derive(Debug, Deserialize, JsonSchema)]
pub struct MapToConceptParams {
    #[schemars(description = "Free-text description of the tool, data or functionality to map")]
    pub description: String,
    #[schemars(description = "Optional additional context appended to the matching query")]
    pub context: Option<String>,
    #[schemars(description = "Max matches to return (default: 5)")]
    pub max_results: Option<usize>,
    #[schemars(description = "Minimum match confidence in [0,1] (default: 0.5)")]
    pub min_confidence: Option<f32>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SuggestConceptParams {
    #[schemars(description = "Description of the concept missing from the ontology")]
    pub description: String,
    #[schemars(
        description = "Concept type: 'Operation', 'Data', 'Format', 'Topic' or 'Identifier' (inferred when omitted)"
    )]
    pub concept_type: Option<String>,
    #[schemars(description = "URI of an existing concept to place the new one under")]
    pub parent_concept: Option<String>,
    #[schemars(description = "Why existing concepts do not cover this")]
    pub rationale: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchConceptsParams {
    #[schemars(description = "Substring to look for in labels, definitions and synonyms")]
    pub query: String,
    #[schemars(description = "Max concepts to return (default: 10)")]
    pub max_results: Option<usize>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ConceptDetailsParams {
    #[schemars(description = "Concept URI, e.g. 'http://edamontology.org/operation_2928'")]
    pub uri: String,
    #[schemars(description = "Hierarchy neighborhood radius in hops (default: 2)")]
    pub max_distance: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct MappingResponse {
    pub matches: Vec<ConceptMatch>,
    pub total_matches: usize,
    pub has_exact_match: bool,
    pub confidence_threshold: f32,
}

#[derive(Debug, Serialize)]
pub struct SuggestionResponse {
    pub suggestions: Vec<SuggestedConcept>,
    pub total_suggestions: usize,
    pub mapping_attempted: bool,
    pub mapping_failed_reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ConceptDetails {
    pub concept: Concept,
    pub hierarchy_path: Vec<String>,
    pub neighbors: Vec<ConceptMatch>,
}

#[derive(Clone)]
pub struct OntomapServer {
    config: OntomapConfig,
    loader: Arc<OntologyLoader>,
    matcher: Arc<ConceptMatcher>,
    suggester: Arc<ConceptSuggester>,
    tool_router: ToolRouter<Self>,
    prompt_router: PromptRouter<Self>,
}

impl OntomapServer {
    pub fn new(config: OntomapConfig) -> Self {
        let loader = Arc::new(OntologyLoader::from_config(&config));
        let embedder: Arc<dyn Embedder> = Arc::new(EmbeddingGenerator::from_config(&config));
        Self::with_components(config, loader, embedder)
    }

    /// Wires the server from pre-built components. Tests inject a stub
    /// embedder through this.
    pub fn with_components(
        config: OntomapConfig,
        loader: Arc<OntologyLoader>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        let matcher = Arc::new(ConceptMatcher::new(loader.clone(), embedder));
        let suggester = Arc::new(ConceptSuggester::new(loader.clone(), matcher.clone()));
        Self {
            config,
            loader,
            matcher,
            suggester,
            tool_router: Self::tool_router(),
            prompt_router: Self::prompt_router(),
        }
    }

    pub fn loader(&self) -> &Arc<OntologyLoader> {
        &self.loader
    }

    fn convert_error(err: OntomapError) -> McpError {
        match err {
            OntomapError::Validation(msg) => McpError::invalid_params(msg, None),
            OntomapError::Ontology(msg) => McpError::internal_error(msg, None),
            OntomapError::Http(e) => McpError::internal_error(e.to_string(), None),
            OntomapError::Serialization(e) => McpError::internal_error(e.to_string(), None),
            OntomapError::Io(e) => McpError::internal_error(e.to_string(), None),
        }
    }

    fn result_to_json<T: Serialize>(result: T) -> Result<String, McpError> {
        serde_json::to_string_pretty(&result)
            .map_err(|e| McpError::internal_error(e.to_string(), None))
    }

    async fn ensure_loaded(&self) -> Result<(), OntomapError> {
        if self.loader.is_loaded() || self.loader.load().await {
            Ok(())
        } else {
            Err(OntomapError::Ontology(
                "Failed to load EDAM ontology".to_string(),
            ))
        }
    }

    fn parse_concept_type(raw: Option<&str>) -> Result<Option<ConceptType>, OntomapError> {
        let Some(raw) = raw else {
            return Ok(None);
        };
        let concept_type = raw
            .parse::<ConceptType>()
            .map_err(|_| OntomapError::Validation(format!("Unknown concept type: {raw}")))?;
        if concept_type == ConceptType::Unknown {
            return Err(OntomapError::Validation(
                "Concept type 'Unknown' cannot be requested explicitly".to_string(),
            ));
        }
        Ok(Some(concept_type))
    }

    /// Exact label or synonym equality wins outright and bypasses the
    /// result cap; otherwise semantic matching applies.
    async fn map_description(
        &self,
        description: &str,
        context: Option<&str>,
        max_results: usize,
        min_confidence: f32,
    ) -> MappingResponse {
        let exact = self.matcher.find_exact(description);
        if !exact.is_empty() {
            return MappingResponse {
                total_matches: exact.len(),
                matches: exact,
                has_exact_match: true,
                confidence_threshold: min_confidence,
            };
        }

        let matches = self
            .matcher
            .match_concepts(description, context, max_results, min_confidence)
            .await;
        MappingResponse {
            total_matches: matches.len(),
            matches,
            has_exact_match: false,
            confidence_threshold: min_confidence,
        }
    }
}

#[tool_router]
impl OntomapServer {
    #[tool(
        description = "Map a free-text description to existing EDAM concepts. Tries exact label/synonym equality first, then embedding similarity. Returns: {matches, total_matches, has_exact_match, confidence_threshold}"
    )]
    pub async fn map_to_concept(
        &self,
        Parameters(params): Parameters<MapToConceptParams>,
    ) -> Result<CallToolResult, McpError> {
        info!("🧬 Mapping: '{}'", preview(&params.description, 50));
        self.ensure_loaded().await.map_err(Self::convert_error)?;

        let response = self
            .map_description(
                &params.description,
                params.context.as_deref(),
                params.max_results.unwrap_or(DEFAULT_MAX_RESULTS),
                params.min_confidence.unwrap_or(DEFAULT_MIN_CONFIDENCE),
            )
            .await;

        info!(
            "✅ Found {} matches (exact: {})",
            response.total_matches, response.has_exact_match
        );

        let json = Self::result_to_json(&response)?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(
        description = "Suggest new EDAM concepts for a description nothing existing covers. Suggestions are suppressed when a high-confidence match already exists. Returns: {suggestions, total_suggestions, mapping_attempted, mapping_failed_reason}"
    )]
    pub async fn suggest_concept(
        &self,
        Parameters(params): Parameters<SuggestConceptParams>,
    ) -> Result<CallToolResult, McpError> {
        info!("💡 Suggesting for: '{}'", preview(&params.description, 50));
        self.ensure_loaded().await.map_err(Self::convert_error)?;

        let concept_type = Self::parse_concept_type(params.concept_type.as_deref())
            .map_err(Self::convert_error)?;

        let pre_map = self
            .map_description(
                &params.description,
                params.rationale.as_deref(),
                PRE_MAP_RESULTS,
                self.config.similarity_threshold,
            )
            .await;
        if pre_map
            .matches
            .first()
            .is_some_and(|m| m.confidence >= HIGH_CONFIDENCE)
        {
            info!("✅ High-confidence match already exists, skipping suggestions");
            let response = SuggestionResponse {
                suggestions: vec![],
                total_suggestions: 0,
                mapping_attempted: true,
                mapping_failed_reason: Some("High-confidence existing matches found".to_string()),
            };
            let json = Self::result_to_json(&response)?;
            return Ok(CallToolResult::success(vec![Content::text(json)]));
        }

        let suggestions = self
            .suggester
            .suggest(
                &params.description,
                concept_type,
                params.parent_concept.as_deref(),
                params.rationale.as_deref(),
                self.config.max_suggestions,
            )
            .await;

        info!("✅ Generated {} suggestions", suggestions.len());

        let response = SuggestionResponse {
            total_suggestions: suggestions.len(),
            suggestions,
            mapping_attempted: true,
            mapping_failed_reason: None,
        };
        let json = Self::result_to_json(&response)?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(
        description = "Substring search over EDAM concept labels, definitions and synonyms. Returns: [{uri, label, type, definition, synonyms, parents, children}]"
    )]
    pub async fn search_concepts(
        &self,
        Parameters(params): Parameters<SearchConceptsParams>,
    ) -> Result<CallToolResult, McpError> {
        info!("🔍 Searching concepts: '{}'", preview(&params.query, 50));
        self.ensure_loaded().await.map_err(Self::convert_error)?;

        let results = self.loader.search(
            &params.query,
            params.max_results.unwrap_or(SEARCH_DEFAULT_RESULTS),
        );

        info!("✅ Found {} concepts", results.len());

        let json = Self::result_to_json(&results)?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(
        description = "Inspect one EDAM concept by URI: its record, root-to-leaf hierarchy path and nearby concepts with distance-decayed confidence. Returns: {concept, hierarchy_path, neighbors}"
    )]
    pub async fn concept_details(
        &self,
        Parameters(params): Parameters<ConceptDetailsParams>,
    ) -> Result<CallToolResult, McpError> {
        info!("📖 Concept details: {}", params.uri);
        self.ensure_loaded().await.map_err(Self::convert_error)?;

        let concept = self.loader.get(&params.uri).ok_or_else(|| {
            Self::convert_error(OntomapError::Validation(format!(
                "Unknown concept URI: {}",
                params.uri
            )))
        })?;

        let details = ConceptDetails {
            hierarchy_path: self.loader.hierarchy_path(&params.uri),
            neighbors: self.matcher.neighbors(
                &params.uri,
                params.max_distance.unwrap_or(DEFAULT_NEIGHBOR_DISTANCE),
            ),
            concept,
        };

        let json = Self::result_to_json(&details)?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }
}

#[prompt_router]
impl OntomapServer {
    #[prompt(
        name = "concept_mapping_guide",
        description = "Guide for choosing between mapping, searching and suggesting EDAM concepts"
    )]
    async fn concept_mapping_guide(&self) -> Result<GetPromptResult, McpError> {
        let guide = r#"# 🧬 EDAM Concept Mapping - Tool Selection Guide

You have access to EDAM ontology tools. Choose the RIGHT tool for each task:

## 🧬 map_to_concept
**When to use:** Linking a tool, operation, data item or format description to existing EDAM concepts
**Examples:**
- "Pairwise alignment of protein sequences"
- "Compressed FASTQ sequencing reads"

## 🔍 search_concepts
**When to use:** You already know part of a concept name and want the matching entries
**Note:** plain substring search, not ranked by relevance

## 📖 concept_details
**When to use:** Inspecting a known concept URI: its definition, where it sits in the
hierarchy, and which concepts are nearby

## 💡 suggest_concept
**When to use:** map_to_concept found nothing convincing and the ontology genuinely
lacks a concept. Provide a rationale; suggestions are suppressed when a
high-confidence match already exists.

---

## 🎯 Quick Decision Tree:

1. **Have a description, need a concept?** → map_to_concept
2. **Know (part of) the name?** → search_concepts
3. **Have a URI, want context?** → concept_details
4. **Nothing fits?** → suggest_concept"#;

        let messages = vec![PromptMessage::new_text(
            PromptMessageRole::Assistant,
            guide.to_string(),
        )];

        Ok(GetPromptResult {
            description: Some("Tool selection guide for EDAM concept mapping".to_string()),
            messages,
        })
    }
}

#[tool_handler]
#[prompt_handler]
impl ServerHandler for OntomapServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_prompts()
                .enable_resources()
                .build(),
            server_info: Implementation {
                name: "ontomap".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            instructions: Some(
                "EDAM ontology concept mapping for bioinformatics resources. Use map_to_concept \
                 to link descriptions to existing concepts, search_concepts for name lookups, \
                 concept_details to inspect the hierarchy, and suggest_concept when nothing fits."
                    .to_string(),
            ),
        }
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParam>,
        _ctx: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, McpError> {
        Ok(ListResourcesResult {
            resources: vec![
                RawResource::new("config://ontomap", "ontomap-config".to_string()).no_annotation(),
                RawResource::new("status://ontology", "ontology-status".to_string())
                    .no_annotation(),
            ],
            next_cursor: None,
        })
    }

    async fn read_resource(
        &self,
        ReadResourceRequestParam { uri }: ReadResourceRequestParam,
        _ctx: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        match uri.as_str() {
            "config://ontomap" => {
                let content = serde_json::to_string_pretty(&json!({
                    "version": env!("CARGO_PKG_VERSION"),
                    "ontology": {
                        "url": self.config.ontology_url,
                        "namespace": self.config.namespace,
                    },
                    "matching": {
                        "similarity_threshold": self.config.similarity_threshold,
                        "max_suggestions": self.config.max_suggestions,
                    },
                    "embedding": {
                        "provider": self.config.embedding_provider,
                        "model": self.config.embedding_model,
                    },
                    "capabilities": {
                        "exact_matching": true,
                        "semantic_matching": true,
                        "neighbor_search": true,
                        "concept_suggestion": true,
                    },
                    "tools": [
                        "map_to_concept",
                        "suggest_concept",
                        "search_concepts",
                        "concept_details",
                    ],
                }))
                .unwrap_or_default();

                Ok(ReadResourceResult {
                    contents: vec![ResourceContents::text(content, uri)],
                })
            }
            "status://ontology" => {
                let content = serde_json::to_string_pretty(&json!({
                    "status": if self.loader.is_loaded() { "loaded" } else { "not_loaded" },
                    "concepts": self.loader.len(),
                    "source": self.loader.source(),
                    "namespace": self.loader.namespace(),
                }))
                .unwrap_or_default();

                Ok(ReadResourceResult {
                    contents: vec![ResourceContents::text(content, uri)],
                })
            }
            _ => Err(McpError::resource_not_found(
                format!("Unknown resource: {}", uri),
                Some(json!({ "uri": uri })),
            )),
        }
    }
}

pub async fn run_server() -> anyhow::Result<()> {
    info!("🚀 Initializing EDAM concept mapping MCP server...");

    let config = OntomapConfig::from_env();
    let server = OntomapServer::new(config);

    if server.loader.load().await {
        info!("✅ Ontology preloaded ({} concepts)", server.loader.len());
    } else {
        warn!("⚠️ Ontology preload failed, retrying on first request");
    }

    info!("✅ ontomap MCP server ready");
    info!("   📍 Ontology: {}", server.config.ontology_url);
    info!(
        "   🤖 Embeddings: {}/{}",
        server.config.embedding_provider, server.config.embedding_model
    );

    let service = server.serve(stdio()).await?;
    service.waiting().await?;

    Ok(())
}
