use serde::{Deserialize, Serialize};

use crate::{
    DEFAULT_CONCEPT_CACHE_TTL, DEFAULT_EMBEDDING_CACHE_SIZE, DEFAULT_EMBEDDING_CACHE_TTL,
    DEFAULT_EMBEDDING_MODEL, DEFAULT_MAX_SUGGESTIONS, DEFAULT_NAMESPACE, DEFAULT_OLLAMA_URL,
    DEFAULT_ONTOLOGY_URL, DEFAULT_SIMILARITY_THRESHOLD,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OntomapConfig {
    pub ontology_url: String,
    pub namespace: String,
    pub similarity_threshold: f32,
    pub max_suggestions: usize,

    pub cache_dir: String,
    pub cache_ttl: u64,
    pub http_timeout: u64,

    pub embedding_provider: String,
    pub embedding_model: String,
    pub embedding_url: String,
    pub embedding_api_key: Option<String>,
    pub embedding_base_url: Option<String>,

    pub embedding_fallback_enabled: bool,
    pub embedding_fallback_url: String,
    pub embedding_fallback_model: String,
    pub embedding_cache_size: usize,
    pub embedding_cache_ttl: u64,
}

impl OntomapConfig {
    pub fn new(ontology_url: &str, namespace: &str) -> Self {
        Self {
            ontology_url: ontology_url.to_string(),
            namespace: namespace.to_string(),
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            max_suggestions: DEFAULT_MAX_SUGGESTIONS,

            cache_dir: "./cache".to_string(),
            cache_ttl: DEFAULT_CONCEPT_CACHE_TTL,
            http_timeout: 30,

            embedding_provider: "ollama".to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            embedding_url: DEFAULT_OLLAMA_URL.to_string(),
            embedding_api_key: None,
            embedding_base_url: None,

            embedding_fallback_enabled: true,
            embedding_fallback_url: DEFAULT_OLLAMA_URL.to_string(),
            embedding_fallback_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            embedding_cache_size: DEFAULT_EMBEDDING_CACHE_SIZE,
            embedding_cache_ttl: DEFAULT_EMBEDDING_CACHE_TTL,
        }
    }

    pub fn from_env() -> Self {
        let mut config = Self::new(
            &std::env::var("ONTOMAP_ONTOLOGY_URL")
                .unwrap_or_else(|_| DEFAULT_ONTOLOGY_URL.to_string()),
            &std::env::var("ONTOMAP_NAMESPACE").unwrap_or_else(|_| DEFAULT_NAMESPACE.to_string()),
        );

        if let Some(threshold) = env_parse("ONTOMAP_SIMILARITY_THRESHOLD") {
            config.similarity_threshold = threshold;
        }
        if let Some(max) = env_parse("ONTOMAP_MAX_SUGGESTIONS") {
            config.max_suggestions = max;
        }
        if let Ok(dir) = std::env::var("ONTOMAP_CACHE_DIR") {
            config.cache_dir = dir;
        }
        if let Some(ttl) = env_parse("ONTOMAP_CACHE_TTL") {
            config.cache_ttl = ttl;
        }
        if let Some(timeout) = env_parse("ONTOMAP_HTTP_TIMEOUT") {
            config.http_timeout = timeout;
        }
        if let Ok(provider) = std::env::var("ONTOMAP_EMBEDDING_PROVIDER") {
            config.embedding_provider = provider;
        }
        if let Ok(model) = std::env::var("ONTOMAP_EMBEDDING_MODEL") {
            config.embedding_model = model;
        }
        if let Ok(url) = std::env::var("ONTOMAP_EMBEDDING_URL") {
            config.embedding_url = url;
        }
        if let Ok(key) = std::env::var("ONTOMAP_EMBEDDING_API_KEY") {
            config.embedding_api_key = Some(key);
        }
        if let Ok(url) = std::env::var("ONTOMAP_EMBEDDING_BASE_URL") {
            config.embedding_base_url = Some(url);
        }
        if let Some(enabled) = env_parse("ONTOMAP_EMBEDDING_FALLBACK") {
            config.embedding_fallback_enabled = enabled;
        }
        if let Ok(url) = std::env::var("ONTOMAP_EMBEDDING_FALLBACK_URL") {
            config.embedding_fallback_url = url;
        }
        if let Ok(model) = std::env::var("ONTOMAP_EMBEDDING_FALLBACK_MODEL") {
            config.embedding_fallback_model = model;
        }

        config
    }
}

impl Default for OntomapConfig {
    fn default() -> Self {
        Self::new(DEFAULT_ONTOLOGY_URL, DEFAULT_NAMESPACE)
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}
