//! Text embedding generation with provider fallback and query caching.
//!
//! The generator talks to Ollama or an OpenAI-compatible endpoint. When
//! the configured provider fails and fallback is enabled, requests retry
//! against a local Ollama instance so that semantic matching keeps
//! working without the primary provider.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::core::OntomapConfig;
use crate::utils::preview;
use crate::{
    DEFAULT_EMBEDDING_CACHE_SIZE, DEFAULT_EMBEDDING_CACHE_TTL, DEFAULT_EMBEDDING_MODEL,
    DEFAULT_OLLAMA_URL,
};

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("Empty text provided for embedding")]
    EmptyText,

    #[error("API key required for provider: {0}")]
    MissingApiKey(String),

    #[error("Embedding provider not implemented: {0}")]
    NotImplemented(String),

    #[error("Both providers failed: primary={0}, fallback={1}")]
    BothFailed(String, String),
}

/// Opaque text-to-vector capability. Vectors share one dimensionality
/// for the lifetime of an implementation.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}

#[derive(Serialize)]
struct OllamaEmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct OllamaEmbeddingResponse {
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct OpenAiEmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct OpenAiEmbeddingResponse {
    data: Vec<OpenAiEmbeddingData>,
}

#[derive(Deserialize)]
struct OpenAiEmbeddingData {
    embedding: Vec<f32>,
}

struct CacheEntry {
    vector: Vec<f32>,
    inserted_at: Instant,
}

/// Bounded query cache with TTL expiry. At capacity the oldest entry is
/// evicted.
struct QueryCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    max_size: usize,
    ttl: Duration,
}

impl QueryCache {
    fn new(max_size: usize, ttl_secs: u64) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_size,
            ttl: Duration::from_secs(ttl_secs),
        }
    }

    fn get(&self, key: &str) -> Option<Vec<f32>> {
        let entries = self.entries.read();
        let entry = entries.get(key)?;
        if entry.inserted_at.elapsed() > self.ttl {
            return None;
        }
        Some(entry.vector.clone())
    }

    fn insert(&self, key: String, vector: Vec<f32>) {
        let mut entries = self.entries.write();
        if entries.len() >= self.max_size && !entries.contains_key(&key) {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.inserted_at)
                .map(|(key, _)| key.clone());
            if let Some(oldest) = oldest {
                entries.remove(&oldest);
            }
        }
        entries.insert(
            key,
            CacheEntry {
                vector,
                inserted_at: Instant::now(),
            },
        );
    }

    fn len(&self) -> usize {
        self.entries.read().len()
    }

    fn clear(&self) {
        self.entries.write().clear();
    }
}

/// Embedding client for Ollama and OpenAI-compatible providers.
pub struct EmbeddingGenerator {
    provider: String,
    model: String,
    url: String,
    api_key: Option<String>,
    base_url: Option<String>,
    client: Client,
    cache: QueryCache,
    fallback_enabled: bool,
    fallback_url: String,
    fallback_model: String,
    using_fallback: AtomicBool,
    fallback_count: AtomicUsize,
}

impl EmbeddingGenerator {
    pub fn new(provider: &str, url: &str, model: &str) -> Self {
        Self {
            provider: provider.to_string(),
            model: model.to_string(),
            url: url.to_string(),
            api_key: None,
            base_url: None,
            client: Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .expect("Failed to create HTTP client"),
            cache: QueryCache::new(DEFAULT_EMBEDDING_CACHE_SIZE, DEFAULT_EMBEDDING_CACHE_TTL),
            fallback_enabled: true,
            fallback_url: DEFAULT_OLLAMA_URL.to_string(),
            fallback_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            using_fallback: AtomicBool::new(false),
            fallback_count: AtomicUsize::new(0),
        }
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    pub fn with_base_url(mut self, base_url: Option<String>) -> Self {
        self.base_url = base_url;
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to create HTTP client");
        self
    }

    pub fn with_cache(mut self, max_size: usize, ttl_secs: u64) -> Self {
        self.cache = QueryCache::new(max_size, ttl_secs);
        self
    }

    pub fn with_fallback(mut self, enabled: bool, url: &str, model: &str) -> Self {
        self.fallback_enabled = enabled;
        self.fallback_url = url.to_string();
        self.fallback_model = model.to_string();
        self
    }

    pub fn from_config(config: &OntomapConfig) -> Self {
        Self::new(
            &config.embedding_provider,
            &config.embedding_url,
            &config.embedding_model,
        )
        .with_api_key(config.embedding_api_key.clone())
        .with_base_url(config.embedding_base_url.clone())
        .with_timeout(config.http_timeout)
        .with_cache(config.embedding_cache_size, config.embedding_cache_ttl)
        .with_fallback(
            config.embedding_fallback_enabled,
            &config.embedding_fallback_url,
            &config.embedding_fallback_model,
        )
    }

    /// Embeds `text`, consulting and filling the query cache when
    /// `use_cache` is set. A failing primary provider falls back to
    /// Ollama when enabled and not already the primary.
    pub async fn generate(&self, text: &str, use_cache: bool) -> Result<Vec<f32>, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::EmptyText);
        }

        if use_cache {
            if let Some(vector) = self.cache.get(text) {
                debug!("Embedding cache hit for '{}'", preview(text, 40));
                return Ok(vector);
            }
        }

        let result = match self.provider.as_str() {
            "ollama" => self.generate_ollama(&self.url, &self.model, text).await,
            "openai" => self.generate_openai(text).await,
            other => Err(EmbeddingError::NotImplemented(other.to_string())),
        };

        let vector = match result {
            Ok(vector) => {
                self.using_fallback.store(false, Ordering::Relaxed);
                vector
            }
            Err(primary) if self.fallback_enabled && self.provider != "ollama" => {
                warn!(
                    "Embedding provider '{}' failed, falling back to Ollama: {}",
                    self.provider, primary
                );
                match self
                    .generate_ollama(&self.fallback_url, &self.fallback_model, text)
                    .await
                {
                    Ok(vector) => {
                        self.using_fallback.store(true, Ordering::Relaxed);
                        self.fallback_count.fetch_add(1, Ordering::Relaxed);
                        vector
                    }
                    Err(fallback) => {
                        return Err(EmbeddingError::BothFailed(
                            primary.to_string(),
                            fallback.to_string(),
                        ));
                    }
                }
            }
            Err(e) => return Err(e),
        };

        if use_cache {
            self.cache.insert(text.to_string(), vector.clone());
        }
        Ok(vector)
    }

    async fn generate_ollama(
        &self,
        url: &str,
        model: &str,
        text: &str,
    ) -> Result<Vec<f32>, EmbeddingError> {
        let endpoint = format!("{}/api/embeddings", url.trim_end_matches('/'));
        let response = self
            .client
            .post(&endpoint)
            .json(&OllamaEmbeddingRequest { model, prompt: text })
            .send()
            .await?
            .error_for_status()?;

        let body = response.text().await?;
        let parsed: OllamaEmbeddingResponse = serde_json::from_str(&body)?;
        if parsed.embedding.is_empty() {
            return Err(EmbeddingError::InvalidResponse(
                "empty embedding vector".to_string(),
            ));
        }
        Ok(parsed.embedding)
    }

    async fn generate_openai(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(EmbeddingError::MissingApiKey(self.provider.clone()));
        };
        let base = self.base_url.as_deref().unwrap_or(OPENAI_API_BASE);
        let endpoint = format!("{}/embeddings", base.trim_end_matches('/'));
        let response = self
            .client
            .post(&endpoint)
            .bearer_auth(api_key)
            .json(&OpenAiEmbeddingRequest {
                model: &self.model,
                input: text,
            })
            .send()
            .await?
            .error_for_status()?;

        let body = response.text().await?;
        let parsed: OpenAiEmbeddingResponse = serde_json::from_str(&body)?;
        parsed
            .data
            .into_iter()
            .next()
            .map(|data| data.embedding)
            .ok_or_else(|| {
                EmbeddingError::InvalidResponse("no embedding data returned".to_string())
            })
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn is_using_fallback(&self) -> bool {
        self.using_fallback.load(Ordering::Relaxed)
    }

    pub fn fallback_count(&self) -> usize {
        self.fallback_count.load(Ordering::Relaxed)
    }

    pub fn cache_size(&self) -> usize {
        self.cache.len()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }
}

#[async_trait]
impl Embedder for EmbeddingGenerator {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.generate(text, true).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let generator = EmbeddingGenerator::new("ollama", DEFAULT_OLLAMA_URL, DEFAULT_EMBEDDING_MODEL);
        assert_eq!(generator.provider(), "ollama");
        assert_eq!(generator.model(), DEFAULT_EMBEDDING_MODEL);
        assert_eq!(generator.cache_size(), 0);
        assert!(!generator.is_using_fallback());
        assert_eq!(generator.fallback_count(), 0);
    }

    #[test]
    fn test_from_config_carries_provider_settings() {
        let mut config = OntomapConfig::default();
        config.embedding_provider = "openai".to_string();
        config.embedding_model = "text-embedding-3-small".to_string();
        config.embedding_api_key = Some("sk-test".to_string());

        let generator = EmbeddingGenerator::from_config(&config);
        assert_eq!(generator.provider(), "openai");
        assert_eq!(generator.model(), "text-embedding-3-small");
        assert_eq!(generator.api_key.as_deref(), Some("sk-test"));
    }

    #[tokio::test]
    async fn test_generate_rejects_empty_text() {
        let generator = EmbeddingGenerator::new("ollama", DEFAULT_OLLAMA_URL, DEFAULT_EMBEDDING_MODEL);
        assert!(matches!(
            generator.generate("   ", true).await,
            Err(EmbeddingError::EmptyText)
        ));
    }

    #[tokio::test]
    async fn test_unknown_provider_without_fallback() {
        let generator = EmbeddingGenerator::new("azure", "http://localhost:9", "m")
            .with_fallback(false, DEFAULT_OLLAMA_URL, DEFAULT_EMBEDDING_MODEL);
        let err = generator.generate("text", false).await.unwrap_err();
        assert!(matches!(err, EmbeddingError::NotImplemented(p) if p == "azure"));
    }

    #[tokio::test]
    async fn test_openai_without_key_fails_fast() {
        let generator = EmbeddingGenerator::new("openai", "unused", "text-embedding-3-small")
            .with_fallback(false, DEFAULT_OLLAMA_URL, DEFAULT_EMBEDDING_MODEL);
        let err = generator.generate("hello", false).await.unwrap_err();
        assert!(matches!(err, EmbeddingError::MissingApiKey(_)));
    }

    #[test]
    fn test_cache_roundtrip_and_clear() {
        let generator = EmbeddingGenerator::new("ollama", DEFAULT_OLLAMA_URL, DEFAULT_EMBEDDING_MODEL);
        generator.cache.insert("query".to_string(), vec![0.1, 0.2]);
        assert_eq!(generator.cache_size(), 1);
        assert_eq!(generator.cache.get("query"), Some(vec![0.1, 0.2]));
        generator.clear_cache();
        assert_eq!(generator.cache_size(), 0);
    }

    #[test]
    fn test_cache_evicts_oldest_at_capacity() {
        let cache = QueryCache::new(2, 60);
        cache.insert("first".to_string(), vec![1.0]);
        std::thread::sleep(Duration::from_millis(5));
        cache.insert("second".to_string(), vec![2.0]);
        std::thread::sleep(Duration::from_millis(5));
        cache.insert("third".to_string(), vec![3.0]);

        assert_eq!(cache.len(), 2);
        assert!(cache.get("first").is_none());
        assert_eq!(cache.get("third"), Some(vec![3.0]));
    }

    #[test]
    fn test_cache_expires_by_ttl() {
        let cache = QueryCache::new(10, 0);
        cache.insert("query".to_string(), vec![1.0]);
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get("query").is_none());
    }

    #[test]
    fn test_cache_refresh_does_not_evict() {
        let cache = QueryCache::new(2, 60);
        cache.insert("a".to_string(), vec![1.0]);
        cache.insert("b".to_string(), vec![2.0]);
        // Overwriting an existing key at capacity must not drop a
        // different entry.
        cache.insert("a".to_string(), vec![3.0]);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a"), Some(vec![3.0]));
        assert_eq!(cache.get("b"), Some(vec![2.0]));
    }
}
