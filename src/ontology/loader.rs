//! EDAM ontology loading and lookup.
//!
//! The loader fetches an OWL document (HTTP, `file://` or plain path),
//! extracts every class inside the configured namespace into [`Concept`]
//! records and serves lookups from an in-memory table. A snapshot cache
//! short-circuits the fetch while fresh; the table is swapped wholesale
//! on every successful load.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use indexmap::IndexMap;
use oxigraph::io::GraphFormat;
use oxigraph::model::vocab::{rdf, rdfs};
use oxigraph::model::{GraphNameRef, NamedNodeRef, Subject, SubjectRef, Term};
use oxigraph::store::Store;
use parking_lot::{RwLock, RwLockReadGuard};
use reqwest::Client;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::core::{ConceptCache, OntomapConfig, OntomapError, Result};
use crate::ontology::models::{Concept, ConceptType};

const OWL_CLASS: NamedNodeRef<'static> =
    NamedNodeRef::new_unchecked("http://www.w3.org/2002/07/owl#Class");
const SKOS_DEFINITION: NamedNodeRef<'static> =
    NamedNodeRef::new_unchecked("http://www.w3.org/2004/02/skos/core#definition");
const SKOS_ALT_LABEL: NamedNodeRef<'static> =
    NamedNodeRef::new_unchecked("http://www.w3.org/2004/02/skos/core#altLabel");
const OBO_HAS_DEFINITION: NamedNodeRef<'static> =
    NamedNodeRef::new_unchecked("http://www.geneontology.org/formats/oboInOwl#hasDefinition");
const OBO_EXACT_SYNONYM: NamedNodeRef<'static> =
    NamedNodeRef::new_unchecked("http://www.geneontology.org/formats/oboInOwl#hasExactSynonym");

/// Loads and holds the EDAM concept table.
pub struct OntologyLoader {
    source: String,
    namespace: String,
    cache: ConceptCache,
    client: Client,
    concepts: RwLock<IndexMap<String, Concept>>,
    loaded: AtomicBool,
}

impl OntologyLoader {
    pub fn new(source: &str, namespace: &str, cache: ConceptCache, timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            source: source.to_string(),
            namespace: namespace.to_string(),
            cache,
            client,
            concepts: RwLock::new(IndexMap::new()),
            loaded: AtomicBool::new(false),
        }
    }

    pub fn from_config(config: &OntomapConfig) -> Self {
        let cache = ConceptCache::new(&config.cache_dir, config.cache_ttl, &config.ontology_url);
        Self::new(
            &config.ontology_url,
            &config.namespace,
            cache,
            config.http_timeout,
        )
    }

    /// Loads (or reloads) the concept table, reporting success as a flag.
    /// On failure the previously loaded table stays visible unchanged.
    pub async fn load(&self) -> bool {
        match self.try_load().await {
            Ok(count) => {
                info!("Loaded {} EDAM concepts from {}", count, self.source);
                true
            }
            Err(e) => {
                error!("Ontology load failed: {}", e);
                false
            }
        }
    }

    /// Fallible load path. Consults the snapshot cache first; a stale or
    /// unreadable snapshot falls through to a fresh fetch and parse.
    pub async fn try_load(&self) -> Result<usize> {
        if self.cache.is_fresh() {
            match self.cache.load() {
                Ok(concepts) => {
                    let count = concepts.len();
                    *self.concepts.write() = concepts;
                    self.loaded.store(true, Ordering::SeqCst);
                    debug!("Restored {} concepts from cache snapshot", count);
                    return Ok(count);
                }
                Err(e) => {
                    warn!("Ignoring unreadable concept cache: {}", e);
                }
            }
        }

        let bytes = self.fetch_source().await?;
        let concepts = self.parse_concepts(&bytes)?;
        if concepts.is_empty() {
            return Err(OntomapError::Ontology(format!(
                "No concepts found under namespace {}",
                self.namespace
            )));
        }

        if let Err(e) = self.cache.store(&concepts) {
            warn!("Failed to write concept cache: {}", e);
        }

        let count = concepts.len();
        *self.concepts.write() = concepts;
        self.loaded.store(true, Ordering::SeqCst);
        Ok(count)
    }

    async fn fetch_source(&self) -> Result<Vec<u8>> {
        match Url::parse(&self.source) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {
                debug!("Fetching ontology from {}", url);
                let response = self.client.get(url).send().await?.error_for_status()?;
                Ok(response.bytes().await?.to_vec())
            }
            Ok(url) if url.scheme() == "file" => {
                let path = url.to_file_path().map_err(|_| {
                    OntomapError::Ontology(format!("Invalid file URL: {}", self.source))
                })?;
                Ok(tokio::fs::read(path).await?)
            }
            Ok(url) => Err(OntomapError::Ontology(format!(
                "Unsupported ontology URL scheme: {}",
                url.scheme()
            ))),
            // Not a URL at all, treat it as a filesystem path.
            Err(_) => Ok(tokio::fs::read(&self.source).await?),
        }
    }

    /// Extracts in-namespace OWL classes into the concept table. Classes
    /// without a usable label are dropped; parent links outside the
    /// namespace are dropped; children are wired up from the parent links
    /// in a second pass.
    fn parse_concepts(&self, bytes: &[u8]) -> Result<IndexMap<String, Concept>> {
        let store =
            Store::new().map_err(|e| OntomapError::Ontology(format!("RDF store error: {e}")))?;
        store
            .load_graph(bytes, GraphFormat::RdfXml, GraphNameRef::DefaultGraph, None)
            .map_err(|e| OntomapError::Ontology(format!("RDF/XML parse failed: {e}")))?;

        let mut concepts = IndexMap::new();
        for quad in store.quads_for_pattern(None, Some(rdf::TYPE), Some(OWL_CLASS.into()), None) {
            let Ok(quad) = quad else { continue };
            let Subject::NamedNode(class) = quad.subject else {
                continue;
            };
            if !class.as_str().starts_with(&self.namespace) {
                continue;
            }

            let Some(label) = literal_value(&store, class.as_ref().into(), rdfs::LABEL) else {
                warn!("Skipping concept without label: {}", class.as_str());
                continue;
            };

            let definition = literal_value(&store, class.as_ref().into(), SKOS_DEFINITION)
                .or_else(|| literal_value(&store, class.as_ref().into(), OBO_HAS_DEFINITION));

            let mut synonyms = literal_values(&store, class.as_ref().into(), SKOS_ALT_LABEL);
            for synonym in literal_values(&store, class.as_ref().into(), OBO_EXACT_SYNONYM) {
                if !synonyms.contains(&synonym) {
                    synonyms.push(synonym);
                }
            }

            let parents = parent_uris(&store, class.as_ref().into(), &self.namespace);
            let uri = class.into_string();
            let concept = Concept {
                concept_type: ConceptType::from_uri(&uri),
                label,
                definition,
                synonyms,
                parents,
                children: Vec::new(),
                uri: uri.clone(),
            };
            concepts.insert(uri, concept);
        }

        let links: Vec<(String, String)> = concepts
            .iter()
            .flat_map(|(uri, concept)| {
                concept
                    .parents
                    .iter()
                    .map(move |parent| (parent.clone(), uri.clone()))
            })
            .collect();
        for (parent, child) in links {
            if let Some(parent_concept) = concepts.get_mut(&parent) {
                parent_concept.children.push(child);
            }
        }

        Ok(concepts)
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::SeqCst)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn len(&self) -> usize {
        self.concepts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.concepts.read().is_empty()
    }

    /// Read access to the whole table, in load order.
    pub fn concepts(&self) -> RwLockReadGuard<'_, IndexMap<String, Concept>> {
        self.concepts.read()
    }

    pub fn get(&self, uri: &str) -> Option<Concept> {
        self.concepts.read().get(uri).cloned()
    }

    pub fn get_by_type(&self, concept_type: ConceptType) -> Vec<Concept> {
        self.concepts
            .read()
            .values()
            .filter(|c| c.concept_type == concept_type)
            .cloned()
            .collect()
    }

    /// Case-insensitive substring search over label, definition and
    /// synonyms, in that order per concept. Results keep table order and
    /// stop at `max_results`.
    pub fn search(&self, query: &str, max_results: usize) -> Vec<Concept> {
        if max_results == 0 {
            return Vec::new();
        }
        let query_lower = query.to_lowercase();
        let mut results = Vec::new();
        for concept in self.concepts.read().values() {
            let hit = concept.label.to_lowercase().contains(&query_lower)
                || concept
                    .definition
                    .as_ref()
                    .is_some_and(|d| d.to_lowercase().contains(&query_lower))
                || concept
                    .synonyms
                    .iter()
                    .any(|s| s.to_lowercase().contains(&query_lower));
            if hit {
                results.push(concept.clone());
                if results.len() >= max_results {
                    break;
                }
            }
        }
        results
    }

    /// Root-to-leaf label path obtained by following the first parent
    /// link upwards. Stops at a concept without parents, at a parent URI
    /// that is not loaded, or on revisiting a concept (cycle guard).
    pub fn hierarchy_path(&self, uri: &str) -> Vec<String> {
        let concepts = self.concepts.read();
        let mut path = Vec::new();
        let mut visited = HashSet::new();
        let mut current = uri.to_string();
        while let Some(concept) = concepts.get(&current) {
            if !visited.insert(current) {
                break;
            }
            path.insert(0, concept.label.clone());
            match concept.parents.first() {
                Some(parent) => current = parent.clone(),
                None => break,
            }
        }
        path
    }

    #[cfg(test)]
    pub(crate) fn seed(&self, concepts: Vec<Concept>) {
        let mut table = self.concepts.write();
        table.clear();
        for concept in concepts {
            table.insert(concept.uri.clone(), concept);
        }
        self.loaded.store(true, Ordering::SeqCst);
    }
}

fn literal_value(store: &Store, subject: SubjectRef<'_>, predicate: NamedNodeRef<'_>) -> Option<String> {
    for quad in store.quads_for_pattern(Some(subject), Some(predicate), None, None) {
        let Ok(quad) = quad else { continue };
        if let Term::Literal(literal) = quad.object {
            let value = literal.value().trim().to_string();
            if !value.is_empty() {
                return Some(value);
            }
        }
    }
    None
}

fn literal_values(store: &Store, subject: SubjectRef<'_>, predicate: NamedNodeRef<'_>) -> Vec<String> {
    let mut values = Vec::new();
    for quad in store.quads_for_pattern(Some(subject), Some(predicate), None, None) {
        let Ok(quad) = quad else { continue };
        if let Term::Literal(literal) = quad.object {
            let value = literal.value().trim().to_string();
            if !value.is_empty() && !values.contains(&value) {
                values.push(value);
            }
        }
    }
    values
}

fn parent_uris(store: &Store, subject: SubjectRef<'_>, namespace: &str) -> Vec<String> {
    let mut parents = Vec::new();
    for quad in store.quads_for_pattern(Some(subject), Some(rdfs::SUB_CLASS_OF), None, None) {
        let Ok(quad) = quad else { continue };
        if let Term::NamedNode(parent) = quad.object {
            if parent.as_str().starts_with(namespace) {
                let uri = parent.into_string();
                if !parents.contains(&uri) {
                    parents.push(uri);
                }
            }
        }
    }
    parents
}
