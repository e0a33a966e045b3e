use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::core::error::Result;
use crate::ontology::models::Concept;

/// On-disk snapshot of the parsed concept collection, keyed by a digest of
/// the ontology source so two sources never share a cache file. A snapshot
/// is a JSON concept map plus a sibling RFC 3339 timestamp stamp; corrupt
/// or stale files are treated as a miss, never an error.
pub struct ConceptCache {
    dir: PathBuf,
    ttl_secs: u64,
    key: String,
}

impl ConceptCache {
    pub fn new(dir: impl AsRef<Path>, ttl_secs: u64, source: &str) -> Self {
        let digest = Sha256::digest(source.as_bytes());
        let key: String = digest.iter().take(8).map(|b| format!("{b:02x}")).collect();
        Self {
            dir: dir.as_ref().to_path_buf(),
            ttl_secs,
            key,
        }
    }

    pub fn concepts_path(&self) -> PathBuf {
        self.dir.join(format!("concepts-{}.json", self.key))
    }

    fn stamp_path(&self) -> PathBuf {
        self.dir.join(format!("concepts-{}.stamp", self.key))
    }

    /// True when a stamp exists and is younger than the freshness window.
    pub fn is_fresh(&self) -> bool {
        let stamp = match fs::read_to_string(self.stamp_path()) {
            Ok(stamp) => stamp,
            Err(_) => return false,
        };
        match DateTime::parse_from_rfc3339(stamp.trim()) {
            Ok(written_at) => {
                let age = Utc::now().signed_duration_since(written_at);
                age < chrono::Duration::seconds(self.ttl_secs as i64)
            }
            Err(e) => {
                debug!("Unreadable cache stamp, treating as stale: {}", e);
                false
            }
        }
    }

    pub fn load(&self) -> Result<IndexMap<String, Concept>> {
        let data = fs::read_to_string(self.concepts_path())?;
        Ok(serde_json::from_str(&data)?)
    }

    pub fn store(&self, concepts: &IndexMap<String, Concept>) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.concepts_path(), serde_json::to_string(concepts)?)?;
        fs::write(self.stamp_path(), Utc::now().to_rfc3339())?;
        Ok(())
    }
}
