//! Vector store abstraction for Kursdesk.
//!
//! Records live in named collections. Each record carries its text, a flat
//! JSON metadata map and an embedding; queries rank by cosine similarity and
//! can be narrowed with equality filters on metadata.

mod memory;
mod sqlite;

pub use memory::MemoryVectorStore;
pub use sqlite::SqliteVectorStore;

use crate::config::{Settings, VectorStoreSettings};
use crate::error::{KursdeskError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Flat key/value metadata attached to a record.
pub type Metadata = serde_json::Map<String, Value>;

/// A record stored in a collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    /// Identifier, unique within its collection.
    pub id: String,
    /// Text that was embedded.
    pub text: String,
    pub metadata: Metadata,
    pub embedding: Vec<f32>,
    /// When this record was written.
    pub indexed_at: DateTime<Utc>,
}

impl Record {
    pub fn new(
        id: impl Into<String>,
        text: impl Into<String>,
        metadata: Metadata,
        embedding: Vec<f32>,
    ) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            metadata,
            embedding,
            indexed_at: Utc::now(),
        }
    }

    /// String metadata value, if present.
    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }

    /// Unsigned integer metadata value, if present.
    pub fn meta_u32(&self, key: &str) -> Option<u32> {
        self.metadata
            .get(key)
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok())
    }
}

/// A search result with score.
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// The matched record.
    pub record: Record,
    /// Similarity score (higher is better).
    pub score: f32,
}

/// Conjunction of metadata equality conditions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataFilter {
    conditions: Vec<(String, Value)>,
}

impl MetadataFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `key` to equal `value`.
    pub fn eq(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push((key.into(), value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Whether every condition holds for `metadata`.
    pub fn matches(&self, metadata: &Metadata) -> bool {
        self.conditions
            .iter()
            .all(|(key, expected)| metadata.get(key) == Some(expected))
    }
}

/// Trait for vector store implementations.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Store a record, replacing any record with the same id.
    async fn upsert(&self, collection: &str, record: &Record) -> Result<()>;

    /// Bulk upsert records.
    async fn upsert_batch(&self, collection: &str, records: &[Record]) -> Result<usize>;

    /// Search for similar records.
    async fn search(
        &self,
        collection: &str,
        query_embedding: &[f32],
        limit: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchResult>> {
        self.search_with_threshold(collection, query_embedding, limit, f32::MIN, filter)
            .await
    }

    /// Search with a minimum similarity threshold.
    async fn search_with_threshold(
        &self,
        collection: &str,
        query_embedding: &[f32],
        limit: usize,
        min_score: f32,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchResult>>;

    /// Fetch a record by id.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Record>>;

    /// All records of a collection, ordered by id.
    async fn list(&self, collection: &str) -> Result<Vec<Record>>;

    /// Number of records in a collection.
    async fn count(&self, collection: &str) -> Result<usize>;

    /// Delete every record of a collection.
    async fn clear_collection(&self, collection: &str) -> Result<usize>;

    async fn exists(&self, collection: &str, id: &str) -> Result<bool> {
        Ok(self.get(collection, id).await?.is_some())
    }
}

/// Open the backend named in the settings.
pub fn create_store(settings: &VectorStoreSettings) -> Result<Arc<dyn VectorStore>> {
    match settings.provider.as_str() {
        "sqlite" => {
            let path = Settings::expand_path(&settings.sqlite_path);
            Ok(Arc::new(SqliteVectorStore::new(&path)?))
        }
        "memory" => Ok(Arc::new(MemoryVectorStore::new())),
        other => Err(KursdeskError::Config(format!(
            "Unknown vector store provider: {}",
            other
        ))),
    }
}

/// Sort by descending score and keep the best `limit`.
fn rank(results: &mut Vec<SearchResult>, limit: usize) {
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    results.truncate(limit);
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.001);

        let c = vec![0.0, 1.0, 0.0];
        assert!((cosine_similarity(&a, &c)).abs() < 0.001);

        let d = vec![-1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &d) + 1.0).abs() < 0.001);

        assert_eq!(cosine_similarity(&a, &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_metadata_filter() {
        let mut metadata = Metadata::new();
        metadata.insert("course_title".into(), json!("Intro to Testing"));
        metadata.insert("lesson_number".into(), json!(2));

        assert!(MetadataFilter::new().matches(&metadata));
        assert!(MetadataFilter::new()
            .eq("course_title", "Intro to Testing")
            .eq("lesson_number", 2u32)
            .matches(&metadata));
        assert!(!MetadataFilter::new().eq("lesson_number", 3u32).matches(&metadata));
        assert!(!MetadataFilter::new().eq("missing", "x").matches(&metadata));
    }

    #[test]
    fn test_record_metadata_accessors() {
        let mut metadata = Metadata::new();
        metadata.insert("title".into(), json!("A"));
        metadata.insert("lesson_count".into(), json!(4));
        let record = Record::new("A", "A", metadata, vec![1.0]);

        assert_eq!(record.meta_str("title"), Some("A"));
        assert_eq!(record.meta_u32("lesson_count"), Some(4));
        assert_eq!(record.meta_str("lesson_count"), None);
    }

    #[test]
    fn test_create_store_rejects_unknown_provider() {
        let settings = VectorStoreSettings {
            provider: "qdrant".to_string(),
            ..Default::default()
        };
        assert!(create_store(&settings).is_err());
    }
}
