//! In-memory vector store implementation.
//!
//! Useful for testing and small datasets.

use super::{cosine_similarity, rank, MetadataFilter, Record, SearchResult, VectorStore};
use crate::error::{KursdeskError, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

type Collections = HashMap<String, BTreeMap<String, Record>>;

/// In-memory vector store.
pub struct MemoryVectorStore {
    collections: RwLock<Collections>,
}

impl MemoryVectorStore {
    /// Create a new in-memory vector store.
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Collections>> {
        self.collections
            .read()
            .map_err(|e| KursdeskError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Collections>> {
        self.collections
            .write()
            .map_err(|e| KursdeskError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }
}

impl Default for MemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn upsert(&self, collection: &str, record: &Record) -> Result<()> {
        let mut collections = self.write()?;
        collections
            .entry(collection.to_string())
            .or_default()
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn upsert_batch(&self, collection: &str, records: &[Record]) -> Result<usize> {
        let mut collections = self.write()?;
        let store = collections.entry(collection.to_string()).or_default();
        for record in records {
            store.insert(record.id.clone(), record.clone());
        }
        Ok(records.len())
    }

    async fn search_with_threshold(
        &self,
        collection: &str,
        query_embedding: &[f32],
        limit: usize,
        min_score: f32,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchResult>> {
        let collections = self.read()?;
        let Some(records) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        let mut results: Vec<SearchResult> = records
            .values()
            .filter(|record| filter.map_or(true, |f| f.matches(&record.metadata)))
            .map(|record| SearchResult {
                score: cosine_similarity(query_embedding, &record.embedding),
                record: record.clone(),
            })
            .filter(|r| r.score >= min_score)
            .collect();

        rank(&mut results, limit);
        Ok(results)
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Record>> {
        let collections = self.read()?;
        Ok(collections
            .get(collection)
            .and_then(|records| records.get(id))
            .cloned())
    }

    async fn list(&self, collection: &str) -> Result<Vec<Record>> {
        let collections = self.read()?;
        Ok(collections
            .get(collection)
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let collections = self.read()?;
        Ok(collections.get(collection).map_or(0, BTreeMap::len))
    }

    async fn clear_collection(&self, collection: &str) -> Result<usize> {
        let mut collections = self.write()?;
        Ok(collections.remove(collection).map_or(0, |records| records.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector_store::Metadata;
    use serde_json::json;

    fn record(id: &str, lesson: u32, embedding: Vec<f32>) -> Record {
        let mut metadata = Metadata::new();
        metadata.insert("lesson_number".into(), json!(lesson));
        Record::new(id, format!("text {}", id), metadata, embedding)
    }

    #[tokio::test]
    async fn test_memory_vector_store() {
        let store = MemoryVectorStore::new();

        store
            .upsert_batch(
                "content",
                &[
                    record("a", 1, vec![1.0, 0.0, 0.0]),
                    record("b", 2, vec![0.0, 1.0, 0.0]),
                ],
            )
            .await
            .unwrap();

        assert_eq!(store.count("content").await.unwrap(), 2);
        assert_eq!(store.count("catalog").await.unwrap(), 0);

        let results = store
            .search("content", &[1.0, 0.0, 0.0], 10, None)
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].record.id, "a");
        assert!((results[0].score - 1.0).abs() < 0.001);

        let filter = MetadataFilter::new().eq("lesson_number", 2u32);
        let results = store
            .search("content", &[1.0, 0.0, 0.0], 10, Some(&filter))
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].record.id, "b");
    }

    #[tokio::test]
    async fn test_threshold_and_upsert_replaces() {
        let store = MemoryVectorStore::new();
        store.upsert("c", &record("a", 1, vec![1.0, 0.0])).await.unwrap();
        store.upsert("c", &record("a", 1, vec![0.0, 1.0])).await.unwrap();
        assert_eq!(store.count("c").await.unwrap(), 1);

        let results = store
            .search_with_threshold("c", &[1.0, 0.0], 5, 0.5, None)
            .await
            .unwrap();
        assert!(results.is_empty());

        assert!(store.exists("c", "a").await.unwrap());
        assert_eq!(store.clear_collection("c").await.unwrap(), 1);
        assert!(store.list("c").await.unwrap().is_empty());
    }
}
