//! SQLite-based vector store implementation.
//!
//! Records of every collection share one table keyed by `(collection, id)`.
//! Cosine similarity and metadata filtering are computed in Rust after the
//! collection is loaded, which is fine at course-catalog scale.

use super::{cosine_similarity, rank, Metadata, MetadataFilter, Record, SearchResult, VectorStore};
use crate::error::{KursdeskError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS records (
        collection TEXT NOT NULL,
        id TEXT NOT NULL,
        text TEXT NOT NULL,
        metadata_json TEXT NOT NULL,
        embedding BLOB NOT NULL,
        indexed_at TEXT NOT NULL,
        PRIMARY KEY (collection, id)
    );

    CREATE INDEX IF NOT EXISTS idx_records_collection ON records(collection);
"#;

/// SQLite-based vector store.
pub struct SqliteVectorStore {
    conn: Mutex<Connection>,
}

impl SqliteVectorStore {
    /// Create a new SQLite vector store.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        // Create parent directories if needed
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // Enable WAL mode for better concurrent performance
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized SQLite vector store at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite vector store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| KursdeskError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }

    /// Serialize embedding to bytes.
    fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    /// Deserialize embedding from bytes.
    fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| {
                let arr: [u8; 4] = chunk.try_into().unwrap_or_default();
                f32::from_le_bytes(arr)
            })
            .collect()
    }

    fn insert(conn: &Connection, collection: &str, record: &Record) -> Result<()> {
        conn.execute(
            r#"
            INSERT OR REPLACE INTO records
            (collection, id, text, metadata_json, embedding, indexed_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                collection,
                record.id,
                record.text,
                serde_json::to_string(&record.metadata)?,
                Self::embedding_to_bytes(&record.embedding),
                record.indexed_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Map a `(id, text, metadata_json, embedding, indexed_at)` row.
    fn row_to_record(row: &Row<'_>) -> rusqlite::Result<Record> {
        let metadata_json: String = row.get(2)?;
        let embedding_bytes: Vec<u8> = row.get(3)?;
        let indexed_at_str: String = row.get(4)?;

        Ok(Record {
            id: row.get(0)?,
            text: row.get(1)?,
            metadata: serde_json::from_str::<Metadata>(&metadata_json).unwrap_or_default(),
            embedding: Self::bytes_to_embedding(&embedding_bytes),
            indexed_at: DateTime::parse_from_rfc3339(&indexed_at_str)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        })
    }

    fn load_collection(conn: &Connection, collection: &str) -> Result<Vec<Record>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT id, text, metadata_json, embedding, indexed_at
            FROM records
            WHERE collection = ?1
            ORDER BY id
            "#,
        )?;

        let records = stmt
            .query_map(params![collection], Self::row_to_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    #[instrument(skip(self, record))]
    async fn upsert(&self, collection: &str, record: &Record) -> Result<()> {
        let conn = self.lock()?;
        Self::insert(&conn, collection, record)?;
        debug!("Upserted record {}", record.id);
        Ok(())
    }

    #[instrument(skip(self, records))]
    async fn upsert_batch(&self, collection: &str, records: &[Record]) -> Result<usize> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;

        for record in records {
            Self::insert(&tx, collection, record)?;
        }

        tx.commit()?;
        info!("Batch upserted {} records into {}", records.len(), collection);
        Ok(records.len())
    }

    #[instrument(skip(self, query_embedding, filter))]
    async fn search_with_threshold(
        &self,
        collection: &str,
        query_embedding: &[f32],
        limit: usize,
        min_score: f32,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchResult>> {
        let records = {
            let conn = self.lock()?;
            Self::load_collection(&conn, collection)?
        };

        let mut results: Vec<SearchResult> = records
            .into_iter()
            .filter(|record| filter.map_or(true, |f| f.matches(&record.metadata)))
            .map(|record| SearchResult {
                score: cosine_similarity(query_embedding, &record.embedding),
                record,
            })
            .filter(|r| r.score >= min_score)
            .collect();

        rank(&mut results, limit);

        debug!("Found {} matching records", results.len());
        Ok(results)
    }

    #[instrument(skip(self))]
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Record>> {
        let conn = self.lock()?;
        let record = conn.query_row(
            r#"
            SELECT id, text, metadata_json, embedding, indexed_at
            FROM records
            WHERE collection = ?1 AND id = ?2
            "#,
            params![collection, id],
            Self::row_to_record,
        );

        match record {
            Ok(r) => Ok(Some(r)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self, collection: &str) -> Result<Vec<Record>> {
        let conn = self.lock()?;
        Self::load_collection(&conn, collection)
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM records WHERE collection = ?1",
            params![collection],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    #[instrument(skip(self))]
    async fn clear_collection(&self, collection: &str) -> Result<usize> {
        let conn = self.lock()?;
        let deleted = conn.execute("DELETE FROM records WHERE collection = ?1", params![collection])?;
        info!("Deleted {} records from {}", deleted, collection);
        Ok(deleted)
    }
}
