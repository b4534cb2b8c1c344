//! Dual-index semantic store.
//!
//! The catalog collection holds one record per course (embedded by title) and is
//! used to resolve fuzzy course names. The content collection holds one record per
//! chunk and answers filtered similarity searches.

use crate::config::SearchSettings;
use crate::embedding::Embedder;
use crate::error::{KursdeskError, Result};
use crate::models::{Course, CourseChunk, Lesson};
use crate::vector_store::{Metadata, MetadataFilter, Record, VectorStore};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, instrument, warn};

/// Collection holding one record per course.
pub const CATALOG_COLLECTION: &str = "course_catalog";
/// Collection holding one record per chunk.
pub const CONTENT_COLLECTION: &str = "course_content";

/// Result of adding a course.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    Added { course: Course, chunk_count: usize },
    /// A course with the same title was already indexed; nothing was written.
    DuplicateSkipped { title: String },
}

impl IngestOutcome {
    pub fn is_added(&self) -> bool {
        matches!(self, IngestOutcome::Added { .. })
    }

    pub fn chunk_count(&self) -> usize {
        match self {
            IngestOutcome::Added { chunk_count, .. } => *chunk_count,
            IngestOutcome::DuplicateSkipped { .. } => 0,
        }
    }
}

/// A chunk returned by content search.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentMatch {
    pub chunk: CourseChunk,
    pub score: f32,
}

/// Course catalog and chunk content over a shared embedder and vector store.
pub struct SemanticStore {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    max_results: usize,
    min_score: f32,
    resolve_min_score: Option<f32>,
    ingest_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl SemanticStore {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        settings: &SearchSettings,
    ) -> Self {
        Self {
            embedder,
            store,
            max_results: settings.max_results,
            min_score: settings.min_score,
            resolve_min_score: settings.resolve_min_score,
            ingest_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn max_results(&self) -> usize {
        self.max_results
    }

    /// Resolve a possibly misspelled or partial course name to an exact title.
    ///
    /// The nearest catalog entry wins unless `resolve_min_score` is configured
    /// and the match falls below it.
    #[instrument(skip(self))]
    pub async fn resolve_course(&self, name: &str) -> Result<String> {
        let name = name.trim();
        if name.is_empty() {
            return Err(KursdeskError::CourseNotFound(name.to_string()));
        }

        let embedding = self.embedder.embed(name).await?;
        let nearest = self
            .store
            .search(CATALOG_COLLECTION, &embedding, 1, None)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| KursdeskError::CourseNotFound(name.to_string()))?;

        if let Some(threshold) = self.resolve_min_score {
            if nearest.score < threshold {
                debug!(
                    "Nearest course '{}' scored {:.3}, below {:.3}",
                    nearest.record.id, nearest.score, threshold
                );
                return Err(KursdeskError::CourseNotFound(name.to_string()));
            }
        }

        debug!("Resolved '{}' to '{}' ({:.3})", name, nearest.record.id, nearest.score);
        Ok(nearest.record.id)
    }

    /// Search chunk content, optionally narrowed to a course and lesson.
    pub async fn search_content(
        &self,
        query: &str,
        course_name: Option<&str>,
        lesson_number: Option<u32>,
    ) -> Result<Vec<ContentMatch>> {
        self.search_content_limited(query, course_name, lesson_number, self.max_results)
            .await
    }

    /// Like [`search_content`](Self::search_content) with an explicit result limit.
    #[instrument(skip(self))]
    pub async fn search_content_limited(
        &self,
        query: &str,
        course_name: Option<&str>,
        lesson_number: Option<u32>,
        limit: usize,
    ) -> Result<Vec<ContentMatch>> {
        let course_title = match course_name {
            Some(name) => Some(self.resolve_course(name).await?),
            None => None,
        };

        let mut filter = MetadataFilter::new();
        if let Some(title) = &course_title {
            filter = filter.eq("course_title", title.as_str());
        }
        if let Some(number) = lesson_number {
            filter = filter.eq("lesson_number", number);
        }
        let filter = (!filter.is_empty()).then_some(filter);

        let embedding = self.embedder.embed(query).await?;
        let results = self
            .store
            .search_with_threshold(
                CONTENT_COLLECTION,
                &embedding,
                limit,
                self.min_score,
                filter.as_ref(),
            )
            .await?;

        let matches: Vec<ContentMatch> = results
            .into_iter()
            .map(|hit| ContentMatch {
                chunk: chunk_from_record(&hit.record),
                score: hit.score,
            })
            .collect();

        debug!("Content search returned {} chunks", matches.len());
        Ok(matches)
    }

    /// Index a course and its chunks unless the title is already present.
    ///
    /// Adds for the same title are serialized; distinct titles proceed in parallel.
    #[instrument(skip(self, course, chunks), fields(title = %course.title, chunks = chunks.len()))]
    pub async fn add_course(&self, course: &Course, chunks: &[CourseChunk]) -> Result<IngestOutcome> {
        validate_chunks(course, chunks)?;

        let lock = self.ingest_lock(&course.title)?;
        let outcome = {
            let _guard = lock.lock().await;
            self.add_course_locked(course, chunks).await
        };
        self.release_ingest_lock(&course.title, lock);
        outcome
    }

    async fn add_course_locked(&self, course: &Course, chunks: &[CourseChunk]) -> Result<IngestOutcome> {
        if self.store.exists(CATALOG_COLLECTION, &course.title).await? {
            info!("Course '{}' already indexed, skipping", course.title);
            return Ok(IngestOutcome::DuplicateSkipped {
                title: course.title.clone(),
            });
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;
        if embeddings.len() != chunks.len() {
            return Err(KursdeskError::Embedding(format!(
                "Expected {} embeddings, got {}",
                chunks.len(),
                embeddings.len()
            )));
        }
        let title_embedding = self.embedder.embed(&course.title).await?;

        let content_records: Vec<Record> = chunks
            .iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| {
                Record::new(chunk.id(), chunk.content.clone(), chunk_metadata(chunk), embedding)
            })
            .collect();

        // Catalog entry last: a title is visible only once all its chunks are stored.
        self.store
            .upsert_batch(CONTENT_COLLECTION, &content_records)
            .await?;
        self.store
            .upsert(
                CATALOG_COLLECTION,
                &Record::new(
                    course.title.clone(),
                    course.title.clone(),
                    course_metadata(course),
                    title_embedding,
                ),
            )
            .await?;

        info!("Indexed course '{}' with {} chunks", course.title, chunks.len());
        Ok(IngestOutcome::Added {
            course: course.clone(),
            chunk_count: chunks.len(),
        })
    }

    /// Titles of all indexed courses, sorted.
    pub async fn get_existing_titles(&self) -> Result<Vec<String>> {
        let records = self.store.list(CATALOG_COLLECTION).await?;
        Ok(records.into_iter().map(|r| r.id).collect())
    }

    pub async fn get_course_count(&self) -> Result<usize> {
        self.store.count(CATALOG_COLLECTION).await
    }

    /// Catalog entry for an exact title.
    pub async fn get_course(&self, title: &str) -> Result<Option<Course>> {
        let record = self.store.get(CATALOG_COLLECTION, title).await?;
        Ok(record.map(|r| course_from_record(&r)))
    }

    /// Every catalog entry, sorted by title.
    pub async fn get_all_courses_metadata(&self) -> Result<Vec<Course>> {
        let records = self.store.list(CATALOG_COLLECTION).await?;
        Ok(records.iter().map(course_from_record).collect())
    }

    /// Lesson of an exact course title.
    pub async fn get_lesson(&self, course_title: &str, lesson_number: u32) -> Result<Option<Lesson>> {
        Ok(self
            .get_course(course_title)
            .await?
            .and_then(|course| course.lesson(lesson_number).cloned()))
    }

    pub async fn get_lesson_link(&self, course_title: &str, lesson_number: u32) -> Result<Option<String>> {
        Ok(self
            .get_lesson(course_title, lesson_number)
            .await?
            .and_then(|lesson| lesson.link))
    }

    pub async fn get_course_link(&self, course_title: &str) -> Result<Option<String>> {
        Ok(self.get_course(course_title).await?.and_then(|c| c.link))
    }

    /// Remove every course and chunk.
    pub async fn clear_all_data(&self) -> Result<()> {
        let courses = self.store.clear_collection(CATALOG_COLLECTION).await?;
        let chunks = self.store.clear_collection(CONTENT_COLLECTION).await?;
        warn!("Cleared {} courses and {} chunks", courses, chunks);
        Ok(())
    }

    fn ingest_lock(&self, title: &str) -> Result<Arc<tokio::sync::Mutex<()>>> {
        let mut locks = self
            .ingest_locks
            .lock()
            .map_err(|e| KursdeskError::VectorStore(format!("Failed to acquire lock: {}", e)))?;
        Ok(locks.entry(title.to_string()).or_default().clone())
    }

    /// Drop the lock entry for `title` unless another add is waiting on it.
    fn release_ingest_lock(&self, title: &str, lock: Arc<tokio::sync::Mutex<()>>) {
        let Ok(mut locks) = self.ingest_locks.lock() else {
            return;
        };
        // One reference held by the map, one by `lock`.
        if locks
            .get(title)
            .is_some_and(|entry| Arc::ptr_eq(entry, &lock) && Arc::strong_count(entry) == 2)
        {
            locks.remove(title);
        }
    }

    #[cfg(test)]
    fn pending_ingest_locks(&self) -> usize {
        self.ingest_locks.lock().map(|l| l.len()).unwrap_or_default()
    }
}

fn validate_chunks(course: &Course, chunks: &[CourseChunk]) -> Result<()> {
    let mut previous: Option<u32> = None;
    for chunk in chunks {
        if chunk.course_title != course.title {
            return Err(KursdeskError::InvalidInput(format!(
                "chunk {} belongs to '{}', not '{}'",
                chunk.chunk_index, chunk.course_title, course.title
            )));
        }
        if previous.is_some_and(|p| chunk.chunk_index <= p) {
            return Err(KursdeskError::InvalidInput(format!(
                "chunk indices of '{}' are not strictly increasing",
                course.title
            )));
        }
        previous = Some(chunk.chunk_index);
    }
    Ok(())
}

fn course_metadata(course: &Course) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert("title".into(), json!(course.title));
    if let Some(instructor) = &course.instructor {
        metadata.insert("instructor".into(), json!(instructor));
    }
    if let Some(link) = &course.link {
        metadata.insert("course_link".into(), json!(link));
    }
    metadata.insert("lessons".into(), json!(course.lessons));
    metadata.insert("lesson_count".into(), json!(course.lessons.len()));
    metadata
}

fn course_from_record(record: &Record) -> Course {
    let lessons = record
        .metadata
        .get("lessons")
        .cloned()
        .and_then(|value| serde_json::from_value::<Vec<Lesson>>(value).ok())
        .unwrap_or_default();

    Course {
        title: record.meta_str("title").unwrap_or(record.id.as_str()).to_string(),
        instructor: record.meta_str("instructor").map(str::to_string),
        link: record.meta_str("course_link").map(str::to_string),
        lessons,
    }
}

fn chunk_metadata(chunk: &CourseChunk) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert("course_title".into(), json!(chunk.course_title));
    if let Some(number) = chunk.lesson_number {
        metadata.insert("lesson_number".into(), json!(number));
    }
    if let Some(title) = &chunk.lesson_title {
        metadata.insert("lesson_title".into(), json!(title));
    }
    metadata.insert("chunk_index".into(), Value::from(chunk.chunk_index));
    metadata
}

fn chunk_from_record(record: &Record) -> CourseChunk {
    CourseChunk {
        course_title: record.meta_str("course_title").unwrap_or_default().to_string(),
        lesson_number: record.meta_u32("lesson_number"),
        lesson_title: record.meta_str("lesson_title").map(str::to_string),
        chunk_index: record.meta_u32("chunk_index").unwrap_or_default(),
        content: record.text.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_course, semantic_store};

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_adds_of_one_title_index_once() {
        let (semantic, store) = semantic_store();
        let semantic = Arc::new(semantic);
        let (course, chunks) = sample_course();

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let semantic = semantic.clone();
                let course = course.clone();
                let chunks = chunks.clone();
                tokio::spawn(async move { semantic.add_course(&course, &chunks).await })
            })
            .collect();

        let mut added = 0;
        for task in tasks {
            if task.await.unwrap().unwrap().is_added() {
                added += 1;
            }
        }

        assert_eq!(added, 1);
        assert_eq!(store.count(CATALOG_COLLECTION).await.unwrap(), 1);
        assert_eq!(store.count(CONTENT_COLLECTION).await.unwrap(), chunks.len());
        assert_eq!(semantic.pending_ingest_locks(), 0);
    }

    #[tokio::test]
    async fn test_ingest_lock_released_after_add() {
        let (semantic, _) = semantic_store();
        let (course, chunks) = sample_course();

        semantic.add_course(&course, &chunks).await.unwrap();
        assert_eq!(semantic.pending_ingest_locks(), 0);

        semantic.add_course(&course, &chunks).await.unwrap();
        assert_eq!(semantic.pending_ingest_locks(), 0);
    }

    #[tokio::test]
    async fn test_add_course_then_duplicate_is_noop() {
        let (semantic, store) = semantic_store();
        let (course, chunks) = sample_course();

        let outcome = semantic.add_course(&course, &chunks).await.unwrap();
        assert_eq!(outcome.chunk_count(), chunks.len());
        let catalog_before = store.count(CATALOG_COLLECTION).await.unwrap();
        let content_before = store.count(CONTENT_COLLECTION).await.unwrap();

        let outcome = semantic.add_course(&course, &chunks).await.unwrap();
        assert_eq!(
            outcome,
            IngestOutcome::DuplicateSkipped {
                title: "Intro to Testing".to_string()
            }
        );
        assert_eq!(store.count(CATALOG_COLLECTION).await.unwrap(), catalog_before);
        assert_eq!(store.count(CONTENT_COLLECTION).await.unwrap(), content_before);
    }

    #[tokio::test]
    async fn test_resolve_course() {
        let (semantic, _) = semantic_store();

        let err = semantic.resolve_course("Intro to Testing").await.unwrap_err();
        assert!(matches!(err, KursdeskError::CourseNotFound(_)));

        let (course, chunks) = sample_course();
        semantic.add_course(&course, &chunks).await.unwrap();

        assert_eq!(
            semantic.resolve_course("Intro to Testing").await.unwrap(),
            "Intro to Testing"
        );
        assert_eq!(
            semantic.resolve_course("intro to testng").await.unwrap(),
            "Intro to Testing"
        );
    }

    #[tokio::test]
    async fn test_resolve_picks_nearest_of_several() {
        let (semantic, _) = semantic_store();
        for title in [
            "Machine Learning Fundamentals",
            "Deep Learning Advanced",
            "MCP: Build Rich-Context AI Apps",
        ] {
            let course = Course::new(title);
            semantic.add_course(&course, &[]).await.unwrap();
        }

        assert_eq!(
            semantic.resolve_course("MCP").await.unwrap(),
            "MCP: Build Rich-Context AI Apps"
        );
        assert_eq!(
            semantic.resolve_course("machine lerning").await.unwrap(),
            "Machine Learning Fundamentals"
        );
    }

    #[tokio::test]
    async fn test_resolve_threshold_rejects_distant_match() {
        let (_, store) = semantic_store();
        let settings = SearchSettings {
            resolve_min_score: Some(0.9),
            ..Default::default()
        };
        let semantic = SemanticStore::new(
            Arc::new(crate::embedding::HashingEmbedder::new(512)),
            store,
            &settings,
        );
        semantic
            .add_course(&Course::new("Intro to Testing"), &[])
            .await
            .unwrap();

        assert!(semantic.resolve_course("Quantum Chemistry").await.is_err());
    }

    #[tokio::test]
    async fn test_search_content_filters_and_empty_results() {
        let (semantic, _) = semantic_store();
        let (course, chunks) = sample_course();
        semantic.add_course(&course, &chunks).await.unwrap();

        let matches = semantic
            .search_content("What does a unit test verify?", Some("Intro to Testing"), None)
            .await
            .unwrap();
        assert!(!matches.is_empty());
        assert_eq!(matches[0].chunk.course_title, "Intro to Testing");
        assert_eq!(matches[0].chunk.lesson_number, Some(1));

        let matches = semantic
            .search_content("unit test", None, Some(2))
            .await
            .unwrap();
        assert!(matches.iter().all(|m| m.chunk.lesson_number == Some(2)));

        let matches = semantic
            .search_content("xylophone zebra quokka", Some("Intro to Testing"), None)
            .await
            .unwrap();
        assert!(matches.is_empty());
    }

    #[tokio::test]
    async fn test_catalog_metadata_round_trip() {
        let (semantic, _) = semantic_store();
        let (course, chunks) = sample_course();
        semantic.add_course(&course, &chunks).await.unwrap();

        let stored = semantic.get_course("Intro to Testing").await.unwrap().unwrap();
        assert_eq!(stored, course);
        assert_eq!(semantic.get_course_count().await.unwrap(), 1);
        assert_eq!(
            semantic.get_existing_titles().await.unwrap(),
            vec!["Intro to Testing".to_string()]
        );
        assert_eq!(
            semantic.get_lesson_link("Intro to Testing", 1).await.unwrap(),
            Some("https://example.com/testing/1".to_string())
        );
        assert_eq!(semantic.get_lesson_link("Intro to Testing", 9).await.unwrap(), None);

        semantic.clear_all_data().await.unwrap();
        assert_eq!(semantic.get_course_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_rejects_foreign_chunks() {
        let (semantic, _) = semantic_store();
        let (_, chunks) = sample_course();
        let err = semantic
            .add_course(&Course::new("Other"), &chunks)
            .await
            .unwrap_err();
        assert!(matches!(err, KursdeskError::InvalidInput(_)));
    }
}
