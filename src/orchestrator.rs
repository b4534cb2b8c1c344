//! Query and ingest orchestrator for Kursdesk.
//!
//! Wires documents, the semantic store, the tool-calling agent and the session
//! store together behind the operations the CLI uses.

use crate::agent::{course_tools, Agent, LanguageModel, OpenAIChatModel};
use crate::chunking::ChunkingConfig;
use crate::config::{Prompts, Settings};
use crate::document::{list_course_files, DocumentProcessor};
use crate::embedding::{create_embedder, Embedder};
use crate::error::{KursdeskError, Result};
use crate::models::{Course, Source};
use crate::semantic::{ContentMatch, IngestOutcome, SemanticStore};
use crate::session::SessionStore;
use crate::vector_store::{create_store, VectorStore};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Files parsed and embedded concurrently during folder ingest.
const INGEST_CONCURRENCY: usize = 4;

/// Answer to a query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub answer: String,
    pub sources: Vec<Source>,
    pub session_id: String,
}

/// Course count and titles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogStats {
    pub total_courses: usize,
    pub course_titles: Vec<String>,
}

/// Summary of a folder ingest.
#[derive(Debug, Clone, Default)]
pub struct FolderIngestReport {
    pub courses_added: usize,
    pub chunks_added: usize,
    /// Titles that were already indexed.
    pub skipped: Vec<String>,
    /// Files that could not be ingested, with the reason.
    pub failed: Vec<(PathBuf, String)>,
}

/// The main orchestrator for the Kursdesk pipeline.
pub struct Orchestrator {
    settings: Settings,
    prompts: Prompts,
    processor: DocumentProcessor,
    semantic: Arc<SemanticStore>,
    agent: Agent,
    sessions: SessionStore,
}

impl Orchestrator {
    /// Create an orchestrator with the providers named in the settings.
    pub fn new(settings: Settings) -> Result<Self> {
        // Load prompts (with optional custom directory and variables)
        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;

        let embedder = create_embedder(&settings.embedding);
        let store = create_store(&settings.vector_store)?;
        let model: Arc<dyn LanguageModel> = Arc::new(OpenAIChatModel::new(&settings.llm));

        info!(
            "Using {} embeddings and {} store",
            settings.embedding.provider, settings.vector_store.provider
        );

        Self::with_components(settings, prompts, embedder, store, model)
    }

    /// Create an orchestrator with custom components.
    pub fn with_components(
        settings: Settings,
        prompts: Prompts,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        model: Arc<dyn LanguageModel>,
    ) -> Result<Self> {
        let processor = DocumentProcessor::new(ChunkingConfig::from(&settings.chunking))?;
        let semantic = Arc::new(SemanticStore::new(embedder, store, &settings.search));
        let agent = Agent::new(
            model,
            Arc::new(course_tools(semantic.clone())),
            &prompts.system_prompt(),
        )
        .with_max_tool_rounds(settings.llm.max_tool_rounds);

        Ok(Self {
            settings,
            prompts,
            processor,
            semantic,
            agent,
            sessions: SessionStore::new(),
        })
    }

    /// Get the settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn semantic_store(&self) -> Arc<SemanticStore> {
        self.semantic.clone()
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Answer a question within a session.
    ///
    /// A missing or unknown session id starts a new session. The session stays
    /// locked for the whole query, so its exchanges are recorded in order.
    #[instrument(skip(self, query))]
    pub async fn process_query(&self, session_id: Option<&str>, query: &str) -> Result<QueryResponse> {
        let query = query.trim();
        if query.is_empty() {
            return Err(KursdeskError::InvalidInput("query is empty".to_string()));
        }

        self.evict_idle_sessions()?;
        let (session_id, handle) = self.sessions.get_or_create(session_id)?;
        let mut context = handle.lock().await;

        let history = context.recent(self.settings.session.max_history).to_vec();
        let prompt = self.prompts.query_prompt(query);

        let response = self.agent.run(&prompt, &history).await.map_err(|e| {
            error!("Query failed: {}", e);
            e
        })?;

        context.record(query, response.answer.clone());
        info!(
            "Answered with {} sources after {} model calls",
            response.sources.len(),
            response.dispatches
        );

        Ok(QueryResponse {
            answer: response.answer,
            sources: response.sources,
            session_id,
        })
    }

    fn evict_idle_sessions(&self) -> Result<()> {
        let idle_minutes = self.settings.session.idle_minutes;
        if idle_minutes == 0 {
            return Ok(());
        }
        if let Some(max_idle) = i64::try_from(idle_minutes)
            .ok()
            .and_then(chrono::Duration::try_minutes)
        {
            self.sessions.evict_idle(max_idle)?;
        }
        Ok(())
    }

    /// Start a fresh session.
    pub fn new_session(&self) -> Result<String> {
        self.sessions.create_session()
    }

    /// Forget a session's history.
    pub async fn clear_session(&self, session_id: &str) -> Result<bool> {
        self.sessions.clear(session_id).await
    }

    /// Parse, chunk and index one course document.
    pub async fn ingest_course_document(&self, raw: &str) -> Result<IngestOutcome> {
        let (course, chunks) = self.processor.process_text(raw)?;
        self.semantic.add_course(&course, &chunks).await
    }

    /// Ingest a course document file.
    #[instrument(skip(self))]
    pub async fn ingest_file(&self, path: &Path) -> Result<IngestOutcome> {
        let (course, chunks) = self.processor.process_file(path).await?;
        self.semantic.add_course(&course, &chunks).await
    }

    /// Ingest every course document in a folder, skipping titles already indexed.
    ///
    /// A missing folder is not an error and ingests nothing.
    #[instrument(skip(self))]
    pub async fn ingest_course_folder(&self, folder: &Path, clear_existing: bool) -> Result<FolderIngestReport> {
        let mut report = FolderIngestReport::default();

        if !folder.is_dir() {
            warn!("Folder {} does not exist", folder.display());
            return Ok(report);
        }

        if clear_existing {
            info!("Clearing existing data before ingest");
            self.semantic.clear_all_data().await?;
        }

        let files = list_course_files(folder)?;
        info!("Found {} course documents in {}", files.len(), folder.display());

        let results: Vec<(PathBuf, Result<IngestOutcome>)> = stream::iter(files)
            .map(|path| async move {
                let result = self.ingest_file(&path).await;
                (path, result)
            })
            .buffered(INGEST_CONCURRENCY)
            .collect()
            .await;

        for (path, result) in results {
            match result {
                Ok(IngestOutcome::Added { course, chunk_count }) => {
                    info!("Added course '{}' ({} chunks)", course.title, chunk_count);
                    report.courses_added += 1;
                    report.chunks_added += chunk_count;
                }
                Ok(IngestOutcome::DuplicateSkipped { title }) => report.skipped.push(title),
                Err(e) if e.is_provider_failure() => return Err(e),
                Err(e) => {
                    warn!("Failed to ingest {}: {}", path.display(), e);
                    report.failed.push((path, e.to_string()));
                }
            }
        }

        Ok(report)
    }

    /// Number and titles of indexed courses.
    pub async fn get_catalog_stats(&self) -> Result<CatalogStats> {
        let course_titles = self.semantic.get_existing_titles().await?;
        Ok(CatalogStats {
            total_courses: course_titles.len(),
            course_titles,
        })
    }

    /// Outline of the course best matching `name`.
    pub async fn course_outline(&self, name: &str) -> Result<Course> {
        let title = self.semantic.resolve_course(name).await?;
        self.semantic
            .get_course(&title)
            .await?
            .ok_or(KursdeskError::CourseNotFound(title))
    }

    /// Direct content search without the model.
    pub async fn search(
        &self,
        query: &str,
        course_name: Option<&str>,
        lesson_number: Option<u32>,
        limit: Option<usize>,
    ) -> Result<Vec<ContentMatch>> {
        let limit = limit.unwrap_or(self.semantic.max_results());
        self.semantic
            .search_content_limited(query, course_name, lesson_number, limit)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{Message, ModelResponse};
    use crate::testing::{orchestrator_with, tool_call, ScriptedModel, SAMPLE_DOCUMENT};
    use tokio_test::assert_ok;

    fn answer(text: &str) -> ModelResponse {
        ModelResponse::FinalAnswer(text.to_string())
    }

    #[tokio::test]
    async fn test_round_trip_sources_name_course_and_lesson() {
        let model = Arc::new(ScriptedModel::new(vec![
            ModelResponse::ToolRequests {
                text: None,
                calls: vec![tool_call(
                    "call_1",
                    "search_course_content",
                    r#"{"query": "What does a unit test verify?"}"#,
                )],
            },
            answer("A unit test verifies one behavior in isolation."),
        ]));
        let orchestrator = orchestrator_with(model.clone());
        assert_ok!(orchestrator.ingest_course_document(SAMPLE_DOCUMENT).await);

        let response = orchestrator
            .process_query(None, "What does a unit test verify?")
            .await
            .unwrap();

        assert_eq!(response.answer, "A unit test verifies one behavior in isolation.");
        assert!(!response.sources.is_empty());
        let label = &response.sources[0].text;
        assert!(label.contains("Intro to Testing"), "{}", label);
        assert!(label.contains("Unit Tests"), "{}", label);

        let first = &model.requests()[0];
        assert_eq!(
            first.messages.last(),
            Some(&Message::User(
                "Answer this question about course materials: What does a unit test verify?"
                    .to_string()
            ))
        );
    }

    #[tokio::test]
    async fn test_history_is_capped_to_most_recent_exchanges() {
        let model = Arc::new(ScriptedModel::new(vec![
            answer("a1"),
            answer("a2"),
            answer("a3"),
        ]));
        let orchestrator = orchestrator_with(model.clone());

        let first = orchestrator.process_query(None, "q1").await.unwrap();
        let session = Some(first.session_id.as_str());
        orchestrator.process_query(session, "q2").await.unwrap();
        orchestrator.process_query(session, "q3").await.unwrap();

        let third = &model.requests()[2];
        assert_eq!(
            third.messages,
            vec![
                Message::User("q1".to_string()),
                Message::Assistant("a1".to_string()),
                Message::User("q2".to_string()),
                Message::Assistant("a2".to_string()),
                Message::User("Answer this question about course materials: q3".to_string()),
            ]
        );

        let requests = model.requests();
        assert_eq!(requests.len(), 3);
        let handle = orchestrator.sessions().get(&first.session_id).unwrap().unwrap();
        assert_eq!(handle.lock().await.len(), 3);
    }

    #[tokio::test]
    async fn test_history_truncates_beyond_limit() {
        let model = Arc::new(ScriptedModel::new(vec![
            answer("a1"),
            answer("a2"),
            answer("a3"),
            answer("a4"),
        ]));
        let orchestrator = orchestrator_with(model.clone());

        let session = orchestrator.new_session().unwrap();
        for q in ["q1", "q2", "q3", "q4"] {
            orchestrator.process_query(Some(&session), q).await.unwrap();
        }

        let fourth = &model.requests()[3];
        let users: Vec<_> = fourth
            .messages
            .iter()
            .filter_map(|m| match m {
                Message::User(text) => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(
            users,
            vec!["q2", "q3", "Answer this question about course materials: q4"]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_queries_on_one_session_run_in_turn() {
        let model = Arc::new(ScriptedModel::new((0..8).map(|i| answer(&format!("a{}", i))).collect()));
        let orchestrator = Arc::new(orchestrator_with(model.clone()));
        let session = orchestrator.new_session().unwrap();

        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let orchestrator = orchestrator.clone();
                let session = session.clone();
                tokio::spawn(async move {
                    orchestrator
                        .process_query(Some(&session), &format!("q{}", i))
                        .await
                })
            })
            .collect();
        for task in tasks {
            assert_ok!(task.await.unwrap());
        }

        let handle = orchestrator.sessions().get(&session).unwrap().unwrap();
        assert_eq!(handle.lock().await.len(), 8);

        // Each query saw the exchanges recorded before it, capped at max_history.
        let mut replayed: Vec<usize> = model
            .requests()
            .iter()
            .map(|r| (r.messages.len() - 1) / 2)
            .collect();
        replayed.sort_unstable();
        assert_eq!(replayed, vec![0, 1, 2, 2, 2, 2, 2, 2]);
    }

    #[tokio::test]
    async fn test_idle_sessions_are_evicted_before_a_query() {
        let model = Arc::new(ScriptedModel::new(vec![answer("a1"), answer("a2")]));
        let orchestrator = orchestrator_with(model);

        let idle = orchestrator.new_session().unwrap();
        orchestrator.process_query(Some(&idle), "q1").await.unwrap();
        orchestrator
            .sessions()
            .get(&idle)
            .unwrap()
            .unwrap()
            .lock()
            .await
            .backdate(chrono::Duration::minutes(61));

        let other = orchestrator.process_query(None, "q2").await.unwrap();
        assert!(orchestrator.sessions().get(&idle).unwrap().is_none());
        assert!(orchestrator.sessions().get(&other.session_id).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_failed_query_records_nothing() {
        let model = Arc::new(ScriptedModel::new(Vec::new()));
        let orchestrator = orchestrator_with(model);

        let session = orchestrator.new_session().unwrap();
        assert!(orchestrator.process_query(Some(&session), "q").await.is_err());
        let handle = orchestrator.sessions().get(&session).unwrap().unwrap();
        assert!(handle.lock().await.is_empty());

        assert!(matches!(
            orchestrator.process_query(None, "   ").await,
            Err(KursdeskError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_duplicate_ingest_and_stats() {
        let orchestrator = orchestrator_with(Arc::new(ScriptedModel::new(Vec::new())));

        let outcome = orchestrator.ingest_course_document(SAMPLE_DOCUMENT).await.unwrap();
        assert!(outcome.is_added());
        let outcome = orchestrator.ingest_course_document(SAMPLE_DOCUMENT).await.unwrap();
        assert!(matches!(outcome, IngestOutcome::DuplicateSkipped { .. }));

        let stats = orchestrator.get_catalog_stats().await.unwrap();
        assert_eq!(
            stats,
            CatalogStats {
                total_courses: 1,
                course_titles: vec!["Intro to Testing".to_string()],
            }
        );

        let outline = orchestrator.course_outline("testing").await.unwrap();
        assert_eq!(outline.lessons.len(), 2);
    }

    #[tokio::test]
    async fn test_folder_ingest() {
        let orchestrator = orchestrator_with(Arc::new(ScriptedModel::new(Vec::new())));
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("course1.txt"), SAMPLE_DOCUMENT).unwrap();
        std::fs::write(
            dir.path().join("course2.txt"),
            "Course Title: Python Basics\nLesson 1: Variables\nVariables hold values.\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("broken.txt"), "Title: Broken\nLesson 1: A\nx\nLesson 1: B\ny").unwrap();
        std::fs::write(dir.path().join("ignored.pdf"), "binary").unwrap();

        let report = orchestrator.ingest_course_folder(dir.path(), false).await.unwrap();
        assert_eq!(report.courses_added, 2);
        assert!(report.chunks_added >= 3);
        assert_eq!(report.failed.len(), 1);

        let report = orchestrator.ingest_course_folder(dir.path(), false).await.unwrap();
        assert_eq!(report.courses_added, 0);
        assert_eq!(report.skipped.len(), 2);

        let report = orchestrator.ingest_course_folder(dir.path(), true).await.unwrap();
        assert_eq!(report.courses_added, 2);

        let missing = dir.path().join("nope");
        let report = orchestrator.ingest_course_folder(&missing, false).await.unwrap();
        assert_eq!(report.courses_added, 0);
        assert_eq!(report.chunks_added, 0);
    }

    #[tokio::test]
    async fn test_search_respects_limit() {
        let orchestrator = orchestrator_with(Arc::new(ScriptedModel::new(Vec::new())));
        orchestrator.ingest_course_document(SAMPLE_DOCUMENT).await.unwrap();

        let matches = orchestrator
            .search("tests", None, None, Some(1))
            .await
            .unwrap();
        assert!(matches.len() <= 1);
    }
}
