//! Kursdesk - Course Materials Q&A
//!
//! A local-first CLI and library for asking questions about course materials.
//! A language model answers with the help of search tools over a semantic index
//! of the courses, and every answer lists the lessons it drew from.
//!
//! # Architecture
//!
//! - `document` - Course document parsing
//! - `chunking` - Overlapping, context-prefixed chunks
//! - `embedding` - Embedding generation (OpenAI or local hashing)
//! - `vector_store` - Vector database abstraction
//! - `semantic` - Course catalog and content indexes
//! - `agent` - Tools, tool registry and the tool-calling loop
//! - `session` - Per-session conversation history
//! - `orchestrator` - Query and ingest coordination
//!
//! # Example
//!
//! ```rust,no_run
//! use kursdesk::config::Settings;
//! use kursdesk::orchestrator::Orchestrator;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let orchestrator = Orchestrator::new(settings)?;
//!
//!     orchestrator.ingest_course_folder(std::path::Path::new("docs"), false).await?;
//!     let response = orchestrator
//!         .process_query(None, "What does lesson 1 of the MCP course cover?")
//!         .await?;
//!     println!("{}", response.answer);
//!
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod chunking;
pub mod cli;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod models;
pub mod openai;
pub mod orchestrator;
pub mod semantic;
pub mod session;
pub mod vector_store;

pub use error::{KursdeskError, Result};

#[cfg(test)]
pub(crate) mod testing {
    //! Shared fixtures for unit tests.

    use crate::agent::{LanguageModel, ModelRequest, ModelResponse, ToolRequest};
    use crate::chunking::ChunkingConfig;
    use crate::config::{Prompts, SearchSettings, Settings};
    use crate::document::DocumentProcessor;
    use crate::embedding::HashingEmbedder;
    use crate::error::{KursdeskError, Result};
    use crate::models::{Course, CourseChunk};
    use crate::orchestrator::Orchestrator;
    use crate::semantic::SemanticStore;
    use crate::vector_store::MemoryVectorStore;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    pub const SAMPLE_DOCUMENT: &str = "Course Title: Intro to Testing
Course Link: https://example.com/testing
Course Instructor: Ada Lovelace

Lesson 1: Unit Tests
Lesson Link: https://example.com/testing/1
A unit test verifies one behavior in isolation.

Lesson 2: Integration Tests
Integration tests exercise components together.
";

    const DIMENSIONS: usize = 1024;

    pub fn sample_course() -> (Course, Vec<CourseChunk>) {
        DocumentProcessor::new(ChunkingConfig::default())
            .unwrap()
            .process_text(SAMPLE_DOCUMENT)
            .unwrap()
    }

    pub fn semantic_store() -> (SemanticStore, Arc<MemoryVectorStore>) {
        let store = Arc::new(MemoryVectorStore::new());
        let semantic = SemanticStore::new(
            Arc::new(HashingEmbedder::new(DIMENSIONS)),
            store.clone(),
            &SearchSettings::default(),
        );
        (semantic, store)
    }

    pub fn orchestrator_with(model: Arc<ScriptedModel>) -> Orchestrator {
        Orchestrator::with_components(
            Settings::default(),
            Prompts::default(),
            Arc::new(HashingEmbedder::new(DIMENSIONS)),
            Arc::new(MemoryVectorStore::new()),
            model,
        )
        .unwrap()
    }

    pub fn tool_call(id: &str, name: &str, arguments: &str) -> ToolRequest {
        ToolRequest {
            id: id.to_string(),
            name: name.to_string(),
            arguments: arguments.to_string(),
        }
    }

    /// Language model that replays canned responses and records every request.
    pub struct ScriptedModel {
        script: Mutex<VecDeque<ModelResponse>>,
        requests: Mutex<Vec<ModelRequest>>,
    }

    impl ScriptedModel {
        pub fn new(script: Vec<ModelResponse>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn requests(&self) -> Vec<ModelRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LanguageModel for ScriptedModel {
        async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse> {
            self.requests.lock().unwrap().push(request.clone());
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| KursdeskError::OpenAI("scripted model has no more responses".to_string()))
        }
    }
}
