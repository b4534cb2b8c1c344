//! Course document loading: parse raw text into a course and chunk it.

mod parser;

pub use parser::{DocumentParser, ParsedDocument};

use crate::chunking::{ChunkingConfig, TextChunker};
use crate::error::{KursdeskError, Result};
use crate::models::{Course, CourseChunk};
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

/// File extensions treated as course documents.
const COURSE_EXTENSIONS: &[&str] = &["txt", "md"];

/// Turns raw course documents into a [`Course`] plus its chunks.
pub struct DocumentProcessor {
    parser: DocumentParser,
    chunker: TextChunker,
}

impl DocumentProcessor {
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        Ok(Self {
            parser: DocumentParser::new(),
            chunker: TextChunker::new(config)?,
        })
    }

    /// Parse and chunk raw document text.
    pub fn process_text(&self, raw: &str) -> Result<(Course, Vec<CourseChunk>)> {
        let parsed = self.parser.parse(raw)?;
        let chunks = self.chunker.chunk_course(&parsed.course.title, &parsed.sections);
        debug!(
            "Parsed '{}' with {} lessons into {} chunks",
            parsed.course.title,
            parsed.course.lessons.len(),
            chunks.len()
        );
        Ok((parsed.course, chunks))
    }

    /// Read, parse and chunk a document file.
    #[instrument(skip(self))]
    pub async fn process_file(&self, path: &Path) -> Result<(Course, Vec<CourseChunk>)> {
        let raw = tokio::fs::read_to_string(path).await?;
        self.process_text(&raw).map_err(|e| match e {
            KursdeskError::Document(msg) => {
                KursdeskError::Document(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })
    }
}

/// Whether a path looks like a course document.
pub fn is_course_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| COURSE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
}

/// List course documents directly inside `dir`, sorted by file name.
pub fn list_course_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| is_course_file(path))
        .collect();
    files.sort();
    Ok(files)
}
