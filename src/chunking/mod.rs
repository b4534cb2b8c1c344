//! Content chunking for course documents.
//!
//! Lesson bodies are split into overlapping character windows, and every piece
//! is prefixed with its course and lesson so it still identifies itself when
//! embedded on its own.

mod boundary;

pub use boundary::split_text;

use crate::config::ChunkingSettings;
use crate::error::{KursdeskError, Result};
use crate::models::CourseChunk;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Configuration for chunking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    /// Maximum body length in characters.
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks.
    pub chunk_overlap: usize,
    /// Search window for sentence/paragraph breaks before the hard limit.
    pub boundary_window: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 800,
            chunk_overlap: 100,
            boundary_window: 80,
        }
    }
}

impl From<&ChunkingSettings> for ChunkingConfig {
    fn from(settings: &ChunkingSettings) -> Self {
        Self {
            chunk_size: settings.chunk_size,
            chunk_overlap: settings.chunk_overlap,
            boundary_window: settings.boundary_window,
        }
    }
}

/// Body text of one lesson (or of a document without lessons).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonText {
    /// `None` for document-level text.
    pub lesson_number: Option<u32>,
    pub lesson_title: Option<String>,
    pub body: String,
}

/// Splits course text into overlapping, context-prefixed chunks.
#[derive(Debug, Clone)]
pub struct TextChunker {
    config: ChunkingConfig,
}

impl TextChunker {
    /// Create a chunker, rejecting an overlap that is not smaller than the chunk size.
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        if config.chunk_size == 0 || config.chunk_overlap >= config.chunk_size {
            return Err(KursdeskError::InvalidInput(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                config.chunk_overlap, config.chunk_size
            )));
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    /// Chunk every lesson of a course.
    ///
    /// Chunk indices run across the whole course, in lesson order.
    pub fn chunk_course(&self, course_title: &str, lessons: &[LessonText]) -> Vec<CourseChunk> {
        let mut chunks = Vec::new();
        let mut next_index: u32 = 0;

        for lesson in lessons {
            let pieces = split_text(&lesson.body, &self.config);

            for (position, piece) in pieces.into_iter().enumerate() {
                let first = position == 0;
                let prefix = chunk_prefix(
                    course_title,
                    lesson.lesson_number,
                    lesson.lesson_title.as_deref().filter(|_| first),
                );

                chunks.push(CourseChunk {
                    course_title: course_title.to_string(),
                    lesson_number: lesson.lesson_number,
                    lesson_title: if first { lesson.lesson_title.clone() } else { None },
                    chunk_index: next_index,
                    content: format!("{}{}", prefix, piece),
                });
                next_index += 1;
            }
        }

        debug!("Created {} chunks for course '{}'", chunks.len(), course_title);
        chunks
    }
}

/// Contextual label placed in front of every chunk body.
fn chunk_prefix(course_title: &str, lesson_number: Option<u32>, lesson_title: Option<&str>) -> String {
    match (lesson_number, lesson_title) {
        (Some(number), Some(title)) => {
            format!("Course {} Lesson {} - {}: ", course_title, number, title)
        }
        (Some(number), None) => format!("Course {} Lesson {}: ", course_title, number),
        (None, Some(title)) => format!("Course {} - {}: ", course_title, title),
        (None, None) => format!("Course {}: ", course_title),
    }
}
