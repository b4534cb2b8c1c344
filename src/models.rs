//! Core domain types shared across ingest and query.

use serde::{Deserialize, Serialize};

/// A lesson within a course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lesson {
    /// Lesson number, unique within its course. Defines ordering.
    pub number: u32,
    /// Lesson title.
    pub title: String,
    /// Optional external link to the lesson.
    pub link: Option<String>,
}

impl Lesson {
    pub fn new(number: u32, title: impl Into<String>) -> Self {
        Self {
            number,
            title: title.into(),
            link: None,
        }
    }

    /// Attach an external link.
    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }
}

/// A course parsed from a source document.
///
/// The title is the course identity: it must be unique across the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub title: String,
    pub instructor: Option<String>,
    pub link: Option<String>,
    /// Lessons ordered by lesson number.
    pub lessons: Vec<Lesson>,
}

impl Course {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            instructor: None,
            link: None,
            lessons: Vec::new(),
        }
    }

    pub fn with_instructor(mut self, instructor: impl Into<String>) -> Self {
        self.instructor = Some(instructor.into());
        self
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    pub fn with_lesson(mut self, lesson: Lesson) -> Self {
        self.lessons.push(lesson);
        self
    }

    /// Look up a lesson by number.
    pub fn lesson(&self, number: u32) -> Option<&Lesson> {
        self.lessons.iter().find(|l| l.number == number)
    }
}

/// A retrievable slice of course text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseChunk {
    /// Title of the owning course.
    pub course_title: String,
    /// Owning lesson, `None` for document-level text.
    pub lesson_number: Option<u32>,
    /// Lesson title, set only on the first chunk of a lesson.
    pub lesson_title: Option<String>,
    /// Position of this chunk within the course. Strictly increasing.
    pub chunk_index: u32,
    /// Chunk text including its contextual prefix.
    pub content: String,
}

impl CourseChunk {
    /// Identifier of this chunk in the content collection.
    pub fn id(&self) -> String {
        chunk_id(&self.course_title, self.chunk_index)
    }

    /// Whether this chunk opens its lesson and carries the lesson title.
    pub fn starts_lesson(&self) -> bool {
        self.lesson_title.is_some()
    }
}

/// Build the content-collection id for a chunk.
pub fn chunk_id(course_title: &str, chunk_index: u32) -> String {
    format!("{}-{}", course_title, chunk_index)
}

/// Attribution for part of an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// Display label, e.g. `Intro to Testing - Lesson 1`.
    pub text: String,
    /// Optional link to the lesson or course.
    pub link: Option<String>,
}

impl Source {
    pub fn new(text: impl Into<String>, link: Option<String>) -> Self {
        Self {
            text: text.into(),
            link,
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.link {
            Some(link) => write!(f, "{} ({})", self.text, link),
            None => write!(f, "{}", self.text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_id_format() {
        let chunk = CourseChunk {
            course_title: "Intro to Testing".to_string(),
            lesson_number: Some(1),
            lesson_title: None,
            chunk_index: 7,
            content: "text".to_string(),
        };
        assert_eq!(chunk.id(), "Intro to Testing-7");
        assert!(!chunk.starts_lesson());
    }

    #[test]
    fn test_course_lesson_lookup() {
        let course = Course::new("Rust")
            .with_lesson(Lesson::new(1, "Ownership"))
            .with_lesson(Lesson::new(2, "Borrowing").with_link("https://example.com/2"));

        assert_eq!(course.lesson(2).and_then(|l| l.link.as_deref()), Some("https://example.com/2"));
        assert!(course.lesson(3).is_none());
    }

    #[test]
    fn test_source_display() {
        let source = Source::new("Rust - Lesson 1", Some("https://example.com".to_string()));
        assert_eq!(source.to_string(), "Rust - Lesson 1 (https://example.com)");
        assert_eq!(Source::new("Rust", None).to_string(), "Rust");
    }
}
