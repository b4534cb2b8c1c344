//! Content search tool.

use super::tools::{optional_str, optional_u32, required_str, Tool, ToolOutput};
use crate::error::{KursdeskError, Result};
use crate::models::{Course, Source};
use crate::semantic::{ContentMatch, SemanticStore};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Searches course content with optional course and lesson filters.
pub struct CourseSearchTool {
    store: Arc<SemanticStore>,
}

impl CourseSearchTool {
    pub const NAME: &'static str = "search_course_content";

    pub fn new(store: Arc<SemanticStore>) -> Self {
        Self { store }
    }

    /// Format matches for the model and build one source per match.
    async fn format_results(&self, matches: &[ContentMatch]) -> Result<ToolOutput> {
        let mut courses: HashMap<String, Option<Course>> = HashMap::new();
        let mut blocks = Vec::with_capacity(matches.len());
        let mut sources = Vec::with_capacity(matches.len());

        for m in matches {
            let chunk = &m.chunk;
            let title = chunk.course_title.as_str();

            let header = match chunk.lesson_number {
                Some(number) => format!("[{} - Lesson {}]", title, number),
                None => format!("[{}]", title),
            };
            blocks.push(format!("{}\n{}", header, chunk.content));

            let source = match chunk.lesson_number {
                Some(number) => {
                    if !courses.contains_key(title) {
                        courses.insert(title.to_string(), self.store.get_course(title).await?);
                    }
                    let lesson_title = courses
                        .get(title)
                        .and_then(Option::as_ref)
                        .and_then(|c| c.lesson(number))
                        .map(|l| l.title.as_str());
                    let label = match lesson_title {
                        Some(lesson_title) => {
                            format!("{} - Lesson {}: {}", title, number, lesson_title)
                        }
                        None => format!("{} - Lesson {}", title, number),
                    };
                    Source::new(label, self.store.get_lesson_link(title, number).await?)
                }
                None => Source::new(title, self.store.get_course_link(title).await?),
            };
            sources.push(source);
        }

        Ok(ToolOutput {
            text: blocks.join("\n\n"),
            sources,
        })
    }
}

#[async_trait]
impl Tool for CourseSearchTool {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Search course materials with smart course name matching and lesson filtering"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "What to search for in the course content"
                },
                "course_name": {
                    "type": "string",
                    "description": "Course title (partial matches work, e.g. 'MCP', 'Introduction')"
                },
                "lesson_number": {
                    "type": "integer",
                    "description": "Specific lesson number to search within (e.g. 1, 2, 3)"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: &Value) -> Result<ToolOutput> {
        let query = required_str(args, "query")?;
        let course_name = optional_str(args, "course_name");
        let lesson_number = optional_u32(args, "lesson_number")?;

        let matches = match self
            .store
            .search_content(query, course_name, lesson_number)
            .await
        {
            Ok(matches) => matches,
            Err(e @ KursdeskError::CourseNotFound(_)) => return Ok(ToolOutput::text(e.to_string())),
            Err(e) => return Err(e),
        };

        if matches.is_empty() {
            let mut filter_info = String::new();
            if let Some(name) = course_name {
                filter_info.push_str(&format!(" in course '{}'", name));
            }
            if let Some(number) = lesson_number {
                filter_info.push_str(&format!(" in lesson {}", number));
            }
            return Ok(ToolOutput::text(format!(
                "No relevant content found{}.",
                filter_info
            )));
        }

        self.format_results(&matches).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::ChunkingConfig;
    use crate::document::DocumentProcessor;
    use crate::testing::{sample_course, semantic_store};

    async fn tool() -> CourseSearchTool {
        let (semantic, _) = semantic_store();
        let (course, chunks) = sample_course();
        semantic.add_course(&course, &chunks).await.unwrap();
        CourseSearchTool::new(Arc::new(semantic))
    }

    #[tokio::test]
    async fn test_formats_results_and_sources() {
        let tool = tool().await;
        let output = tool
            .execute(&json!({"query": "What does a unit test verify?", "course_name": "Intro to Testing"}))
            .await
            .unwrap();

        assert!(output.text.starts_with("[Intro to Testing - Lesson 1]\n"));
        assert!(output.text.contains("A unit test verifies one behavior in isolation."));
        assert_eq!(output.sources[0].text, "Intro to Testing - Lesson 1: Unit Tests");
        assert_eq!(
            output.sources[0].link.as_deref(),
            Some("https://example.com/testing/1")
        );
        assert_eq!(output.sources.len(), output.text.matches("[Intro to Testing").count());
    }

    #[tokio::test]
    async fn test_document_level_chunk_links_the_course() {
        let (semantic, _) = semantic_store();
        let (course, chunks) = DocumentProcessor::new(ChunkingConfig::default())
            .unwrap()
            .process_text("Course Title: Field Notes\nCourse Link: https://example.com/notes\n\nLoose notes about testing fixtures.\n")
            .unwrap();
        semantic.add_course(&course, &chunks).await.unwrap();
        let tool = CourseSearchTool::new(Arc::new(semantic));

        let output = tool
            .execute(&json!({"query": "testing fixtures notes", "course_name": "Field Notes"}))
            .await
            .unwrap();

        assert!(output.text.starts_with("[Field Notes]\n"));
        assert_eq!(
            output.sources,
            vec![Source::new("Field Notes", Some("https://example.com/notes".to_string()))]
        );
    }

    #[tokio::test]
    async fn test_no_results_messages() {
        let tool = tool().await;

        let output = tool
            .execute(&json!({"query": "xylophone zebra quokka"}))
            .await
            .unwrap();
        assert_eq!(output.text, "No relevant content found.");
        assert!(output.sources.is_empty());

        let output = tool
            .execute(&json!({"query": "xylophone", "course_name": "Intro to Testing", "lesson_number": 3}))
            .await
            .unwrap();
        assert_eq!(
            output.text,
            "No relevant content found in course 'Intro to Testing' in lesson 3."
        );
    }

    #[tokio::test]
    async fn test_unknown_course_on_empty_catalog() {
        let (semantic, _) = semantic_store();
        let tool = CourseSearchTool::new(Arc::new(semantic));
        let output = tool
            .execute(&json!({"query": "loops", "course_name": "Python"}))
            .await
            .unwrap();
        assert_eq!(output.text, "No course found matching 'Python'");
    }

    #[tokio::test]
    async fn test_missing_query_is_an_error() {
        let tool = tool().await;
        let err = tool.execute(&json!({"course_name": "x"})).await.unwrap_err();
        assert!(matches!(err, KursdeskError::ToolArguments(_)));
    }
}
