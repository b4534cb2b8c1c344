//! Course outline tool.

use super::tools::{required_str, Tool, ToolOutput};
use crate::error::{KursdeskError, Result};
use crate::models::{Course, Source};
use crate::semantic::SemanticStore;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

/// Returns a course's title, link, instructor and lesson list.
pub struct CourseOutlineTool {
    store: Arc<SemanticStore>,
}

impl CourseOutlineTool {
    pub const NAME: &'static str = "get_course_outline";

    pub fn new(store: Arc<SemanticStore>) -> Self {
        Self { store }
    }
}

/// Render a course outline as plain text.
pub fn format_outline(course: &Course) -> String {
    let mut lines = vec![format!("Course Title: {}", course.title)];
    if let Some(link) = &course.link {
        lines.push(format!("Course Link: {}", link));
    }
    if let Some(instructor) = &course.instructor {
        lines.push(format!("Course Instructor: {}", instructor));
    }

    if course.lessons.is_empty() {
        lines.push("Lessons: none".to_string());
    } else {
        lines.push(format!("Lessons ({}):", course.lessons.len()));
        for lesson in &course.lessons {
            lines.push(format!("Lesson {}: {}", lesson.number, lesson.title));
        }
    }

    lines.join("\n")
}

#[async_trait]
impl Tool for CourseOutlineTool {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Get the outline of a course: title, link, instructor and the numbered list of lessons"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "course_title": {
                    "type": "string",
                    "description": "Course title (partial matches work, e.g. 'MCP', 'Introduction')"
                }
            },
            "required": ["course_title"]
        })
    }

    async fn execute(&self, args: &Value) -> Result<ToolOutput> {
        let name = required_str(args, "course_title")?;

        let title = match self.store.resolve_course(name).await {
            Ok(title) => title,
            Err(e @ KursdeskError::CourseNotFound(_)) => return Ok(ToolOutput::text(e.to_string())),
            Err(e) => return Err(e),
        };

        let course = self
            .store
            .get_course(&title)
            .await?
            .ok_or_else(|| KursdeskError::CourseNotFound(name.to_string()))?;

        Ok(ToolOutput {
            text: format_outline(&course),
            sources: vec![Source::new(course.title.clone(), course.link.clone())],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_course, semantic_store};

    #[tokio::test]
    async fn test_outline_with_fuzzy_title() {
        let (semantic, _) = semantic_store();
        let (course, chunks) = sample_course();
        semantic.add_course(&course, &chunks).await.unwrap();
        let tool = CourseOutlineTool::new(Arc::new(semantic));

        let output = tool
            .execute(&json!({"course_title": "testing intro"}))
            .await
            .unwrap();

        assert_eq!(
            output.text,
            "Course Title: Intro to Testing\n\
             Course Link: https://example.com/testing\n\
             Course Instructor: Ada Lovelace\n\
             Lessons (2):\n\
             Lesson 1: Unit Tests\n\
             Lesson 2: Integration Tests"
        );
        assert_eq!(output.sources, vec![Source::new(
            "Intro to Testing",
            Some("https://example.com/testing".to_string())
        )]);
    }

    #[tokio::test]
    async fn test_outline_on_empty_catalog() {
        let (semantic, _) = semantic_store();
        let tool = CourseOutlineTool::new(Arc::new(semantic));
        let output = tool.execute(&json!({"course_title": "Anything"})).await.unwrap();
        assert_eq!(output.text, "No course found matching 'Anything'");
    }

    #[test]
    fn test_format_outline_without_lessons() {
        let course = Course::new("Notes");
        assert_eq!(format_outline(&course), "Course Title: Notes\nLessons: none");
    }
}
