//! Outline command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::error::KursdeskError;
use crate::orchestrator::Orchestrator;
use anyhow::Result;

/// Show the outline of the course best matching `course`.
pub async fn run_outline(course: &str, settings: Settings) -> Result<()> {
    preflight::check(Operation::Search, &settings)?;

    let orchestrator = Orchestrator::new(settings)?;

    let course = match orchestrator.course_outline(course).await {
        Ok(course) => course,
        Err(KursdeskError::CourseNotFound(name)) => {
            Output::warning(&format!("No course found matching '{}'", name));
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    Output::header(&course.title);
    if let Some(instructor) = &course.instructor {
        Output::kv("Instructor", instructor);
    }
    if let Some(link) = &course.link {
        Output::kv("Link", link);
    }
    println!();

    if course.lessons.is_empty() {
        Output::info("This course has no lessons.");
    }
    for lesson in &course.lessons {
        match &lesson.link {
            Some(link) => Output::list_item(&format!("Lesson {}: {} ({})", lesson.number, lesson.title, link)),
            None => Output::list_item(&format!("Lesson {}: {}", lesson.number, lesson.title)),
        }
    }

    Ok(())
}
