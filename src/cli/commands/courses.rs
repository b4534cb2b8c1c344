//! Courses command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;

/// List indexed courses.
pub async fn run_courses(settings: Settings) -> Result<()> {
    let orchestrator = Orchestrator::new(settings)?;

    let courses = match orchestrator.semantic_store().get_all_courses_metadata().await {
        Ok(courses) => courses,
        Err(e) => {
            Output::error(&format!("Failed to list courses: {}", e));
            return Err(e.into());
        }
    };

    if courses.is_empty() {
        Output::info("No courses indexed yet. Use 'kursdesk ingest <path>' to add some.");
        return Ok(());
    }

    Output::header(&format!("Indexed Courses ({})", courses.len()));
    println!();
    for course in &courses {
        Output::course_info(course);
    }

    let total_lessons: usize = courses.iter().map(|c| c.lessons.len()).sum();
    println!();
    Output::kv("Total courses", &courses.len().to_string());
    Output::kv("Total lessons", &total_lessons.to_string());

    Ok(())
}
