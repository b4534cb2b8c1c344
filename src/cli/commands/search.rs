//! Search command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::error::KursdeskError;
use crate::orchestrator::Orchestrator;
use anyhow::Result;

/// Run the search command.
pub async fn run_search(
    query: &str,
    course: Option<&str>,
    lesson: Option<u32>,
    limit: Option<usize>,
    settings: Settings,
) -> Result<()> {
    preflight::check(Operation::Search, &settings)?;

    let orchestrator = Orchestrator::new(settings)?;

    let spinner = Output::spinner("Searching...");
    let results = orchestrator.search(query, course, lesson, limit).await;
    spinner.finish_and_clear();

    match results {
        Ok(hits) => {
            if hits.is_empty() {
                Output::warning("No relevant content found.");
            } else {
                Output::success(&format!("Found {} results", hits.len()));
                for hit in &hits {
                    Output::search_result(hit);
                }
            }
        }
        Err(KursdeskError::CourseNotFound(name)) => {
            Output::warning(&format!("No course found matching '{}'", name));
        }
        Err(e) => {
            Output::error(&format!("Search failed: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
