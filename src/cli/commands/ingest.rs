//! Ingest command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use crate::semantic::IngestOutcome;
use anyhow::Result;
use std::path::PathBuf;

/// Run the ingest command on a file or folder.
pub async fn run_ingest(path: Option<&str>, clear: bool, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Ingest, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let path = match path {
        Some(p) => Settings::expand_path(p),
        None => settings.docs_dir(),
    };
    let orchestrator = Orchestrator::new(settings)?;

    if path.is_file() {
        if clear {
            orchestrator.semantic_store().clear_all_data().await?;
        }
        return ingest_single(&orchestrator, path).await;
    }

    if !path.is_dir() {
        Output::warning(&format!("Nothing to ingest at {}", path.display()));
        return Ok(());
    }

    let spinner = Output::spinner(&format!("Ingesting {}...", path.display()));
    let report = orchestrator.ingest_course_folder(&path, clear).await;
    spinner.finish_and_clear();
    let report = report?;

    for title in &report.skipped {
        Output::info(&format!("Skipped '{}' (already indexed)", title));
    }
    for (file, reason) in &report.failed {
        Output::warning(&format!("{}: {}", file.display(), reason));
    }
    Output::success(&format!(
        "Added {} courses with {} chunks",
        report.courses_added, report.chunks_added
    ));

    Ok(())
}

async fn ingest_single(orchestrator: &Orchestrator, path: PathBuf) -> Result<()> {
    let spinner = Output::spinner(&format!("Ingesting {}...", path.display()));
    let outcome = orchestrator.ingest_file(&path).await;
    spinner.finish_and_clear();

    match outcome? {
        IngestOutcome::Added {
            course,
            chunk_count,
        } => {
            Output::success(&format!(
                "Added '{}' ({} lessons, {} chunks)",
                course.title,
                course.lessons.len(),
                chunk_count
            ));
        }
        IngestOutcome::DuplicateSkipped { title } => {
            Output::info(&format!("Skipped '{}' (already indexed)", title));
        }
    }

    Ok(())
}
