//! Interactive chat command.

use super::with_model;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;
use console::style;
use std::io::{self, BufRead, Write};

/// Run the interactive chat command.
pub async fn run_chat(model: Option<String>, settings: Settings) -> Result<()> {
    // Pre-flight checks
    if let Err(e) = preflight::check(Operation::Ask, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let orchestrator = Orchestrator::new(with_model(settings, model))?;
    let mut session_id = orchestrator.new_session()?;

    let stats = orchestrator.get_catalog_stats().await?;
    if stats.total_courses == 0 {
        Output::warning("No courses indexed yet. Use 'kursdesk ingest <path>' to add some.");
    }

    println!("\n{}", style("Kursdesk Chat").bold().cyan());
    println!(
        "{}\n",
        style("Ask about your courses, or 'exit' to quit. Use 'clear' to start a new conversation.")
            .dim()
    );

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("{} ", style("You:").green().bold());
        stdout.flush()?;

        let mut input = String::new();
        if stdin.lock().read_line(&mut input)? == 0 {
            break;
        }

        let input = input.trim();

        if input.is_empty() {
            continue;
        }

        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            Output::info("Goodbye!");
            break;
        }

        if input.eq_ignore_ascii_case("clear") {
            orchestrator.sessions().remove(&session_id)?;
            session_id = orchestrator.new_session()?;
            Output::info("Started a new conversation.");
            continue;
        }

        let spinner = Output::spinner("Thinking...");
        let result = orchestrator.process_query(Some(&session_id), input).await;
        spinner.finish_and_clear();

        match result {
            Ok(response) => {
                println!("\n{} {}", style("Kursdesk:").cyan().bold(), response.answer);
                Output::sources(&response.sources);
                println!();
            }
            Err(e) => {
                Output::error(&format!("Error: {}", e));
            }
        }
    }

    Ok(())
}
