//! CLI output formatting utilities.

use crate::models::{Course, Source};
use crate::semantic::ContentMatch;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

/// Output helper for CLI formatting.
pub struct Output;

impl Output {
    /// Print an info message.
    pub fn info(msg: &str) {
        println!("{} {}", style(">>").cyan().bold(), msg);
    }

    /// Print a success message.
    pub fn success(msg: &str) {
        println!("{} {}", style(">>").green().bold(), msg);
    }

    /// Print a warning message.
    pub fn warning(msg: &str) {
        eprintln!("{} {}", style(">>").yellow().bold(), msg);
    }

    /// Print an error message.
    pub fn error(msg: &str) {
        eprintln!("{} {}", style(">>").red().bold(), msg);
    }

    /// Print a header.
    pub fn header(msg: &str) {
        println!("\n{}", style(msg).bold().underlined());
    }

    /// Print a key-value pair.
    pub fn kv(key: &str, value: &str) {
        println!("  {}: {}", style(key).dim(), value);
    }

    /// Print a list item.
    pub fn list_item(msg: &str) {
        println!("  {} {}", style("*").cyan(), msg);
    }

    /// Print numbered sources under an answer.
    pub fn sources(sources: &[Source]) {
        if sources.is_empty() {
            return;
        }
        Output::header("Sources");
        for (i, source) in sources.iter().enumerate() {
            match &source.link {
                Some(link) => println!(
                    "  {} {}  {}",
                    style(format!("[{}]", i + 1)).cyan(),
                    style(&source.text).bold(),
                    style(link).dim()
                ),
                None => println!(
                    "  {} {}",
                    style(format!("[{}]", i + 1)).cyan(),
                    style(&source.text).bold()
                ),
            }
        }
    }

    /// Print a content search hit.
    pub fn search_result(hit: &ContentMatch) {
        let label = match hit.chunk.lesson_number {
            Some(number) => format!("{} - Lesson {}", hit.chunk.course_title, number),
            None => hit.chunk.course_title.clone(),
        };
        println!(
            "\n{} {} (score: {:.2})",
            style(">>").green(),
            style(label).bold(),
            hit.score
        );
        println!("   {}", content_preview(&hit.chunk.content, 200));
    }

    /// Print a one-line course summary.
    pub fn course_info(course: &Course) {
        let instructor = course
            .instructor
            .as_deref()
            .map(|i| format!(", {}", i))
            .unwrap_or_default();
        println!(
            "  {} {} ({} lessons{})",
            style("*").cyan(),
            style(&course.title).bold(),
            course.lessons.len(),
            instructor
        );
    }

    /// Create a spinner.
    pub fn spinner(msg: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        if let Ok(spinner_style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            pb.set_style(spinner_style);
        }
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    }
}

/// Flatten and truncate content with an ellipsis.
fn content_preview(content: &str, max_chars: usize) -> String {
    let content = content.replace('\n', " ");
    if content.chars().count() <= max_chars {
        content
    } else {
        let truncated: String = content.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}
