//! CLI module for Kursdesk.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Kursdesk - Course Materials Q&A
///
/// Index course documents and ask questions about them. Answers cite the
/// courses and lessons they were drawn from.
#[derive(Parser, Debug)]
#[command(name = "kursdesk")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Index a course document or a folder of course documents
    Ingest {
        /// File or folder to ingest (defaults to the configured docs folder)
        path: Option<String>,

        /// Remove all indexed courses before ingesting
        #[arg(long)]
        clear: bool,
    },

    /// Ask a question about the indexed courses
    Ask {
        /// The question to ask
        question: String,

        /// LLM model to use for the answer
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Start an interactive chat session
    Chat {
        /// LLM model to use
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Search course content without asking the model
    Search {
        /// Search query
        query: String,

        /// Restrict to a course (partial names work)
        #[arg(long)]
        course: Option<String>,

        /// Restrict to a lesson number
        #[arg(long)]
        lesson: Option<u32>,

        /// Maximum number of results
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// List indexed courses
    Courses,

    /// Show the outline of a course
    Outline {
        /// Course title (partial names work)
        course: String,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Open configuration file in editor
    Edit,

    /// Show configuration file path
    Path,
}
