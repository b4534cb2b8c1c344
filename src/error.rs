//! Error types for Kursdesk.

use thiserror::Error;

/// Library-level error type for Kursdesk operations.
#[derive(Error, Debug)]
pub enum KursdeskError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Document parsing failed: {0}")]
    Document(String),

    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("OpenAI API error: {0}")]
    OpenAI(String),

    #[error("No course found matching '{0}'")]
    CourseNotFound(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid tool arguments: {0}")]
    ToolArguments(String),

    #[error("Agent error: {0}")]
    Agent(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl KursdeskError {
    /// Whether this error comes from an external provider (embedding index,
    /// vector storage or language model). Such failures abort the whole query.
    pub fn is_provider_failure(&self) -> bool {
        matches!(
            self,
            KursdeskError::Embedding(_)
                | KursdeskError::VectorStore(_)
                | KursdeskError::OpenAI(_)
                | KursdeskError::Http(_)
                | KursdeskError::Database(_)
        )
    }
}

/// Result type alias for Kursdesk operations.
pub type Result<T> = std::result::Result<T, KursdeskError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_failure_classification() {
        assert!(KursdeskError::Embedding("down".to_string()).is_provider_failure());
        assert!(KursdeskError::OpenAI("401".to_string()).is_provider_failure());
        assert!(!KursdeskError::CourseNotFound("MCP".to_string()).is_provider_failure());
        assert!(!KursdeskError::UnknownTool("nope".to_string()).is_provider_failure());
    }

    #[test]
    fn test_course_not_found_message() {
        let err = KursdeskError::CourseNotFound("Rust 101".to_string());
        assert_eq!(err.to_string(), "No course found matching 'Rust 101'");
    }
}
