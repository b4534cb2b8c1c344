//! Pre-flight checks before operations that call external providers.
//!
//! Validates configuration up front instead of failing halfway through an
//! ingest or a query.

use crate::config::{EmbeddingProvider, Settings};
use crate::error::{KursdeskError, Result};

/// Requirements for different operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Ingest embeds documents.
    Ingest,
    /// Search embeds the query.
    Search,
    /// Asking questions embeds and calls the chat model.
    Ask,
}

/// Run pre-flight checks for the given operation.
///
/// Returns Ok(()) if all checks pass, or an error describing what's missing.
pub fn check(operation: Operation, settings: &Settings) -> Result<()> {
    if needs_api_key(operation, settings) {
        check_api_key(std::env::var("OPENAI_API_KEY").ok().as_deref())?;
    }
    Ok(())
}

/// Whether the operation reaches OpenAI with these settings.
pub fn needs_api_key(operation: Operation, settings: &Settings) -> bool {
    match operation {
        Operation::Ask => true,
        Operation::Ingest | Operation::Search => {
            settings.embedding.provider == EmbeddingProvider::OpenAI
        }
    }
}

/// Check that an OpenAI API key is configured.
fn check_api_key(key: Option<&str>) -> Result<()> {
    match key {
        Some(key) if !key.trim().is_empty() => Ok(()),
        Some(_) => Err(KursdeskError::Config(
            "OPENAI_API_KEY is empty. Set it with: export OPENAI_API_KEY='sk-...'".to_string(),
        )),
        None => Err(KursdeskError::Config(
            "OPENAI_API_KEY not set. Set it with: export OPENAI_API_KEY='sk-...'".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hashing_embeddings_need_no_key_for_search() {
        let mut settings = Settings::default();
        settings.embedding.provider = EmbeddingProvider::Hashing;
        assert!(!needs_api_key(Operation::Search, &settings));
        assert!(!needs_api_key(Operation::Ingest, &settings));
        assert!(needs_api_key(Operation::Ask, &settings));
        assert!(check(Operation::Search, &settings).is_ok());
    }

    #[test]
    fn test_openai_embeddings_need_key() {
        let settings = Settings::default();
        assert!(needs_api_key(Operation::Ingest, &settings));
    }

    #[test]
    fn test_check_api_key() {
        assert!(check_api_key(Some("sk-test")).is_ok());
        assert!(check_api_key(Some("  ")).is_err());
        assert!(check_api_key(None).is_err());
    }
}
