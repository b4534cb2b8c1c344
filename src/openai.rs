//! OpenAI client construction shared by the embedding and chat providers.

use async_openai::{config::OpenAIConfig, Client};
use std::time::Duration;
use tracing::{debug, warn};

/// Request timeout used when nothing else is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Build an OpenAI client whose requests give up after `timeout`.
///
/// `OPENAI_API_KEY` supplies the key; `OPENAI_BASE_URL`, when set, points the
/// client at a compatible endpoint.
pub fn create_client(timeout: Duration) -> Client<OpenAIConfig> {
    let mut config = OpenAIConfig::default();
    if let Some(base) = base_url_override(std::env::var("OPENAI_BASE_URL").ok()) {
        debug!("Using OpenAI-compatible endpoint {}", base);
        config = config.with_api_base(base);
    }

    let http_client = match reqwest::Client::builder().timeout(timeout).build() {
        Ok(client) => client,
        Err(e) => {
            warn!("Failed to build HTTP client with timeout, using defaults: {}", e);
            reqwest::Client::new()
        }
    };

    Client::with_config(config).with_http_client(http_client)
}

/// Request timeout for a configured number of seconds. 0 means the default.
pub fn request_timeout(secs: u64) -> Duration {
    if secs == 0 {
        DEFAULT_TIMEOUT
    } else {
        Duration::from_secs(secs)
    }
}

fn base_url_override(raw: Option<String>) -> Option<String> {
    let raw = raw?;
    let trimmed = raw.trim().trim_end_matches('/');
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_timeout() {
        assert_eq!(request_timeout(0), DEFAULT_TIMEOUT);
        assert_eq!(request_timeout(30), Duration::from_secs(30));
    }

    #[test]
    fn test_base_url_override() {
        assert_eq!(base_url_override(None), None);
        assert_eq!(base_url_override(Some("  ".to_string())), None);
        assert_eq!(
            base_url_override(Some("http://localhost:8080/v1/".to_string())).as_deref(),
            Some("http://localhost:8080/v1")
        );
    }
}
