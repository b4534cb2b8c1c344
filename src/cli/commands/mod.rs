//! CLI command implementations.

mod ask;
mod chat;
mod config;
mod courses;
mod ingest;
mod outline;
mod search;

pub use ask::run_ask;
pub use chat::run_chat;
pub use config::run_config;
pub use courses::run_courses;
pub use ingest::run_ingest;
pub use outline::run_outline;
pub use search::run_search;

use crate::config::Settings;

/// Settings with an optional chat model override applied.
fn with_model(mut settings: Settings, model: Option<String>) -> Settings {
    if let Some(model) = model {
        settings.llm.model = model;
    }
    settings
}
