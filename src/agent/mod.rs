//! Tool-calling agent over the course catalog.
//!
//! The model receives the search and outline tools, may request them for a
//! bounded number of rounds, and then answers. Sources of every executed call
//! are collected for attribution.

mod llm;
mod outline;
mod runner;
mod search;
mod tools;

pub use llm::{
    LanguageModel, Message, ModelRequest, ModelResponse, OpenAIChatModel, ToolDefinition,
    ToolRequest,
};
pub use outline::{format_outline, CourseOutlineTool};
pub use runner::{Agent, AgentResponse, ToolCallRecord, NO_ANSWER};
pub use search::CourseSearchTool;
pub use tools::{
    optional_str, optional_u32, parse_arguments, required_str, SourceBuffer, Tool, ToolOutput,
    ToolRegistry,
};

use crate::semantic::SemanticStore;
use std::sync::Arc;

/// Registry holding the content search and course outline tools.
pub fn course_tools(store: Arc<SemanticStore>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(CourseSearchTool::new(store.clone())));
    registry.register(Arc::new(CourseOutlineTool::new(store)));
    registry
}
