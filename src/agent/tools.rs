//! Tool abstraction, registry and per-query source collection.

use super::llm::ToolDefinition;
use crate::error::{KursdeskError, Result};
use crate::models::Source;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Output of one tool invocation: text for the model plus the sources it used.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolOutput {
    pub text: String,
    /// One source per retrieved item, in the order the items appear in `text`.
    pub sources: Vec<Source>,
}

impl ToolOutput {
    /// Output with no attributable sources.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sources: Vec::new(),
        }
    }
}

/// A capability the model can invoke by name.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema of the accepted arguments.
    fn parameters_schema(&self) -> Value;

    async fn execute(&self, args: &Value) -> Result<ToolOutput>;

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// Registered tools, dispatched by name.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. A tool with the same name is replaced.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.retain(|t| t.name() != tool.name());
        self.tools.push(tool);
    }

    pub fn get_tool_definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name().to_string()).collect()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name).cloned()
    }

    /// Run the named tool.
    pub async fn execute_tool(&self, name: &str, args: &Value) -> Result<ToolOutput> {
        let tool = self
            .get(name)
            .ok_or_else(|| KursdeskError::UnknownTool(name.to_string()))?;
        debug!("Executing tool {} with {}", name, args);
        tool.execute(args).await
    }
}

/// Sources gathered while answering a single query.
#[derive(Debug, Clone, Default)]
pub struct SourceBuffer {
    sources: Vec<Source>,
}

impl SourceBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the sources of a tool invocation, keeping call order.
    pub fn extend(&mut self, sources: impl IntoIterator<Item = Source>) {
        self.sources.extend(sources);
    }

    /// Sources collected so far, in call order.
    pub fn last_sources(&self) -> &[Source] {
        &self.sources
    }

    /// Empty the buffer once its sources have been handed out.
    pub fn reset(&mut self) {
        self.sources.clear();
    }
}

/// Parse raw model arguments. An empty string means no arguments.
pub fn parse_arguments(raw: &str) -> Result<Value> {
    if raw.trim().is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| KursdeskError::ToolArguments(format!("invalid JSON: {}", e)))?;
    if !value.is_object() {
        return Err(KursdeskError::ToolArguments(
            "arguments must be a JSON object".to_string(),
        ));
    }
    Ok(value)
}

/// Required, non-empty string argument.
pub fn required_str<'a>(args: &'a Value, key: &str) -> Result<&'a str> {
    optional_str(args, key)
        .ok_or_else(|| KursdeskError::ToolArguments(format!("missing '{}' argument", key)))
}

/// Optional string argument; blank strings count as absent.
pub fn optional_str<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Optional positive integer argument, accepting numeric strings too.
pub fn optional_u32(args: &Value, key: &str) -> Result<Option<u32>> {
    let value = match args.get(key) {
        None | Some(Value::Null) => return Ok(None),
        Some(value) => value,
    };

    let parsed = match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) if s.trim().is_empty() => return Ok(None),
        Value::String(s) => s.trim().parse::<u32>().ok(),
        _ => None,
    };

    parsed.map(Some).ok_or_else(|| {
        KursdeskError::ToolArguments(format!("'{}' must be a non-negative integer", key))
    })
}
