//! Agent runner with a bounded tool calling loop.

use super::llm::{LanguageModel, Message, ModelRequest, ModelResponse, ToolRequest};
use super::tools::{parse_arguments, SourceBuffer, ToolRegistry};
use crate::error::{KursdeskError, Result};
use crate::models::Source;
use crate::session::Exchange;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Answer used when the model ends without any text.
pub const NO_ANSWER: &str = "I couldn't find an answer in the course materials.";

/// Agent that lets the model search course materials before answering.
pub struct Agent {
    model: Arc<dyn LanguageModel>,
    tools: Arc<ToolRegistry>,
    system_prompt: String,
    max_tool_rounds: usize,
}

impl Agent {
    pub fn new(model: Arc<dyn LanguageModel>, tools: Arc<ToolRegistry>, system_prompt: &str) -> Self {
        debug!("Agent tools: {}", tools.tool_names().join(", "));
        Self {
            model,
            tools,
            system_prompt: system_prompt.to_string(),
            max_tool_rounds: 1,
        }
    }

    /// Set how many rounds of tool calls are executed before the model must answer.
    pub fn with_max_tool_rounds(mut self, rounds: usize) -> Self {
        self.max_tool_rounds = rounds;
        self
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Answer a prompt given prior exchanges.
    ///
    /// Rounds below the cap offer the tools; the dispatch after the last executed
    /// round is sent without tools. Tool requests beyond the cap are not executed.
    pub async fn run(&self, prompt: &str, history: &[Exchange]) -> Result<AgentResponse> {
        let mut messages: Vec<Message> = Vec::with_capacity(history.len() * 2 + 1);
        for exchange in history {
            messages.push(Message::User(exchange.query.clone()));
            messages.push(Message::Assistant(exchange.answer.clone()));
        }
        messages.push(Message::User(prompt.to_string()));

        let mut sources = SourceBuffer::new();
        let mut tool_calls_made = Vec::new();
        let mut tool_rounds = 0;
        let mut dispatches = 0;

        loop {
            let tools = if tool_rounds < self.max_tool_rounds {
                self.tools.get_tool_definitions()
            } else {
                Vec::new()
            };

            dispatches += 1;
            debug!("Agent dispatch {} ({} tools offered)", dispatches, tools.len());

            let request = ModelRequest {
                system: self.system_prompt.clone(),
                messages: messages.clone(),
                tools,
            };
            let response = self.model.complete(&request).await?;

            let (text, calls) = match response {
                ModelResponse::FinalAnswer(answer) => {
                    let answer = if answer.trim().is_empty() {
                        warn!("Model returned an empty answer");
                        NO_ANSWER.to_string()
                    } else {
                        answer
                    };
                    return Ok(Self::build_response(answer, sources, tool_calls_made, dispatches));
                }
                ModelResponse::ToolRequests { text, calls } => (text, calls),
            };

            if tool_rounds >= self.max_tool_rounds || calls.is_empty() {
                if !calls.is_empty() {
                    warn!(
                        "Ignoring {} tool requests after {} tool rounds",
                        calls.len(),
                        tool_rounds
                    );
                }
                let answer = text.unwrap_or_else(|| NO_ANSWER.to_string());
                return Ok(Self::build_response(answer, sources, tool_calls_made, dispatches));
            }

            tool_rounds += 1;
            messages.push(Message::AssistantToolCalls {
                text,
                calls: calls.clone(),
            });

            for call in &calls {
                let record = self.execute_tool_call(call, &mut sources).await?;
                messages.push(Message::ToolResult {
                    call_id: call.id.clone(),
                    content: record.result.clone(),
                });
                tool_calls_made.push(record);
            }
        }
    }

    /// Execute a single tool call and return a record of it.
    ///
    /// Tool failures become the textual result; provider failures abort.
    async fn execute_tool_call(
        &self,
        call: &ToolRequest,
        sources: &mut SourceBuffer,
    ) -> Result<ToolCallRecord> {
        info!("Agent calling tool: {} with args: {}", call.name, call.arguments);

        let outcome = match parse_arguments(&call.arguments) {
            Ok(args) => self.tools.execute_tool(&call.name, &args).await,
            Err(e) => Err(e),
        };

        let result = match outcome {
            Ok(output) => {
                sources.extend(output.sources);
                output.text
            }
            Err(e) if e.is_provider_failure() => return Err(e),
            Err(e) => {
                if matches!(e, KursdeskError::UnknownTool(_)) {
                    error!("Model requested unregistered tool '{}'", call.name);
                } else {
                    warn!("Tool {} failed: {}", call.name, e);
                }
                format!("Tool execution failed: {}", e)
            }
        };

        Ok(ToolCallRecord {
            name: call.name.clone(),
            arguments: call.arguments.clone(),
            result,
        })
    }

    fn build_response(
        answer: String,
        mut sources: SourceBuffer,
        tool_calls: Vec<ToolCallRecord>,
        dispatches: usize,
    ) -> AgentResponse {
        let collected = sources.last_sources().to_vec();
        sources.reset();
        AgentResponse {
            answer,
            sources: collected,
            tool_calls,
            dispatches,
        }
    }
}

/// Response from an agent run.
#[derive(Debug)]
pub struct AgentResponse {
    /// The final answer text.
    pub answer: String,
    /// Sources from every executed tool call, in call order.
    pub sources: Vec<Source>,
    /// Record of all tool calls made during execution.
    pub tool_calls: Vec<ToolCallRecord>,
    /// Number of model calls used.
    pub dispatches: usize,
}

/// Record of a tool call made by the agent.
#[derive(Debug, Clone)]
pub struct ToolCallRecord {
    /// Name of the tool called.
    pub name: String,
    /// JSON arguments passed to the tool.
    pub arguments: String,
    /// Result returned to the model.
    pub result: String,
}

impl std::fmt::Display for ToolCallRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name, self.arguments)
    }
}
