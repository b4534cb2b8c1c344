//! Language model interface and its OpenAI chat-completions implementation.

use crate::config::LlmSettings;
use crate::error::{KursdeskError, Result};
use crate::openai::{create_client, request_timeout};
use async_openai::types::{
    ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs,
    ChatCompletionTool, ChatCompletionToolChoiceOption, ChatCompletionToolType,
    CreateChatCompletionRequestArgs, FunctionCall, FunctionObject,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

/// Tool description sent to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON schema of the tool's arguments.
    pub parameters: Value,
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRequest {
    /// Provider-assigned call id, echoed back with the result.
    pub id: String,
    pub name: String,
    /// Raw JSON arguments as produced by the model.
    pub arguments: String,
}

/// One message of the outbound conversation.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    User(String),
    Assistant(String),
    /// Assistant turn that asked for tools.
    AssistantToolCalls {
        text: Option<String>,
        calls: Vec<ToolRequest>,
    },
    ToolResult {
        call_id: String,
        content: String,
    },
}

/// A complete request to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRequest {
    pub system: String,
    pub messages: Vec<Message>,
    /// Tools the model may call. Empty means the model must answer in text.
    pub tools: Vec<ToolDefinition>,
}

/// What the model produced for a request.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelResponse {
    FinalAnswer(String),
    ToolRequests {
        /// Text the model emitted alongside its tool calls, if any.
        text: Option<String>,
        calls: Vec<ToolRequest>,
    },
}

/// Trait for chat models that support tool calling.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse>;
}

/// Chat model backed by the OpenAI chat completions API.
pub struct OpenAIChatModel {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAIChatModel {
    pub fn new(settings: &LlmSettings) -> Self {
        Self {
            client: create_client(request_timeout(settings.timeout_secs)),
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
        }
    }

    fn build_messages(request: &ModelRequest) -> Result<Vec<ChatCompletionRequestMessage>> {
        let mut messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(request.system.clone())
                .build()
                .map_err(|e| KursdeskError::Agent(e.to_string()))?
                .into(),
        ];

        for message in &request.messages {
            let converted: ChatCompletionRequestMessage = match message {
                Message::User(text) => ChatCompletionRequestUserMessageArgs::default()
                    .content(text.clone())
                    .build()
                    .map_err(|e| KursdeskError::Agent(e.to_string()))?
                    .into(),
                Message::Assistant(text) => ChatCompletionRequestAssistantMessageArgs::default()
                    .content(text.clone())
                    .build()
                    .map_err(|e| KursdeskError::Agent(e.to_string()))?
                    .into(),
                Message::AssistantToolCalls { text, calls } => {
                    let mut args = ChatCompletionRequestAssistantMessageArgs::default();
                    args.tool_calls(calls.iter().map(to_openai_call).collect::<Vec<_>>());
                    if let Some(text) = text {
                        args.content(text.clone());
                    }
                    args.build()
                        .map_err(|e| KursdeskError::Agent(e.to_string()))?
                        .into()
                }
                Message::ToolResult { call_id, content } => {
                    ChatCompletionRequestToolMessageArgs::default()
                        .tool_call_id(call_id.clone())
                        .content(content.clone())
                        .build()
                        .map_err(|e| KursdeskError::Agent(e.to_string()))?
                        .into()
                }
            };
            messages.push(converted);
        }

        Ok(messages)
    }
}

fn to_openai_call(call: &ToolRequest) -> ChatCompletionMessageToolCall {
    ChatCompletionMessageToolCall {
        id: call.id.clone(),
        r#type: ChatCompletionToolType::Function,
        function: FunctionCall {
            name: call.name.clone(),
            arguments: call.arguments.clone(),
        },
    }
}

fn to_openai_tool(definition: &ToolDefinition) -> ChatCompletionTool {
    ChatCompletionTool {
        r#type: ChatCompletionToolType::Function,
        function: FunctionObject {
            name: definition.name.clone(),
            description: Some(definition.description.clone()),
            parameters: Some(definition.parameters.clone()),
            strict: None,
        },
    }
}

#[async_trait]
impl LanguageModel for OpenAIChatModel {
    #[instrument(skip(self, request), fields(messages = request.messages.len(), tools = request.tools.len()))]
    async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse> {
        let messages = Self::build_messages(request)?;

        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&self.model)
            .messages(messages)
            .temperature(self.temperature)
            .max_completion_tokens(self.max_tokens);
        if !request.tools.is_empty() {
            args.tools(request.tools.iter().map(to_openai_tool).collect::<Vec<_>>())
                .tool_choice(ChatCompletionToolChoiceOption::Auto);
        }
        let openai_request = args
            .build()
            .map_err(|e| KursdeskError::Agent(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(openai_request)
            .await
            .map_err(|e| KursdeskError::OpenAI(format!("Chat API error: {}", e)))?;

        let choice = response
            .choices
            .first()
            .ok_or_else(|| KursdeskError::OpenAI("No response from model".to_string()))?;

        let text = choice.message.content.clone().filter(|t| !t.trim().is_empty());

        match &choice.message.tool_calls {
            Some(tool_calls) if !tool_calls.is_empty() => {
                let calls = tool_calls
                    .iter()
                    .map(|call| ToolRequest {
                        id: call.id.clone(),
                        name: call.function.name.clone(),
                        arguments: call.function.arguments.clone(),
                    })
                    .collect();
                debug!("Model requested {} tool calls", tool_calls.len());
                Ok(ModelResponse::ToolRequests { text, calls })
            }
            _ => Ok(ModelResponse::FinalAnswer(text.unwrap_or_default())),
        }
    }
}
