//! OpenAI provider implementation
//!
//! Implements [`LLMProvider`] against the Chat Completions API, both as a
//! single blocking request and as a server-sent event stream whose tool
//! calls arrive as fragments.
//! See: https://platform.openai.com/docs/api-reference/chat
//!
//! # Examples
//!
//! ## Streaming a reply
//!
//! ```no_run
//! use agent_llm::{CompletionRequest, Message, LLMProvider};
//! use agent_llm::providers::OpenAIProvider;
//! use agent_llm::stream::collect_stream;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Create provider from OPENAI_API_KEY environment variable
//!     let provider = OpenAIProvider::from_env()?;
//!
//!     let request = CompletionRequest::builder("gpt-4o-mini")
//!         .add_message(Message::user("Hello!"))
//!         .max_tokens(100)
//!         .build();
//!
//!     let stream = provider.stream(request).await?;
//!     let response = collect_stream(stream, |delta| print!("{delta}")).await?;
//!     println!("\n{} tokens", response.usage.total());
//!
//!     Ok(())
//! }
//! ```
//!
//! ## OpenAI-compatible servers
//!
//! ```no_run
//! use agent_llm::providers::{OpenAIProvider, OpenAIConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let local_config = OpenAIConfig::new("not-needed")
//!     .with_api_base("http://localhost:8000/v1")
//!     .with_timeout(60);
//!
//! let provider = OpenAIProvider::with_config(local_config)?;
//! # Ok(())
//! # }
//! ```

use crate::stream::{CompletionStream, StreamEvent, ToolCallFragment};
use crate::{
    CompletionRequest, CompletionResponse, ContentBlock, ImageSource, LLMError, LLMProvider,
    Message, MessageContent, Result, Role, StopReason, TokenUsage, ToolDefinition,
};
use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::{StreamExt, future, stream};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

const DEFAULT_OPENAI_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_TIMEOUT_SECS: u64 = 120;
const DONE_MARKER: &str = "[DONE]";

/// Configuration for OpenAI provider
#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    /// API key for authentication
    pub api_key: String,

    /// Base URL for the OpenAI API (default: "https://api.openai.com/v1")
    pub api_base: String,

    /// Request timeout in seconds (default: 120)
    pub timeout_secs: u64,

    /// Optional list of supported models
    /// If None, any model string is accepted
    pub supported_models: Option<Vec<String>>,
}

impl OpenAIConfig {
    /// Create a new config with the given API key and default settings
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    /// Create config from environment variables
    ///
    /// Reads the API key from `OPENAI_API_KEY` and, when set, the base URL
    /// from `OPENAI_API_BASE`.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            LLMError::ConfigurationError("OPENAI_API_KEY environment variable not set".to_string())
        })?;

        let mut config = Self::new(api_key);
        if let Ok(api_base) = std::env::var("OPENAI_API_BASE") {
            config.api_base = api_base;
        }
        Ok(config)
    }

    /// Set custom API base URL
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Set request timeout in seconds
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Restrict the provider to the given models
    pub fn with_supported_models(mut self, models: Vec<String>) -> Self {
        self.supported_models = Some(models);
        self
    }

    /// Add a single supported model
    pub fn add_supported_model(mut self, model: impl Into<String>) -> Self {
        self.supported_models
            .get_or_insert_with(Vec::new)
            .push(model.into());
        self
    }
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: DEFAULT_OPENAI_API_BASE.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            supported_models: None,
        }
    }
}

/// OpenAI chat completions provider
///
/// Works with any server that speaks the Chat Completions protocol.
pub struct OpenAIProvider {
    client: Client,
    config: OpenAIConfig,
}

impl OpenAIProvider {
    /// Create a provider with custom configuration
    pub fn with_config(config: OpenAIConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { client, config })
    }

    /// Create a provider with an API key and default settings
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_config(OpenAIConfig::new(api_key))
    }

    /// Create a provider from `OPENAI_API_KEY` / `OPENAI_API_BASE`
    pub fn from_env() -> Result<Self> {
        Self::with_config(OpenAIConfig::from_env()?)
    }

    /// Get the current configuration
    pub fn config(&self) -> &OpenAIConfig {
        &self.config
    }

    /// Validate model name against supported models list (if configured)
    fn validate_model(&self, model: &str) -> Result<()> {
        if let Some(supported) = &self.config.supported_models {
            if !supported.iter().any(|m| m == model) {
                return Err(LLMError::InvalidRequest(format!(
                    "Model '{model}' is not in the supported models list: {supported:?}"
                )));
            }
        }
        Ok(())
    }

    /// POST a chat completion request, mapping non-success statuses to errors
    async fn post(&self, body: &OpenAIRequest) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.api_base))
            .bearer_auth(&self.config.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            return Err(LLMError::from_status(status.as_u16(), error_text, &body.model));
        }
        Ok(response)
    }
}

#[async_trait]
impl LLMProvider for OpenAIProvider {
    #[instrument(skip(self, request), fields(model = %request.model, api_base = %self.config.api_base))]
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        self.validate_model(&request.model)?;
        let body = build_request(request, false);
        debug!(messages = body.messages.len(), "Sending chat completion");

        let openai_response: OpenAIResponse = self.post(&body).await?.json().await.map_err(|e| {
            LLMError::UnexpectedResponse(format!("Failed to parse response: {e}"))
        })?;

        let choice = openai_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LLMError::UnexpectedResponse("No choices in response".to_string()))?;

        let usage = openai_response.usage.map(TokenUsage::from).unwrap_or_default();
        debug!(
            finish_reason = %choice.finish_reason,
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            "Received chat completion"
        );

        Ok(CompletionResponse {
            message: parse_openai_response(choice.message)?,
            stop_reason: map_stop_reason(&choice.finish_reason),
            usage,
        })
    }

    #[instrument(skip(self, request), fields(model = %request.model, api_base = %self.config.api_base))]
    async fn stream(&self, request: CompletionRequest) -> Result<CompletionStream> {
        self.validate_model(&request.model)?;
        let body = build_request(request, true);
        debug!(messages = body.messages.len(), "Opening chat completion stream");

        let response = self.post(&body).await?;

        let events = response
            .bytes_stream()
            .eventsource()
            .take_while(|event| {
                future::ready(!matches!(event, Ok(event) if event.data.trim() == DONE_MARKER))
            })
            .flat_map(|event| {
                let parsed = event
                    .map_err(|e| LLMError::Stream(e.to_string()))
                    .and_then(|event| parse_stream_chunk(&event.data));
                let items: Vec<Result<StreamEvent>> = match parsed {
                    Ok(events) => events.into_iter().map(Ok).collect(),
                    Err(err) => vec![Err(err)],
                };
                stream::iter(items)
            });

        Ok(Box::pin(events))
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

// ============================================================================
// OpenAI-specific request types
// ============================================================================

#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    max_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<OpenAITool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream_options: Option<StreamOptions>,
}

#[derive(Debug, Serialize)]
struct StreamOptions {
    include_usage: bool,
}

#[derive(Debug, Serialize)]
struct OpenAIMessage {
    role: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<OpenAIContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OpenAIToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl OpenAIMessage {
    fn text(role: &'static str, text: String) -> Self {
        Self {
            role,
            content: Some(OpenAIContent::Text(text)),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

#[derive(Debug, Serialize, Clone)]
#[serde(untagged)]
enum OpenAIContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize, Clone)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Serialize)]
struct OpenAITool {
    #[serde(rename = "type")]
    tool_type: &'static str,
    function: OpenAIFunction,
}

#[derive(Debug, Serialize)]
struct OpenAIFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct OpenAIToolCall {
    id: String,
    #[serde(rename = "type")]
    tool_type: &'static str,
    function: OpenAIFunctionCall,
}

#[derive(Debug, Serialize)]
struct OpenAIFunctionCall {
    name: String,
    arguments: String,
}

// ============================================================================
// OpenAI-specific response types
// ============================================================================

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
    #[serde(default)]
    finish_reason: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<OpenAIResponseToolCall>>,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseToolCall {
    id: String,
    function: OpenAIResponseFunctionCall,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct OpenAIUsage {
    prompt_tokens: usize,
    completion_tokens: usize,
}

impl From<OpenAIUsage> for TokenUsage {
    fn from(usage: OpenAIUsage) -> Self {
        Self {
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
        }
    }
}

/// One `data:` payload of a streamed completion
#[derive(Debug, Deserialize)]
struct OpenAIStreamChunk {
    #[serde(default)]
    choices: Vec<OpenAIStreamChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIStreamChoice {
    #[serde(default)]
    delta: OpenAIDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OpenAIDelta {
    content: Option<String>,
    tool_calls: Option<Vec<OpenAIToolCallDelta>>,
}

#[derive(Debug, Deserialize)]
struct OpenAIToolCallDelta {
    index: u32,
    id: Option<String>,
    #[serde(rename = "type")]
    tool_type: Option<String>,
    function: Option<OpenAIFunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct OpenAIFunctionDelta {
    name: Option<String>,
    arguments: Option<String>,
}

// ============================================================================
// Conversion functions
// ============================================================================

fn build_request(request: CompletionRequest, stream: bool) -> OpenAIRequest {
    let tools = request
        .tools
        .as_deref()
        .filter(|tools| !tools.is_empty())
        .map(convert_tools);

    OpenAIRequest {
        messages: build_openai_messages(request.system, request.messages),
        model: request.model,
        max_tokens: request.max_tokens,
        temperature: request.temperature,
        tools,
        stop: request.stop_sequences,
        stream,
        stream_options: stream.then_some(StreamOptions {
            include_usage: true,
        }),
    }
}

/// System prompt first, then the converted conversation
fn build_openai_messages(system: Option<String>, messages: Vec<Message>) -> Vec<OpenAIMessage> {
    system
        .map(|sys| OpenAIMessage::text("system", sys))
        .into_iter()
        .chain(messages.into_iter().flat_map(convert_message))
        .collect()
}

/// Convert a single message to OpenAI format
///
/// Tool results become separate `tool` messages, so one message may
/// expand to several.
fn convert_message(msg: Message) -> Vec<OpenAIMessage> {
    let role = msg.role.as_str();

    match msg.content {
        Some(MessageContent::Text(text)) => vec![OpenAIMessage::text(role, text)],
        Some(MessageContent::Blocks(blocks)) => convert_blocks(role, blocks),
        None => vec![OpenAIMessage::text(role, String::new())],
    }
}

fn convert_blocks(role: &'static str, blocks: Vec<ContentBlock>) -> Vec<OpenAIMessage> {
    let mut tool_messages = Vec::new();
    let mut parts = Vec::new();
    let mut tool_calls = Vec::new();

    for block in blocks {
        match block {
            ContentBlock::Text { text } => parts.push(ContentPart::Text { text }),
            ContentBlock::Image { source } => {
                let url = match source {
                    ImageSource::Url { url } => url,
                    ImageSource::Base64 { media_type, data } => {
                        format!("data:{media_type};base64,{data}")
                    }
                };
                parts.push(ContentPart::ImageUrl {
                    image_url: ImageUrl { url },
                });
            }
            ContentBlock::ToolUse { id, name, input } => tool_calls.push(OpenAIToolCall {
                id,
                tool_type: "function",
                function: OpenAIFunctionCall {
                    name,
                    arguments: tool_arguments(input),
                },
            }),
            ContentBlock::ToolResult {
                tool_use_id,
                content,
                ..
            } => tool_messages.push(OpenAIMessage {
                tool_call_id: Some(tool_use_id),
                ..OpenAIMessage::text("tool", content)
            }),
        }
    }

    if parts.is_empty() && tool_calls.is_empty() {
        return tool_messages;
    }

    let content = match parts.as_slice() {
        [] => None,
        [ContentPart::Text { text }] => Some(OpenAIContent::Text(text.clone())),
        _ => Some(OpenAIContent::Parts(parts)),
    };

    let mut messages = vec![OpenAIMessage {
        role,
        content,
        tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
        tool_call_id: None,
    }];
    messages.extend(tool_messages);
    messages
}

/// Arguments string for a stored tool-use input
///
/// A string input holds arguments that never decoded and is sent back verbatim.
fn tool_arguments(input: serde_json::Value) -> String {
    match input {
        serde_json::Value::String(raw) => raw,
        other => other.to_string(),
    }
}

fn convert_tools(tools: &[ToolDefinition]) -> Vec<OpenAITool> {
    tools
        .iter()
        .map(|tool| OpenAITool {
            tool_type: "function",
            function: OpenAIFunction {
                name: tool.name.clone(),
                description: tool.description.clone(),
                parameters: tool.input_schema.clone(),
            },
        })
        .collect()
}

/// Parse a non-streamed assistant message
fn parse_openai_response(msg: OpenAIResponseMessage) -> Result<Message> {
    let text = msg.content.unwrap_or_default();
    let Some(tool_calls) = msg.tool_calls.filter(|calls| !calls.is_empty()) else {
        return Ok(Message::assistant(text));
    };

    let mut blocks = Vec::with_capacity(tool_calls.len() + 1);
    if !text.is_empty() {
        blocks.push(ContentBlock::Text { text });
    }
    for call in tool_calls {
        let input = if call.function.arguments.trim().is_empty() {
            serde_json::json!({})
        } else {
            serde_json::from_str(&call.function.arguments).map_err(|source| {
                LLMError::MalformedToolArguments {
                    name: call.function.name.clone(),
                    source,
                }
            })?
        };
        blocks.push(ContentBlock::ToolUse {
            id: call.id,
            name: call.function.name,
            input,
        });
    }

    Ok(Message {
        role: Role::Assistant,
        content: Some(MessageContent::Blocks(blocks)),
    })
}

/// Turn one streamed `data:` payload into events
///
/// Text precedes tool-call fragments, which precede the finish reason;
/// usage (sent in a trailing chunk with no choices) comes last.
fn parse_stream_chunk(data: &str) -> Result<Vec<StreamEvent>> {
    let chunk: OpenAIStreamChunk = serde_json::from_str(data)
        .map_err(|e| LLMError::Stream(format!("Unreadable stream chunk: {e}")))?;

    let mut events = Vec::new();
    for choice in chunk.choices {
        if let Some(text) = choice.delta.content.filter(|text| !text.is_empty()) {
            events.push(StreamEvent::TextDelta(text));
        }
        for call in choice.delta.tool_calls.unwrap_or_default() {
            let (function_name, arguments) = match call.function {
                Some(function) => (function.name, function.arguments.unwrap_or_default()),
                None => (None, String::new()),
            };
            events.push(StreamEvent::ToolCallDelta(ToolCallFragment {
                index: call.index,
                id: call.id,
                function_name,
                arguments,
                call_type: call.tool_type,
            }));
        }
        if let Some(reason) = choice.finish_reason {
            events.push(StreamEvent::Finished(map_stop_reason(&reason)));
        }
    }
    if let Some(usage) = chunk.usage {
        events.push(StreamEvent::Usage(usage.into()));
    }
    Ok(events)
}

fn map_stop_reason(reason: &str) -> StopReason {
    let mapped = StopReason::from_finish_reason(reason);
    if mapped == StopReason::ContentFilter {
        debug!("Content filtered by OpenAI safety systems");
    }
    mapped
}

// ============================================================================
// Tests
// ============================================================================
