//! Streaming chat session with tool calls
//!
//! A turn follows the tool-chat loop:
//! 1. Stream a completion over the history with the registry's tools
//! 2. Echo text deltas and accumulate tool-call fragments
//! 3. If tools were called, run them, append their results plus a
//!    follow-up instruction and stream again
//! 4. Otherwise append the answer and return it

use crate::events::{ChatEventHandler, truncate_chars};
use agent_core::{Error, Result};
use agent_llm::{
    AccumulatedToolCall, CompletionRequest, ContentBlock, LLMProvider, Message, MessageContent,
    Role, StreamedResponse, collect_stream,
};
use agent_tools::ToolRegistry;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful assistant. Answer the user's questions appropriately.";
const DEFAULT_FOLLOW_UP: &str = "Now answer the user based on the tool results above.";

/// Configuration for a chat session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Model to use
    pub model: String,

    /// System prompt sent with every request
    pub system_prompt: Option<String>,

    /// Max tokens per completion
    pub max_tokens: usize,

    /// Temperature; provider default when unset
    pub temperature: Option<f32>,

    /// Maximum tool rounds per turn (prevents infinite loops)
    pub max_tool_rounds: usize,

    /// System message appended after each round of tool results
    pub follow_up_instruction: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            system_prompt: Some(DEFAULT_SYSTEM_PROMPT.to_string()),
            max_tokens: 4096,
            temperature: None,
            max_tool_rounds: 5,
            follow_up_instruction: DEFAULT_FOLLOW_UP.to_string(),
        }
    }
}

/// A conversation with an LLM that can call registered tools
pub struct ChatSession {
    provider: Arc<dyn LLMProvider>,
    tool_registry: Arc<ToolRegistry>,
    config: SessionConfig,
    history: Vec<Message>,
}

impl ChatSession {
    /// Create a new session with an empty history
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        tool_registry: Arc<ToolRegistry>,
        config: SessionConfig,
    ) -> Self {
        Self {
            provider,
            tool_registry,
            config,
            history: Vec::new(),
        }
    }

    pub fn builder() -> ChatSessionBuilder {
        ChatSessionBuilder::new()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Conversation so far, oldest first
    pub fn history(&self) -> &[Message] {
        &self.history
    }

    /// Forget the conversation
    pub fn clear(&mut self) {
        self.history.clear();
    }

    /// Run one user turn and return the final answer
    ///
    /// Tool failures are reported to the model as error results and do not
    /// end the turn. Provider failures do; the history keeps the messages
    /// appended before the failure.
    pub async fn send(
        &mut self,
        user_input: impl Into<String>,
        handler: &dyn ChatEventHandler,
    ) -> Result<String> {
        self.history.push(Message::user(user_input));

        let mut rounds = 0;
        loop {
            let response = match self.stream_round(handler).await {
                Ok(response) => response,
                Err(e) => {
                    handler.on_error(&e.to_string()).await;
                    return Err(e);
                }
            };

            if !response.has_tool_calls() {
                let text = response.text;
                info!(rounds, response_length = text.len(), "Turn completed");
                self.history.push(Message::assistant(text.clone()));
                handler.on_complete(&text).await;
                return Ok(text);
            }

            if rounds >= self.config.max_tool_rounds {
                warn!(
                    max_tool_rounds = self.config.max_tool_rounds,
                    "Tool round limit reached, ignoring further tool calls"
                );
                let text = response.text;
                self.history.push(Message::assistant(text.clone()));
                handler.on_complete(&text).await;
                return Ok(text);
            }

            rounds += 1;
            info!(
                round = rounds,
                tool_count = response.tool_calls.len(),
                "Model requested tool use"
            );
            self.run_tools(response, handler).await;
            self.history
                .push(Message::system(self.config.follow_up_instruction.clone()));
        }
    }

    async fn stream_round(&self, handler: &dyn ChatEventHandler) -> Result<StreamedResponse> {
        let tools = self.tool_registry.definitions();
        let mut builder = CompletionRequest::builder(&self.config.model)
            .messages(self.history.clone())
            .max_tokens(self.config.max_tokens);

        if let Some(system) = &self.config.system_prompt {
            builder = builder.system(system.clone());
        }
        if let Some(temperature) = self.config.temperature {
            builder = builder.temperature(temperature);
        }
        if !tools.is_empty() {
            builder = builder.tools(tools);
        }

        debug!(
            model = %self.config.model,
            messages = self.history.len(),
            "Streaming completion"
        );
        let stream = self
            .provider
            .stream(builder.build())
            .await
            .map_err(|e| Error::ProcessingFailed(e.to_string()))?;

        let response = collect_stream(stream, |delta| handler.on_text_delta(delta))
            .await
            .map_err(|e| Error::ProcessingFailed(e.to_string()))?;

        info!(
            stop_reason = ?response.stop_reason,
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            "LLM response received"
        );
        Ok(response)
    }

    /// Dispatch every call, then append the assistant tool-use message
    /// followed by one result message per call
    async fn run_tools(&mut self, response: StreamedResponse, handler: &dyn ChatEventHandler) {
        let mut blocks = Vec::with_capacity(response.tool_calls.len() + 1);
        if !response.text.is_empty() {
            blocks.push(ContentBlock::Text {
                text: response.text,
            });
        }

        let mut results = Vec::with_capacity(response.tool_calls.len());
        for (position, call) in response.tool_calls.iter().enumerate() {
            let id = call
                .id
                .clone()
                .unwrap_or_else(|| format!("call_{position}"));
            let name = call.function_name.clone().unwrap_or_default();
            let input = tool_input(call);

            handler.on_tool_start(&id, &name, &input).await;
            results.push(self.run_tool(&id, &name, call, handler).await);

            blocks.push(ContentBlock::ToolUse { id, name, input });
        }

        self.history.push(Message {
            role: Role::Assistant,
            content: Some(MessageContent::Blocks(blocks)),
        });
        self.history.extend(results);
    }

    async fn run_tool(
        &self,
        id: &str,
        name: &str,
        call: &AccumulatedToolCall,
        handler: &dyn ChatEventHandler,
    ) -> Message {
        info!(
            tool_name = %name,
            tool_id = %id,
            input_preview = %truncate_chars(&call.arguments, 500),
            "Executing tool"
        );

        let start_time = Instant::now();
        let outcome = self.tool_registry.dispatch(name, &call.arguments).await;
        let duration_ms = u64::try_from(start_time.elapsed().as_millis()).unwrap_or(u64::MAX);

        match outcome {
            Ok(result) => {
                let output = tool_output(result);
                info!(
                    tool_name = %name,
                    duration_ms,
                    result_length = output.len(),
                    "Tool execution succeeded"
                );
                handler.on_tool_done(id, name, Ok(output.as_str()), duration_ms).await;
                Message::tool_result(id, output)
            }
            Err(e) => {
                let error = e.to_string();
                warn!(tool_name = %name, duration_ms, error = %error, "Tool execution failed");
                handler.on_tool_done(id, name, Err(error.as_str()), duration_ms).await;
                Message::tool_error(id, format!("Error: {error}"))
            }
        }
    }
}

/// Decoded arguments for the tool-use block; undecodable buffers are kept
/// as a raw string, which providers replay verbatim
fn tool_input(call: &AccumulatedToolCall) -> Value {
    call.parse_arguments()
        .unwrap_or_else(|_| Value::String(call.arguments.clone()))
}

/// String results go to the model verbatim, anything else as JSON
fn tool_output(result: Value) -> String {
    match result {
        Value::String(text) => text,
        other => other.to_string(),
    }
}

/// Builder for ChatSession
pub struct ChatSessionBuilder {
    provider: Option<Arc<dyn LLMProvider>>,
    tool_registry: Arc<ToolRegistry>,
    config: SessionConfig,
}

impl ChatSessionBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self {
            provider: None,
            tool_registry: Arc::new(ToolRegistry::new()),
            config: SessionConfig::default(),
        }
    }

    /// Set the LLM provider
    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Set the tool registry
    pub fn tool_registry(mut self, registry: Arc<ToolRegistry>) -> Self {
        self.tool_registry = registry;
        self
    }

    /// Set the full configuration
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn max_tokens(mut self, max_tokens: usize) -> Self {
        self.config.max_tokens = max_tokens;
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = Some(temperature);
        self
    }

    pub fn max_tool_rounds(mut self, max: usize) -> Self {
        self.config.max_tool_rounds = max;
        self
    }

    pub fn follow_up_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.config.follow_up_instruction = instruction.into();
        self
    }

    /// Build the session
    pub fn build(self) -> Result<ChatSession> {
        let provider = self
            .provider
            .ok_or_else(|| Error::InitializationFailed("Provider not set".to_string()))?;

        Ok(ChatSession::new(provider, self.tool_registry, self.config))
    }
}

impl Default for ChatSessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_llm::{
        CompletionResponse, CompletionStream, LLMError, StopReason, StreamEvent, TokenUsage,
        ToolCallFragment,
    };
    use agent_tools::Tool;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays one scripted event list per `stream` call
    struct ScriptedProvider {
        rounds: Mutex<VecDeque<Vec<StreamEvent>>>,
        requests: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedProvider {
        fn new(rounds: Vec<Vec<StreamEvent>>) -> Self {
            Self {
                rounds: Mutex::new(rounds.into()),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LLMProvider for ScriptedProvider {
        async fn complete(&self, _request: CompletionRequest) -> agent_llm::Result<CompletionResponse> {
            Err(LLMError::ProviderError("streaming only".to_string()))
        }

        async fn stream(&self, request: CompletionRequest) -> agent_llm::Result<CompletionStream> {
            self.requests.lock().unwrap().push(request);
            let events = self
                .rounds
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| LLMError::ProviderError("script exhausted".to_string()))?;
            Ok(Box::pin(futures::stream::iter(events.into_iter().map(Ok))))
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    struct LookupTool;

    #[async_trait]
    impl Tool for LookupTool {
        async fn execute(&self, params: Value) -> Result<Value> {
            match params["ticker"].as_str() {
                Some(ticker) => Ok(json!(format!("{ticker}: 227.50"))),
                None => Err(Error::ProcessingFailed("ticker missing".to_string())),
            }
        }

        fn name(&self) -> &str {
            "lookup_price"
        }

        fn description(&self) -> &str {
            "Look up a price"
        }

        fn input_schema(&self) -> Value {
            json!({"type": "object"})
        }
    }

    #[derive(Default)]
    struct RecordingHandler {
        events: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ChatEventHandler for RecordingHandler {
        fn on_text_delta(&self, delta: &str) {
            self.events.lock().unwrap().push(format!("text:{delta}"));
        }

        async fn on_tool_start(&self, id: &str, name: &str, _input: &Value) {
            self.events.lock().unwrap().push(format!("start:{id}:{name}"));
        }

        async fn on_tool_done(
            &self,
            id: &str,
            _name: &str,
            result: std::result::Result<&str, &str>,
            _duration_ms: u64,
        ) {
            let status = if result.is_ok() { "ok" } else { "err" };
            self.events.lock().unwrap().push(format!("done:{id}:{status}"));
        }

        async fn on_complete(&self, text: &str) {
            self.events.lock().unwrap().push(format!("complete:{text}"));
        }
    }

    fn tool_round(id: &str, arguments: &[&str]) -> Vec<StreamEvent> {
        let mut events = vec![StreamEvent::ToolCallDelta(
            ToolCallFragment::new(0)
                .with_id(id)
                .with_function_name("lookup_price")
                .with_call_type("function"),
        )];
        events.extend(
            arguments
                .iter()
                .map(|chunk| StreamEvent::ToolCallDelta(ToolCallFragment::new(0).with_arguments(*chunk))),
        );
        events.push(StreamEvent::Finished(StopReason::ToolUse));
        events
    }

    fn answer_round(chunks: &[&str]) -> Vec<StreamEvent> {
        let mut events: Vec<_> = chunks
            .iter()
            .map(|chunk| StreamEvent::TextDelta((*chunk).to_string()))
            .collect();
        events.push(StreamEvent::Finished(StopReason::EndTurn));
        events.push(StreamEvent::Usage(TokenUsage {
            input_tokens: 40,
            output_tokens: 8,
        }));
        events
    }

    fn session(provider: Arc<ScriptedProvider>) -> ChatSession {
        let registry = Arc::new(ToolRegistry::new());
        registry.register(Arc::new(LookupTool));
        ChatSession::builder()
            .provider(provider)
            .tool_registry(registry)
            .follow_up_instruction("Answer from the tool results")
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_tool_round_then_answer() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            tool_round("call_1", &["{\"ticker\":", "\"AAPL\"}"]),
            answer_round(&["AAPL trades ", "at 227.50."]),
        ]));
        let mut session = session(Arc::clone(&provider));
        let handler = RecordingHandler::default();

        let answer = session.send("What is Apple at?", &handler).await.unwrap();
        assert_eq!(answer, "AAPL trades at 227.50.");

        let history = session.history();
        assert_eq!(history.len(), 5);
        assert_eq!(history[0].role, Role::User);
        assert!(history[1].has_tool_uses());
        match history[1].tool_uses()[0] {
            ContentBlock::ToolUse { id, input, .. } => {
                assert_eq!(id, "call_1");
                assert_eq!(input, &json!({"ticker": "AAPL"}));
            }
            other => panic!("Expected tool use, got {other:?}"),
        }
        match &history[2].content {
            Some(MessageContent::Blocks(blocks)) => match &blocks[0] {
                ContentBlock::ToolResult {
                    tool_use_id,
                    content,
                    is_error,
                } => {
                    assert_eq!(tool_use_id, "call_1");
                    assert_eq!(content, "AAPL: 227.50");
                    assert_eq!(*is_error, None);
                }
                other => panic!("Expected tool result, got {other:?}"),
            },
            other => panic!("Expected blocks, got {other:?}"),
        }
        assert_eq!(history[3].role, Role::System);
        assert_eq!(history[3].text(), Some("Answer from the tool results"));
        assert_eq!(history[4].role, Role::Assistant);
        assert_eq!(history[4].text(), Some("AAPL trades at 227.50."));

        let events = handler.events.lock().unwrap().clone();
        assert_eq!(
            events,
            vec![
                "start:call_1:lookup_price",
                "done:call_1:ok",
                "text:AAPL trades ",
                "text:at 227.50.",
                "complete:AAPL trades at 227.50.",
            ]
        );

        // Both rounds advertise the tools
        let requests = provider.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert!(requests.iter().all(CompletionRequest::has_tools));
        assert_eq!(requests[1].messages.len(), 4);
    }

    #[tokio::test]
    async fn test_failed_tool_becomes_error_result() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            tool_round("call_7", &["{}"]),
            answer_round(&["Which ticker?"]),
        ]));
        let mut session = session(provider);
        let handler = RecordingHandler::default();

        session.send("Price?", &handler).await.unwrap();

        match &session.history()[2].content {
            Some(MessageContent::Blocks(blocks)) => match &blocks[0] {
                ContentBlock::ToolResult {
                    content, is_error, ..
                } => {
                    assert_eq!(content, "Error: Processing failed: ticker missing");
                    assert_eq!(*is_error, Some(true));
                }
                other => panic!("Expected tool result, got {other:?}"),
            },
            other => panic!("Expected blocks, got {other:?}"),
        }
        assert!(handler
            .events
            .lock()
            .unwrap()
            .contains(&"done:call_7:err".to_string()));
    }

    #[tokio::test]
    async fn test_malformed_arguments_do_not_abort_turn() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            tool_round("call_2", &["{\"ticker\":"]),
            answer_round(&["Sorry."]),
        ]));
        let mut session = session(provider);

        let answer = session.send("Price?", &crate::NoOpEventHandler).await.unwrap();
        assert_eq!(answer, "Sorry.");
        match session.history()[1].tool_uses()[0] {
            ContentBlock::ToolUse { input, .. } => assert_eq!(input, &json!("{\"ticker\":")),
            other => panic!("Expected tool use, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_tool_round_limit() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            tool_round("call_1", &["{\"ticker\":\"A\"}"]),
            tool_round("call_2", &["{\"ticker\":\"B\"}"]),
        ]));
        let mut session = ChatSession::builder()
            .provider(provider)
            .tool_registry(Arc::new(ToolRegistry::new()))
            .max_tool_rounds(1)
            .build()
            .unwrap();

        let answer = session.send("Loop", &crate::NoOpEventHandler).await.unwrap();
        assert_eq!(answer, "");
        // user, tool use, result, follow-up, final assistant
        assert_eq!(session.history().len(), 5);
    }

    #[tokio::test]
    async fn test_provider_failure_propagates() {
        let provider = Arc::new(ScriptedProvider::new(Vec::new()));
        let mut session = session(provider);

        let result = session.send("Hello", &crate::NoOpEventHandler).await;
        assert!(matches!(result, Err(Error::ProcessingFailed(_))));
        assert_eq!(session.history().len(), 1);
    }

    #[test]
    fn test_builder_requires_provider() {
        let result = ChatSession::builder().model("gpt-4o").build();
        assert!(matches!(result, Err(Error::InitializationFailed(_))));
    }

    #[test]
    fn test_default_config() {
        let config = SessionConfig::default();
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.max_tool_rounds, 5);
        assert!(config.system_prompt.is_some());
    }
}
