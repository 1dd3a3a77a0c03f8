//! LLM provider trait definition

use crate::stream::{CompletionStream, StreamEvent, ToolCallFragment};
use crate::{CompletionRequest, CompletionResponse, ContentBlock, MessageContent, Result};
use async_trait::async_trait;

/// Trait for LLM providers
///
/// Implementations of this trait provide access to different LLM services
/// (e.g., OpenAI, Gemini).
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Generate a completion from the LLM
    ///
    /// # Arguments
    ///
    /// * `request` - The completion request with messages, tools, and parameters
    ///
    /// # Returns
    ///
    /// The completion response with the assistant's message and metadata
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;

    /// Generate a completion as a stream of events
    ///
    /// Providers without native streaming inherit this default, which runs
    /// [`complete`](Self::complete) and replays the response as events.
    async fn stream(&self, request: CompletionRequest) -> Result<CompletionStream> {
        let response = self.complete(request).await?;
        let events: Vec<Result<StreamEvent>> =
            response_events(response).into_iter().map(Ok).collect();
        Ok(Box::pin(futures::stream::iter(events)))
    }

    /// Get the provider name (e.g., "openai", "gemini")
    fn name(&self) -> &str;
}

fn response_events(response: CompletionResponse) -> Vec<StreamEvent> {
    let mut events = Vec::new();
    let mut next_index = 0u32;

    match response.message.content {
        Some(MessageContent::Text(text)) => events.push(StreamEvent::TextDelta(text)),
        Some(MessageContent::Blocks(blocks)) => {
            for block in blocks {
                match block {
                    ContentBlock::Text { text } => events.push(StreamEvent::TextDelta(text)),
                    ContentBlock::ToolUse { id, name, input } => {
                        events.push(StreamEvent::ToolCallDelta(
                            ToolCallFragment::new(next_index)
                                .with_id(id)
                                .with_function_name(name)
                                .with_call_type("function")
                                .with_arguments(input.to_string()),
                        ));
                        next_index += 1;
                    }
                    ContentBlock::Image { .. } | ContentBlock::ToolResult { .. } => {}
                }
            }
        }
        None => {}
    }

    events.push(StreamEvent::Finished(response.stop_reason));
    events.push(StreamEvent::Usage(response.usage));
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::collect_stream;
    use crate::{Message, Role, StopReason, TokenUsage};
    use serde_json::json;

    struct FixedProvider;

    #[async_trait]
    impl LLMProvider for FixedProvider {
        async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse> {
            Ok(CompletionResponse {
                message: Message {
                    role: Role::Assistant,
                    content: Some(MessageContent::Blocks(vec![
                        ContentBlock::Text {
                            text: "Checking".to_string(),
                        },
                        ContentBlock::ToolUse {
                            id: "call_7".to_string(),
                            name: "get_stock_info".to_string(),
                            input: json!({"ticker": "MSFT"}),
                        },
                    ])),
                },
                stop_reason: StopReason::ToolUse,
                usage: TokenUsage {
                    input_tokens: 3,
                    output_tokens: 2,
                },
            })
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    #[tokio::test]
    async fn test_default_stream_replays_completion() {
        let provider = FixedProvider;
        let stream = provider
            .stream(CompletionRequest::builder("m").build())
            .await
            .unwrap();
        let response = collect_stream(stream, |_| {}).await.unwrap();

        assert_eq!(response.text, "Checking");
        assert_eq!(response.stop_reason, Some(StopReason::ToolUse));
        assert_eq!(response.tool_calls.len(), 1);
        assert_eq!(response.tool_calls[0].id.as_deref(), Some("call_7"));
        assert_eq!(
            response.tool_calls[0].parse_arguments().unwrap(),
            json!({"ticker": "MSFT"})
        );
        assert_eq!(response.usage.total(), 5);
    }
}
