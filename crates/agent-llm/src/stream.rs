//! Streaming completions and tool-call reconstruction
//!
//! Streaming providers deliver tool calls as fragments: each fragment
//! names the call's stream `index` and carries a piece of the call. The
//! first fragment of a call usually holds the id and function name, later
//! ones only a chunk of the JSON arguments. [`ToolCallAccumulator`] folds
//! fragments back into whole calls; [`collect_stream`] drives it from a
//! provider stream while echoing text deltas.
//!
//! ```
//! use agent_llm::stream::{ToolCallAccumulator, ToolCallFragment};
//!
//! let calls: Vec<_> = [
//!     ToolCallFragment::new(0).with_id("call_1").with_function_name("get_current_time"),
//!     ToolCallFragment::new(0).with_arguments("{\"timezone\":"),
//!     ToolCallFragment::new(0).with_arguments("\"UTC\"}"),
//! ]
//! .into_iter()
//! .collect::<ToolCallAccumulator>()
//! .finish();
//!
//! assert_eq!(calls[0].function_name.as_deref(), Some("get_current_time"));
//! assert_eq!(calls[0].arguments, "{\"timezone\":\"UTC\"}");
//! ```

use crate::{
    ContentBlock, LLMError, Message, MessageContent, Result, Role, StopReason, TokenUsage,
};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::pin::Pin;
use tracing::debug;

/// One partial update to a tool call, as delivered mid-stream
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallFragment {
    /// Which in-progress call this fragment belongs to
    pub index: u32,
    pub id: Option<String>,
    pub function_name: Option<String>,
    /// Chunk of the JSON arguments, possibly empty
    pub arguments: String,
    /// Call type tag, e.g. `"function"`
    pub call_type: Option<String>,
}

impl ToolCallFragment {
    /// Empty fragment for `index`
    pub fn new(index: u32) -> Self {
        Self {
            index,
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_function_name(mut self, name: impl Into<String>) -> Self {
        self.function_name = Some(name.into());
        self
    }

    pub fn with_arguments(mut self, chunk: impl Into<String>) -> Self {
        self.arguments = chunk.into();
        self
    }

    pub fn with_call_type(mut self, call_type: impl Into<String>) -> Self {
        self.call_type = Some(call_type.into());
        self
    }
}

/// A tool call reassembled from its fragments
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccumulatedToolCall {
    pub id: Option<String>,
    pub function_name: Option<String>,
    /// Concatenation of every fragment's argument chunk, in arrival order
    pub arguments: String,
    pub call_type: Option<String>,
}

impl AccumulatedToolCall {
    /// Decode the argument buffer
    ///
    /// An empty or whitespace-only buffer decodes to an empty object.
    pub fn parse_arguments(&self) -> Result<Value> {
        if self.arguments.trim().is_empty() {
            return Ok(Value::Object(serde_json::Map::new()));
        }
        serde_json::from_str(&self.arguments).map_err(|source| {
            LLMError::MalformedToolArguments {
                name: self.function_name.clone().unwrap_or_default(),
                source,
            }
        })
    }
}

/// Folds fragments into complete tool calls, one slot per stream index
///
/// A fragment's non-null `id`, `function_name` and `call_type` overwrite
/// the slot's current value (last non-null write wins). Argument chunks
/// are always appended. Nothing is validated here.
#[derive(Debug, Clone, Default)]
pub struct ToolCallAccumulator {
    slots: BTreeMap<u32, AccumulatedToolCall>,
}

impl ToolCallAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one fragment into its slot, creating the slot on first sight
    pub fn push(&mut self, fragment: ToolCallFragment) {
        let slot = self.slots.entry(fragment.index).or_default();

        if fragment.id.is_some() {
            slot.id = fragment.id;
        }
        if fragment.function_name.is_some() {
            slot.function_name = fragment.function_name;
        }
        if fragment.call_type.is_some() {
            slot.call_type = fragment.call_type;
        }
        slot.arguments.push_str(&fragment.arguments);
    }

    /// Number of distinct calls seen so far
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// The reassembled calls in ascending index order
    pub fn finish(self) -> Vec<AccumulatedToolCall> {
        self.slots.into_values().collect()
    }
}

impl Extend<ToolCallFragment> for ToolCallAccumulator {
    fn extend<I: IntoIterator<Item = ToolCallFragment>>(&mut self, iter: I) {
        for fragment in iter {
            self.push(fragment);
        }
    }
}

impl FromIterator<ToolCallFragment> for ToolCallAccumulator {
    fn from_iter<I: IntoIterator<Item = ToolCallFragment>>(iter: I) -> Self {
        let mut accumulator = Self::new();
        accumulator.extend(iter);
        accumulator
    }
}

/// Event produced by a streaming completion
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// A chunk of assistant text
    TextDelta(String),
    /// A fragment of a tool call
    ToolCallDelta(ToolCallFragment),
    /// The model stopped generating
    Finished(StopReason),
    /// Token accounting, usually sent once near the end
    Usage(TokenUsage),
}

/// Boxed stream of completion events
pub type CompletionStream = Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>;

/// Everything a streamed completion produced
#[derive(Debug, Clone, Default)]
pub struct StreamedResponse {
    pub text: String,
    pub tool_calls: Vec<AccumulatedToolCall>,
    pub stop_reason: Option<StopReason>,
    pub usage: TokenUsage,
}

impl StreamedResponse {
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// Build the assistant message: a text block when text was produced,
    /// then one tool-use block per call with decoded arguments
    ///
    /// Calls missing an id get a positional one (`call_<n>`) so results can
    /// still be matched to them.
    pub fn into_message(self) -> Result<Message> {
        if self.tool_calls.is_empty() {
            return Ok(Message::assistant(self.text));
        }

        let mut blocks = Vec::with_capacity(self.tool_calls.len() + 1);
        if !self.text.is_empty() {
            blocks.push(ContentBlock::Text { text: self.text });
        }
        for (position, call) in self.tool_calls.iter().enumerate() {
            let input = call.parse_arguments()?;
            blocks.push(ContentBlock::ToolUse {
                id: call
                    .id
                    .clone()
                    .unwrap_or_else(|| format!("call_{position}")),
                name: call.function_name.clone().unwrap_or_default(),
                input,
            });
        }

        Ok(Message {
            role: Role::Assistant,
            content: Some(MessageContent::Blocks(blocks)),
        })
    }
}

/// Drain a completion stream
///
/// Text deltas are appended to the response and handed to `on_text` as
/// they arrive. The first stream error aborts collection.
pub async fn collect_stream<F>(mut stream: CompletionStream, mut on_text: F) -> Result<StreamedResponse>
where
    F: FnMut(&str),
{
    let mut response = StreamedResponse::default();
    let mut accumulator = ToolCallAccumulator::new();

    while let Some(event) = stream.next().await {
        match event? {
            StreamEvent::TextDelta(delta) => {
                on_text(&delta);
                response.text.push_str(&delta);
            }
            StreamEvent::ToolCallDelta(fragment) => accumulator.push(fragment),
            StreamEvent::Finished(reason) => response.stop_reason = Some(reason),
            StreamEvent::Usage(usage) => response.usage += usage,
        }
    }

    response.tool_calls = accumulator.finish();
    debug!(
        text_len = response.text.len(),
        tool_calls = response.tool_calls.len(),
        stop_reason = ?response.stop_reason,
        "Stream collected"
    );
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use serde_json::json;

    fn frag(index: u32) -> ToolCallFragment {
        ToolCallFragment::new(index)
    }

    #[test]
    fn test_arguments_concatenate_in_arrival_order() {
        let calls = ToolCallAccumulator::from_iter([
            frag(0).with_arguments("{\"a\":"),
            frag(0).with_arguments("1}"),
        ])
        .finish();
        assert_eq!(calls[0].arguments, "{\"a\":1}");

        let reversed = ToolCallAccumulator::from_iter([
            frag(0).with_arguments("1}"),
            frag(0).with_arguments("{\"a\":"),
        ])
        .finish();
        assert_eq!(reversed[0].arguments, "1}{\"a\":");
    }

    #[test]
    fn test_interleaved_indexes_resolve_independently() {
        let calls = ToolCallAccumulator::from_iter([
            frag(0)
                .with_id("call_a")
                .with_function_name("get_stock_info")
                .with_arguments("{\"ticker\":"),
            frag(1)
                .with_id("call_b")
                .with_function_name("get_current_time")
                .with_arguments("{\"timezone\":"),
            frag(0).with_arguments("\"AAPL\"}"),
            frag(1).with_arguments("\"UTC\"}"),
        ])
        .finish();

        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].id.as_deref(), Some("call_a"));
        assert_eq!(calls[0].arguments, "{\"ticker\":\"AAPL\"}");
        assert_eq!(calls[1].id.as_deref(), Some("call_b"));
        assert_eq!(calls[1].arguments, "{\"timezone\":\"UTC\"}");
    }

    #[test]
    fn test_sparse_id_and_name_propagate() {
        let calls = ToolCallAccumulator::from_iter([
            frag(0)
                .with_id("x")
                .with_function_name("f")
                .with_call_type("function"),
            frag(0).with_arguments("{}"),
        ])
        .finish();

        assert_eq!(
            calls,
            vec![AccumulatedToolCall {
                id: Some("x".to_string()),
                function_name: Some("f".to_string()),
                arguments: "{}".to_string(),
                call_type: Some("function".to_string()),
            }]
        );
    }

    #[test]
    fn test_later_non_null_values_overwrite() {
        let calls = ToolCallAccumulator::from_iter([
            frag(0).with_id("first"),
            frag(0),
            frag(0).with_id("second"),
        ])
        .finish();
        assert_eq!(calls[0].id.as_deref(), Some("second"));
    }

    #[test]
    fn test_empty_argument_call_is_emitted() {
        let calls = ToolCallAccumulator::from_iter([frag(0).with_function_name("get_time")])
            .finish();

        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].arguments, "");
        assert_eq!(calls[0].parse_arguments().unwrap(), json!({}));
    }

    #[test]
    fn test_finish_orders_by_index_and_skips_gaps() {
        let calls = ToolCallAccumulator::from_iter([
            frag(5).with_function_name("late"),
            frag(2).with_function_name("early"),
        ])
        .finish();

        let names: Vec<_> = calls
            .iter()
            .map(|c| c.function_name.as_deref().unwrap_or(""))
            .collect();
        assert_eq!(names, vec!["early", "late"]);
    }

    #[test]
    fn test_empty_accumulator() {
        let accumulator = ToolCallAccumulator::new();
        assert!(accumulator.is_empty());
        assert!(accumulator.finish().is_empty());
    }

    #[test]
    fn test_malformed_arguments_surface_downstream() {
        let call = AccumulatedToolCall {
            function_name: Some("get_stock_history".to_string()),
            arguments: "{\"ticker\": ".to_string(),
            ..Default::default()
        };

        match call.parse_arguments() {
            Err(LLMError::MalformedToolArguments { name, .. }) => {
                assert_eq!(name, "get_stock_history");
            }
            other => panic!("Expected malformed arguments, got {other:?}"),
        }
    }

    #[test]
    fn test_into_message_without_tools() {
        let response = StreamedResponse {
            text: "Hello".to_string(),
            ..Default::default()
        };
        let message = response.into_message().unwrap();
        assert_eq!(message.role, Role::Assistant);
        assert_eq!(message.text(), Some("Hello"));
        assert!(!message.has_tool_uses());
    }

    #[test]
    fn test_into_message_with_tools() {
        let response = StreamedResponse {
            text: String::new(),
            tool_calls: vec![AccumulatedToolCall {
                id: None,
                function_name: Some("get_current_time".to_string()),
                arguments: "{\"timezone\":\"UTC\"}".to_string(),
                call_type: None,
            }],
            stop_reason: Some(StopReason::ToolUse),
            usage: TokenUsage::default(),
        };

        let message = response.into_message().unwrap();
        let uses = message.tool_uses();
        assert_eq!(uses.len(), 1);
        match uses[0] {
            ContentBlock::ToolUse { id, name, input } => {
                assert_eq!(id, "call_0");
                assert_eq!(name, "get_current_time");
                assert_eq!(input["timezone"], "UTC");
            }
            other => panic!("Expected tool use, got {other:?}"),
        }
        assert_eq!(message.text(), None);
    }

    #[tokio::test]
    async fn test_collect_stream() {
        let events = vec![
            Ok(StreamEvent::TextDelta("Let me ".to_string())),
            Ok(StreamEvent::TextDelta("check.".to_string())),
            Ok(StreamEvent::ToolCallDelta(
                frag(0).with_id("call_1").with_function_name("get_current_time"),
            )),
            Ok(StreamEvent::ToolCallDelta(frag(0).with_arguments("{}"))),
            Ok(StreamEvent::Finished(StopReason::ToolUse)),
            Ok(StreamEvent::Usage(TokenUsage {
                input_tokens: 10,
                output_tokens: 4,
            })),
        ];
        let stream: CompletionStream = Box::pin(stream::iter(events));

        let mut echoed = Vec::new();
        let response = collect_stream(stream, |delta| echoed.push(delta.to_string()))
            .await
            .unwrap();

        assert_eq!(echoed, vec!["Let me ", "check."]);
        assert_eq!(response.text, "Let me check.");
        assert_eq!(response.tool_calls.len(), 1);
        assert_eq!(response.stop_reason, Some(StopReason::ToolUse));
        assert_eq!(response.usage.total(), 14);
    }

    #[tokio::test]
    async fn test_collect_stream_propagates_errors() {
        let events = vec![
            Ok(StreamEvent::TextDelta("partial".to_string())),
            Err(LLMError::Stream("connection reset".to_string())),
        ];
        let stream: CompletionStream = Box::pin(stream::iter(events));

        let result = collect_stream(stream, |_| {}).await;
        assert!(matches!(result, Err(LLMError::Stream(_))));
    }
}
