//! Chat session events and the terminal printer

use async_trait::async_trait;
use serde_json::Value;
use std::io::{self, Write};
use tracing::debug;

const TOOL_RESULT_PREVIEW_CHARS: usize = 500;

const YELLOW: &str = "\x1b[33m";
const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const RESET: &str = "\x1b[0m";

/// Event handler for chat session events
///
/// Implement this trait to follow a [`ChatSession`](crate::ChatSession)
/// turn as it happens: streamed text, tool calls and their results.
#[async_trait]
pub trait ChatEventHandler: Send + Sync {
    /// Called for each streamed text chunk
    fn on_text_delta(&self, _delta: &str) {}

    /// Called when a tool execution starts
    async fn on_tool_start(&self, _id: &str, _name: &str, _input: &Value) {}

    /// Called when a tool execution completes
    async fn on_tool_done(
        &self,
        _id: &str,
        _name: &str,
        _result: std::result::Result<&str, &str>,
        _duration_ms: u64,
    ) {
    }

    /// Called with the final answer of a turn
    async fn on_complete(&self, _text: &str) {}

    /// Called when a turn fails
    async fn on_error(&self, _error: &str) {}
}

/// No-op event handler for when events are not needed
pub struct NoOpEventHandler;

#[async_trait]
impl ChatEventHandler for NoOpEventHandler {}

/// Prints a chat turn to the terminal
///
/// Text is echoed to stdout as it streams; tool activity is tagged with
/// `[Tool Call]` / `[Tool Result]`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleEventHandler;

impl ConsoleEventHandler {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ChatEventHandler for ConsoleEventHandler {
    fn on_text_delta(&self, delta: &str) {
        if let Err(e) = write_delta(&mut io::stdout().lock(), delta) {
            debug!(error = %e, "Failed to echo streamed text");
        }
    }

    async fn on_tool_start(&self, _id: &str, name: &str, input: &Value) {
        println!("\n{}", tool_call_line(name, input));
    }

    async fn on_tool_done(
        &self,
        _id: &str,
        name: &str,
        result: std::result::Result<&str, &str>,
        duration_ms: u64,
    ) {
        println!("{}", tool_result_line(name, result, duration_ms));
    }

    async fn on_complete(&self, _text: &str) {
        println!();
    }

    async fn on_error(&self, error: &str) {
        eprintln!("\n{RED}[Error]{RESET} {error}");
    }
}

fn write_delta(out: &mut impl Write, delta: &str) -> io::Result<()> {
    out.write_all(delta.as_bytes())?;
    out.flush()
}

fn tool_call_line(name: &str, input: &Value) -> String {
    format!("{YELLOW}[Tool Call]{RESET} {name} {input}")
}

fn tool_result_line(name: &str, result: std::result::Result<&str, &str>, duration_ms: u64) -> String {
    match result {
        Ok(output) => format!(
            "{GREEN}[Tool Result]{RESET} {name} ({duration_ms} ms)\n{}",
            truncate_chars(output, TOOL_RESULT_PREVIEW_CHARS)
        ),
        Err(error) => format!("{RED}[Tool Result]{RESET} {name} failed: {error}"),
    }
}

/// First `max` characters of `text`, with `...` appended when cut
pub(crate) fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
