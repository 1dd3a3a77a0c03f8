//! Natural language to SQL

use agent_core::{Error, Result};
use agent_llm::{CompletionRequest, LLMProvider, Message};
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, instrument};

const SQL_SYSTEM_PROMPT: &str = "You translate requests into SQL. \
Reply with the SQL query only, without explanations.";

/// One-shot completion that turns a request into a SQL query
pub struct TextToSql {
    provider: Arc<dyn LLMProvider>,
    model: String,
    code_fence: Regex,
}

impl TextToSql {
    pub fn new(provider: Arc<dyn LLMProvider>, model: impl Into<String>) -> Result<Self> {
        let code_fence = Regex::new(r"(?s)```[A-Za-z]*[ \t]*\n?(.*?)```")
            .map_err(|e| Error::InitializationFailed(e.to_string()))?;

        Ok(Self {
            provider,
            model: model.into(),
            code_fence,
        })
    }

    /// Generate SQL for `question`
    #[instrument(skip(self), fields(model = %self.model))]
    pub async fn generate(&self, question: &str) -> Result<String> {
        let request = CompletionRequest::builder(&self.model)
            .system(SQL_SYSTEM_PROMPT)
            .add_message(Message::user(question))
            .max_tokens(1024)
            .build();

        let response = self
            .provider
            .complete(request)
            .await
            .map_err(|e| Error::ProcessingFailed(e.to_string()))?;

        let text = response.message.text().unwrap_or_default();
        debug!(response_length = text.len(), "SQL generated");
        Ok(self.strip_code_fence(text))
    }

    /// Body of the first markdown code fence, or the trimmed text when
    /// there is none
    pub fn strip_code_fence(&self, text: &str) -> String {
        self.code_fence
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map_or(text, |body| body.as_str())
            .trim()
            .to_string()
    }
}
