//! Gemini provider implementation
//!
//! Covers the parts of the Generative Language API the toolkit uses:
//! uploading local documents through the Files API and generating text
//! from a prompt plus uploaded files. Plain text conversations go through
//! [`LLMProvider::complete`].
//! See: https://ai.google.dev/api/files and https://ai.google.dev/api/generate-content
//!
//! ```no_run
//! use agent_llm::providers::GeminiProvider;
//!
//! # async fn review() -> agent_llm::Result<()> {
//! let gemini = GeminiProvider::from_env()?;
//! let paper = gemini.upload_file("paper.pdf").await?;
//! let reply = gemini
//!     .generate_with_files("gemini-2.0-flash-exp", "Summarize this paper.", &[paper])
//!     .await?;
//! println!("{}", reply.text);
//! # Ok(())
//! # }
//! ```

use crate::{
    CompletionRequest, CompletionResponse, ContentBlock, ImageSource, LLMError, LLMProvider,
    Message, MessageContent, Result, Role, StopReason, TokenUsage,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, instrument};

const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_TIMEOUT_SECS: u64 = 300;
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Configuration for the Gemini provider
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    /// Base URL without version path (default: Google's public endpoint)
    pub api_base: String,
    /// Request timeout in seconds; uploads and long generations need room
    pub timeout_secs: u64,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_base: DEFAULT_GEMINI_API_BASE.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Read the API key from `GEMINI_API_KEY`
    pub fn from_env() -> Result<Self> {
        std::env::var("GEMINI_API_KEY")
            .map(Self::new)
            .map_err(|_| {
                LLMError::ConfigurationError(
                    "GEMINI_API_KEY environment variable not set".to_string(),
                )
            })
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

/// A document stored with the Files API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    /// Resource name, e.g. `files/abc123`
    pub name: String,
    /// URI to reference the file from generation requests
    pub uri: String,
    pub mime_type: String,
}

/// Text produced by a generation request
#[derive(Debug, Clone)]
pub struct Generation {
    pub text: String,
    pub stop_reason: StopReason,
    pub usage: TokenUsage,
}

/// Gemini provider
pub struct GeminiProvider {
    client: Client,
    config: GeminiConfig,
}

impl GeminiProvider {
    pub fn with_config(config: GeminiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_config(GeminiConfig::new(api_key))
    }

    pub fn from_env() -> Result<Self> {
        Self::with_config(GeminiConfig::from_env()?)
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    /// Upload a local file; the MIME type is derived from its extension
    #[instrument(skip(self, path), fields(path = %path.as_ref().display()))]
    pub async fn upload_file(&self, path: impl AsRef<Path>) -> Result<UploadedFile> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let mime_type = mime_type_for(path);
        debug!(size = bytes.len(), mime_type, "Uploading file");

        let response = self
            .client
            .post(format!("{}/upload/v1beta/files", self.config.api_base))
            .query(&[("uploadType", "media")])
            .header(API_KEY_HEADER, &self.config.api_key)
            .header(reqwest::header::CONTENT_TYPE, mime_type)
            .body(bytes)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            return Err(LLMError::from_status(status.as_u16(), error_text, "files"));
        }

        let uploaded: UploadResponse = response.json().await.map_err(|e| {
            LLMError::UnexpectedResponse(format!("Failed to parse upload response: {e}"))
        })?;
        debug!(name = %uploaded.file.name, "File uploaded");
        Ok(uploaded.file)
    }

    /// Generate text from previously uploaded files followed by a prompt
    pub async fn generate_with_files(
        &self,
        model: &str,
        prompt: &str,
        files: &[UploadedFile],
    ) -> Result<Generation> {
        let mut parts: Vec<Part> = files.iter().map(Part::from).collect();
        parts.push(Part::text(prompt));

        let request = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts,
            }],
            system_instruction: None,
            generation_config: None,
        };
        self.generate(model, &request).await
    }

    #[instrument(skip(self, request), fields(model = %model))]
    async fn generate(&self, model: &str, request: &GenerateRequest) -> Result<Generation> {
        debug!(contents = request.contents.len(), "Sending generateContent");

        let response = self
            .client
            .post(format!(
                "{}/v1beta/models/{model}:generateContent",
                self.config.api_base
            ))
            .header(API_KEY_HEADER, &self.config.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            return Err(LLMError::from_status(status.as_u16(), error_text, model));
        }

        let body: GenerateResponse = response.json().await.map_err(|e| {
            LLMError::UnexpectedResponse(format!("Failed to parse response: {e}"))
        })?;
        let generation = body.into_generation()?;
        debug!(
            text_len = generation.text.len(),
            input_tokens = generation.usage.input_tokens,
            output_tokens = generation.usage.output_tokens,
            "Received generation"
        );
        Ok(generation)
    }
}

#[async_trait]
impl LLMProvider for GeminiProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        if request.has_tools() {
            return Err(LLMError::InvalidRequest(
                "tool calling is not supported by the Gemini provider".to_string(),
            ));
        }

        let (system_instruction, contents) = convert_messages(request.system, request.messages);
        let body = GenerateRequest {
            contents,
            system_instruction,
            generation_config: Some(GenerationConfig {
                max_output_tokens: request.max_tokens,
                temperature: request.temperature,
                stop_sequences: request.stop_sequences,
            }),
        };

        let generation = self.generate(&request.model, &body).await?;
        Ok(CompletionResponse {
            message: Message::assistant(generation.text),
            stop_reason: generation.stop_reason,
            usage: generation.usage,
        })
    }

    fn name(&self) -> &'static str {
        "gemini"
    }
}

fn mime_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("pdf") => "application/pdf",
        Some("txt") => "text/plain",
        Some("md") => "text/markdown",
        Some("csv") => "text/csv",
        Some("html" | "htm") => "text/html",
        Some("json") => "application/json",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
struct UploadResponse {
    file: UploadedFile,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_sequences: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
enum Part {
    Text(String),
    FileData(FileData),
    InlineData(InlineData),
}

impl Part {
    fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }
}

impl From<&UploadedFile> for Part {
    fn from(file: &UploadedFile) -> Self {
        Self::FileData(FileData {
            mime_type: file.mime_type.clone(),
            file_uri: file.uri.clone(),
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FileData {
    mime_type: String,
    file_uri: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: usize,
    #[serde(default)]
    candidates_token_count: usize,
}

impl GenerateResponse {
    fn into_generation(self) -> Result<Generation> {
        let candidate = self.candidates.into_iter().next().ok_or_else(|| {
            LLMError::UnexpectedResponse("No candidates in response".to_string())
        })?;

        let text = candidate
            .content
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect::<String>()
            })
            .unwrap_or_default();

        let usage = self.usage_metadata.unwrap_or_default();
        Ok(Generation {
            text,
            stop_reason: candidate
                .finish_reason
                .as_deref()
                .map_or(StopReason::EndTurn, StopReason::from_finish_reason),
            usage: TokenUsage {
                input_tokens: usage.prompt_token_count,
                output_tokens: usage.candidates_token_count,
            },
        })
    }
}

/// Split a conversation into a system instruction and `user`/`model` turns
///
/// System messages anywhere in the conversation join the system
/// instruction. Tool blocks have no counterpart here and are dropped.
fn convert_messages(
    system: Option<String>,
    messages: Vec<Message>,
) -> (Option<SystemInstruction>, Vec<Content>) {
    let mut instructions: Vec<Part> = system.into_iter().map(Part::Text).collect();
    let mut contents = Vec::new();

    for message in messages {
        let parts = message_parts(message.content);
        match message.role {
            Role::System => instructions.extend(parts),
            Role::User => contents.push(Content { role: "user", parts }),
            Role::Assistant => contents.push(Content {
                role: "model",
                parts,
            }),
        }
    }

    let instruction = (!instructions.is_empty()).then_some(SystemInstruction {
        parts: instructions,
    });
    (instruction, contents)
}

fn message_parts(content: Option<MessageContent>) -> Vec<Part> {
    match content {
        Some(MessageContent::Text(text)) => vec![Part::Text(text)],
        Some(MessageContent::Blocks(blocks)) => blocks
            .into_iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(Part::Text(text)),
                ContentBlock::Image {
                    source: ImageSource::Base64 { media_type, data },
                } => Some(Part::InlineData(InlineData {
                    mime_type: media_type,
                    data,
                })),
                ContentBlock::Image {
                    source: ImageSource::Url { url },
                } => Some(Part::FileData(FileData {
                    mime_type: "image/jpeg".to_string(),
                    file_uri: url,
                })),
                ContentBlock::ToolUse { .. } | ContentBlock::ToolResult { .. } => None,
            })
            .collect(),
        None => vec![],
    }
}
