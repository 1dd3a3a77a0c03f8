//! PDF paper review with a multimodal model

use agent_core::{Error, Result};
use agent_llm::providers::GeminiProvider;
use std::path::{Path, PathBuf};
use tracing::info;

/// Writes a structured review of a paper, modeled on an example review
pub struct PaperReviewer {
    provider: GeminiProvider,
    model: String,
    language: String,
}

impl PaperReviewer {
    pub fn new(provider: GeminiProvider, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            language: "English".to_string(),
        }
    }

    /// Language the review is written in
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Upload both PDFs and generate the review text
    pub async fn review(&self, paper: &Path, example_review: &Path) -> Result<String> {
        info!(path = %example_review.display(), "Uploading example review");
        let example = self
            .provider
            .upload_file(example_review)
            .await
            .map_err(|e| Error::ProcessingFailed(e.to_string()))?;

        info!(path = %paper.display(), "Uploading paper");
        let paper = self
            .provider
            .upload_file(paper)
            .await
            .map_err(|e| Error::ProcessingFailed(e.to_string()))?;

        let generation = self
            .provider
            .generate_with_files(&self.model, &self.prompt(), &[example, paper])
            .await
            .map_err(|e| Error::ProcessingFailed(e.to_string()))?;

        info!(
            review_length = generation.text.len(),
            output_tokens = generation.usage.output_tokens,
            "Review generated"
        );
        Ok(generation.text)
    }

    fn prompt(&self) -> String {
        format!(
            "You are an AI engineer with a PhD in statistics. \
Analyze and review the given paper in depth.

The first document is an example paper review. Follow its structure and style.
The second document is the paper to review.

The review must cover:
1. The core idea and contribution of the paper
2. A detailed explanation of the proposed method or algorithm
3. The main experimental results and performance analysis
4. Strengths and limitations of the paper
5. Practical applicability and directions for future research

Match the format and depth of the example, adapted to the paper under review.
Write the entire review in {}.",
            self.language
        )
    }
}

/// `<paper stem>_review.md` next to the paper
pub fn review_output_path(paper: &Path) -> PathBuf {
    let stem = paper
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "paper".to_string());
    paper.with_file_name(format!("{stem}_review.md"))
}
