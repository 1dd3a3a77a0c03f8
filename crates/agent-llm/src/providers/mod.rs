//! Concrete LLM provider implementations
//!
//! Each provider sits behind a cargo feature of the same name.

#[cfg(feature = "openai")]
pub mod openai;

#[cfg(feature = "gemini")]
pub mod gemini;

#[cfg(feature = "openai")]
pub use openai::{OpenAIConfig, OpenAIProvider};

#[cfg(feature = "gemini")]
pub use gemini::{GeminiConfig, GeminiProvider, Generation, UploadedFile};
